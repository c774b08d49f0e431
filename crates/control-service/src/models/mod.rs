//! 控制面领域模型

mod credential;
mod rule;

pub use credential::{Credential, CredentialEvent, PlainCredential};
pub use rule::{Rule, RuleEvent, RuleUpdate};
