//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// 凭据加密配置
///
/// `key_hex` 为 64 个 hex 字符（32 字节 AES-256 密钥）。未配置时
/// 加密器降级为 passthrough 模式，仅用于开发环境。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionConfig {
    pub key_hex: Option<String>,
}

/// 静态目标定义
///
/// 开发/演示环境下通过配置预置的初始目标清单，生产环境由发现子系统
/// 在运行期注册目标。
#[derive(Debug, Clone, Deserialize)]
pub struct StaticTargetConfig {
    pub jvm_id: String,
    pub connect_url: String,
    pub alias: Option<String>,
}

/// 目标发现配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub static_targets: Vec<StaticTargetConfig>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（FLIGHTWATCH_ 前缀，如 FLIGHTWATCH_ENCRYPTION_KEY_HEX -> encryption.key_hex）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("FLIGHTWATCH_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{env}.toml"))).required(false),
            )
            .add_source(
                Environment::with_prefix("FLIGHTWATCH")
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
        assert!(config.encryption.key_hex.is_none());
    }

    #[test]
    fn test_is_production() {
        let config = AppConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(config.is_production());
        assert!(!AppConfig::default().is_production());
    }
}
