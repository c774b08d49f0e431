//! 生命周期事件模型与进程内事件总线
//!
//! 控制面的缓存一致性依赖生命周期事件：规则/凭据的增删改、目标的
//! 发现与丢失都会发布类型化事件，订阅方（各缓存）据此做失效处理。
//!
//! ## 投递语义
//!
//! `EventBus` 是同步的观察者注册表：`publish` 在调用方线程上依次执行
//! 全部处理器，返回时失效已经生效。这保证了"先失效、后可见"——
//! 发布事件的变更调用返回之后，任何后续查询都不会再观察到过期缓存值，
//! 且不同 key 的并发查询之间不会被一把全局锁串行化。

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::target::Target;

/// 实体生命周期类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleCategory {
    Created,
    Updated,
    Deleted,
}

impl std::fmt::Display for LifecycleCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        };
        write!(f, "{s}")
    }
}

/// 目标发现事件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryKind {
    /// 发现新目标（或已知目标重新上线）
    Found,
    /// 目标进程消失，所有以该目标为键的缓存必须清除
    Lost,
}

/// 目标发现事件
///
/// 由发现子系统在目标增减时发布。目标总体是全体组件共享的可变状态，
/// 变更只通过事件广播而非轮询暴露，缓存因此能与变更同步地做出反应。
#[derive(Debug, Clone)]
pub struct TargetDiscoveryEvent {
    pub kind: DiscoveryKind,
    pub target: Target,
}

type Handler<E> = Box<dyn Fn(&E) + Send + Sync>;

/// 进程内同步事件总线
///
/// 显式注册处理器的观察者列表，不依赖任何注入容器。各组件在启动装配
/// 阶段注册自己的失效处理器；运行期只读遍历，注册与发布互不阻塞
/// （读写锁，发布方持读锁）。
///
/// 处理器必须是非阻塞的纯内存操作；不得在处理器内再次向同一总线
/// 发布事件，否则会在读锁上重入。
pub struct EventBus<E> {
    handlers: RwLock<Vec<Handler<E>>>,
}

impl<E> EventBus<E> {
    /// 创建空总线
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// 注册一个事件处理器
    ///
    /// 处理器按注册顺序被调用。
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) {
        self.handlers.write().push(Box::new(handler));
    }

    /// 同步发布事件：在当前线程依次调用全部处理器
    pub fn publish(&self, event: &E) {
        for handler in self.handlers.read().iter() {
            handler(event);
        }
    }

    /// 已注册的处理器数量（用于装配自检）
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
