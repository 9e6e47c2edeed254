//! 自定义作用域抽象

use infrastructure_common::{ContainerError, Instance};

/// 作用域内创建实例的回调
pub type ScopeObjectFactory<'a> = &'a dyn Fn() -> Result<Instance, ContainerError>;

/// 作用域结束时执行的销毁回调
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// 作用域策略
///
/// 单例与原型以外的作用域由注册到容器的策略管理，策略决定实例的存放位置与存活时间
pub trait Scope: Send + Sync {
    /// 返回作用域内已存在的实例，不存在时用 `factory` 创建
    fn get(&self, name: &str, factory: ScopeObjectFactory<'_>) -> Result<Instance, ContainerError>;

    /// 从作用域移除实例，同时丢弃其销毁回调（由调用方负责销毁）
    fn remove(&self, name: &str) -> Option<Instance>;

    /// 注册实例在作用域结束时的销毁回调
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// 作用域标识
    fn conversation_id(&self) -> Option<String> {
        None
    }
}
