//! # 依赖注入具体实现
//!
//! 提供依赖注入容器、实例注册表、定义合并解析器、属性值解析器以及内置协作组件的实现。
//!
//! ## 主要类型
//!
//! - [`DiContainerImpl`] - 容器实现，驱动组件创建与销毁
//! - [`DiContainerBuilder`] - 容器构建器
//! - [`InstanceRegistry`] - 三层单例缓存与依赖关系表
//! - [`DefinitionMerger`] - 父子定义合并与缓存
//! - [`MapScope`] / [`PlaceholderEvaluator`] / [`TypeCatalog`] - 内置协作组件

pub mod builder;
pub mod catalog;
pub mod container;
pub mod definition_registry;
pub mod disposal;
pub mod evaluator;
pub mod instance_registry;
pub mod merge;
pub mod scope;

mod markers;
mod value_resolver;

pub use builder::DiContainerBuilder;
pub use catalog::TypeCatalog;
pub use container::DiContainerImpl;
pub use definition_registry::DefinitionRegistry;
pub use disposal::DisposalHook;
pub use evaluator::PlaceholderEvaluator;
pub use instance_registry::{EarlyReferenceFactory, InstanceRegistry};
pub use merge::DefinitionMerger;
pub use scope::MapScope;

#[cfg(test)]
mod tests;
