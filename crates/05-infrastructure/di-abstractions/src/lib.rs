//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件定义模型与容器各协作方的接口。
//!
//! ## 核心接口
//!
//! - [`ComponentDefinition`] / [`MergedDefinition`] - 原始定义与合并后的定义
//! - [`InstanceFactory`] - 实例创建钩子
//! - [`ComponentPostProcessor`] - 组件后置处理器
//! - [`Scope`] - 自定义作用域策略
//! - [`ExpressionEvaluator`] - 表达式求值器
//! - [`DefinitionSource`] - 组件定义来源
//! - [`DiContainer`] - 容器公共接口

pub mod container;
pub mod definition;
pub mod factory;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use container::*;
pub use definition::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
pub use scope::*;
