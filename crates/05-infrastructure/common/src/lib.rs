//! # Infrastructure Common
//!
//! 依赖注入容器各层共享的基础类型。
//!
//! ## 核心内容
//!
//! - [`ContainerError`] - 容器错误分类
//! - [`Lifetime`] - 组件作用域（单例、原型、自定义作用域）
//! - [`Instance`] - 容器管理的组件实例
//! - [`TypeInfo`] - 组件类型元数据
//! - [`ContainerConfig`] - 容器配置

pub mod component;
pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use component::*;
pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
