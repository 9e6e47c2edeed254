//! 组件生命周期（作用域）定义

use std::fmt;

/// 单例作用域名称
pub const SCOPE_SINGLETON: &str = "singleton";
/// 原型作用域名称
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// 组件生命周期类型
///
/// 决定组件实例的共享方式与存放位置
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// 单例模式 - 容器内每个名称只创建一个实例，存放在实例注册表中
    Singleton,
    /// 原型模式 - 每次请求都创建新实例，容器不缓存
    Prototype,
    /// 自定义作用域 - 实例由同名的作用域策略管理
    Scoped(String),
}

impl Lifetime {
    /// 从作用域名称解析生命周期
    pub fn from_name(name: &str) -> Self {
        match name {
            SCOPE_SINGLETON => Self::Singleton,
            SCOPE_PROTOTYPE => Self::Prototype,
            other => Self::Scoped(other.to_string()),
        }
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        match self {
            Self::Singleton => SCOPE_SINGLETON,
            Self::Prototype => SCOPE_PROTOTYPE,
            Self::Scoped(name) => name,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Singleton)
    }

    pub fn is_prototype(&self) -> bool {
        matches!(self, Self::Prototype)
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::Singleton
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 组件创建状态
///
/// `Absent -> InCreation -> EarlyExposed -> Created`，失败时回到 `Absent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationState {
    /// 不存在任何缓存
    Absent,
    /// 正在创建中
    InCreation,
    /// 已对外暴露早期引用
    EarlyExposed,
    /// 已完全创建
    Created,
}

impl Default for CreationState {
    fn default() -> Self {
        Self::Absent
    }
}
