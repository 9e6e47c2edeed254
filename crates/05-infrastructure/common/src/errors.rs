//! 错误类型定义

use thiserror::Error;

/// 外部钩子（创建钩子、后置处理器、作用域、表达式求值器）返回的错误
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 容器错误类型
///
/// 覆盖组件定义合并、实例创建、依赖注入与销毁过程中的所有失败情形
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("组件未定义: {name}")]
    NoSuchComponent { name: String },

    #[error("无法解析父定义: 组件 '{name}' 的父定义 '{parent}', 原因: {reason}")]
    UnresolvableParentReference {
        name: String,
        parent: String,
        reason: String,
    },

    #[error("组件 '{name}' 是抽象定义，不能实例化")]
    AbstractDefinition { name: String },

    #[error("组件 '{name}' 与 '{dependency}' 之间存在循环 depends-on 关系")]
    DependsOnCycle { name: String, dependency: String },

    #[error("原型组件 '{name}' 存在无法解析的循环依赖")]
    CircularPrototypeDependency { name: String },

    #[error("组件 '{name}' 正在创建中，存在无法通过早期引用解析的循环依赖")]
    CurrentlyInCreation { name: String },

    #[error("组件 '{name}' 的 {label} 无法满足对 '{target}' 的引用: {reason}")]
    UnsatisfiedReference {
        name: String,
        label: String,
        target: String,
        reason: String,
    },

    #[error("组件 '{name}' 引用了无效的组件名称 '{target}' ({label})")]
    InvalidReferenceName {
        name: String,
        label: String,
        target: String,
    },

    #[error("组件 '{name}' 的 {label} 中存在空的键或值")]
    InvalidPropertiesEntry { name: String, label: String },

    #[error("未注册的作用域: 组件 '{name}' 使用了作用域 '{scope}'")]
    UnknownScope { name: String, scope: String },

    #[error("组件 '{name}' 的早期引用与最终实例不一致，已注入早期引用的依赖方持有的是另一个对象")]
    EarlyReferenceMismatch { name: String },

    #[error("组件 '{name}' 创建失败: {message}")]
    ConstructionFailure {
        name: String,
        message: String,
        #[source]
        source: Option<HookError>,
        related_causes: Vec<ContainerError>,
    },

    #[error("组件 '{name}' 在设置 {label} 时解析失败: {source}")]
    ReferenceFailure {
        name: String,
        label: String,
        #[source]
        source: Box<ContainerError>,
        related_causes: Vec<ContainerError>,
    },

    #[error("组件 '{name}' 的类型不是期望的 {expected}")]
    ComponentTypeMismatch {
        name: String,
        expected: &'static str,
    },

    #[error("容器正在销毁，不允许创建组件 '{name}'")]
    CreationNotAllowed { name: String },

    #[error("组件 '{name}' 已存在单例实例，不能重复注册")]
    DuplicateSingleton { name: String },

    #[error("不允许覆盖已存在的组件定义: {name}")]
    DefinitionOverrideNotAllowed { name: String },

    #[error("容器配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
}

impl ContainerError {
    /// 创建组件未定义错误
    pub fn no_such_component(name: impl Into<String>) -> Self {
        Self::NoSuchComponent { name: name.into() }
    }

    /// 创建组件构造失败错误（不带来源）
    pub fn construction(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstructionFailure {
            name: name.into(),
            message: message.into(),
            source: None,
            related_causes: Vec::new(),
        }
    }

    /// 包装外部钩子返回的错误
    pub fn hook_failure(
        name: impl Into<String>,
        message: impl Into<String>,
        source: HookError,
    ) -> Self {
        Self::ConstructionFailure {
            name: name.into(),
            message: message.into(),
            source: Some(source),
            related_causes: Vec::new(),
        }
    }

    /// 沿着 `ReferenceFailure` 链找到最初的错误
    pub fn root_cause(&self) -> &ContainerError {
        let mut current = self;
        while let Self::ReferenceFailure { source, .. } = current {
            current = source;
        }
        current
    }

    /// 创建过程中被抑制、随最终错误一并报告的关联错误
    pub fn related_causes(&self) -> &[ContainerError] {
        match self {
            Self::ConstructionFailure { related_causes, .. }
            | Self::ReferenceFailure { related_causes, .. } => related_causes,
            _ => &[],
        }
    }

    /// 附加关联错误
    ///
    /// 只有构造失败与引用失败两类错误能携带关联错误，其余错误原样返回并交还未附加的部分
    pub fn with_related_causes(
        mut self,
        causes: Vec<ContainerError>,
    ) -> (Self, Vec<ContainerError>) {
        match &mut self {
            Self::ConstructionFailure { related_causes, .. }
            | Self::ReferenceFailure { related_causes, .. } => {
                related_causes.extend(causes);
                (self, Vec::new())
            }
            _ => (self, causes),
        }
    }

    /// 是否为组件未定义错误（沿引用链判断）
    pub fn is_no_such_component(&self) -> bool {
        matches!(self.root_cause(), Self::NoSuchComponent { .. })
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type ContainerResult<T> = Result<T, ContainerError>;
