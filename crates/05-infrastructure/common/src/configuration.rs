//! 容器配置
//!
//! 配置可以来自文件（toml/json/yaml）与 `LORN_DI_` 前缀的环境变量，未配置的项使用默认值

use crate::errors::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "LORN_DI";

/// 单次创建过程最多记录的被抑制错误数量
pub const DEFAULT_SUPPRESSED_ERROR_LIMIT: usize = 100;

/// 容器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许单例之间通过早期引用解决循环依赖
    pub allow_circular_references: bool,
    /// 是否允许同名组件定义覆盖
    pub allow_definition_overriding: bool,
    /// 是否缓存合并后的组件定义
    pub cache_metadata: bool,
    /// 单次创建过程最多记录的被抑制错误数量，超出部分不再记录
    pub suppressed_error_limit: usize,
    /// 匿名内部组件的名称前缀
    pub inner_name_prefix: String,
    /// 占位符求值器使用的键值
    pub placeholders: HashMap<String, String>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_definition_overriding: true,
            cache_metadata: true,
            suppressed_error_limit: DEFAULT_SUPPRESSED_ERROR_LIMIT,
            inner_name_prefix: "(inner component)".to_string(),
            placeholders: HashMap::new(),
        }
    }
}

impl ContainerConfig {
    /// 加载配置：可选的配置文件 + 环境变量
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        Self::build(builder, path)
    }

    /// 从必须存在的配置文件加载
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let builder = config::Config::builder().add_source(config::File::from(path));
        Self::build(builder, Some(path))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        debug!("加载容器配置: {:?}", path);

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                error!("容器配置构建失败: {}", e);
                ConfigError::ParseError {
                    source: Box::new(e),
                }
            })?;

        let config: Self = settings.try_deserialize().map_err(|e| {
            error!("容器配置绑定失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inner_name_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "inner_name_prefix 不能为空".to_string(),
            });
        }
        Ok(())
    }

    /// 设置是否允许循环引用
    pub fn with_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }

    /// 设置是否允许定义覆盖
    pub fn with_definition_overriding(mut self, allow: bool) -> Self {
        self.allow_definition_overriding = allow;
        self
    }

    /// 添加占位符
    pub fn with_placeholder(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_permissive() {
        let config = ContainerConfig::default();
        assert!(config.allow_circular_references);
        assert!(config.allow_definition_overriding);
        assert!(config.cache_metadata);
        assert_eq!(config.suppressed_error_limit, 100);
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("创建临时文件应该成功");
        writeln!(
            file,
            "allow_circular_references = false\nsuppressed_error_limit = 5\n\n[placeholders]\napp_name = \"demo\""
        )
        .unwrap();

        let config = ContainerConfig::from_file(file.path()).expect("配置加载应该成功");
        assert!(!config.allow_circular_references);
        assert!(config.allow_definition_overriding);
        assert_eq!(config.suppressed_error_limit, 5);
        assert_eq!(config.placeholders.get("app_name").map(String::as_str), Some("demo"));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = ContainerConfig::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn empty_prefix_is_rejected() {
        let config = ContainerConfig {
            inner_name_prefix: "  ".to_string(),
            ..ContainerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
