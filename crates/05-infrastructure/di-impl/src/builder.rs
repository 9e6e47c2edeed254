//! 容器构建器

use crate::catalog::TypeCatalog;
use crate::container::DiContainerImpl;
use crate::evaluator::PlaceholderEvaluator;
use di_abstractions::{
    ComponentDefinition, ComponentPostProcessor, ContainerBuilder, DefinitionSource,
    ExpressionEvaluator, InstanceFactory, Scope,
};
use infrastructure_common::{ContainerConfig, ContainerError, Instance};
use std::sync::Arc;
use tracing::info;

/// 依赖注入容器构建器
#[derive(Default)]
pub struct DiContainerBuilder {
    config: ContainerConfig,
    definitions: Vec<(String, ComponentDefinition)>,
    instances: Vec<(String, Instance)>,
    source: Option<Arc<dyn DefinitionSource>>,
    parent: Option<Arc<DiContainerImpl>>,
    instance_factory: Option<Arc<dyn InstanceFactory>>,
    post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
}

impl DiContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerBuilder for DiContainerBuilder {
    type Container = DiContainerImpl;

    fn build(self) -> Result<DiContainerImpl, ContainerError> {
        self.config.validate()?;
        info!(
            "构建依赖注入容器: {} 个组件定义, {} 个单例实例, {} 个作用域",
            self.definitions.len(),
            self.instances.len(),
            self.scopes.len()
        );

        let instance_factory = self
            .instance_factory
            .unwrap_or_else(|| Arc::new(TypeCatalog::new()));
        // 配置了占位符但没有指定求值器时使用占位符求值器
        let evaluator = self.evaluator.or_else(|| {
            (!self.config.placeholders.is_empty()).then(|| {
                Arc::new(PlaceholderEvaluator::new(self.config.placeholders.clone()))
                    as Arc<dyn ExpressionEvaluator>
            })
        });

        let container = DiContainerImpl::from_parts(
            self.config,
            instance_factory,
            self.source,
            self.parent,
            self.post_processors,
            evaluator,
        );

        for (name, scope) in self.scopes {
            container.register_scope(name, scope)?;
        }
        for (name, definition) in self.definitions {
            container.register_definition(name, definition)?;
        }
        for (name, instance) in self.instances {
            container.register_instance(name, instance)?;
        }
        Ok(container)
    }

    fn register_definition(
        mut self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Self {
        self.definitions.push((name.into(), definition));
        self
    }

    fn register_instance(mut self, name: impl Into<String>, instance: Instance) -> Self {
        self.instances.push((name.into(), instance));
        self
    }

    fn with_definition_source(mut self, source: Arc<dyn DefinitionSource>) -> Self {
        self.source = Some(source);
        self
    }

    fn with_parent(mut self, parent: Arc<DiContainerImpl>) -> Self {
        self.parent = Some(parent);
        self
    }

    fn with_instance_factory(mut self, factory: Arc<dyn InstanceFactory>) -> Self {
        self.instance_factory = Some(factory);
        self
    }

    fn with_post_processor(mut self, processor: Arc<dyn ComponentPostProcessor>) -> Self {
        self.post_processors.push(processor);
        self
    }

    fn with_scope(mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    fn with_evaluator(mut self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }
}
