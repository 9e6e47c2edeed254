//! 组件销毁回调

use di_abstractions::{ComponentPostProcessor, InstanceFactory, MergedDefinition};
use infrastructure_common::Instance;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 组件的销毁回调
///
/// 依次执行需要参与销毁的后置处理器与实例创建钩子的销毁回调，失败只记录日志
pub struct DisposalHook {
    name: String,
    instance: Instance,
    definition: Arc<MergedDefinition>,
    factory: Option<Arc<dyn InstanceFactory>>,
    processors: Vec<Arc<dyn ComponentPostProcessor>>,
}

impl DisposalHook {
    /// 实例需要销毁时创建回调
    pub fn for_instance(
        name: &str,
        instance: &Instance,
        definition: &Arc<MergedDefinition>,
        factory: &Arc<dyn InstanceFactory>,
        processors: &[Arc<dyn ComponentPostProcessor>],
    ) -> Option<Self> {
        let processors: Vec<_> = processors
            .iter()
            .filter(|p| p.requires_destruction(name, instance))
            .cloned()
            .collect();
        let factory = factory
            .requires_destruction(name, definition, instance)
            .then(|| Arc::clone(factory));

        if processors.is_empty() && factory.is_none() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            instance: Arc::clone(instance),
            definition: Arc::clone(definition),
            factory,
            processors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 执行销毁
    pub fn run(self) {
        debug!("销毁组件: {}", self.name);

        for processor in &self.processors {
            if let Err(e) = processor.before_destruction(&self.name, &self.instance) {
                warn!("组件 '{}' 的销毁前置处理失败: {}", self.name, e);
            }
        }

        if let Some(factory) = &self.factory {
            if let Err(e) = factory.destroy(&self.name, &self.definition, &self.instance) {
                warn!("组件 '{}' 的销毁回调执行失败: {}", self.name, e);
            }
        }
    }
}

impl fmt::Debug for DisposalHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposalHook")
            .field("name", &self.name)
            .field("processors", &self.processors.len())
            .field("invoke_factory", &self.factory.is_some())
            .finish()
    }
}
