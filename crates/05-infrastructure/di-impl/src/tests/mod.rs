//! 单元测试公共组件


use crate::container::DiContainerImpl;
use di_abstractions::{ContainerBuilder, InstanceFactory, MergedDefinition, ResolvedValue};
use indexmap::IndexMap;
use infrastructure_common::{downcast_instance, instance, HookError, Instance};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
pub(crate) fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 通用测试组件：记录构造参数与注入的属性
#[derive(Debug)]
pub(crate) struct Bag {
    pub name: String,
    pub args: Vec<ResolvedValue>,
    pub props: Mutex<IndexMap<String, ResolvedValue>>,
}

impl Bag {
    pub fn prop(&self, key: &str) -> Option<ResolvedValue> {
        self.props.lock().get(key).cloned()
    }

    /// 属性中注入的组件
    pub fn peer(&self, key: &str) -> Option<Arc<Bag>> {
        self.prop(key).and_then(|v| v.as_component::<Bag>())
    }
}

pub(crate) fn as_bag(instance: &Instance) -> Arc<Bag> {
    downcast_instance::<Bag>(instance).expect("实例应该是 Bag")
}

/// 记录调用情况的实例创建钩子
#[derive(Default)]
pub(crate) struct RecordingFactory {
    pub events: Mutex<Vec<String>>,
    instantiations: Mutex<IndexMap<String, usize>>,
    total: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    failing_destroy: Mutex<HashSet<String>>,
}

impl RecordingFactory {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 让指定组件的实例化失败
    pub fn fail(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub fn recover(&self, name: &str) {
        self.failing.lock().remove(name);
    }

    /// 让指定组件的销毁回调失败
    pub fn fail_destroy(&self, name: &str) {
        self.failing_destroy.lock().insert(name.to_string());
    }

    pub fn instantiations(&self, name: &str) -> usize {
        self.instantiations.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_instantiations(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// 只保留指定前缀的事件
    pub fn events_with(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }
}

impl InstanceFactory for RecordingFactory {
    fn instantiate(
        &self,
        name: &str,
        _definition: &MergedDefinition,
        args: &[ResolvedValue],
    ) -> Result<Instance, HookError> {
        *self.instantiations.lock().entry(name.to_string()).or_default() += 1;
        self.total.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(name) {
            return Err(format!("组件 {name} 构造失败").into());
        }
        self.events.lock().push(format!("new:{name}"));
        Ok(instance(Bag {
            name: name.to_string(),
            args: args.to_vec(),
            props: Mutex::new(IndexMap::new()),
        }))
    }

    fn populate(
        &self,
        _name: &str,
        _definition: &MergedDefinition,
        instance: &Instance,
        properties: &[(String, ResolvedValue)],
    ) -> Result<(), HookError> {
        let Some(bag) = downcast_instance::<Bag>(instance) else {
            return Ok(());
        };
        let mut props = bag.props.lock();
        for (key, value) in properties {
            props.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn initialize(
        &self,
        name: &str,
        definition: &MergedDefinition,
        _instance: &Instance,
    ) -> Result<(), HookError> {
        if let Some(method) = definition.init_method() {
            self.events.lock().push(format!("{method}:{name}"));
        }
        Ok(())
    }

    fn requires_destruction(
        &self,
        _name: &str,
        _definition: &MergedDefinition,
        _instance: &Instance,
    ) -> bool {
        true
    }

    fn destroy(
        &self,
        name: &str,
        _definition: &MergedDefinition,
        _instance: &Instance,
    ) -> Result<(), HookError> {
        self.events.lock().push(format!("destroy:{name}"));
        if self.failing_destroy.lock().contains(name) {
            return Err(format!("组件 {name} 销毁失败").into());
        }
        Ok(())
    }
}

/// 使用记录钩子构建容器
pub(crate) fn container_with(factory: &Arc<RecordingFactory>) -> DiContainerImpl {
    init_test_logger();
    DiContainerImpl::builder()
        .with_instance_factory(Arc::clone(factory) as Arc<dyn InstanceFactory>)
        .build()
        .expect("构建容器应该成功")
}
