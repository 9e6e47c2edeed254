//! 集成测试公共支撑
//!
//! 提供记录实例化次数与销毁顺序的创建钩子，以及通用的测试组件

use di_abstractions::{ContainerBuilder, InstanceFactory, MergedDefinition, ResolvedValue};
use di_impl::DiContainerImpl;
use infrastructure_common::{downcast_instance, instance, ContainerError, HookError, Instance};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT_LOGGER: Once = Once::new();

/// 初始化测试日志系统（只初始化一次）
pub fn init_test_logger() {
    INIT_LOGGER.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 通用测试组件
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub args: Vec<ResolvedValue>,
    props: Mutex<Vec<(String, ResolvedValue)>>,
}

impl Node {
    pub fn prop(&self, key: &str) -> Option<ResolvedValue> {
        self.props
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn peer(&self, key: &str) -> Option<Arc<Node>> {
        self.prop(key).and_then(|v| v.as_component::<Node>())
    }
}

pub fn as_node(instance: &Instance) -> Arc<Node> {
    downcast_instance::<Node>(instance).expect("实例应该是 Node")
}

/// 计数的实例创建钩子
#[derive(Default)]
pub struct CountingFactory {
    delay: Option<Duration>,
    instantiations: Mutex<HashMap<String, usize>>,
    destroyed: Mutex<Vec<(String, Instance)>>,
}

impl CountingFactory {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 每次实例化前等待，扩大并发竞争窗口
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn instantiations(&self, name: &str) -> usize {
        self.instantiations.lock().get(name).copied().unwrap_or(0)
    }

    /// 按执行顺序记录的销毁回调
    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed
            .lock()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// 指定名称下被销毁的实例
    pub fn destroyed_instances(&self, name: &str) -> Vec<Instance> {
        self.destroyed
            .lock()
            .iter()
            .filter(|(destroyed, _)| destroyed == name)
            .map(|(_, instance)| instance.clone())
            .collect()
    }
}

impl InstanceFactory for CountingFactory {
    fn instantiate(
        &self,
        name: &str,
        _definition: &MergedDefinition,
        args: &[ResolvedValue],
    ) -> Result<Instance, HookError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        *self.instantiations.lock().entry(name.to_string()).or_default() += 1;
        Ok(instance(Node {
            name: name.to_string(),
            args: args.to_vec(),
            props: Mutex::new(Vec::new()),
        }))
    }

    fn populate(
        &self,
        _name: &str,
        _definition: &MergedDefinition,
        instance: &Instance,
        properties: &[(String, ResolvedValue)],
    ) -> Result<(), HookError> {
        let node = downcast_instance::<Node>(instance).ok_or("实例不是 Node")?;
        node.props.lock().extend(properties.iter().cloned());
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
        instance: &Instance,
    ) -> Result<(), HookError> {
        self.destroyed
            .lock()
            .push((name.to_string(), instance.clone()));
        Ok(())
    }
}

/// 使用计数钩子构建空容器
pub fn container_with(factory: &Arc<CountingFactory>) -> Result<DiContainerImpl, ContainerError> {
    init_test_logger();
    DiContainerImpl::builder()
        .with_instance_factory(Arc::clone(factory) as Arc<dyn InstanceFactory>)
        .build()
}
