//! 组件定义模型
//!
//! [`ComponentDefinition`] 是声明式来源产出的原始定义，
//! [`MergedDefinition`] 是沿父定义链展开后真正用于创建实例的定义。

use indexmap::IndexMap;
use infrastructure_common::{Lifetime, RequiredType, TypeInfo};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// 对其他组件的引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReference {
    /// 目标组件名称（可以包含表达式）
    pub name: String,
    /// 是否直接到父容器中查找
    pub to_parent: bool,
    /// 目标缺失时是否允许注入空值
    pub optional: bool,
    /// 目标实例必须满足的具体类型
    pub required_type: Option<RequiredType>,
}

impl ComponentReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            to_parent: false,
            optional: false,
            required_type: None,
        }
    }

    /// 到父容器中查找
    pub fn to_parent(mut self) -> Self {
        self.to_parent = true;
        self
    }

    /// 标记为可选引用
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// 要求目标为指定类型
    pub fn with_required_type<T: 'static>(mut self) -> Self {
        self.required_type = Some(RequiredType::of::<T>());
        self
    }
}

const EVALUATION_UNKNOWN: u8 = 0;
const EVALUATION_STATIC: u8 = 1;
const EVALUATION_DYNAMIC: u8 = 2;

/// 字面量/表达式字符串
///
/// 记录求值后是否为动态值；已知为静态的字面量不再交给求值器
#[derive(Clone)]
pub struct TypedLiteral {
    value: String,
    evaluation: Arc<AtomicU8>,
}

impl TypedLiteral {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            evaluation: Arc::new(AtomicU8::new(EVALUATION_UNKNOWN)),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// 求值结果与原文不同
    pub fn is_dynamic(&self) -> bool {
        self.evaluation.load(Ordering::Acquire) == EVALUATION_DYNAMIC
    }

    /// 已求值过且结果与原文相同
    pub fn is_known_static(&self) -> bool {
        self.evaluation.load(Ordering::Acquire) == EVALUATION_STATIC
    }

    pub fn mark_dynamic(&self) {
        self.evaluation.store(EVALUATION_DYNAMIC, Ordering::Release);
    }

    pub fn mark_static(&self) {
        // 动态标记一旦确定不再回退
        let _ = self.evaluation.compare_exchange(
            EVALUATION_UNKNOWN,
            EVALUATION_STATIC,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

impl fmt::Debug for TypedLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedLiteral")
            .field("value", &self.value)
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

impl PartialEq for TypedLiteral {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

/// 嵌套的匿名内部组件定义
#[derive(Debug, Clone)]
pub struct InnerDefinition {
    /// 声明的名称，未声明时由容器生成
    pub name: Option<String>,
    pub definition: Box<ComponentDefinition>,
}

/// 属性/构造参数的原始值
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// 按身份引用其他组件，注入目标实例
    Reference(ComponentReference),
    /// 按名称引用其他组件，只注入名称
    NameReference(String),
    /// 嵌套的内部组件
    Inner(InnerDefinition),
    /// 有序列表
    List(Vec<PropertyValue>),
    /// 去重集合（保持首次出现顺序）
    Set(Vec<PropertyValue>),
    /// 键值映射（保持插入顺序）
    Map(Vec<(PropertyValue, PropertyValue)>),
    /// 属性风格的键值映射，键和值都不允许为空
    Properties(Vec<(PropertyValue, PropertyValue)>),
    /// 字面量或表达式字符串
    Literal(TypedLiteral),
    /// 其他已经是具体值的数据，原样注入
    Value(serde_json::Value),
    /// 空值
    Null,
}

impl PropertyValue {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Reference(ComponentReference::new(name))
    }

    pub fn name_reference(name: impl Into<String>) -> Self {
        Self::NameReference(name.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(TypedLiteral::new(value))
    }

    pub fn value(value: serde_json::Value) -> Self {
        Self::Value(value)
    }

    pub fn inner(definition: ComponentDefinition) -> Self {
        Self::Inner(InnerDefinition {
            name: None,
            definition: Box::new(definition),
        })
    }

    pub fn named_inner(name: impl Into<String>, definition: ComponentDefinition) -> Self {
        Self::Inner(InnerDefinition {
            name: Some(name.into()),
            definition: Box::new(definition),
        })
    }
}

impl From<ComponentReference> for PropertyValue {
    fn from(reference: ComponentReference) -> Self {
        Self::Reference(reference)
    }
}

/// 原始组件定义
#[derive(Debug, Clone, Default)]
pub struct ComponentDefinition {
    /// 类型标识，交给创建钩子解释
    pub type_name: Option<String>,
    /// 父定义名称
    pub parent: Option<String>,
    /// 作用域，未设置时合并后默认为单例
    pub scope: Option<Lifetime>,
    /// 是否为抽象定义（只作为模板）
    pub is_abstract: bool,
    /// 显式声明的前置依赖
    pub depends_on: Vec<String>,
    /// 构造参数（按下标）
    pub constructor_args: BTreeMap<usize, PropertyValue>,
    /// 属性（保持声明顺序）
    pub properties: IndexMap<String, PropertyValue>,
    /// 初始化回调名称
    pub init_method: Option<String>,
    /// 销毁回调名称
    pub destroy_method: Option<String>,
    /// 描述
    pub description: Option<String>,
    /// 附加属性
    pub attributes: BTreeMap<String, String>,
}

impl ComponentDefinition {
    /// 创建指定类型的定义
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    /// 创建继承自父定义的子定义
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_scope(mut self, scope: Lifetime) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn singleton(self) -> Self {
        self.with_scope(Lifetime::Singleton)
    }

    pub fn prototype(self) -> Self {
        self.with_scope(Lifetime::Prototype)
    }

    pub fn scoped(self, scope_name: impl Into<String>) -> Self {
        self.with_scope(Lifetime::Scoped(scope_name.into()))
    }

    pub fn abstract_template(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    pub fn arg(mut self, index: usize, value: PropertyValue) -> Self {
        self.constructor_args.insert(index, value);
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method = Some(method.into());
        self
    }

    pub fn destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method = Some(method.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// 合并后的组件定义
///
/// 一个合并定义同一时刻只对应一个组件名称；过期后由合并解析器重新计算，而不是原地修改
#[derive(Debug)]
pub struct MergedDefinition {
    name: String,
    type_name: Option<String>,
    scope: Lifetime,
    is_abstract: bool,
    depends_on: Vec<String>,
    constructor_args: BTreeMap<usize, PropertyValue>,
    properties: IndexMap<String, PropertyValue>,
    init_method: Option<String>,
    destroy_method: Option<String>,
    description: Option<String>,
    attributes: BTreeMap<String, String>,
    /// 父定义链（由近及远）
    lineage: Vec<String>,
    stale: AtomicBool,
    resolved_type: OnceCell<TypeInfo>,
}

impl MergedDefinition {
    /// 无父定义时直接复制原始定义
    pub fn from_root(name: impl Into<String>, definition: &ComponentDefinition) -> Self {
        Self {
            name: name.into(),
            type_name: definition.type_name.clone(),
            scope: definition.scope.clone().unwrap_or_default(),
            is_abstract: definition.is_abstract,
            depends_on: definition.depends_on.clone(),
            constructor_args: definition.constructor_args.clone(),
            properties: definition.properties.clone(),
            init_method: definition.init_method.clone(),
            destroy_method: definition.destroy_method.clone(),
            description: definition.description.clone(),
            attributes: definition.attributes.clone(),
            lineage: Vec::new(),
            stale: AtomicBool::new(false),
            resolved_type: OnceCell::new(),
        }
    }

    /// 在父定义的深拷贝上叠加子定义声明的字段，子定义优先
    ///
    /// `is_abstract` 与 `depends_on` 始终取自子定义
    pub fn overlay(
        parent: &MergedDefinition,
        name: impl Into<String>,
        child: &ComponentDefinition,
    ) -> Self {
        let mut constructor_args = parent.constructor_args.clone();
        constructor_args.extend(
            child
                .constructor_args
                .iter()
                .map(|(index, value)| (*index, value.clone())),
        );

        let mut properties = parent.properties.clone();
        for (key, value) in &child.properties {
            properties.insert(key.clone(), value.clone());
        }

        let mut attributes = parent.attributes.clone();
        attributes.extend(child.attributes.clone());

        let mut lineage = Vec::with_capacity(parent.lineage.len() + 1);
        lineage.push(parent.name.clone());
        lineage.extend(parent.lineage.iter().cloned());

        Self {
            name: name.into(),
            type_name: child.type_name.clone().or_else(|| parent.type_name.clone()),
            scope: child.scope.clone().unwrap_or_else(|| parent.scope.clone()),
            is_abstract: child.is_abstract,
            depends_on: child.depends_on.clone(),
            constructor_args,
            properties,
            init_method: child.init_method.clone().or_else(|| parent.init_method.clone()),
            destroy_method: child
                .destroy_method
                .clone()
                .or_else(|| parent.destroy_method.clone()),
            description: child.description.clone().or_else(|| parent.description.clone()),
            attributes,
            lineage,
            stale: AtomicBool::new(false),
            resolved_type: OnceCell::new(),
        }
    }

    /// 非单例组件内部的组件不能是单例，强制使用外部组件的作用域
    pub fn contained_in(mut self, containing: Option<&MergedDefinition>) -> Self {
        if let Some(containing) = containing {
            if !containing.is_singleton() && self.is_singleton() {
                self.scope = containing.scope.clone();
            }
        }
        self
    }

    /// 类型标识未变化时沿用过期定义上已推导的类型信息
    pub fn inherit_derived(&self, previous: &MergedDefinition) {
        if self.type_name != previous.type_name {
            return;
        }
        if let Some(info) = previous.resolved_type.get() {
            let _ = self.resolved_type.set(info.clone());
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// 推导的类型信息（惰性计算）
    pub fn resolved_type(&self) -> Option<&TypeInfo> {
        let type_name = self.type_name.as_deref()?;
        Some(self.resolved_type.get_or_init(|| TypeInfo::from_name(type_name)))
    }

    /// 是否已经推导过类型信息
    pub fn has_resolved_type(&self) -> bool {
        self.resolved_type.get().is_some()
    }

    pub fn scope(&self) -> &Lifetime {
        &self.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.scope.is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope.is_prototype()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn constructor_args(&self) -> &BTreeMap<usize, PropertyValue> {
        &self.constructor_args
    }

    pub fn properties(&self) -> &IndexMap<String, PropertyValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn init_method(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    pub fn destroy_method(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// 父定义链（由近及远）
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// 是否由指定名称的定义派生（自身或父定义链上）
    pub fn derives_from(&self, name: &str) -> bool {
        self.name == name || self.lineage.iter().any(|ancestor| ancestor == name)
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// 标记过期，下次访问时重新合并
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }
}
