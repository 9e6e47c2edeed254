//! 占位符求值器

use di_abstractions::{ExpressionEvaluator, MergedDefinition};
use infrastructure_common::HookError;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashMap;

static PLACEHOLDER: OnceCell<Regex> = OnceCell::new();

/// `${key}` 与 `${key:default}` 占位符替换
///
/// 没有占位符的字符串原样返回；占位符既没有取值也没有默认值时报错
#[derive(Debug, Clone, Default)]
pub struct PlaceholderEvaluator {
    values: HashMap<String, String>,
}

impl PlaceholderEvaluator {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    fn pattern() -> Result<&'static Regex, HookError> {
        PLACEHOLDER
            .get_or_try_init(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}"))
            .map_err(|e| Box::new(e) as HookError)
    }

    /// 替换字符串中的所有占位符
    pub fn substitute(&self, text: &str) -> Result<String, HookError> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }

        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        for captures in Self::pattern()?.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let key = captures.get(1).map_or("", |m| m.as_str()).trim();
            let value = match (self.values.get(key), captures.get(2)) {
                (Some(value), _) => value.as_str(),
                (None, Some(default)) => default.as_str(),
                (None, None) => return Err(format!("未定义的占位符 '{key}'").into()),
            };
            result.push_str(&text[last..whole.start()]);
            result.push_str(value);
            last = whole.end();
        }
        result.push_str(&text[last..]);
        Ok(result)
    }
}

impl ExpressionEvaluator for PlaceholderEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        _definition: Option<&MergedDefinition>,
    ) -> Result<serde_json::Value, HookError> {
        self.substitute(expression).map(serde_json::Value::String)
    }
}
