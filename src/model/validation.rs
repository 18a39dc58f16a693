//! 提交前校验：可插拔的最小必填检查

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    path::{resolve, Path},
    value::Value,
};

pub const REQUIRED_MESSAGE: &str = "此字段为必填项";
pub const NOT_TEXT_MESSAGE: &str = "此字段必须是文本";
pub const NOT_LEAF_MESSAGE: &str = "此字段必须是文本、数字或布尔值";

/// 校验结果：路径 → 错误信息；为空表示通过
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    errors: BTreeMap<String, String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn insert(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(path.into(), message.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.errors.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// 校验钩子：每次调用都对整棵树重新计算
pub trait ValidationHook {
    fn validate(&self, tree: &Value) -> ValidationResult;
}

impl<F> ValidationHook for F
where
    F: Fn(&Value) -> ValidationResult,
{
    fn validate(&self, tree: &Value) -> ValidationResult {
        self(tree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// 必须是非空（去除空白后）的字符串
    NonEmptyString,
    /// 必须是文本、数字或布尔值，且不是 `""`、`0`、`false` 这类空值
    Present,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub path: String,
    pub rule: RuleKind,
    /// 自定义错误信息，缺省时使用内置文案
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FieldRule {
    pub fn new(path: impl Into<String>, rule: RuleKind) -> Self {
        Self {
            path: path.into(),
            rule,
            message: None,
        }
    }

    fn check(&self, tree: &Value) -> Option<String> {
        let found = resolve(tree, &Path::parse(&self.path)).ok();
        let failure = match (self.rule, found) {
            (_, None) => REQUIRED_MESSAGE,
            (RuleKind::Present, Some(v)) if v.is_container() => NOT_LEAF_MESSAGE,
            (RuleKind::Present, Some(Value::String(s))) if s.trim().is_empty() => REQUIRED_MESSAGE,
            (RuleKind::Present, Some(v)) if v.is_empty_default() => REQUIRED_MESSAGE,
            (RuleKind::Present, Some(_)) => return None,
            (RuleKind::NonEmptyString, Some(Value::String(s))) if s.trim().is_empty() => {
                REQUIRED_MESSAGE
            }
            (RuleKind::NonEmptyString, Some(Value::String(_))) => return None,
            (RuleKind::NonEmptyString, Some(_)) => NOT_TEXT_MESSAGE,
        };
        Some(self.message.clone().unwrap_or_else(|| failure.to_string()))
    }
}

#[derive(Error, Debug)]
#[error("校验规则配置无效: {0}")]
pub struct ValidationConfigError(#[from] serde_json::Error);

/// 按配置列表检查必填字段
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredFields {
    rules: Vec<FieldRule>,
}

impl RequiredFields {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// 从 JSON 配置加载，例如 `[{"path": "name", "rule": "nonEmptyString"}]`
    pub fn from_json_str(text: &str) -> Result<Self, ValidationConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn rule(mut self, path: impl Into<String>, rule: RuleKind) -> Self {
        self.rules.push(FieldRule::new(path, rule));
        self
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }
}

impl ValidationHook for RequiredFields {
    fn validate(&self, tree: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();
        for rule in &self.rules {
            if let Some(message) = rule.check(tree) {
                result.insert(rule.path.as_str(), message);
            }
        }
        result
    }
}
