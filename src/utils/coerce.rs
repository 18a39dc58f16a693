//! Coercion: 将表单控件的原始输入转换为目标叶子类型

use serde_json::Number;
use thiserror::Error;

use crate::model::value::{Value, ValueKind};

/// 表单控件给出的原始输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafInput {
    /// 文本框 / 数字框的内容
    Text(String),
    /// 复选框的勾选状态
    Checked(bool),
}

impl From<&str> for LeafInput {
    fn from(s: &str) -> Self {
        LeafInput::Text(s.to_string())
    }
}

impl From<String> for LeafInput {
    fn from(s: String) -> Self {
        LeafInput::Text(s)
    }
}

impl From<bool> for LeafInput {
    fn from(b: bool) -> Self {
        LeafInput::Checked(b)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("无法将 {input} 转换为 {expected}")]
pub struct CoercionError {
    pub expected: ValueKind,
    pub input: String,
}

impl CoercionError {
    fn new(expected: ValueKind, input: &LeafInput) -> Self {
        let input = match input {
            LeafInput::Text(s) => format!("{:?}", s),
            LeafInput::Checked(b) => format!("勾选状态 {}", b),
        };
        Self { expected, input }
    }
}

/// 解析数字文本：整数优先保留为整数，拒绝空串、NaN 与无穷
pub fn parse_number(raw: &str) -> Option<Number> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<u64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Number::from(n));
    }
    raw.parse::<f64>().ok().and_then(Number::from_f64)
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// 转换为 `kind` 类别的叶子值；容器类别一律拒绝
pub fn coerce(input: &LeafInput, kind: ValueKind) -> Result<Value, CoercionError> {
    let err = || CoercionError::new(kind, input);
    match (kind, input) {
        (ValueKind::Boolean, LeafInput::Checked(b)) => Ok(Value::Boolean(*b)),
        (ValueKind::Boolean, LeafInput::Text(s)) => {
            parse_bool(s).map(Value::Boolean).ok_or_else(err)
        }
        (ValueKind::Number, LeafInput::Text(s)) => {
            parse_number(s).map(Value::Number).ok_or_else(err)
        }
        (ValueKind::String, LeafInput::Text(s)) => Ok(Value::String(s.clone())),
        _ => Err(err()),
    }
}
