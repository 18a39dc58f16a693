//! IO helper: 读取初始文档与校验规则（只读，不回写）

use std::{fs, path::Path};

use thiserror::Error;

use crate::model::{
    codec::{deserialize, ParseError},
    validation::{RequiredFields, ValidationConfigError},
    value::Value,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Rules(#[from] ValidationConfigError),
}

/// 从文件读取初始值
pub fn read_value_file(p: &Path) -> Result<Value, LoadError> {
    let text = fs::read_to_string(p)?;
    Ok(deserialize(&text)?)
}

/// 从文件读取必填规则列表
pub fn read_rules_file(p: &Path) -> Result<RequiredFields, LoadError> {
    let text = fs::read_to_string(p)?;
    Ok(RequiredFields::from_json_str(&text)?)
}
