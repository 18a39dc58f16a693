//! 序列化 / 反序列化：值树与规范文本之间的转换
//!
//! 规范文本：两个空格缩进、按插入顺序输出键，与 `JSON.stringify(v, null, 2)` 一致。

use thiserror::Error;

use crate::model::value::Value;

/// 文本无法解析为值树
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("JSON解析失败: {message}")]
pub struct ParseError {
    pub message: String,
    /// 1 起始；无位置信息时为 0
    pub line: usize,
    pub column: usize,
    /// 文本在结尾处中断（用户很可能还在输入）
    pub incomplete: bool,
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self {
            message: e.to_string(),
            line: e.line(),
            column: e.column(),
            incomplete: e.is_eof(),
        }
    }
}

/// 生成规范文本；相同结构与插入历史的树得到相同文本
pub fn serialize(tree: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(tree)
}

/// 整体解析；失败时不产生任何部分结果
pub fn deserialize(text: &str) -> Result<Value, ParseError> {
    Ok(serde_json::from_str::<Value>(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "name": "John Doe",
  "email": "john.doe@example.com",
  "age": 30,
  "newsletter": true,
  "address": {
    "street": "123 Main St",
    "city": "Anytown",
    "zip": {
      "one": "test",
      "two": [
        3,
        5,
        68
      ]
    }
  },
  "hobbies": [
    "reading",
    "traveling",
    "swimming"
  ],
  "empty": {},
  "none": [],
  "ratio": 0.25
}"#;

    #[test]
    fn test_round_trip() {
        let tree = deserialize(SAMPLE).expect("解析示例应该成功");
        let text = serialize(&tree).expect("序列化应该成功");
        let again = deserialize(&text).expect("再次解析应该成功");
        assert_eq!(again, tree, "往返后结构应相等");
    }

    #[test]
    fn test_canonical_text_is_stable() {
        let tree = deserialize(SAMPLE).unwrap();
        assert_eq!(
            serialize(&tree).unwrap(),
            SAMPLE,
            "规范文本应与输入一致（两空格缩进、插入顺序）"
        );
        assert_eq!(serialize(&tree).unwrap(), serialize(&tree.clone()).unwrap());
    }

    #[test]
    fn test_integer_stays_integer() {
        let tree = deserialize(r#"{"age": 31}"#).unwrap();
        assert!(serialize(&tree).unwrap().contains("\"age\": 31\n"));
    }

    #[test]
    fn test_malformed_text_reports_position() {
        let err = deserialize("{\n  \"age\": \"oops\"").unwrap_err();
        assert!(err.incomplete, "截断的文本应标记为未完成");
        assert_eq!(err.line, 2);

        let err = deserialize(r#"{"age": oops}"#).unwrap_err();
        assert!(!err.incomplete);
        assert!(err.to_string().starts_with("JSON解析失败"));
    }

    #[test]
    fn test_null_is_a_parse_error() {
        let err = deserialize(r#"{"a": null}"#).unwrap_err();
        assert!(err.message.contains("null"), "错误信息应说明 null 不受支持: {}", err.message);
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(deserialize(r#"{"a": 1} x"#).is_err());
    }
}
