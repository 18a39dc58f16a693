//! 值树（ValueTree）：被编辑的 JSON 形状数据在内存中的表示
//!
//! 五种变体覆盖全部合法值，`kind()` 是所有组件分派行为的唯一依据。
//! 对象成员按插入顺序保存（IndexMap），比较时与顺序无关；数组比较与顺序有关。

use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::{SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::Number;
use thiserror::Error;

/// 对象成员表（保持插入顺序）
pub type Map = IndexMap<String, Value>;

/// 被编辑的值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Boolean(bool),
    Object(Map),
    Array(Vec<Value>),
}

/// 值的类别（与 UI 控件解耦）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("未知的值类型: {0}（可选 string/number/boolean/object/array）")]
pub struct UnknownKind(pub String);

impl ValueKind {
    pub const ALL: [ValueKind; 5] = [
        ValueKind::String,
        ValueKind::Number,
        ValueKind::Boolean,
        ValueKind::Object,
        ValueKind::Array,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Object => "object",
            ValueKind::Array => "array",
        }
    }

    /// 对象与数组是容器，其余为叶子
    pub fn is_container(self) -> bool {
        matches!(self, ValueKind::Object | ValueKind::Array)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        match wanted.as_str() {
            "string" | "text" => Ok(ValueKind::String),
            "number" => Ok(ValueKind::Number),
            "boolean" | "bool" | "checkbox" => Ok(ValueKind::Boolean),
            "object" => Ok(ValueKind::Object),
            "array" => Ok(ValueKind::Array),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// 值的类别判定，对每个合法值都有且只有一个结果
pub fn kind_of(v: &Value) -> ValueKind {
    match v {
        Value::String(_) => ValueKind::String,
        Value::Number(_) => ValueKind::Number,
        Value::Boolean(_) => ValueKind::Boolean,
        Value::Object(_) => ValueKind::Object,
        Value::Array(_) => ValueKind::Array,
    }
}

/// 某类别的规范空值：`""`、`0`、`false`、`{}`、`[]`
pub fn empty_of(kind: ValueKind) -> Value {
    match kind {
        ValueKind::String => Value::String(String::new()),
        ValueKind::Number => Value::Number(Number::from(0u64)),
        ValueKind::Boolean => Value::Boolean(false),
        ValueKind::Object => Value::Object(Map::new()),
        ValueKind::Array => Value::Array(Vec::new()),
    }
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        kind_of(self)
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        self.kind().is_container()
    }

    /// 是否等于本类别的规范空值；数字按数值比较，`0.0` 也算空
    pub fn is_empty_default(&self) -> bool {
        match self {
            Value::Number(n) => n.as_f64() == Some(0.0),
            other => *other == empty_of(other.kind()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// 子元素数量（对象字段数 / 数组长度），叶子为 0
    pub fn len(&self) -> usize {
        match self {
            Value::Object(m) => m.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 容器嵌套层数：叶子为 0，`{}`/`[]` 为 1
    pub fn depth(&self) -> usize {
        match self {
            Value::Object(m) => 1 + m.values().map(Value::depth).max().unwrap_or(0),
            Value::Array(items) => 1 + items.iter().map(Value::depth).max().unwrap_or(0),
            _ => 0,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Object(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(n) => n.serialize(serializer),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for v in items {
                    out.serialize_element(v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("字符串、数字、布尔值、对象或数组")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(Number::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Number::from_f64(v)
            .map(Value::Number)
            .ok_or_else(|| E::custom("数值必须是有限数"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    // null 不属于数据模型
    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Err(E::custom("不支持 null 值"))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Err(E::custom("不支持 null 值"))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Object(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
