//! SyncEngine：值树与文本两种视图的唯一写入者
//!
//! 结构化编辑 → 重写树 → 派生文本；文本编辑 → 立即保存文本 → 解析成功才替换树。
//! 每个动作只沿一个方向派生，动作结束时两种视图要么一致，要么文本是尚未被接受的草稿。

use jsonpath_rust::JsonPath;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    codec::{deserialize, serialize, ParseError},
    path::{
        is_addressable_key, resolve, resolve_mut, write_create, Path, PathError, WriteMode,
        MAX_DEPTH,
    },
    shadow_tree::{build_fields, FieldNode},
    validation::{RequiredFields, ValidationHook, ValidationResult},
    value::{empty_of, Value, ValueKind},
};
use crate::utils::coerce::{coerce, CoercionError, LeafInput};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("'{path}' {source}")]
    Coercion {
        path: Path,
        #[source]
        source: CoercionError,
    },
    #[error("无效路径 '{path}': {reason}")]
    InvalidPath { path: Path, reason: String },
    #[error("目标 '{path}' 是 {kind}，不支持该操作")]
    InvalidTarget { path: Path, kind: ValueKind },
    #[error("键 '{key}' 已存在于 '{path}'")]
    DuplicateKey { path: Path, key: String },
    #[error("路径不存在: '{path}'")]
    NotFound { path: Path },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("JSON序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("JSONPath错误: {0}")]
    Query(String),
}

impl From<PathError> for SyncError {
    fn from(e: PathError) -> Self {
        match e {
            PathError::NotFound { path } => SyncError::NotFound { path },
            PathError::InvalidPath { path, reason } => SyncError::InvalidPath { path, reason },
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// 严格模式：重复键报 `DuplicateKey`，穿过标量写入报 `InvalidPath`。
    /// 关闭后与早期表单行为一致：重复键被空值覆盖，中间标量被替换为 `{}`。
    pub strict: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl EngineOptions {
    fn write_mode(&self) -> WriteMode {
        if self.strict {
            WriteMode::Strict
        } else {
            WriteMode::Overwrite
        }
    }
}

/// 引擎持有的文档：树是唯一事实来源，文本是它的投影或未被接受的草稿
#[derive(Debug, Clone, PartialEq)]
pub struct EditedDocument {
    tree: Value,
    text: String,
    last_parse_error: Option<ParseError>,
}

impl EditedDocument {
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn last_parse_error(&self) -> Option<&ParseError> {
        self.last_parse_error.as_ref()
    }
}

pub struct SyncEngine {
    doc: EditedDocument,
    options: EngineOptions,
    validator: Box<dyn ValidationHook>,
}

impl SyncEngine {
    /// 以初始值构建，文本由树派生
    pub fn new(initial: Value) -> Result<Self, SyncError> {
        Self::with_options(initial, EngineOptions::default())
    }

    pub fn with_options(initial: Value, options: EngineOptions) -> Result<Self, SyncError> {
        if initial.depth() > MAX_DEPTH {
            return Err(SyncError::InvalidPath {
                path: Path::root(),
                reason: format!("嵌套超过 {} 层", MAX_DEPTH),
            });
        }
        let text = serialize(&initial)?;
        tracing::debug!("引擎初始化: {} 字符, strict={}", text.len(), options.strict);
        Ok(Self {
            doc: EditedDocument {
                tree: initial,
                text,
                last_parse_error: None,
            },
            options,
            validator: Box::new(RequiredFields::default()),
        })
    }

    /// 从原始文本构建；文本必须可解析
    pub fn from_text(text: &str) -> Result<Self, SyncError> {
        Self::new(deserialize(text)?)
    }

    /// 替换提交前使用的校验钩子
    pub fn with_validation(mut self, hook: impl ValidationHook + 'static) -> Self {
        self.validator = Box::new(hook);
        self
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    pub fn document(&self) -> &EditedDocument {
        &self.doc
    }

    pub fn tree(&self) -> &Value {
        &self.doc.tree
    }

    pub fn text(&self) -> &str {
        &self.doc.text
    }

    pub fn last_parse_error(&self) -> Option<&ParseError> {
        self.doc.last_parse_error.as_ref()
    }

    pub fn is_text_valid(&self) -> bool {
        self.doc.last_parse_error.is_none()
    }

    /// 只读取值，不创建任何节点
    pub fn value_at(&self, path: &str) -> Result<&Value, SyncError> {
        Ok(resolve(&self.doc.tree, &Path::parse(path))?)
    }

    /// 供表单渲染的字段列表
    pub fn fields(&self) -> Vec<FieldNode> {
        build_fields(&self.doc.tree)
    }

    /// 结构化编辑：按路径上已有叶子的类别转换输入；路径不存在时使用 `declared`
    pub fn structured_edit(
        &mut self,
        path: &str,
        input: impl Into<LeafInput>,
        declared: ValueKind,
    ) -> Result<(), SyncError> {
        let path = Path::parse(path);
        let input = input.into();

        let target = match resolve(&self.doc.tree, &path) {
            Ok(existing) if existing.is_container() => {
                tracing::warn!("结构化编辑被拒绝: '{}' 是 {}", path, existing.kind());
                return Err(SyncError::InvalidTarget {
                    path,
                    kind: existing.kind(),
                });
            }
            Ok(existing) => {
                if existing.kind() != declared {
                    tracing::debug!(
                        "'{}' 声明类型 {} 与现有类型 {} 不同，按现有类型转换",
                        path,
                        declared,
                        existing.kind()
                    );
                }
                existing.kind()
            }
            Err(PathError::NotFound { .. }) => declared,
            Err(e) => return Err(e.into()),
        };

        let value = coerce(&input, target).map_err(|source| {
            tracing::warn!("'{}' 类型转换失败: {}", path, source);
            SyncError::Coercion {
                path: path.clone(),
                source,
            }
        })?;

        let tree = write_create(&self.doc.tree, &path, value, self.options.write_mode())
            .map_err(|e| {
                tracing::warn!("结构化编辑失败: {}", e);
                SyncError::from(e)
            })?;
        if self.doc.last_parse_error.is_some() {
            tracing::debug!("丢弃未被接受的文本草稿");
        }
        self.commit(tree)?;
        tracing::debug!("结构化编辑完成: '{}'", path);
        Ok(())
    }

    /// 文本编辑：文本立即生效；解析成功才替换树，失败时保留上一个有效树
    pub fn text_edit(&mut self, new_text: impl Into<String>) -> Result<(), ParseError> {
        self.doc.text = new_text.into();
        match deserialize(&self.doc.text) {
            Ok(tree) => {
                // 与结构化编辑一样，接受后的文本回到规范形式
                match serialize(&tree) {
                    Ok(text) => self.doc.text = text,
                    Err(e) => tracing::warn!("规范化文本失败，保留用户文本: {}", e),
                }
                self.doc.tree = tree;
                self.doc.last_parse_error = None;
                tracing::debug!("文本编辑已接受: {} 字符", self.doc.text.len());
                Ok(())
            }
            Err(err) => {
                tracing::debug!("文本暂不可解析，保留上一个有效树: {}", err);
                self.doc.last_parse_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// 结构扩展：向数组追加元素，或向对象插入新键；新值为 `kind` 的空值
    ///
    /// 键名中不能含 `.`，否则新成员无法再用点分路径寻址。
    pub fn schema_extend(
        &mut self,
        path: &str,
        key: Option<&str>,
        kind: ValueKind,
    ) -> Result<(), SyncError> {
        let path = Path::parse(path);
        // 目标容器在第 len+1 层，新容器再深一层
        if kind.is_container() && path.len() + 2 > MAX_DEPTH {
            tracing::warn!("结构扩展被拒绝: '{}' 已接近嵌套上限", path);
            return Err(SyncError::InvalidPath {
                path,
                reason: format!("嵌套超过 {} 层", MAX_DEPTH),
            });
        }
        let mut tree = self.doc.tree.clone();
        let target = resolve_mut(&mut tree, &path)?;

        match target {
            Value::Array(items) => {
                if let Some(key) = key {
                    tracing::debug!("向数组 '{}' 追加元素，忽略键名 '{}'", path, key);
                }
                items.push(empty_of(kind));
            }
            Value::Object(map) => {
                let key = match key.map(str::trim) {
                    Some(k) if !k.is_empty() => k,
                    _ => {
                        return Err(SyncError::InvalidPath {
                            path,
                            reason: "向对象添加成员需要非空键名".to_string(),
                        })
                    }
                };
                if !is_addressable_key(key) {
                    tracing::warn!("结构扩展被拒绝: 键名 '{}' 含 '.'", key);
                    return Err(SyncError::InvalidPath {
                        path,
                        reason: format!("键名 '{}' 不能包含 '.'", key),
                    });
                }
                if map.contains_key(key) {
                    if self.options.strict {
                        tracing::warn!("结构扩展被拒绝: '{}' 已有键 '{}'", path, key);
                        return Err(SyncError::DuplicateKey {
                            path,
                            key: key.to_string(),
                        });
                    }
                    tracing::debug!("覆盖已有键 '{}'", key);
                }
                map.insert(key.to_string(), empty_of(kind));
            }
            scalar => {
                let kind = scalar.kind();
                tracing::warn!("结构扩展被拒绝: '{}' 是 {}", path, kind);
                return Err(SyncError::InvalidTarget { path, kind });
            }
        }

        self.commit(tree)?;
        tracing::debug!("结构扩展完成: '{}' + {}", path, kind);
        Ok(())
    }

    /// 运行校验钩子；不修改文档
    pub fn validate(&self) -> ValidationResult {
        self.validator.validate(&self.doc.tree)
    }

    /// 提交：校验通过时返回当前值
    pub fn submit(&self) -> Result<&Value, ValidationResult> {
        let result = self.validate();
        if !result.is_valid() {
            tracing::warn!("提交被拒绝: {} 个字段未通过校验", result.len());
            return Err(result);
        }
        tracing::info!("表单已提交:\n{}", self.doc.text);
        Ok(&self.doc.tree)
    }

    /// 丢弃未被接受的文本草稿，从树重新派生文本
    pub fn reformat(&mut self) -> Result<(), SyncError> {
        let tree = self.doc.tree.clone();
        self.commit(tree)
    }

    /// 按 JSONPath 提取第一个匹配节点的规范文本
    pub fn query(&self, json_path: &str) -> Result<String, SyncError> {
        let dom = serde_json::to_value(&self.doc.tree)?;
        let hits: Vec<&serde_json::Value> = dom
            .query(json_path)
            .map_err(|e| SyncError::Query(e.to_string()))?;
        let first = hits
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Query("未匹配到任何节点".into()))?;
        Ok(serde_json::to_string_pretty(first)?)
    }

    /// 先派生文本再整体替换，任何一步失败文档都保持原状
    fn commit(&mut self, tree: Value) -> Result<(), SyncError> {
        let text = serialize(&tree)?;
        self.doc = EditedDocument {
            tree,
            text,
            last_parse_error: None,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::validation::{RuleKind, REQUIRED_MESSAGE};
    use serde_json::json;

    fn value(v: serde_json::Value) -> Value {
        Value::deserialize(v).expect("构建测试值失败")
    }

    fn engine(v: serde_json::Value) -> SyncEngine {
        SyncEngine::new(value(v)).expect("引擎初始化失败")
    }

    fn assert_in_sync(engine: &SyncEngine) {
        assert!(engine.is_text_valid());
        assert_eq!(engine.text(), serialize(engine.tree()).unwrap(), "文本应是树的规范序列化");
    }

    #[test]
    fn test_construct_derives_text() {
        let e = engine(json!({"name": "John"}));
        assert_eq!(e.text(), "{\n  \"name\": \"John\"\n}");
        assert_in_sync(&e);
    }

    #[test]
    fn test_structured_edit_write_create() {
        let mut e = engine(json!({}));
        e.structured_edit("address.zip.one", "test", ValueKind::String)
            .expect("写入应该成功");
        assert_eq!(*e.tree(), value(json!({"address": {"zip": {"one": "test"}}})));
        assert_in_sync(&e);
    }

    #[test]
    fn test_structured_edit_uses_existing_kind() {
        let mut e = engine(json!({"age": 30, "newsletter": true}));
        // 声明为文本，但现有叶子是数字
        e.structured_edit("age", "31", ValueKind::String).unwrap();
        assert_eq!(*e.value_at("age").unwrap(), Value::from(31));

        e.structured_edit("newsletter", false, ValueKind::Boolean).unwrap();
        assert_eq!(*e.value_at("newsletter").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_structured_edit_rejects_bad_number() {
        let mut e = engine(json!({"age": 30}));
        let before = e.document().clone();
        let err = e.structured_edit("age", "thirty", ValueKind::Number).unwrap_err();
        assert!(matches!(err, SyncError::Coercion { .. }));
        assert_eq!(*e.document(), before, "失败后文档应保持原状");
    }

    #[test]
    fn test_structured_edit_rejects_container_target() {
        let mut e = engine(json!({"address": {"city": "Anytown"}}));
        let err = e.structured_edit("address", "x", ValueKind::String).unwrap_err();
        assert!(matches!(err, SyncError::InvalidTarget { kind: ValueKind::Object, .. }));
    }

    #[test]
    fn test_structured_edit_through_scalar() {
        let mut e = engine(json!({"a": {"b": "text"}}));
        let err = e.structured_edit("a.b.c", "x", ValueKind::String).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath { .. }));
        assert_eq!(*e.tree(), value(json!({"a": {"b": "text"}})));

        let options = EngineOptions { strict: false };
        let mut lenient =
            SyncEngine::with_options(value(json!({"a": {"b": "text"}})), options).unwrap();
        lenient.structured_edit("a.b.c", "x", ValueKind::String).unwrap();
        assert_eq!(*lenient.tree(), value(json!({"a": {"b": {"c": "x"}}})));
    }

    #[test]
    fn test_structured_edit_is_idempotent_under_reparse() {
        let mut e = engine(json!({"hobbies": ["reading", "traveling"], "age": 30}));
        e.structured_edit("hobbies.1", "coding", ValueKind::String).unwrap();
        let reparsed = deserialize(&serialize(e.tree()).unwrap()).unwrap();
        assert_eq!(reparsed, *e.tree());
    }

    #[test]
    fn test_text_edit_invalid_keeps_tree() {
        let mut e = engine(json!({"age": 31}));
        let before = e.tree().clone();
        for bad in ["", "{", r#"{"age": "oops""#, r#"{"age": null}"#, "[1,]", "nope"] {
            let result = e.text_edit(bad);
            assert!(result.is_err(), "{:?} 不应被接受", bad);
            assert_eq!(*e.tree(), before, "无效文本不应改动树");
            assert_eq!(e.text(), bad, "文本视图应保留最新输入");
            assert!(e.last_parse_error().is_some());
            assert!(!e.is_text_valid());
        }
    }

    #[test]
    fn test_text_edit_changes_shape() {
        let mut e = engine(json!({"age": 31}));
        e.text_edit(r#"{"name": "Jane", "tags": ["a", true]}"#).unwrap();
        assert_eq!(*e.tree(), value(json!({"name": "Jane", "tags": ["a", true]})));
        assert_in_sync(&e);
    }

    #[test]
    fn test_schema_extend_array() {
        let mut e = engine(json!({"hobbies": ["reading"]}));
        e.schema_extend("hobbies", None, ValueKind::String).unwrap();
        assert_eq!(*e.tree(), value(json!({"hobbies": ["reading", ""]})));
        assert_in_sync(&e);
    }

    #[test]
    fn test_schema_extend_object_all_kinds() {
        let mut e = engine(json!({}));
        let kinds = [
            ("s", ValueKind::String),
            ("n", ValueKind::Number),
            ("b", ValueKind::Boolean),
            ("o", ValueKind::Object),
            ("a", ValueKind::Array),
        ];
        for (key, kind) in kinds {
            e.schema_extend("", Some(key), kind).unwrap();
        }
        assert_eq!(*e.tree(), value(json!({"s": "", "n": 0, "b": false, "o": {}, "a": []})));

        e.schema_extend("o", Some("inner"), ValueKind::Number).unwrap();
        assert_eq!(*e.value_at("o.inner").unwrap(), Value::from(0));
    }

    #[test]
    fn test_schema_extend_duplicate_key() {
        let mut e = engine(json!({"name": "John"}));
        let before = e.document().clone();
        let err = e.schema_extend("", Some("name"), ValueKind::String).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateKey { ref key, .. } if key == "name"));
        assert_eq!(*e.document(), before);

        let options = EngineOptions { strict: false };
        let mut lenient =
            SyncEngine::with_options(value(json!({"name": "John"})), options).unwrap();
        lenient.schema_extend("", Some("name"), ValueKind::String).unwrap();
        assert_eq!(*lenient.tree(), value(json!({"name": ""})));
    }

    #[test]
    fn test_schema_extend_failures() {
        let mut e = engine(json!({"name": "John", "tags": []}));
        assert!(matches!(
            e.schema_extend("name", Some("x"), ValueKind::String),
            Err(SyncError::InvalidTarget { kind: ValueKind::String, .. })
        ));
        assert!(matches!(
            e.schema_extend("missing", Some("x"), ValueKind::String),
            Err(SyncError::NotFound { .. })
        ));
        assert!(matches!(
            e.schema_extend("", None, ValueKind::String),
            Err(SyncError::InvalidPath { .. })
        ));
        // 数组忽略键名
        e.schema_extend("tags", Some("ignored"), ValueKind::Number).unwrap();
        assert_eq!(*e.value_at("tags").unwrap(), value(json!([0])));
    }

    #[test]
    fn test_schema_extend_rejects_dotted_key() {
        let mut e = engine(json!({}));
        let before = e.document().clone();
        let err = e.schema_extend("", Some("a.b"), ValueKind::String).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath { .. }));
        assert_eq!(*e.document(), before, "被拒绝的键不应写入");

        // 字段列表里的每条路径都应回到同一个成员
        e.schema_extend("", Some("a"), ValueKind::Object).unwrap();
        e.schema_extend("a", Some("b"), ValueKind::String).unwrap();
        let path = e.fields().last().map(|f| f.path.clone()).expect("应有字段");
        e.structured_edit(&path, "x", ValueKind::String).unwrap();
        assert_eq!(*e.tree(), value(json!({"a": {"b": "x"}})));
        assert_in_sync(&e);
    }

    #[test]
    fn test_schema_extend_stops_at_depth_limit() {
        let mut e = engine(json!({}));
        let mut path = String::new();
        loop {
            match e.schema_extend(&path, Some("k"), ValueKind::Object) {
                Ok(()) => path = if path.is_empty() { "k".into() } else { format!("{}.k", path) },
                Err(err) => {
                    assert!(matches!(err, SyncError::InvalidPath { .. }), "{:?}", err);
                    break;
                }
            }
        }
        assert_eq!(e.tree().depth(), MAX_DEPTH);
        // 最深处仍可追加叶子
        e.schema_extend(&path, Some("leaf"), ValueKind::String).unwrap();

        // 引擎展示的文本原样提交回来仍然有效
        let text = e.text().to_string();
        e.text_edit(text).expect("引擎生成的文本应能重新解析");
        assert_in_sync(&e);
    }

    #[test]
    fn test_construct_rejects_too_deep_value() {
        let mut deep = Value::from("x");
        for _ in 0..=MAX_DEPTH {
            deep = Value::Array(vec![deep]);
        }
        let err = SyncEngine::new(deep).err().expect("超过嵌套上限的初始值应被拒绝");
        assert!(matches!(err, SyncError::InvalidPath { .. }));
    }

    #[test]
    fn test_validate_and_submit() {
        let rules = RequiredFields::default()
            .rule("name", RuleKind::NonEmptyString)
            .rule("email", RuleKind::NonEmptyString);
        let mut e = engine(json!({"name": "", "email": "a@b.com"})).with_validation(rules);

        let result = e.validate();
        assert_eq!(result.len(), 1);
        assert_eq!(result.get("name"), Some(REQUIRED_MESSAGE));
        assert!(e.submit().is_err());

        e.structured_edit("name", "John", ValueKind::String).unwrap();
        let submitted = e.submit().expect("校验通过后应可提交");
        assert_eq!(*submitted, value(json!({"name": "John", "email": "a@b.com"})));
    }

    #[test]
    fn test_reformat_discards_draft() {
        let mut e = engine(json!({"a": 1}));
        let _ = e.text_edit("{\"a\": ");
        e.reformat().unwrap();
        assert_in_sync(&e);
        assert_eq!(*e.tree(), value(json!({"a": 1})));
    }

    #[test]
    fn test_query_subtree() {
        let e = engine(json!({"address": {"zip": {"two": [3, 5, 68]}}}));
        assert_eq!(e.query("$.address.zip.two[2]").unwrap(), "68");
        assert!(e.query("$.address.zip.two").unwrap().contains("68"));
        assert!(matches!(e.query("$.nothing"), Err(SyncError::Query(_))));
    }

    #[test]
    fn test_end_to_end() {
        let mut e = engine(json!({"age": 30}));

        e.structured_edit("age", "31", ValueKind::Number).unwrap();
        assert_eq!(*e.value_at("age").unwrap(), Value::from(31));
        assert!(e.text().contains("\"age\": 31"));

        assert!(e.text_edit(r#"{"age": "oops""#).is_err());
        assert_eq!(*e.value_at("age").unwrap(), Value::from(31));
        assert!(e.last_parse_error().is_some());

        e.text_edit(r#"{"age": 32}"#).unwrap();
        assert_eq!(*e.value_at("age").unwrap(), Value::from(32));
        assert!(e.last_parse_error().is_none());
        assert_in_sync(&e);
    }
}
