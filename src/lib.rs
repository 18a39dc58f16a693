//! JSON 表单同步库
//!
//! 同一个 JSON 形状的值通过两种视图编辑：按叶子生成的表单字段，以及原始文本。
//! `SyncEngine` 是唯一写入者，保证任一视图的编辑都能无损地反映到另一视图。

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::codec::{deserialize, serialize, ParseError};
pub use model::data_core::{EditedDocument, EngineOptions, SyncEngine, SyncError};
pub use model::path::{Path, PathError, Seg, MAX_DEPTH};
pub use model::shadow_tree::{build_fields, filter_fields, FieldNode};
pub use model::validation::{FieldRule, RequiredFields, RuleKind, ValidationHook, ValidationResult};
pub use model::value::{empty_of, kind_of, Map, Value, ValueKind};
pub use utils::coerce::{CoercionError, LeafInput};
