//! 影子树（Shadow Tree）：把值树展开成表单字段列表，每个叶子一个输入控件，每个容器一个分组

use crate::model::{
    path::is_addressable_key,
    value::{Value, ValueKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    /// 节点在父级中的键名或下标
    pub name: String,
    /// 点分路径（可直接用于结构化编辑与结构扩展）
    pub path: String,
    pub kind: ValueKind,
    /// 子元素数量（对象字段数 / 数组长度）
    pub children: u32,
    /// 轻量预览（字符串截断、数字/布尔的简短描述）
    pub preview: String,
    /// 节点深度（用于UI缩进显示），顶层字段为 0
    pub depth: u32,
    /// `path` 能否解析回本节点；键名含 `.` 或为空时为 false，后代随之为 false
    pub addressable: bool,
}

impl FieldNode {
    pub fn is_leaf(&self) -> bool {
        !self.kind.is_container()
    }
}

const PREVIEW_CHARS: usize = 32;

fn preview_of(v: &Value) -> String {
    match v {
        Value::String(s) => {
            let s = s.trim();
            if s.chars().count() > PREVIEW_CHARS {
                let truncated: String = s.chars().take(PREVIEW_CHARS).collect();
                format!("\"{}...\"", truncated)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Object(m) => format!("{{..}} ({} keys)", m.len()),
        Value::Array(a) => format!("[..] ({} items)", a.len()),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// 深度优先、按插入顺序展开
///
/// 根容器就是表单本身，不产生节点；根为叶子时产生一个路径为空串的节点。
pub fn build_fields(root: &Value) -> Vec<FieldNode> {
    fn walk(
        out: &mut Vec<FieldNode>,
        v: &Value,
        name: &str,
        path: &str,
        depth: u32,
        addressable: bool,
    ) {
        out.push(FieldNode {
            name: name.to_string(),
            path: path.to_string(),
            kind: v.kind(),
            children: v.len() as u32,
            preview: preview_of(v),
            depth,
            addressable,
        });
        walk_children(out, v, path, depth + 1, addressable);
    }
    fn walk_children(
        out: &mut Vec<FieldNode>,
        v: &Value,
        path: &str,
        depth: u32,
        addressable: bool,
    ) {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let ok = addressable && is_addressable_key(k);
                    walk(out, child, k, &join(path, k), depth, ok);
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    let name = idx.to_string();
                    walk(out, child, &name, &join(path, &name), depth, addressable);
                }
            }
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(64);
    if root.is_container() {
        walk_children(&mut out, root, "", 0, true);
    } else {
        walk(&mut out, root, "", "", 0, true);
    }
    out
}

/// 只保留路径或名称包含过滤条件的节点；空条件保留全部
pub fn filter_fields<'a>(nodes: &'a [FieldNode], filter: &str) -> Vec<&'a FieldNode> {
    let filter = filter.trim();
    nodes
        .iter()
        .filter(|n| filter.is_empty() || n.path.contains(filter) || n.name.contains(filter))
        .collect()
}
