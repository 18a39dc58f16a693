//! 路径寻址：把点分路径（如 `address.zip.two.1`）解析为段序列，并在值树上读写
//!
//! 数组下标没有单独语法，只是数字形式的段；段在对象上按键名解释，在数组上按下标解释。

use std::{borrow::Cow, fmt};

use thiserror::Error;

use crate::model::value::{Map, Value};

/// 容器最大嵌套层数（根算一层），与 serde_json 解析时的递归上限一致
pub const MAX_DEPTH: usize = 127;

/// 键名能否写进点分路径并解析回同一个成员
pub fn is_addressable_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('.')
}

/// 路径中的一段
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Seg {
    Key(String),
    Index(usize),
}

impl Seg {
    /// 规范十进制写法（无前导零）识别为下标，其余为键名
    fn parse(token: &str) -> Self {
        let canonical = !token.is_empty()
            && token.bytes().all(|b| b.is_ascii_digit())
            && (token == "0" || !token.starts_with('0'));
        match token.parse::<usize>() {
            Ok(i) if canonical => Seg::Index(i),
            _ => Seg::Key(token.to_string()),
        }
    }

    /// 在对象上使用的键名
    pub fn as_key(&self) -> Cow<'_, str> {
        match self {
            Seg::Key(k) => Cow::Borrowed(k),
            Seg::Index(i) => Cow::Owned(i.to_string()),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => f.write_str(k),
            Seg::Index(i) => write!(f, "{}", i),
        }
    }
}

/// 完整路径；空路径指向根
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Seg>);

impl Path {
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// 按 `.` 切分；空串表示根
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::root();
        }
        Self(s.split('.').map(Seg::parse).collect())
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// 前 `len` 段构成的路径
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("路径不存在: '{path}'")]
    NotFound { path: Path },
    #[error("无效路径 '{path}': {reason}")]
    InvalidPath { path: Path, reason: String },
}

/// 写入时对中间标量的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// 中间段是标量时报错
    Strict,
    /// 中间段是标量时替换为空对象
    Overwrite,
}

fn child<'a>(node: &'a Value, seg: &Seg) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(seg.as_key().as_ref()),
        Value::Array(items) => seg.as_index().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, seg: &Seg) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(seg.as_key().as_ref()),
        Value::Array(items) => match seg.as_index() {
            Some(i) => items.get_mut(i),
            None => None,
        },
        _ => None,
    }
}

/// 只读解析，不会自动创建
pub fn resolve<'a>(tree: &'a Value, path: &Path) -> Result<&'a Value, PathError> {
    let mut current = tree;
    for (depth, seg) in path.segments().iter().enumerate() {
        current = child(current, seg).ok_or_else(|| PathError::NotFound {
            path: path.prefix(depth + 1),
        })?;
    }
    Ok(current)
}

/// 可变解析，同样不会自动创建
pub fn resolve_mut<'a>(tree: &'a mut Value, path: &Path) -> Result<&'a mut Value, PathError> {
    let mut current = tree;
    for (depth, seg) in path.segments().iter().enumerate() {
        current = child_mut(current, seg).ok_or_else(|| PathError::NotFound {
            path: path.prefix(depth + 1),
        })?;
    }
    Ok(current)
}

/// 写入并返回新树，输入树保持不变
///
/// 缺失的中间段自动创建为空对象；数组只支持范围内的下标替换，从不扩展长度。
pub fn write_create(
    tree: &Value,
    path: &Path,
    value: Value,
    mode: WriteMode,
) -> Result<Value, PathError> {
    if path.len() > MAX_DEPTH {
        return Err(PathError::InvalidPath {
            path: path.clone(),
            reason: format!("嵌套超过 {} 层", MAX_DEPTH),
        });
    }
    let mut next = tree.clone();
    write_at(&mut next, path, 0, value, mode)?;
    Ok(next)
}

fn write_at(
    node: &mut Value,
    path: &Path,
    depth: usize,
    value: Value,
    mode: WriteMode,
) -> Result<(), PathError> {
    let Some((seg, rest)) = path.segments()[depth..].split_first() else {
        *node = value;
        return Ok(());
    };

    if mode == WriteMode::Overwrite && !node.is_container() {
        tracing::debug!("覆盖标量为空对象: '{}'", path.prefix(depth));
        *node = Value::Object(Map::new());
    }

    match node {
        Value::Object(map) => {
            let key = seg.as_key().into_owned();
            if rest.is_empty() {
                map.insert(key, value);
                return Ok(());
            }
            let slot = map
                .entry(key)
                .or_insert_with(|| Value::Object(Map::new()));
            write_at(slot, path, depth + 1, value, mode)
        }
        Value::Array(items) => {
            let Some(index) = seg.as_index() else {
                return Err(PathError::InvalidPath {
                    path: path.clone(),
                    reason: format!(
                        "数组 '{}' 只能使用数字下标，得到 '{}'",
                        path.prefix(depth),
                        seg
                    ),
                });
            };
            let len = items.len();
            let slot = items.get_mut(index).ok_or_else(|| PathError::InvalidPath {
                path: path.clone(),
                reason: format!("下标 {} 越界（长度 {}）", index, len),
            })?;
            write_at(slot, path, depth + 1, value, mode)
        }
        scalar => Err(PathError::InvalidPath {
            path: path.clone(),
            reason: format!("'{}' 是 {}，不是容器", path.prefix(depth), scalar.kind()),
        }),
    }
}
