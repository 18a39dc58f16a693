//! VM桥接层：把前端的输入翻译成 SyncEngine 动作，并把引擎状态整理成可显示的文本
//!
//! 终端前端（main.rs）只负责读写行；命令解析与执行都在这里，便于测试。

use std::fmt::Write as _;

use thiserror::Error;

use crate::model::{
    data_core::{SyncEngine, SyncError},
    shadow_tree::{filter_fields, FieldNode},
    validation::{FieldRule, RequiredFields, RuleKind, ValidationResult},
    value::{UnknownKind, ValueKind},
};

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_TEXT_VALID: &str = "JSON有效";
pub const STATUS_TEXT_DRAFT: &str = "JSON尚未完成";
pub const STATUS_UPDATED: &str = "已更新";
pub const STATUS_VALID: &str = "校验通过";
pub const STATUS_SUBMITTED: &str = "已提交";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";
pub const MARK_NOT_ADDRESSABLE: &str = "（键名含 '.'，只能在文本中编辑）";

/// 命令行中代表根路径的写法
pub const ROOT_PATH_ALIAS: &str = "$";

/// 未指定文件时使用的示例文档
pub const SAMPLE_DOCUMENT: &str = r#"{
  "name": "John Doe",
  "email": "john.doe@example.com",
  "age": 30,
  "newsletter": true,
  "address": {
    "street": "123 Main St",
    "city": "Anytown",
    "zip": {
      "one": "test",
      "two": [3, 5, 68]
    }
  },
  "hobbies": ["reading", "traveling", "swimming"]
}"#;

/// 示例文档配套的必填规则
pub fn default_rules() -> RequiredFields {
    RequiredFields::new(vec![
        FieldRule::new("name", RuleKind::NonEmptyString),
        FieldRule::new("email", RuleKind::NonEmptyString),
    ])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Fields(String),
    Set { path: String, kind: ValueKind, raw: String },
    Toggle(String),
    Text(String),
    Add { path: String, kind: ValueKind, key: Option<String> },
    Validate,
    Submit,
    Query(String),
    Reformat,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("未知命令: {0}（输入 help 查看用法）")]
    Unknown(String),
    #[error("用法: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Kind(#[from] UnknownKind),
}

pub const HELP: &str = "\
show                      显示当前文本
fields [filter]           列出表单字段
set PATH KIND VALUE       编辑叶子（KIND: string/number/boolean）
toggle PATH               切换布尔字段
text JSON                 替换整段文本
add PATH KIND [KEY]       追加数组元素或对象成员（根路径写作 $）
validate                  运行必填校验
submit                    校验并提交
query JSONPATH            查看子树
reformat                  丢弃草稿，按树重新生成文本
quit                      退出";

fn normalize_path(raw: &str) -> String {
    if raw == ROOT_PATH_ALIAS {
        String::new()
    } else {
        raw.to_string()
    }
}

/// 解析一行输入
pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim_start()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let cmd = match head {
        "" | "show" => Command::Show,
        "fields" => Command::Fields(rest.to_string()),
        "set" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            let path = parts.next().filter(|p| !p.is_empty());
            let (Some(path), Some(kind)) = (path, parts.next()) else {
                return Err(CommandError::Usage("set PATH KIND VALUE"));
            };
            Command::Set {
                path: normalize_path(path),
                kind: kind.parse()?,
                raw: parts.next().unwrap_or("").to_string(),
            }
        }
        "toggle" => match args.next() {
            Some(path) => Command::Toggle(normalize_path(path)),
            None => return Err(CommandError::Usage("toggle PATH")),
        },
        "text" => Command::Text(rest.to_string()),
        "add" => {
            let (Some(path), Some(kind)) = (args.next(), args.next()) else {
                return Err(CommandError::Usage("add PATH KIND [KEY]"));
            };
            Command::Add {
                path: normalize_path(path),
                kind: kind.parse()?,
                key: args.next().map(str::to_string),
            }
        }
        "validate" => Command::Validate,
        "submit" => Command::Submit,
        "query" if !rest.is_empty() => Command::Query(rest.to_string()),
        "query" => return Err(CommandError::Usage("query JSONPATH")),
        "reformat" => Command::Reformat,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(cmd)
}

/// 文本视图状态行
pub fn text_status(engine: &SyncEngine) -> String {
    match engine.last_parse_error() {
        None => STATUS_TEXT_VALID.to_string(),
        Some(err) if err.incomplete => format!("{}（第 {} 行）", STATUS_TEXT_DRAFT, err.line),
        Some(err) => format!("{}{}", STATUS_ERROR_PREFIX, err),
    }
}

/// 字段列表：按深度缩进，叶子显示预览；无法按路径编辑的节点附加标记
pub fn render_fields(nodes: &[&FieldNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        let indent = "  ".repeat(node.depth as usize);
        let mark = if node.addressable { "" } else { MARK_NOT_ADDRESSABLE };
        let sep = if node.is_leaf() { " =" } else { "" };
        let _ = writeln!(
            out,
            "{}{} [{}]{} {}{}",
            indent, node.path, node.kind, sep, node.preview, mark
        );
    }
    out
}

pub fn render_validation(result: &ValidationResult) -> String {
    if result.is_valid() {
        return STATUS_VALID.to_string();
    }
    let mut out = String::new();
    for (path, message) in result.iter() {
        let _ = writeln!(out, "{}: {}", path, message);
    }
    out
}

/// 执行一条命令，返回要显示的文本
pub fn execute(engine: &mut SyncEngine, cmd: Command) -> Result<String, SyncError> {
    let out = match cmd {
        Command::Show => format!("{}\n-- {}", engine.text(), text_status(engine)),
        Command::Fields(filter) => {
            let fields = engine.fields();
            render_fields(&filter_fields(&fields, &filter))
        }
        Command::Set { path, kind, raw } => {
            engine.structured_edit(&path, raw, kind)?;
            STATUS_UPDATED.to_string()
        }
        Command::Toggle(path) => {
            let found = engine.value_at(&path)?;
            let Some(current) = found.as_bool() else {
                return Err(SyncError::InvalidTarget {
                    path: path.as_str().into(),
                    kind: found.kind(),
                });
            };
            engine.structured_edit(&path, !current, ValueKind::Boolean)?;
            format!("{} = {}", path, !current)
        }
        Command::Text(text) => {
            // 草稿是正常状态，不作为错误上报
            let _ = engine.text_edit(text);
            text_status(engine)
        }
        Command::Add { path, kind, key } => {
            engine.schema_extend(&path, key.as_deref(), kind)?;
            STATUS_UPDATED.to_string()
        }
        Command::Validate => render_validation(&engine.validate()),
        Command::Submit => match engine.submit() {
            Ok(_) => STATUS_SUBMITTED.to_string(),
            Err(result) => render_validation(&result),
        },
        Command::Query(json_path) => engine.query(&json_path)?,
        Command::Reformat => {
            engine.reformat()?;
            engine.text().to_string()
        }
        Command::Help => HELP.to_string(),
        Command::Quit => String::new(),
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_engine() -> SyncEngine {
        SyncEngine::from_text(SAMPLE_DOCUMENT)
            .expect("示例文档应可解析")
            .with_validation(default_rules())
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("show"), Ok(Command::Show));
        assert_eq!(
            parse_command("set address.city string New York"),
            Ok(Command::Set {
                path: "address.city".into(),
                kind: ValueKind::String,
                raw: "New York".into(),
            })
        );
        assert_eq!(
            parse_command("add $ boolean subscribed"),
            Ok(Command::Add {
                path: String::new(),
                kind: ValueKind::Boolean,
                key: Some("subscribed".into()),
            })
        );
        assert_eq!(
            parse_command(r#"text {"a": 1}"#),
            Ok(Command::Text(r#"{"a": 1}"#.into()))
        );
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(matches!(parse_command("frobnicate"), Err(CommandError::Unknown(_))));
        assert!(matches!(parse_command("set age"), Err(CommandError::Usage(_))));
        assert!(matches!(parse_command("add hobbies null"), Err(CommandError::Kind(_))));
        assert!(matches!(parse_command("query"), Err(CommandError::Usage(_))));
    }

    #[test]
    fn test_execute_set_and_toggle() {
        let mut engine = sample_engine();
        execute(&mut engine, parse_command("set age number 31").unwrap()).expect("编辑应该成功");
        assert!(engine.text().contains("\"age\": 31"));

        let out = execute(&mut engine, Command::Toggle("newsletter".into())).unwrap();
        assert_eq!(out, "newsletter = false");

        let err = execute(&mut engine, Command::Toggle("age".into())).unwrap_err();
        assert!(matches!(err, SyncError::InvalidTarget { kind: ValueKind::Number, .. }));
    }

    #[test]
    fn test_execute_text_draft_is_not_an_error() {
        let mut engine = sample_engine();
        let out = execute(&mut engine, Command::Text("{\"name\": ".into())).unwrap();
        assert!(out.starts_with(STATUS_TEXT_DRAFT), "未完成的文本应显示为草稿: {}", out);
        assert!(!engine.is_text_valid());
    }

    #[test]
    fn test_execute_add_and_fields() {
        let mut engine = sample_engine();
        execute(&mut engine, parse_command("add hobbies string").unwrap()).unwrap();
        let listing = execute(&mut engine, Command::Fields("hobbies".into())).unwrap();
        assert!(
            listing.contains("hobbies.3 [string] = \"\""),
            "新元素应出现在字段列表中:\n{}",
            listing
        );
    }

    #[test]
    fn test_fields_mark_dotted_keys() {
        let mut engine = SyncEngine::from_text(r#"{"a.b": "x", "c": {"d": 1}}"#).unwrap();
        let listing = execute(&mut engine, Command::Fields(String::new())).unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], format!("a.b [string] = \"x\"{}", MARK_NOT_ADDRESSABLE));
        assert_eq!(lines[1], "c [object] {..} (1 keys)");
        assert_eq!(lines[2], "  c.d [number] = 1");

        let err = execute(&mut engine, parse_command("add $ string e.f").unwrap()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPath { .. }));
    }

    #[test]
    fn test_execute_submit_reports_validation() {
        let mut engine = sample_engine();
        assert_eq!(execute(&mut engine, Command::Submit).unwrap(), STATUS_SUBMITTED);

        execute(&mut engine, parse_command("set name string").unwrap()).unwrap();
        let out = execute(&mut engine, Command::Submit).unwrap();
        assert!(out.contains("name: 此字段为必填项"));
    }

    #[test]
    fn test_text_status_reports_syntax_error() {
        let mut engine = sample_engine();
        let _ = engine.text_edit("{\"a\": x}");
        assert!(text_status(&engine).starts_with(STATUS_ERROR_PREFIX));
    }
}
