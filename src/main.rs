//! 程序入口：初始化日志、加载初始文档，并在终端上驱动 SyncEngine

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::SubscriberBuilder;

use json_form_sync::{
    utils::fs::{read_rules_file, read_value_file},
    vm::bridge::{
        default_rules, execute, parse_command, Command, SAMPLE_DOCUMENT, STATUS_ERROR_PREFIX,
        STATUS_READY,
    },
    EngineOptions, SyncEngine,
};

/// 在终端上同步编辑 JSON 表单与文本
#[derive(Parser, Debug)]
#[command(name = "json_form_sync", about, long_about = None)]
struct Args {
    /// 初始文档（缺省时使用内置示例）
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// 必填规则文件，例如 [{"path": "name", "rule": "nonEmptyString"}]
    #[arg(long, value_name = "RULES")]
    rules: Option<PathBuf>,

    /// 重复键覆盖、穿过标量写入时替换为空对象
    #[arg(long)]
    lenient: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn build_engine(args: &Args) -> anyhow::Result<SyncEngine> {
    let options = EngineOptions { strict: !args.lenient };
    let initial = match &args.file {
        Some(path) => read_value_file(path)
            .with_context(|| format!("加载文档失败: {}", path.display()))?,
        None => json_form_sync::deserialize(SAMPLE_DOCUMENT).context("示例文档无效")?,
    };
    let rules = match &args.rules {
        Some(path) => read_rules_file(path)
            .with_context(|| format!("加载校验规则失败: {}", path.display()))?,
        None => default_rules(),
    };
    Ok(SyncEngine::with_options(initial, options)?.with_validation(rules))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志输出（写到 stderr，不干扰命令输出）
    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let _ = SubscriberBuilder::default()
        .with_max_level(level)
        .with_writer(io::stderr)
        .try_init();

    let mut engine = build_engine(&args)?;
    tracing::info!("引擎启动成功: {} 个字段", engine.fields().len());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    writeln!(stdout, "{}\n{}", engine.text(), STATUS_READY)?;

    for line in stdin.lock().lines() {
        let line = line.context("读取输入失败")?;
        let cmd = match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(cmd) => cmd,
            Err(e) => {
                writeln!(stdout, "{}{}", STATUS_ERROR_PREFIX, e)?;
                continue;
            }
        };
        match execute(&mut engine, cmd) {
            Ok(out) => writeln!(stdout, "{}", out)?,
            Err(e) => writeln!(stdout, "{}{}", STATUS_ERROR_PREFIX, e)?,
        }
        stdout.flush()?;
    }
    Ok(())
}
