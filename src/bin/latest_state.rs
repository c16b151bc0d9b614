// 该文件是 Shouwang （守望） 项目的一部分。
// src/bin/latest_state.rs - 输出最近确认状态
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use url::Url;

use shouwang::{FromUrl, output::CsvStateLog};

/// 周期性读取状态日志最后一行，以 JSON 输出全局确认状态
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 状态日志，例如 csv:///data/{date}_Animal/animal_states_log.csv
  #[arg(long, value_name = "STATE_LOG")]
  pub state_log: Url,
  /// 输出中使用的对象名称
  #[arg(long, default_value = "animal", value_name = "NAME")]
  pub name: String,
  /// 读取间隔（秒）
  #[arg(long, default_value = "1", value_name = "SECONDS")]
  pub interval: u64,
  /// 只读取一次
  #[arg(long)]
  pub once: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let state_log = CsvStateLog::from_url(&args.state_log)?;

  loop {
    match state_log.latest_confirmed_state() {
      Ok(Some(state)) => {
        let mut payload = serde_json::Map::new();
        payload.insert(args.name.clone(), state.as_str().into());
        println!("{}", serde_json::Value::Object(payload));
      }
      Ok(None) => debug!("暂无状态: {}", state_log.path().display()),
      Err(e) => error!("读取状态日志失败: {}", e),
    }

    if args.once {
      break;
    }
    std::thread::sleep(Duration::from_secs(args.interval));
  }

  Ok(())
}
