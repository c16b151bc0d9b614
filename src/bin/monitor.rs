// 该文件是 Shouwang （守望） 项目的一部分。
// src/bin/monitor.rs - 行为状态监测主程序
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use shouwang::{
  FromUrl,
  config::MonitorConfig,
  input::InputWrapper,
  output::OutputWrapper,
  task::{PollingTask, Task, install_ctrlc_handler},
};

/// Shouwang 行为状态监测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 配置文件路径（TOML），省略时使用默认配置
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,
  /// 检测日志，例如 csv:///data/{date}_Animal/animal_detections_log.csv?class=animal
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 状态日志，例如 csv:///data/{date}_Animal/animal_states_log.csv
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 覆盖配置中的移动阈值
  #[arg(long, value_name = "THRESHOLD")]
  pub movement_threshold: Option<f64>,
  /// 覆盖配置中的确认窗口长度
  #[arg(long, value_name = "COUNT")]
  pub window_size: Option<usize>,
  /// 覆盖配置中的空闲超时（秒）
  #[arg(long, value_name = "SECONDS")]
  pub idle_timeout: Option<f64>,
  /// 覆盖配置中的轮询间隔（秒）
  #[arg(long, value_name = "SECONDS")]
  pub check_interval: Option<f64>,
  /// 最大轮询次数，省略表示一直运行
  #[arg(long, value_name = "COUNT")]
  pub max_iterations: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  let mut config = match &args.config {
    Some(path) => MonitorConfig::load(path)?,
    None => MonitorConfig::default(),
  };
  if let Some(threshold) = args.movement_threshold {
    config.movement_threshold = threshold;
  }
  if let Some(window_size) = args.window_size {
    config.confirmation_window_size = window_size;
  }
  if let Some(idle_timeout) = args.idle_timeout {
    config.idle_timeout_secs = idle_timeout;
  }
  if let Some(check_interval) = args.check_interval {
    config.check_interval_secs = check_interval;
  }
  let settings = config.into_settings()?;

  let mut input_url = args.input.clone();
  if !input_url.query_pairs().any(|(k, _)| k == "class") {
    input_url
      .query_pairs_mut()
      .append_pair("class", &settings.subject_class);
  }

  info!("检测日志: {}", input_url);
  info!("状态日志: {}", args.output);
  info!("监测对象类别: {}", settings.subject_class);
  info!("被动摄像头: {:?}", settings.roles.passive());
  info!("主动摄像头: {:?}", settings.roles.active());
  info!("移动阈值: {}", settings.movement_threshold);
  info!(
    "全局状态确认需要 {} 个连续一致的有效帧对状态",
    settings.window_size
  );
  info!(
    "空闲超时: {} 秒内没有新的有效帧对则重置为 unknown",
    settings.idle_timeout.num_milliseconds() as f64 / 1000.0
  );
  info!("轮询间隔: {:?}", settings.check_interval);

  let input = InputWrapper::from_url(&input_url)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let shutdown = install_ctrlc_handler()?;

  let monitor = PollingTask::new(&settings)
    .with_max_iterations(args.max_iterations)
    .with_shutdown(shutdown)
    .run_task(input, output)?;

  info!("最后确认状态: {}", monitor.global_state());
  Ok(())
}
