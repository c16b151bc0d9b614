// 该文件是 Shouwang （守望） 项目的一部分。
// src/output/csv_state_log.rs - CSV 状态日志
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

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  classifier::{BehaviorState, UnknownStateError},
  csv_row, expand_date_placeholder,
  output::{RecordSource, StateRecord, StateSink},
};

pub const STATE_LOG_HEADER: [&str; 8] = [
  "timestamp",
  "state",
  "last_confirmed_state",
  "camera",
  "x_center",
  "y_center",
  "frames_used",
  "notes",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const NOT_AVAILABLE: &str = "N/A";
const TIMEOUT_FRAMES: &str = "TIMEOUT";
const LAST_CONFIRMED_COLUMN: usize = 2;

#[derive(Error, Debug)]
pub enum CsvStateLogError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("状态日志最后一行缺少 last_confirmed_state 字段: {0}")]
  MissingColumn(String),
  #[error("状态日志内容错误: {0}")]
  InvalidState(#[from] UnknownStateError),
}

/// 追加写入的 CSV 状态日志，文件不存在时先写入表头
#[derive(Debug, Clone)]
pub struct CsvStateLog {
  path: PathBuf,
  header_checked: bool,
}

impl FromUrlWithScheme for CsvStateLog {
  const SCHEME: &'static str = "csv";
}

impl FromUrl for CsvStateLog {
  type Error = CsvStateLogError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CsvStateLogError::SchemeMismatch);
    }
    let path = urlencoding::decode(url.path())?;
    let path = expand_date_placeholder(&path, Local::now().date_naive());
    Ok(CsvStateLog::new(path))
  }
}

impl CsvStateLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      header_checked: false,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 文件不存在时创建文件（及其父目录）并写入表头
  ///
  /// 文件已存在（包括被其他写入者抢先创建）时不做任何修改。
  pub fn ensure_header(&self) -> Result<(), CsvStateLogError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent)?;
    }
    let mut file = match OpenOptions::new()
      .create_new(true)
      .write(true)
      .open(&self.path)
    {
      Ok(file) => file,
      Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(()),
      Err(e) => return Err(e.into()),
    };
    debug!("创建状态日志: {}", self.path.display());
    writeln!(file, "{}", csv_row::join(STATE_LOG_HEADER))?;
    Ok(())
  }

  fn open_for_append(&self) -> std::io::Result<fs::File> {
    OpenOptions::new().append(true).open(&self.path)
  }

  pub fn latest_confirmed_state(&self) -> Result<Option<BehaviorState>, CsvStateLogError> {
    latest_confirmed_state(&self.path)
  }
}

fn format_row(record: &StateRecord) -> String {
  let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
  let state = record.state.to_string();
  let confirmed = record.last_confirmed_state.to_string();
  let notes = record.notes_field();

  let (camera, x, y, frames) = match &record.source {
    RecordSource::Pair {
      camera,
      position,
      prev_filename,
      curr_filename,
    } => (
      camera.to_string(),
      format!("{:.4}", position.x),
      format!("{:.4}", position.y),
      format!("{};{}", prev_filename, curr_filename),
    ),
    RecordSource::Timeout => (
      NOT_AVAILABLE.to_string(),
      NOT_AVAILABLE.to_string(),
      NOT_AVAILABLE.to_string(),
      TIMEOUT_FRAMES.to_string(),
    ),
  };

  csv_row::join([
    timestamp, state, confirmed, camera, x, y, frames, notes,
  ])
}

impl StateSink for CsvStateLog {
  type Error = CsvStateLogError;

  fn append(&mut self, record: &StateRecord) -> Result<(), Self::Error> {
    if !self.header_checked {
      self.ensure_header()?;
      self.header_checked = true;
    }
    // 运行期间文件被移走时重新创建
    let mut file = match self.open_for_append() {
      Ok(file) => file,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        self.ensure_header()?;
        self.open_for_append()?
      }
      Err(e) => return Err(e.into()),
    };
    writeln!(file, "{}", format_row(record))?;
    Ok(())
  }
}

/// 读取状态日志最后一行的全局确认状态
///
/// 文件不存在、为空或只有表头时返回 `Ok(None)`。
pub fn latest_confirmed_state(
  path: impl AsRef<Path>,
) -> Result<Option<BehaviorState>, CsvStateLogError> {
  let content = match fs::read_to_string(path.as_ref()) {
    Ok(content) => content,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e.into()),
  };

  let Some(last_line) = content.lines().rev().find(|line| !line.trim().is_empty()) else {
    return Ok(None);
  };

  let fields = csv_row::split(last_line);
  if fields.first().map(String::as_str) == Some(STATE_LOG_HEADER[0]) {
    return Ok(None);
  }

  let state = fields
    .get(LAST_CONFIRMED_COLUMN)
    .ok_or_else(|| CsvStateLogError::MissingColumn(last_line.to_string()))?;
  Ok(Some(state.trim().parse()?))
}
