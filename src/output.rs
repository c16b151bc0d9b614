// 该文件是 Shouwang （守望） 项目的一部分。
// src/output.rs - 状态输出定义
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

use std::convert::Infallible;
use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;
use url::Url;

use crate::classifier::BehaviorState;
use crate::detection::{CameraId, Position};
use crate::{FromUrl, FromUrlWithScheme};

mod csv_state_log;
pub use self::csv_state_log::{CsvStateLog, CsvStateLogError, STATE_LOG_HEADER, latest_confirmed_state};

/// 状态记录的接收端
pub trait StateSink {
  type Error;
  fn append(&mut self, record: &StateRecord) -> Result<(), Self::Error>;
}

/// 状态日志中的注释标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
  DuplicatePairAndState,
  StateConfirmed(BehaviorState),
  IdleTimeout,
}

impl fmt::Display for Note {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Note::DuplicatePairAndState => f.write_str("IGNORED=DUPLICATE_PAIR_AND_STATE"),
      Note::StateConfirmed(state) => write!(f, "STATE_CONFIRMED={}", state),
      Note::IdleTimeout => f.write_str("IDLE_TIMEOUT"),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordSource {
  Pair {
    camera: CameraId,
    position: Position,
    prev_filename: String,
    curr_filename: String,
  },
  Timeout,
}

/// 状态日志中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
  pub timestamp: NaiveDateTime,
  /// 本帧对判定出的状态，超时记录为 `unknown`
  pub state: BehaviorState,
  /// 处理完本条记录后的全局确认状态
  pub last_confirmed_state: BehaviorState,
  pub source: RecordSource,
  pub notes: Vec<Note>,
}

impl StateRecord {
  pub fn is_duplicate(&self) -> bool {
    self.notes.contains(&Note::DuplicatePairAndState)
  }

  pub fn confirmed_state(&self) -> Option<BehaviorState> {
    self.notes.iter().find_map(|note| match note {
      Note::StateConfirmed(state) => Some(*state),
      _ => None,
    })
  }

  pub fn notes_field(&self) -> String {
    self
      .notes
      .iter()
      .map(ToString::to_string)
      .collect::<Vec<_>>()
      .join(";")
  }
}

impl<S: StateSink + ?Sized> StateSink for &mut S {
  type Error = S::Error;

  fn append(&mut self, record: &StateRecord) -> Result<(), Self::Error> {
    (**self).append(record)
  }
}

impl StateSink for Vec<StateRecord> {
  type Error = Infallible;

  fn append(&mut self, record: &StateRecord) -> Result<(), Self::Error> {
    self.push(record.clone());
    Ok(())
  }
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("CSV 状态日志错误: {0}")]
  CsvStateLogError(#[from] CsvStateLogError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  CsvStateLog(CsvStateLog),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      CsvStateLog::SCHEME => Ok(OutputWrapper::CsvStateLog(CsvStateLog::from_url(url)?)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl StateSink for OutputWrapper {
  type Error = OutputError;

  fn append(&mut self, record: &StateRecord) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::CsvStateLog(output) => output.append(record).map_err(OutputError::from),
    }
  }
}
