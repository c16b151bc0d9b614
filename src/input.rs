// 该文件是 Shouwang （守望） 项目的一部分。
// src/input.rs - 检测记录输入
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

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme, detection::DetectionEvent};

mod csv_detection_log;
pub use self::csv_detection_log::{CsvDetectionLog, CsvDetectionLogError, DEFAULT_SUBJECT_CLASS};

/// 检测记录来源
///
/// 返回时间戳不早于 `watermark` 的记录，按时间升序排列。水位线时刻上的
/// 记录可能被再次交付，重复的帧对由确认引擎忽略。
/// 来源不存在或没有新数据时返回空列表而不是错误。
pub trait DetectionSource {
  type Error;
  fn read_since(
    &mut self,
    watermark: Option<NaiveDateTime>,
  ) -> Result<Vec<DetectionEvent>, Self::Error>;
}

impl DetectionSource for Vec<DetectionEvent> {
  type Error = Infallible;

  fn read_since(
    &mut self,
    watermark: Option<NaiveDateTime>,
  ) -> Result<Vec<DetectionEvent>, Self::Error> {
    let mut events: Vec<_> = self
      .iter()
      .filter(|e| watermark.is_none_or(|w| e.timestamp() >= w))
      .cloned()
      .collect();
    events.sort_by_key(DetectionEvent::timestamp);
    Ok(events)
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("CSV 检测日志错误: {0}")]
  CsvDetectionLogError(#[from] CsvDetectionLogError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  CsvDetectionLog(CsvDetectionLog),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() == CsvDetectionLog::SCHEME {
      let input = CsvDetectionLog::from_url(url)?;
      return Ok(InputWrapper::CsvDetectionLog(input));
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl DetectionSource for InputWrapper {
  type Error = InputError;

  fn read_since(
    &mut self,
    watermark: Option<NaiveDateTime>,
  ) -> Result<Vec<DetectionEvent>, Self::Error> {
    match self {
      InputWrapper::CsvDetectionLog(input) => input.read_since(watermark).map_err(InputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Position;
  use chrono::{NaiveDate, TimeDelta};

  #[test]
  fn in_memory_source_filters_and_sorts() {
    let base = NaiveDate::from_ymd_opt(2026, 1, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap();
    let at = |s| base + TimeDelta::seconds(s);
    let mut source = vec![
      DetectionEvent::new(at(3), 1, "3_1.jpg", Position::new(0.0, 0.0)),
      DetectionEvent::new(at(1), 1, "1_1.jpg", Position::new(0.0, 0.0)),
      DetectionEvent::new(at(2), 1, "2_1.jpg", Position::new(0.0, 0.0)),
    ];

    let all = source.read_since(None).unwrap();
    let names: Vec<_> = all.iter().map(|e| e.filename()).collect();
    assert_eq!(names, ["1_1.jpg", "2_1.jpg", "3_1.jpg"]);

    // 水位线时刻的记录会再次交付
    let newer = source.read_since(Some(at(2))).unwrap();
    let names: Vec<_> = newer.iter().map(|e| e.filename()).collect();
    assert_eq!(names, ["2_1.jpg", "3_1.jpg"]);
  }
}
