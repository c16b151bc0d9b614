// 该文件是 Shouwang （守望） 项目的一部分。
// src/input/csv_detection_log.rs - CSV 检测日志输入
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

//! # CSV 检测日志
//!
//! 目标检测程序每处理一帧就向日志追加若干行：
//!
//! ```text
//! timestamp,camera,filename,object_class,x_center,y_center
//! 2026-01-01T08:00:00.125000,1,2601010001_1_a.jpg,animal,0.4127,0.6630
//! ```
//!
//! 列按表头名称定位，顺序无关。`object_class` 列缺失时不做类别过滤。
//! 每次轮询重新读取整个文件，返回时间戳不早于水位线的记录；
//! 水位线时刻上已经交付过的记录不再重复交付。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, csv_row,
  detection::{CameraId, DetectionEvent, Position},
  expand_date_placeholder,
  input::DetectionSource,
};

pub const DEFAULT_SUBJECT_CLASS: &str = "animal";

const CLASS_QUERY_KEY: &str = "class";
const COLUMN_TIMESTAMP: &str = "timestamp";
const COLUMN_CAMERA: &str = "camera";
const COLUMN_FILENAME: &str = "filename";
const COLUMN_CLASS: &str = "object_class";
const COLUMN_X: &str = "x_center";
const COLUMN_Y: &str = "y_center";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Error, Debug)]
pub enum CsvDetectionLogError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("路径解码错误: {0}")]
  PathDecodeError(#[from] std::string::FromUtf8Error),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("检测日志缺少列: {0}")]
  MissingColumn(&'static str),
}

#[derive(Debug, Error, PartialEq)]
enum RowError {
  #[error("字段数量不足")]
  ShortRow,
  #[error("时间戳无法解析: {0}")]
  Timestamp(String),
  #[error("摄像头编号无法解析: {0}")]
  Camera(String),
  #[error("坐标无法解析: {0}")]
  Coordinate(String),
}

struct Columns {
  timestamp: usize,
  camera: usize,
  filename: usize,
  class: Option<usize>,
  x: usize,
  y: usize,
}

impl Columns {
  fn from_header(header: &[String]) -> Result<Self, CsvDetectionLogError> {
    let index: HashMap<&str, usize> = header
      .iter()
      .enumerate()
      .map(|(i, name)| (name.trim(), i))
      .collect();
    let require = |name: &'static str| {
      index
        .get(name)
        .copied()
        .ok_or(CsvDetectionLogError::MissingColumn(name))
    };

    Ok(Columns {
      timestamp: require(COLUMN_TIMESTAMP)?,
      camera: require(COLUMN_CAMERA)?,
      filename: require(COLUMN_FILENAME)?,
      class: index.get(COLUMN_CLASS).copied(),
      x: require(COLUMN_X)?,
      y: require(COLUMN_Y)?,
    })
  }
}

type EventKey = (CameraId, String);

fn event_key(event: &DetectionEvent) -> EventKey {
  (event.camera(), event.filename().to_string())
}

/// 从目标检测程序写出的 CSV 日志中读取目标记录
#[derive(Debug, Clone)]
pub struct CsvDetectionLog {
  path: PathBuf,
  subject_class: String,
  /// 最近一批记录中最晚的时间戳，以及该时刻已交付的记录
  delivered_at: Option<(NaiveDateTime, HashSet<EventKey>)>,
}

impl FromUrlWithScheme for CsvDetectionLog {
  const SCHEME: &'static str = "csv";
}

impl FromUrl for CsvDetectionLog {
  type Error = CsvDetectionLogError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CsvDetectionLogError::SchemeMismatch);
    }

    let subject_class = url
      .query_pairs()
      .find(|(k, _)| k == CLASS_QUERY_KEY)
      .map(|(_, v)| v.into_owned())
      .unwrap_or_else(|| DEFAULT_SUBJECT_CLASS.to_string());

    let path = urlencoding::decode(url.path())?;
    let path = expand_date_placeholder(&path, Local::now().date_naive());
    Ok(CsvDetectionLog::new(path).with_subject_class(subject_class))
  }
}

impl CsvDetectionLog {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      subject_class: DEFAULT_SUBJECT_CLASS.to_string(),
      delivered_at: None,
    }
  }

  pub fn with_subject_class(mut self, subject_class: impl Into<String>) -> Self {
    self.subject_class = subject_class.into();
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn subject_class(&self) -> &str {
    &self.subject_class
  }

  fn parse_row(
    &self,
    columns: &Columns,
    fields: &[String],
  ) -> Result<Option<DetectionEvent>, RowError> {
    let field = |i: usize| fields.get(i).map(|f| f.trim()).ok_or(RowError::ShortRow);

    if let Some(class) = columns.class
      && field(class)? != self.subject_class
    {
      return Ok(None);
    }

    let timestamp = parse_timestamp(field(columns.timestamp)?)?;
    let camera_field = field(columns.camera)?;
    let camera: CameraId = camera_field
      .parse()
      .map_err(|_| RowError::Camera(camera_field.to_string()))?;
    let x = parse_coordinate(field(columns.x)?)?;
    let y = parse_coordinate(field(columns.y)?)?;

    Ok(Some(DetectionEvent::new(
      timestamp,
      camera,
      field(columns.filename)?,
      Position::new(x, y),
    )))
  }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, RowError> {
  TIMESTAMP_FORMATS
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .or_else(|| {
      DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
    })
    .ok_or_else(|| RowError::Timestamp(s.to_string()))
}

fn parse_coordinate(s: &str) -> Result<f64, RowError> {
  s.parse::<f64>()
    .ok()
    .filter(|v| v.is_finite())
    .ok_or_else(|| RowError::Coordinate(s.to_string()))
}

impl DetectionSource for CsvDetectionLog {
  type Error = CsvDetectionLogError;

  fn read_since(
    &mut self,
    watermark: Option<NaiveDateTime>,
  ) -> Result<Vec<DetectionEvent>, Self::Error> {
    let content = match fs::read(&self.path) {
      Ok(content) => content,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut lines = content
      .split(|b| *b == b'\n')
      .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
      .filter(|line| !line.trim_ascii().is_empty());
    let Some(header) = lines.next() else {
      return Ok(Vec::new());
    };
    let columns = Columns::from_header(&csv_row::split(&String::from_utf8_lossy(header)))?;

    let delivered = match (&self.delivered_at, watermark) {
      (Some((at, keys)), Some(w)) if *at == w => Some(keys),
      _ => None,
    };
    let is_new = |event: &DetectionEvent| match watermark {
      None => true,
      Some(w) if event.timestamp() > w => true,
      Some(w) if event.timestamp() == w => {
        delivered.is_none_or(|keys| !keys.contains(&event_key(event)))
      }
      Some(_) => false,
    };

    let mut events = Vec::new();
    for line in lines {
      let Ok(line) = std::str::from_utf8(line) else {
        debug!("跳过非 UTF-8 检测记录: {}", String::from_utf8_lossy(line));
        continue;
      };
      match self.parse_row(&columns, &csv_row::split(line)) {
        Ok(Some(event)) if is_new(&event) => events.push(event),
        Ok(_) => {}
        Err(e) => debug!("跳过无效检测记录 ({}): {}", e, line),
      }
    }

    events.sort_by_key(DetectionEvent::timestamp);

    if let Some(latest) = events.last().map(DetectionEvent::timestamp) {
      let mut keys = match self.delivered_at.take() {
        Some((at, keys)) if at == latest => keys,
        _ => HashSet::new(),
      };
      keys.extend(
        events
          .iter()
          .filter(|e| e.timestamp() == latest)
          .map(event_key),
      );
      self.delivered_at = Some((latest, keys));
    }

    Ok(events)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  #[test]
  fn timestamps_in_both_layouts() {
    let expected = NaiveDate::from_ymd_opt(2026, 1, 1)
      .unwrap()
      .and_hms_micro_opt(8, 0, 0, 125_000)
      .unwrap();
    assert_eq!(parse_timestamp("2026-01-01T08:00:00.125"), Ok(expected));
    assert_eq!(parse_timestamp("2026-01-01 08:00:00.125000"), Ok(expected));
    assert_eq!(
      parse_timestamp("2026-01-01 08:00:00"),
      Ok(expected - chrono::TimeDelta::milliseconds(125))
    );
    assert!(parse_timestamp("yesterday").is_err());
  }

  #[test]
  fn coordinates_must_be_finite() {
    assert_eq!(parse_coordinate("0.25"), Ok(0.25));
    assert!(parse_coordinate("NaN").is_err());
    assert!(parse_coordinate("inf").is_err());
    assert!(parse_coordinate("").is_err());
  }

  #[test]
  fn rows_of_other_classes_are_filtered() {
    let log = CsvDetectionLog::new("unused.csv");
    let header = csv_row::split("timestamp,camera,filename,object_class,x_center,y_center");
    let columns = Columns::from_header(&header).unwrap();

    let row = csv_row::split("2026-01-01T08:00:00,2,5_2.jpg,animal,0.1,0.2");
    let event = log.parse_row(&columns, &row).unwrap().unwrap();
    assert_eq!(event.camera(), 2);
    assert_eq!(event.filename(), "5_2.jpg");

    let row = csv_row::split("2026-01-01T08:00:00,2,5_2.jpg,person,0.1,0.2");
    assert_eq!(log.parse_row(&columns, &row), Ok(None));

    let row = csv_row::split("2026-01-01T08:00:00,two,5_2.jpg,animal,0.1,0.2");
    assert_eq!(
      log.parse_row(&columns, &row),
      Err(RowError::Camera("two".into()))
    );
  }

  #[test]
  fn header_must_name_required_columns() {
    let header = csv_row::split("timestamp,camera,x_center,y_center");
    assert!(matches!(
      Columns::from_header(&header),
      Err(CsvDetectionLogError::MissingColumn("filename"))
    ));
  }
}
