// 该文件是 Shouwang （守望） 项目的一部分。
// src/detection.rs - 检测记录定义
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

use chrono::NaiveDateTime;

use crate::frame::FrameIndex;

pub type CameraId = u32;

/// 归一化坐标下的目标中心点，取值范围 [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

impl Position {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }

  /// 两个位置之间的移动量：`(|dx| + |dy|) / 2`
  pub fn movement_to(&self, other: &Position) -> f64 {
    ((other.x - self.x).abs() + (other.y - self.y).abs()) / 2.0
  }
}

/// 单条目标检测记录，读入后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
  timestamp: NaiveDateTime,
  camera: CameraId,
  filename: String,
  position: Position,
}

impl DetectionEvent {
  pub fn new(
    timestamp: NaiveDateTime,
    camera: CameraId,
    filename: impl Into<String>,
    position: Position,
  ) -> Self {
    Self {
      timestamp,
      camera,
      filename: filename.into(),
      position,
    }
  }

  pub fn timestamp(&self) -> NaiveDateTime {
    self.timestamp
  }

  pub fn camera(&self) -> CameraId {
    self.camera
  }

  pub fn filename(&self) -> &str {
    &self.filename
  }

  pub fn position(&self) -> Position {
    self.position
  }

  pub fn frame_index(&self) -> Option<FrameIndex> {
    FrameIndex::parse(&self.filename)
  }
}
