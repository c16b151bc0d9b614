// 该文件是 Shouwang （守望） 项目的一部分。
// src/classifier.rs - 帧对状态判定
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

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::detection::{CameraId, DetectionEvent};

/// 监测对象的行为状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BehaviorState {
  Walk,
  Rest,
  Passive,
  #[default]
  Unknown,
}

impl BehaviorState {
  pub fn as_str(&self) -> &'static str {
    match self {
      BehaviorState::Walk => "walk",
      BehaviorState::Rest => "rest",
      BehaviorState::Passive => "PASSIVE",
      BehaviorState::Unknown => "unknown",
    }
  }
}

impl fmt::Display for BehaviorState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的行为状态: {0}")]
pub struct UnknownStateError(pub String);

impl FromStr for BehaviorState {
  type Err = UnknownStateError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "walk" => Ok(BehaviorState::Walk),
      "rest" => Ok(BehaviorState::Rest),
      "PASSIVE" => Ok(BehaviorState::Passive),
      "unknown" => Ok(BehaviorState::Unknown),
      other => Err(UnknownStateError(other.to_string())),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraRole {
  Passive,
  Active,
  Unspecified,
}

/// 摄像头角色划分
///
/// 被动摄像头（例如窝内摄像头）只要看到目标就判定为 `PASSIVE`；
/// 主动摄像头根据前后两帧的位移判定 `walk` / `rest`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraRoles {
  passive: BTreeSet<CameraId>,
  active: BTreeSet<CameraId>,
}

impl CameraRoles {
  pub fn new(
    passive: impl IntoIterator<Item = CameraId>,
    active: impl IntoIterator<Item = CameraId>,
  ) -> Self {
    Self {
      passive: passive.into_iter().collect(),
      active: active.into_iter().collect(),
    }
  }

  // 被动角色优先，同时出现在两个集合中的摄像头按被动处理
  pub fn role_of(&self, camera: CameraId) -> CameraRole {
    if self.passive.contains(&camera) {
      CameraRole::Passive
    } else if self.active.contains(&camera) {
      CameraRole::Active
    } else {
      CameraRole::Unspecified
    }
  }

  /// 同时配置为被动与主动的摄像头
  pub fn overlapping(&self) -> Vec<CameraId> {
    self.passive.intersection(&self.active).copied().collect()
  }

  pub fn passive(&self) -> &BTreeSet<CameraId> {
    &self.passive
  }

  pub fn active(&self) -> &BTreeSet<CameraId> {
    &self.active
  }
}

#[derive(Debug, Clone)]
pub struct PairClassifier {
  roles: CameraRoles,
  movement_threshold: f64,
}

impl PairClassifier {
  pub fn new(roles: CameraRoles, movement_threshold: f64) -> Self {
    Self {
      roles,
      movement_threshold,
    }
  }

  pub fn roles(&self) -> &CameraRoles {
    &self.roles
  }

  pub fn movement_threshold(&self) -> f64 {
    self.movement_threshold
  }

  /// 判定同一摄像头相邻两帧的候选状态
  ///
  /// 调用方保证 `curr` 的帧序号恰好是 `prev` 的下一帧。
  pub fn classify(&self, prev: &DetectionEvent, curr: &DetectionEvent) -> BehaviorState {
    match self.roles.role_of(curr.camera()) {
      CameraRole::Passive => BehaviorState::Passive,
      CameraRole::Active => {
        let movement = prev.position().movement_to(&curr.position());
        if movement > self.movement_threshold {
          BehaviorState::Walk
        } else {
          BehaviorState::Rest
        }
      }
      CameraRole::Unspecified => BehaviorState::Unknown,
    }
  }
}
