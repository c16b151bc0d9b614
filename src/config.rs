// 该文件是 Shouwang （守望） 项目的一部分。
// src/config.rs - 监测配置
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

//! # 配置
//!
//! 配置文件为 TOML 格式，所有字段均可省略：
//!
//! ```toml
//! movement_threshold = 0.02
//! confirmation_window_size = 3
//! idle_timeout_secs = 30
//! check_interval_secs = 1
//! passive_cameras = [1]
//! active_cameras = [2, 3, 4]
//! subject_class = "animal"
//! # max_processed_pairs = 100000
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::classifier::CameraRoles;
use crate::detection::CameraId;
use crate::input::DEFAULT_SUBJECT_CLASS;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("确认窗口长度必须至少为 1")]
  ZeroWindowSize,
  #[error("去重集合上限必须至少为 1")]
  ZeroProcessedLimit,
  #[error("{name} 无效: {value}")]
  InvalidValue { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
  /// 主动摄像头判定为 `walk` 的最小移动量（严格大于）
  pub movement_threshold: f64,
  /// 确认全局状态所需的连续一致状态数
  pub confirmation_window_size: usize,
  pub idle_timeout_secs: f64,
  pub check_interval_secs: f64,
  pub passive_cameras: Vec<CameraId>,
  pub active_cameras: Vec<CameraId>,
  pub subject_class: String,
  pub max_processed_pairs: Option<usize>,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      movement_threshold: 0.0,
      confirmation_window_size: 1,
      idle_timeout_secs: 1.0,
      check_interval_secs: 1.0,
      passive_cameras: Vec::new(),
      active_cameras: Vec::new(),
      subject_class: DEFAULT_SUBJECT_CLASS.to_string(),
      max_processed_pairs: None,
    }
  }
}

/// 校验后的配置
#[derive(Debug, Clone)]
pub struct MonitorSettings {
  pub movement_threshold: f64,
  pub window_size: NonZeroUsize,
  pub idle_timeout: TimeDelta,
  pub check_interval: Duration,
  pub roles: CameraRoles,
  pub subject_class: String,
  pub max_processed_pairs: Option<NonZeroUsize>,
}

impl MonitorConfig {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Self::from_toml_str(&content)
  }

  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(content)?)
  }

  pub fn into_settings(self) -> Result<MonitorSettings, ConfigError> {
    let window_size =
      NonZeroUsize::new(self.confirmation_window_size).ok_or(ConfigError::ZeroWindowSize)?;
    let max_processed_pairs = match self.max_processed_pairs {
      Some(limit) => Some(NonZeroUsize::new(limit).ok_or(ConfigError::ZeroProcessedLimit)?),
      None => None,
    };

    if !self.movement_threshold.is_finite() || self.movement_threshold < 0.0 {
      return Err(ConfigError::InvalidValue {
        name: "movement_threshold",
        value: self.movement_threshold,
      });
    }
    let idle_timeout = Duration::try_from_secs_f64(self.idle_timeout_secs)
      .ok()
      .and_then(|d| TimeDelta::from_std(d).ok())
      .ok_or(ConfigError::InvalidValue {
        name: "idle_timeout_secs",
        value: self.idle_timeout_secs,
      })?;
    let check_interval = Duration::try_from_secs_f64(self.check_interval_secs)
      .ok()
      .filter(|d| !d.is_zero())
      .ok_or(ConfigError::InvalidValue {
        name: "check_interval_secs",
        value: self.check_interval_secs,
      })?;

    let roles = CameraRoles::new(self.passive_cameras, self.active_cameras);
    let overlapping = roles.overlapping();
    if !overlapping.is_empty() {
      warn!(
        "摄像头 {:?} 同时配置为被动与主动，将按被动摄像头处理",
        overlapping
      );
    }

    Ok(MonitorSettings {
      movement_threshold: self.movement_threshold,
      window_size,
      idle_timeout,
      check_interval,
      roles,
      subject_class: self.subject_class,
      max_processed_pairs,
    })
  }
}
