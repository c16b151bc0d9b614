// 该文件是 Shouwang （守望） 项目的一部分。
// src/watchdog.rs - 空闲超时看门狗
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

use chrono::{NaiveDateTime, TimeDelta};

use crate::classifier::BehaviorState;
use crate::confirmation::ConfirmationEngine;

/// 长时间没有有效帧对时将全局状态重置为 `unknown`
#[derive(Debug, Clone, Copy)]
pub struct IdleWatchdog {
  idle_timeout: TimeDelta,
}

impl IdleWatchdog {
  pub fn new(idle_timeout: TimeDelta) -> Self {
    Self { idle_timeout }
  }

  pub fn idle_timeout(&self) -> TimeDelta {
    self.idle_timeout
  }

  /// 检查是否超时，超时则清空确认历史并返回 `true`
  pub fn check(&self, engine: &mut ConfirmationEngine, now: NaiveDateTime) -> bool {
    let Some(last) = engine.last_contributing() else {
      return false;
    };
    if now - last < self.idle_timeout {
      return false;
    }
    if engine.global_state() == BehaviorState::Unknown && engine.window().is_empty() {
      return false;
    }
    engine.reset();
    true
  }
}
