// 该文件是 Shouwang （守望） 项目的一部分。
// src/confirmation.rs - 去重与全局状态确认
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

//! # 去重与确认
//!
//! 每个帧对以 `(起始帧, 结束帧, 状态)` 作为身份。同一身份只会向确认窗口
//! 贡献一次，直到空闲超时清空历史。确认窗口保留最近 K 个贡献状态，
//! 窗口满且全部相同时才会更新全局状态。

use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;

use chrono::NaiveDateTime;

use crate::classifier::BehaviorState;
use crate::frame::FrameIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairIdentity {
  pub start_index: FrameIndex,
  pub end_index: FrameIndex,
  pub state: BehaviorState,
}

/// 已计入确认窗口的帧对身份集合
///
/// 设置 `capacity` 后按插入顺序淘汰最早的身份，否则一直增长到下一次清空。
#[derive(Debug, Default)]
pub struct ProcessedSet {
  seen: HashSet<PairIdentity>,
  order: VecDeque<PairIdentity>,
  capacity: Option<NonZeroUsize>,
}

impl ProcessedSet {
  pub fn new(capacity: Option<NonZeroUsize>) -> Self {
    Self {
      seen: HashSet::new(),
      order: VecDeque::new(),
      capacity,
    }
  }

  pub fn contains(&self, id: &PairIdentity) -> bool {
    self.seen.contains(id)
  }

  /// 插入新身份，已存在时返回 `false`
  pub fn insert(&mut self, id: PairIdentity) -> bool {
    if !self.seen.insert(id) {
      return false;
    }
    if let Some(capacity) = self.capacity {
      self.order.push_back(id);
      while self.order.len() > capacity.get() {
        if let Some(oldest) = self.order.pop_front() {
          self.seen.remove(&oldest);
        }
      }
    }
    true
  }

  pub fn len(&self) -> usize {
    self.seen.len()
  }

  pub fn is_empty(&self) -> bool {
    self.seen.is_empty()
  }

  pub fn clear(&mut self) {
    self.seen.clear();
    self.order.clear();
  }
}

/// 固定容量的状态滑动窗口
#[derive(Debug)]
pub struct ConfirmationWindow {
  states: VecDeque<BehaviorState>,
  capacity: NonZeroUsize,
}

impl ConfirmationWindow {
  pub fn new(capacity: NonZeroUsize) -> Self {
    Self {
      states: VecDeque::with_capacity(capacity.get()),
      capacity,
    }
  }

  pub fn push(&mut self, state: BehaviorState) {
    if self.states.len() == self.capacity.get() {
      self.states.pop_front();
    }
    self.states.push_back(state);
  }

  /// 窗口已满且所有状态一致时返回该状态
  pub fn homogeneous(&self) -> Option<BehaviorState> {
    if self.states.len() != self.capacity.get() {
      return None;
    }
    let first = *self.states.front()?;
    self.states.iter().all(|s| *s == first).then_some(first)
  }

  pub fn len(&self) -> usize {
    self.states.len()
  }

  pub fn is_empty(&self) -> bool {
    self.states.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity.get()
  }

  pub fn clear(&mut self) {
    self.states.clear();
  }
}

/// 单个帧对提交后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contribution {
  /// 身份已处理过，不进入窗口
  Duplicate,
  /// 新身份，`confirmed` 为本次确认的新全局状态
  Accepted { confirmed: Option<BehaviorState> },
}

#[derive(Debug)]
pub struct ConfirmationEngine {
  global_state: BehaviorState,
  window: ConfirmationWindow,
  processed: ProcessedSet,
  last_contributing: Option<NaiveDateTime>,
}

impl ConfirmationEngine {
  pub fn new(window_size: NonZeroUsize, max_processed: Option<NonZeroUsize>) -> Self {
    Self {
      global_state: BehaviorState::Unknown,
      window: ConfirmationWindow::new(window_size),
      processed: ProcessedSet::new(max_processed),
      last_contributing: None,
    }
  }

  pub fn submit(&mut self, id: PairIdentity, timestamp: NaiveDateTime) -> Contribution {
    if !self.processed.insert(id) {
      return Contribution::Duplicate;
    }

    self.window.push(id.state);
    self.last_contributing = Some(timestamp);

    let confirmed = match self.window.homogeneous() {
      Some(state) if state != self.global_state => {
        self.global_state = state;
        Some(state)
      }
      _ => None,
    };
    Contribution::Accepted { confirmed }
  }

  /// 清空窗口与去重集合并将全局状态置为 `unknown`
  ///
  /// 最近贡献时间保持不变。
  pub fn reset(&mut self) {
    self.global_state = BehaviorState::Unknown;
    self.window.clear();
    self.processed.clear();
  }

  pub fn global_state(&self) -> BehaviorState {
    self.global_state
  }

  pub fn last_contributing(&self) -> Option<NaiveDateTime> {
    self.last_contributing
  }

  pub fn window(&self) -> &ConfirmationWindow {
    &self.window
  }

  pub fn processed(&self) -> &ProcessedSet {
    &self.processed
  }
}
