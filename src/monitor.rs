// 该文件是 Shouwang （守望） 项目的一部分。
// src/monitor.rs - 行为状态监测
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

use std::fmt::Display;

use chrono::NaiveDateTime;
use tracing::{debug, error, info, warn};

use crate::{
  classifier::{BehaviorState, PairClassifier},
  config::MonitorSettings,
  confirmation::{ConfirmationEngine, Contribution, PairIdentity},
  detection::DetectionEvent,
  output::{Note, RecordSource, StateRecord, StateSink},
  sequencer::{CameraSequencer, Sequenced, SequentialPair},
  watchdog::IdleWatchdog,
};

/// 一轮处理的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
  pub events: usize,
  pub dropped: usize,
  pub pairs: usize,
  pub duplicates: usize,
  pub confirmations: usize,
  pub timed_out: bool,
  pub sink_failures: usize,
}

/// 持有全部监测状态：各摄像头最近一帧、去重集合、确认窗口与全局状态
#[derive(Debug)]
pub struct StateMonitor {
  sequencer: CameraSequencer,
  classifier: PairClassifier,
  engine: ConfirmationEngine,
  watchdog: IdleWatchdog,
}

impl StateMonitor {
  pub fn new(settings: &MonitorSettings) -> Self {
    Self {
      sequencer: CameraSequencer::new(),
      classifier: PairClassifier::new(settings.roles.clone(), settings.movement_threshold),
      engine: ConfirmationEngine::new(settings.window_size, settings.max_processed_pairs),
      watchdog: IdleWatchdog::new(settings.idle_timeout),
    }
  }

  pub fn global_state(&self) -> BehaviorState {
    self.engine.global_state()
  }

  pub fn engine(&self) -> &ConfirmationEngine {
    &self.engine
  }

  /// 空闲超时检查，超时时返回一条超时记录
  pub fn check_idle(&mut self, now: NaiveDateTime) -> Option<StateRecord> {
    if !self.watchdog.check(&mut self.engine, now) {
      return None;
    }
    warn!(
      "空闲超时: 超过 {} 秒没有新的有效帧对, 全局状态重置为 unknown",
      self.watchdog.idle_timeout().num_milliseconds() as f64 / 1000.0
    );
    Some(StateRecord {
      timestamp: now,
      state: BehaviorState::Unknown,
      last_confirmed_state: self.engine.global_state(),
      source: RecordSource::Timeout,
      notes: vec![Note::IdleTimeout],
    })
  }

  /// 处理单条检测记录，形成有效帧对时返回对应的状态记录
  pub fn process(&mut self, event: &DetectionEvent) -> Option<StateRecord> {
    match self.sequencer.observe(event) {
      Sequenced::Dropped => {
        debug!("无法从文件名解析帧序号, 跳过: {}", event.filename());
        None
      }
      Sequenced::Unpaired => None,
      Sequenced::Pair(pair) => Some(self.process_pair(pair)),
    }
  }

  fn process_pair(&mut self, pair: SequentialPair) -> StateRecord {
    let state = self.classifier.classify(&pair.prev, &pair.curr);
    let id = PairIdentity {
      start_index: pair.start_index,
      end_index: pair.end_index,
      state,
    };

    let mut notes = Vec::new();
    match self.engine.submit(id, pair.curr.timestamp()) {
      Contribution::Duplicate => notes.push(Note::DuplicatePairAndState),
      Contribution::Accepted {
        confirmed: Some(confirmed),
      } => notes.push(Note::StateConfirmed(confirmed)),
      Contribution::Accepted { confirmed: None } => {}
    }

    let record = StateRecord {
      timestamp: pair.curr.timestamp(),
      state,
      last_confirmed_state: self.engine.global_state(),
      source: RecordSource::Pair {
        camera: pair.curr.camera(),
        position: pair.curr.position(),
        prev_filename: pair.prev.filename().to_string(),
        curr_filename: pair.curr.filename().to_string(),
      },
      notes,
    };

    info!(
      "摄像头 {}: 帧 {} -> {} 判定状态 = {}, 全局确认状态 = {} (位置: {:.4}, {:.4}) {}",
      pair.curr.camera(),
      pair.start_index,
      pair.end_index,
      state,
      record.last_confirmed_state,
      pair.curr.position().x,
      pair.curr.position().y,
      record.notes_field()
    );
    record
  }

  /// 执行一轮：先做空闲超时检查，再按时间顺序处理本批检测记录
  ///
  /// 写入失败只记录错误，内存中的状态照常推进。
  pub fn tick<S>(
    &mut self,
    now: NaiveDateTime,
    mut batch: Vec<DetectionEvent>,
    sink: &mut S,
  ) -> TickSummary
  where
    S: StateSink,
    S::Error: Display,
  {
    let mut summary = TickSummary::default();

    if let Some(record) = self.check_idle(now) {
      summary.timed_out = true;
      emit(sink, &record, &mut summary);
    }

    batch.sort_by_key(DetectionEvent::timestamp);
    for event in &batch {
      summary.events += 1;
      if event.frame_index().is_none() {
        summary.dropped += 1;
      }
      if let Some(record) = self.process(event) {
        summary.pairs += 1;
        if record.is_duplicate() {
          summary.duplicates += 1;
        }
        if record.confirmed_state().is_some() {
          summary.confirmations += 1;
        }
        emit(sink, &record, &mut summary);
      }
    }

    summary
  }
}

fn emit<S>(sink: &mut S, record: &StateRecord, summary: &mut TickSummary)
where
  S: StateSink,
  S::Error: Display,
{
  if let Err(e) = sink.append(record) {
    error!("写入状态日志失败: {}", e);
    summary.sink_failures += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classifier::CameraRoles;
  use crate::detection::Position;
  use chrono::{NaiveDate, TimeDelta};
  use std::num::NonZeroUsize;
  use std::time::Duration;

  fn settings(window: usize) -> MonitorSettings {
    MonitorSettings {
      movement_threshold: 0.05,
      window_size: NonZeroUsize::new(window).unwrap(),
      idle_timeout: TimeDelta::seconds(10),
      check_interval: Duration::from_secs(1),
      roles: CameraRoles::new([0], [1]),
      subject_class: "animal".into(),
      max_processed_pairs: None,
    }
  }

  fn at(sec: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
      .unwrap()
      .and_hms_opt(0, 0, 0)
      .unwrap()
      + TimeDelta::seconds(sec)
  }

  fn event(sec: i64, camera: u32, index: u64, x: f64, y: f64) -> DetectionEvent {
    DetectionEvent::new(
      at(sec),
      camera,
      format!("{index}_{camera}_a.jpg"),
      Position::new(x, y),
    )
  }

  struct FailingSink;

  impl StateSink for FailingSink {
    type Error = String;

    fn append(&mut self, _record: &StateRecord) -> Result<(), Self::Error> {
      Err("disk full".into())
    }
  }

  #[test]
  fn first_detection_only_primes_the_camera() {
    let mut monitor = StateMonitor::new(&settings(1));
    assert_eq!(monitor.process(&event(0, 1, 10, 0.1, 0.1)), None);
    assert_eq!(monitor.global_state(), BehaviorState::Unknown);
  }

  #[test]
  fn batch_is_processed_in_timestamp_order() {
    let mut monitor = StateMonitor::new(&settings(1));
    let mut sink = Vec::new();
    let batch = vec![
      event(2, 1, 11, 0.20, 0.10),
      event(1, 1, 10, 0.10, 0.10),
    ];
    let summary = monitor.tick(at(2), batch, &mut sink);
    assert_eq!(summary.pairs, 1);
    assert_eq!(summary.confirmations, 1);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink[0].state, BehaviorState::Rest);
  }

  #[test]
  fn sink_failures_do_not_stop_state_updates() {
    let mut monitor = StateMonitor::new(&settings(1));
    let batch = vec![event(1, 0, 10, 0.1, 0.1), event(2, 0, 11, 0.9, 0.9)];
    let summary = monitor.tick(at(2), batch, &mut FailingSink);
    assert_eq!(summary.sink_failures, 1);
    assert_eq!(monitor.global_state(), BehaviorState::Passive);
  }

  #[test]
  fn timeout_runs_before_the_batch() {
    let mut monitor = StateMonitor::new(&settings(1));
    let mut sink = Vec::new();
    monitor.tick(
      at(1),
      vec![event(0, 1, 10, 0.1, 0.1), event(1, 1, 11, 0.1, 0.1)],
      &mut sink,
    );
    assert_eq!(monitor.global_state(), BehaviorState::Rest);

    // 同一帧对在超时后重新投递，作为新身份重新确认
    let summary = monitor.tick(
      at(30),
      vec![event(29, 1, 10, 0.1, 0.1), event(30, 1, 11, 0.1, 0.1)],
      &mut sink,
    );
    assert!(summary.timed_out);
    assert_eq!(summary.duplicates, 0);
    assert_eq!(sink[1].source, RecordSource::Timeout);
    assert_eq!(sink[1].notes, vec![Note::IdleTimeout]);
    assert_eq!(sink[2].notes, vec![Note::StateConfirmed(BehaviorState::Rest)]);
    assert_eq!(monitor.global_state(), BehaviorState::Rest);
  }
}
