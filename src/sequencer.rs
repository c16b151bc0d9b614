// 该文件是 Shouwang （守望） 项目的一部分。
// src/sequencer.rs - 单摄像头相邻帧配对
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

use std::collections::HashMap;

use crate::detection::{CameraId, DetectionEvent};
use crate::frame::FrameIndex;

/// 同一摄像头帧序号严格相邻的两条检测记录
#[derive(Debug, Clone, PartialEq)]
pub struct SequentialPair {
  pub start_index: FrameIndex,
  pub end_index: FrameIndex,
  pub prev: DetectionEvent,
  pub curr: DetectionEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sequenced {
  /// 文件名无法解析帧序号，记录被丢弃
  Dropped,
  /// 该摄像头没有上一帧，或上一帧不相邻
  Unpaired,
  Pair(SequentialPair),
}

#[derive(Debug, Clone)]
struct LastFrame {
  index: FrameIndex,
  event: DetectionEvent,
}

/// 按摄像头记录最近一帧，并识别严格相邻的帧对
#[derive(Debug, Default)]
pub struct CameraSequencer {
  last_frames: HashMap<CameraId, LastFrame>,
}

impl CameraSequencer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn observe(&mut self, event: &DetectionEvent) -> Sequenced {
    let Some(index) = event.frame_index() else {
      return Sequenced::Dropped;
    };

    let outcome = match self.last_frames.get(&event.camera()) {
      Some(last) if last.index.is_followed_by(index) => Sequenced::Pair(SequentialPair {
        start_index: last.index,
        end_index: index,
        prev: last.event.clone(),
        curr: event.clone(),
      }),
      _ => Sequenced::Unpaired,
    };

    self.last_frames.insert(
      event.camera(),
      LastFrame {
        index,
        event: event.clone(),
      },
    );
    outcome
  }

  pub fn last_frame(&self, camera: CameraId) -> Option<&DetectionEvent> {
    self.last_frames.get(&camera).map(|last| &last.event)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Position;
  use chrono::NaiveDate;

  fn event(camera: CameraId, name: &str) -> DetectionEvent {
    let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
      .unwrap()
      .and_hms_opt(8, 0, 0)
      .unwrap();
    DetectionEvent::new(ts, camera, name, Position::new(0.5, 0.5))
  }

  #[test]
  fn consecutive_frames_pair_once() {
    let mut seq = CameraSequencer::new();
    assert_eq!(seq.observe(&event(1, "10_1.jpg")), Sequenced::Unpaired);
    match seq.observe(&event(1, "11_1.jpg")) {
      Sequenced::Pair(pair) => {
        assert_eq!(pair.start_index, FrameIndex::new(10));
        assert_eq!(pair.end_index, FrameIndex::new(11));
        assert_eq!(pair.prev.filename(), "10_1.jpg");
        assert_eq!(pair.curr.filename(), "11_1.jpg");
      }
      other => panic!("expected a pair, got {other:?}"),
    }
  }

  #[test]
  fn gaps_and_rollbacks_do_not_pair_but_advance() {
    let mut seq = CameraSequencer::new();
    seq.observe(&event(1, "10_1.jpg"));
    assert_eq!(seq.observe(&event(1, "12_1.jpg")), Sequenced::Unpaired);
    assert_eq!(seq.last_frame(1).unwrap().filename(), "12_1.jpg");
    assert_eq!(seq.observe(&event(1, "11_1.jpg")), Sequenced::Unpaired);
    assert!(matches!(seq.observe(&event(1, "12_1.jpg")), Sequenced::Pair(_)));
  }

  #[test]
  fn invalid_names_leave_state_untouched() {
    let mut seq = CameraSequencer::new();
    seq.observe(&event(1, "10_1.jpg"));
    assert_eq!(seq.observe(&event(1, "snapshot.jpg")), Sequenced::Dropped);
    assert_eq!(seq.last_frame(1).unwrap().filename(), "10_1.jpg");
    assert!(matches!(seq.observe(&event(1, "11_1.jpg")), Sequenced::Pair(_)));
  }

  #[test]
  fn cameras_are_sequenced_independently() {
    let mut seq = CameraSequencer::new();
    seq.observe(&event(1, "10_1.jpg"));
    assert_eq!(seq.observe(&event(2, "11_2.jpg")), Sequenced::Unpaired);
    assert!(matches!(seq.observe(&event(1, "11_1.jpg")), Sequenced::Pair(_)));
    assert!(matches!(seq.observe(&event(2, "12_2.jpg")), Sequenced::Pair(_)));
  }
}
