// 该文件是 Shouwang （守望） 项目的一部分。
// src/task.rs - 轮询任务
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
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::{thread, time::Duration};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::{
  config::MonitorSettings, detection::DetectionEvent, input::DetectionSource, monitor::StateMonitor,
  output::StateSink,
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

pub trait Task<I, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, output: O) -> Result<Self::Output, Self::Error>;
}

/// 安装 Ctrl-C 处理函数，返回用于通知任务循环退出的接收端
///
/// 只能调用一次。收到信号后若 30 秒内仍未退出则强制结束进程。
pub fn install_ctrlc_handler() -> anyhow::Result<Receiver<()>> {
  let (tx, rx) = mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(rx)
}

fn local_now() -> NaiveDateTime {
  Local::now().naive_local()
}

/// 轮询检测来源并推进状态监测的主循环
///
/// 每轮依次执行：空闲超时检查、读取新检测记录、按时间顺序处理、等待下一轮。
/// 中断信号只在两轮之间生效。
pub struct PollingTask {
  monitor: StateMonitor,
  check_interval: Duration,
  max_iterations: Option<usize>,
  shutdown: Option<Receiver<()>>,
  clock: Box<dyn FnMut() -> NaiveDateTime>,
  watermark: Option<NaiveDateTime>,
}

impl PollingTask {
  pub fn new(settings: &MonitorSettings) -> Self {
    Self {
      monitor: StateMonitor::new(settings),
      check_interval: settings.check_interval,
      max_iterations: None,
      shutdown: None,
      clock: Box::new(local_now),
      watermark: None,
    }
  }

  pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
    self.max_iterations = max_iterations;
    self
  }

  pub fn with_shutdown(mut self, shutdown: Receiver<()>) -> Self {
    self.shutdown = Some(shutdown);
    self
  }

  pub fn with_clock(mut self, clock: impl FnMut() -> NaiveDateTime + 'static) -> Self {
    self.clock = Box::new(clock);
    self
  }

  pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
    self.check_interval = check_interval;
    self
  }

  /// 等待下一轮，期间收到中断信号返回 `true`
  fn wait_for_next_round(&self) -> bool {
    match &self.shutdown {
      Some(rx) => match rx.recv_timeout(self.check_interval) {
        Ok(()) => true,
        Err(RecvTimeoutError::Timeout) => false,
        Err(RecvTimeoutError::Disconnected) => {
          thread::sleep(self.check_interval);
          false
        }
      },
      None => {
        thread::sleep(self.check_interval);
        false
      }
    }
  }

  fn run_round<I, O>(&mut self, input: &mut I, output: &mut O)
  where
    I: DetectionSource,
    I::Error: Display,
    O: StateSink,
    O::Error: Display,
  {
    let now = (self.clock)();
    let batch = match input.read_since(self.watermark) {
      Ok(batch) => batch,
      Err(e) => {
        warn!("读取检测记录失败, 本轮按空批次处理: {}", e);
        Vec::new()
      }
    };
    let latest = batch.iter().map(DetectionEvent::timestamp).max();

    let summary = self.monitor.tick(now, batch, output);
    if summary.events > 0 || summary.timed_out {
      debug!("本轮处理结果: {:?}", summary);
    }

    // 整批处理完成后才推进水位线
    if latest.is_some() {
      self.watermark = latest;
    }
  }
}

impl<I, O> Task<I, O> for PollingTask
where
  I: DetectionSource,
  I::Error: Display,
  O: StateSink,
  O::Error: Display,
{
  type Output = StateMonitor;
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, mut output: O) -> Result<Self::Output, Self::Error> {
    info!("开始监测任务...");
    let mut round = 0usize;
    loop {
      round += 1;
      self.run_round(&mut input, &mut output);

      if self.max_iterations.map(|n| round >= n).unwrap_or(false) {
        info!("达到指定轮数 {}, 退出任务循环", round);
        break;
      }
      if self.wait_for_next_round() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，退出。最后确认状态: {}",
      self.monitor.global_state()
    );
    Ok(self.monitor)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::classifier::{BehaviorState, CameraRoles};
  use crate::detection::Position;
  use crate::output::StateRecord;
  use chrono::{NaiveDate, TimeDelta};
  use std::cell::Cell;
  use std::num::NonZeroUsize;
  use std::rc::Rc;

  fn settings() -> MonitorSettings {
    MonitorSettings {
      movement_threshold: 0.05,
      window_size: NonZeroUsize::MIN,
      idle_timeout: TimeDelta::seconds(5),
      check_interval: Duration::from_millis(1),
      roles: CameraRoles::new([], [1]),
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

  /// 每轮前进 `step` 秒的时钟
  fn stepping_clock(step: i64) -> impl FnMut() -> NaiveDateTime + 'static {
    let tick = Rc::new(Cell::new(0));
    move || {
      tick.set(tick.get() + 1);
      at(tick.get() * step)
    }
  }

  struct Failing;

  impl DetectionSource for Failing {
    type Error = &'static str;

    fn read_since(
      &mut self,
      _watermark: Option<NaiveDateTime>,
    ) -> Result<Vec<DetectionEvent>, Self::Error> {
      Err("unavailable")
    }
  }

  #[test]
  fn re_read_records_are_not_double_counted() {
    let source = vec![
      DetectionEvent::new(at(1), 1, "10_1.jpg", Position::new(0.1, 0.1)),
      DetectionEvent::new(at(2), 1, "11_1.jpg", Position::new(0.4, 0.1)),
    ];
    let mut records: Vec<StateRecord> = Vec::new();
    let monitor = PollingTask::new(&settings())
      .with_max_iterations(Some(3))
      .with_clock(stepping_clock(1))
      .run_task(source, &mut records)
      .unwrap();
    assert_eq!(monitor.global_state(), BehaviorState::Walk);
    assert_eq!(records.len(), 1);
  }

  #[test]
  fn source_errors_do_not_stop_the_loop() {
    let mut records: Vec<StateRecord> = Vec::new();
    let monitor = PollingTask::new(&settings())
      .with_max_iterations(Some(2))
      .with_clock(stepping_clock(1))
      .run_task(Failing, &mut records)
      .unwrap();
    assert_eq!(monitor.global_state(), BehaviorState::Unknown);
    assert!(records.is_empty());
  }

  #[test]
  fn shutdown_signal_ends_the_loop() {
    let (tx, rx) = mpsc::channel();
    tx.send(()).unwrap();
    let mut records: Vec<StateRecord> = Vec::new();
    let task = PollingTask::new(&settings())
      .with_shutdown(rx)
      .with_check_interval(Duration::from_secs(60));
    let monitor = task.run_task(Vec::new(), &mut records).unwrap();
    assert_eq!(monitor.global_state(), BehaviorState::Unknown);
  }
}
