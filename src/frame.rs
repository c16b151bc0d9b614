// 该文件是 Shouwang （守望） 项目的一部分。
// src/frame.rs - 帧序号提取
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

use std::fmt;

const FRAME_INDEX_DELIMITER: char = '_';

/// 单个摄像头内单调递增的帧序号
///
/// 帧序号由抓帧程序写入文件名开头，例如 `2501010042_1_a.jpg` 的序号为
/// `2501010042`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(u64);

impl FrameIndex {
  pub fn new(index: u64) -> Self {
    FrameIndex(index)
  }

  /// 从文件名中解析帧序号，无法解析时返回 `None`
  ///
  /// 序号两侧的空白会被忽略。
  pub fn parse(filename: &str) -> Option<Self> {
    let token = filename.split(FRAME_INDEX_DELIMITER).next()?;
    token.trim().parse::<u64>().ok().map(FrameIndex)
  }

  pub fn value(&self) -> u64 {
    self.0
  }

  /// `next` 是否恰好是本帧的下一帧
  pub fn is_followed_by(&self, next: FrameIndex) -> bool {
    self.0.checked_add(1) == Some(next.0)
  }
}

impl fmt::Display for FrameIndex {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_leading_token() {
    assert_eq!(FrameIndex::parse("123_cam1_a.jpg"), Some(FrameIndex(123)));
    assert_eq!(FrameIndex::parse("0042_1_#.jpg"), Some(FrameIndex(42)));
    assert_eq!(FrameIndex::parse("7"), Some(FrameIndex(7)));
    assert_eq!(FrameIndex::parse(" 12_1.jpg"), Some(FrameIndex(12)));
    assert_eq!(FrameIndex::parse("12 _1.jpg"), Some(FrameIndex(12)));
  }

  #[test]
  fn malformed_names_are_rejected() {
    for name in ["", "_1.jpg", "abc_1.jpg", "12a_1.jpg", "123.jpg", "-5_1.jpg", " _1.jpg", "1 2_1.jpg"] {
      assert_eq!(FrameIndex::parse(name), None, "{name:?}");
    }
  }

  #[test]
  fn consecutive_check() {
    let a = FrameIndex::new(10);
    assert!(a.is_followed_by(FrameIndex::new(11)));
    assert!(!a.is_followed_by(FrameIndex::new(12)));
    assert!(!a.is_followed_by(FrameIndex::new(10)));
    assert!(!a.is_followed_by(FrameIndex::new(9)));
    assert!(!FrameIndex::new(u64::MAX).is_followed_by(FrameIndex::new(0)));
  }
}
