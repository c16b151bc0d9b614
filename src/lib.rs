// 该文件是 Shouwang （守望） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod classifier;
pub mod config;
pub mod confirmation;
mod csv_row;
pub mod detection;
pub mod frame;
pub mod input;
pub mod monitor;
pub mod output;
pub mod sequencer;
pub mod task;
pub mod watchdog;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// 将路径中的 `{date}` 占位符展开为当天日期（`%Y%m%d`）
///
/// 检测日志与状态日志按天存放在 `<base>/<YYYYMMDD>_<subject>/` 目录下。
pub fn expand_date_placeholder(path: &str, date: chrono::NaiveDate) -> String {
  path.replace("{date}", &date.format("%Y%m%d").to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::NaiveDate;

  #[test]
  fn date_placeholder_is_expanded_everywhere() {
    let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
    assert_eq!(
      expand_date_placeholder("/data/{date}_Animal/log-{date}.csv", date),
      "/data/20260307_Animal/log-20260307.csv"
    );
    assert_eq!(expand_date_placeholder("/data/log.csv", date), "/data/log.csv");
  }
}
