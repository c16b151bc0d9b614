// 该文件是 Shouwang （守望） 项目的一部分。
// src/csv_row.rs - CSV 行拆分与拼接
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

// 只处理检测日志与状态日志用到的子集：逗号分隔，双引号包裹，`""` 转义。

pub(crate) fn split(line: &str) -> Vec<String> {
  let mut fields = Vec::new();
  let mut field = String::new();
  let mut quoted = false;
  let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

  while let Some(c) = chars.next() {
    match (c, quoted) {
      ('"', true) if chars.peek() == Some(&'"') => {
        field.push('"');
        chars.next();
      }
      ('"', true) => quoted = false,
      ('"', false) if field.is_empty() => quoted = true,
      (',', false) => fields.push(std::mem::take(&mut field)),
      (c, _) => field.push(c),
    }
  }
  fields.push(field);
  fields
}

pub(crate) fn join<I, S>(fields: I) -> String
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  fields
    .into_iter()
    .map(|f| escape(f.as_ref()))
    .collect::<Vec<_>>()
    .join(",")
}

fn escape(field: &str) -> String {
  if field.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", field.replace('"', "\"\""))
  } else {
    field.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn splits_plain_and_quoted_fields() {
    assert_eq!(split("a,b,,c\r\n"), vec!["a", "b", "", "c"]);
    assert_eq!(split(r#"1,"x,y","say ""hi""""#), vec!["1", "x,y", r#"say "hi""#]);
  }

  #[test]
  fn join_quotes_only_when_needed() {
    assert_eq!(join(["a", "b;c", "d,e"]), r#"a,b;c,"d,e""#);
    let line = join(["q\"uote", "plain"]);
    assert_eq!(split(&line), vec!["q\"uote", "plain"]);
  }
}
