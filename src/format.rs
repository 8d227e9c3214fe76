use regex::{Captures, Regex};

use super::toplevel::Toplevel;

/// Renders one row from a template like `"{t}  {a:10}"`.
///
/// `{t}` is the title, `{a}` (or `{c}`) the app id. A bare placeholder is
/// right-padded to the column maximum shared across all rows; `{t:N}`
/// truncates or pads to exactly N codepoints instead. Unknown placeholders
/// are left in the output untouched.
pub struct Formatter {
  template: String,
  window_regex: Regex,
}

impl Formatter {
  pub fn new<S: Into<String>>(template: S) -> Self {
    Self {
      template: template.into(),
      window_regex: Regex::new(r"\{[-\w]+(:-?[0-9]+)?\}").unwrap(),
    }
  }

  pub fn render(&self, toplevel: &Toplevel, title_max: usize, app_id_max: usize) -> String {
    let expanded = self.expand(toplevel, title_max, app_id_max);
    expanded.trim_end().to_owned()
  }

  /// Placeholder substitution without the final trailing-whitespace trim.
  fn expand(&self, toplevel: &Toplevel, title_max: usize, app_id_max: usize) -> String {
    self
      .window_regex
      .replace_all(&self.template, |caps: &Captures| {
        let m = caps.get(0).unwrap().as_str();
        eval_placeholder(m, toplevel, title_max, app_id_max).unwrap_or_else(|| m.to_owned())
      })
      .into_owned()
  }
}

/// Expands one `{x}` / `{x:N}` match; `None` means the letter is not ours
/// and the match passes through as literal text.
fn eval_placeholder(
  m: &str,
  toplevel: &Toplevel,
  title_max: usize,
  app_id_max: usize,
) -> Option<String> {
  let bytes = m.as_bytes();
  // a count is only recognized on single-letter placeholders, and zero or
  // negative counts fall back to column alignment
  let count = if bytes.get(2) == Some(&b':') {
    m[3..m.len() - 1].parse::<i64>().ok().filter(|l| *l > 0).map(|l| l as usize)
  } else {
    None
  };

  match bytes[1] {
    b't' => Some(aligned_field(
      toplevel.title.as_deref(),
      toplevel.title_len,
      count,
      title_max,
    )),
    b'a' | b'c' => Some(aligned_field(
      toplevel.app_id.as_deref(),
      toplevel.app_id_len,
      count,
      app_id_max,
    )),
    _ => None,
  }
}

/// Escape, then pad with spaces: to `column_max` codepoints when no count
/// is given, to exactly `count` (truncating first) otherwise. All widths
/// are codepoint counts of the raw text, not of the escaped form.
fn aligned_field(
  field: Option<&str>,
  field_chars: usize,
  count: Option<usize>,
  column_max: usize,
) -> String {
  let input = field.unwrap_or("");
  let (mut out, spaces) = match count {
    None => (escape_markup(input), column_max.saturating_sub(field_chars)),
    Some(n) if field_chars > n => {
      let truncated: String = input.chars().take(n).collect();
      (escape_markup(&truncated), 0)
    }
    Some(n) => (escape_markup(input), n - field_chars),
  };
  for _ in 0..spaces {
    out.push(' ');
  }
  out
}

/// Markup-escape for display layers that interpret pango-style markup.
fn escape_markup(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '\'' => out.push_str("&#39;"),
      '"' => out.push_str("&quot;"),
      _ => out.push(c),
    }
  }
  out
}
