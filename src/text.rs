//! Splitting file text into a line buffer and joining it back.

use serde::Serialize;

/// The line terminator a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }

    /// Picks the majority terminator of `text`. Ties and texts without any
    /// line break resolve to LF.
    pub fn detect(text: &str) -> Self {
        let total = text.matches('\n').count();
        let crlf = text.matches("\r\n").count();
        if crlf > 0 && crlf * 2 > total {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }
}

/// A file's text as a line buffer plus what is needed to reassemble it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitText {
    pub lines: Vec<String>,
    pub ending: LineEnding,
    pub trailing_newline: bool,
}

/// Splits `text` into lines with terminators (and any `\r`) removed.
///
/// # Example
///
/// ```
/// # use driftpatch::text::{split_lines, LineEnding};
/// let split = split_lines("a\r\nb\r\n");
/// assert_eq!(split.lines, vec!["a", "b"]);
/// assert_eq!(split.ending, LineEnding::CrLf);
/// assert!(split.trailing_newline);
/// ```
pub fn split_lines(text: &str) -> SplitText {
    let ending = LineEnding::detect(text);
    if text.is_empty() {
        return SplitText {
            lines: Vec::new(),
            ending,
            trailing_newline: false,
        };
    }

    let trailing_newline = text.ends_with('\n');
    let body = if trailing_newline {
        &text[..text.len() - 1]
    } else {
        text
    };
    let lines = body
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect();

    SplitText {
        lines,
        ending,
        trailing_newline,
    }
}

/// Joins a line buffer back into text.
pub fn join_lines<T: AsRef<str>>(lines: &[T], ending: LineEnding, trailing_newline: bool) -> String {
    let sep = ending.as_str();
    let mut out = String::with_capacity(lines.iter().map(|l| l.as_ref().len() + sep.len()).sum());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(line.as_ref());
    }
    if trailing_newline && !lines.is_empty() {
        out.push_str(sep);
    }
    out
}
