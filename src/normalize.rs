//! Comparison form of a text line.

/// Columns a tab advances the indent level by.
const TAB_WIDTH: usize = 4;

/// A line folded for comparison. Never written back to a file.
///
/// `text` has leading and trailing whitespace removed and every internal
/// run of spaces or tabs collapsed to one space. The leading whitespace is
/// kept separately as `indent` (in columns) so that indentation may differ
/// between two lines that still compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine {
    /// Leading whitespace in columns, tabs expanded to the next multiple of
    /// four. Informational only: scoring compares `text`, so re-indented
    /// lines still match, and blank lines report 0.
    pub indent: usize,
    pub text: String,
}

impl NormalizedLine {
    /// The line holds nothing but whitespace.
    ///
    /// Blank lines match each other perfectly, so a block made only of them
    /// says nothing about location.
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Normalizes a line for comparison.
///
/// # Example
///
/// ```
/// # use driftpatch::normalize::normalize;
/// let a = normalize("\tlet  x =\t1;   ");
/// let b = normalize("    let x = 1;");
/// assert_eq!(a.text, "let x = 1;");
/// assert_eq!(a.text, b.text);
/// assert_eq!(a.indent, b.indent);
/// ```
pub fn normalize(line: &str) -> NormalizedLine {
    let mut indent = 0;
    for c in line.chars() {
        match c {
            ' ' => indent += 1,
            '\t' => indent += TAB_WIDTH - indent % TAB_WIDTH,
            _ => break,
        }
    }

    let text = line.split_whitespace().collect::<Vec<_>>().join(" ");
    // Whitespace-only lines carry no meaningful indentation.
    let indent = if text.is_empty() { 0 } else { indent };

    NormalizedLine { indent, text }
}
