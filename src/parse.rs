//! Unified-diff parser.
//!
//! The parser makes one forward pass over the diff text. Position state lives
//! in a `Cursor` value that every parsing step takes and returns, so each
//! step is a plain function of its input and can be tested in isolation.
//!
//! Anything outside a `---`/`+++` file section is ignored: prose, markdown
//! fences around the diff, and git's extended headers (`diff --git`, `index`,
//! mode and rename lines). Inside a hunk body every line must carry a ' ',
//! '-', '+' or '\' prefix, with two allowances made for hand-edited and
//! model-generated diffs: a completely empty line is read as an empty context
//! line, and a fence or git header line closes the body.

use crate::diff::{FileDiff, Hunk, HunkLine, HunkRange, LineKind};
use crate::error::ParseError;
use log::{debug, trace};

/// A read position in the diff's lines.
#[derive(Debug, Clone, Copy)]
struct Cursor<'a> {
    lines: &'a [&'a str],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(lines: &'a [&'a str]) -> Self {
        Self { lines, pos: 0 }
    }

    fn peek(self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    fn peek_next(self) -> Option<&'a str> {
        self.lines.get(self.pos + 1).copied()
    }

    fn advance(self) -> Self {
        Self {
            lines: self.lines,
            pos: self.pos + 1,
        }
    }

    /// 1-based line number of the current position.
    fn line_no(self) -> usize {
        self.pos + 1
    }

    /// The cursor sits on a `--- ` line immediately followed by a `+++ ` line.
    fn at_file_header(self) -> bool {
        self.peek().is_some_and(|l| l.starts_with("--- "))
            && self.peek_next().is_some_and(|l| l.starts_with("+++ "))
    }
}

const GIT_HEADER_PREFIXES: &[&str] = &[
    "diff ",
    "index ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "dissimilarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
    "Binary files",
];

fn is_git_header(line: &str) -> bool {
    GIT_HEADER_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Fences only count at column 0; a body line like " ```" is context.
fn is_fence(line: &str) -> bool {
    line.starts_with("```")
}

/// Parses unified-diff text into one [`FileDiff`] per target file.
///
/// Sections naming the same target are merged, keeping hunk order. The
/// `@@` line numbers are recorded as hints only.
///
/// # Errors
///
/// Any malformed construct fails the whole call; see [`ParseError`].
///
/// # Example
///
/// ```
/// use driftpatch::parse_diff;
///
/// let diff = "\
/// --- a/f.py
/// +++ b/f.py
/// @@ -1,2 +1,2 @@
///  def f():
/// -    return 1
/// +    return 10
/// ";
/// let files = parse_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].target_path().to_str(), Some("f.py"));
/// assert_eq!(files[0].hunks[0].before_block(), vec!["def f():", "    return 1"]);
/// ```
pub fn parse_diff(text: &str) -> Result<Vec<FileDiff>, ParseError> {
    let lines: Vec<&str> = text
        .lines()
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();
    let mut cursor = Cursor::new(&lines);
    let mut sections: Vec<FileDiff> = Vec::new();

    loop {
        cursor = skip_preamble(cursor)?;
        if cursor.peek().is_none() {
            break;
        }
        let (section, next) = parse_file_section(cursor)?;
        trace!(
            "  Parsed file section '{}' with {} hunk(s).",
            section.new_path,
            section.hunks.len()
        );
        sections.push(section);
        cursor = next;
    }

    let merged = merge_sections(sections);
    debug!("Parsed {} file diff(s).", merged.len());
    Ok(merged)
}

/// Skips lines that belong to no file section, stopping on the next file
/// header or at end of input.
fn skip_preamble(mut cursor: Cursor<'_>) -> Result<Cursor<'_>, ParseError> {
    while let Some(line) = cursor.peek() {
        if cursor.at_file_header() {
            return Ok(cursor);
        }
        if line.starts_with("--- ") && cursor.peek_next().is_some_and(|l| l.starts_with("@@")) {
            return Err(ParseError::MissingNewPath {
                line: cursor.line_no(),
            });
        }
        if line.starts_with("@@") {
            return Err(ParseError::HunkOutsideFile {
                line: cursor.line_no(),
            });
        }
        cursor = cursor.advance();
    }
    Ok(cursor)
}

fn parse_header_path(rest: &str) -> String {
    // Drop the optional tab-separated timestamp.
    let path = rest.split('\t').next().unwrap_or(rest).trim();
    match path {
        "a/dev/null" | "b/dev/null" => "/dev/null".to_string(),
        _ => path.to_string(),
    }
}

/// Parses one `---`/`+++` header pair and all hunks that follow it.
fn parse_file_section(cursor: Cursor<'_>) -> Result<(FileDiff, Cursor<'_>), ParseError> {
    let header_line = cursor.line_no();
    let old_path = cursor
        .peek()
        .and_then(|l| l.strip_prefix("--- "))
        .map(parse_header_path)
        .unwrap_or_default();
    let cursor = cursor.advance();
    let new_path = cursor
        .peek()
        .and_then(|l| l.strip_prefix("+++ "))
        .map(parse_header_path)
        .ok_or(ParseError::MissingNewPath { line: header_line })?;
    let mut cursor = cursor.advance();

    let mut hunks = Vec::new();
    while cursor.peek().is_some_and(|l| l.starts_with("@@")) {
        let (hunk, next) = parse_hunk(cursor)?;
        hunks.push(hunk);
        cursor = next;
    }

    if hunks.is_empty() {
        return Err(ParseError::EmptyFileSection {
            line: header_line,
            path: new_path,
        });
    }

    Ok((
        FileDiff {
            old_path,
            new_path,
            hunks,
        },
        cursor,
    ))
}

/// Parses `@@ -a[,b] +c[,d] @@[ section]`.
fn parse_hunk_header(line: &str) -> Option<(HunkRange, Option<String>)> {
    let rest = line.strip_prefix("@@ ")?;
    let close = rest.find("@@")?;
    let mut ranges = rest[..close].split_whitespace();
    let (old_start, old_len) = parse_range(ranges.next()?.strip_prefix('-')?)?;
    let (new_start, new_len) = parse_range(ranges.next()?.strip_prefix('+')?)?;
    if ranges.next().is_some() {
        return None;
    }
    let section = rest[close + 2..].trim();
    let section = (!section.is_empty()).then(|| section.to_string());
    Some((
        HunkRange {
            old_start,
            old_len,
            new_start,
            new_len,
        },
        section,
    ))
}

fn parse_range(range: &str) -> Option<(usize, usize)> {
    match range.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((range.parse().ok()?, 1)),
    }
}

/// Parses a hunk header and its body, returning the cursor positioned on the
/// first line after the body.
fn parse_hunk(cursor: Cursor<'_>) -> Result<(Hunk, Cursor<'_>), ParseError> {
    let header = cursor.peek().unwrap_or_default();
    let (range, section) =
        parse_hunk_header(header).ok_or_else(|| ParseError::MalformedHunkHeader {
            line: cursor.line_no(),
            text: header.to_string(),
        })?;

    let mut hunk = Hunk::new(range, Vec::new());
    hunk.section = section;

    let mut cursor = cursor.advance();
    // Empty lines are held back until a real body line follows, so blank
    // lines trailing a hunk are not mistaken for context.
    let mut pending_blanks = 0usize;

    while let Some(line) = cursor.peek() {
        if line.starts_with("@@") || cursor.at_file_header() || is_fence(line) || is_git_header(line)
        {
            break;
        }

        if line.is_empty() {
            pending_blanks += 1;
            cursor = cursor.advance();
            continue;
        }

        let kind = match line.as_bytes()[0] {
            b' ' => Some(LineKind::Context),
            b'-' => Some(LineKind::Removal),
            b'+' => Some(LineKind::Addition),
            b'\\' => None,
            _ => {
                return Err(ParseError::UnrecognizedLine {
                    line: cursor.line_no(),
                    text: line.to_string(),
                })
            }
        };

        match kind {
            Some(kind) => {
                for _ in 0..pending_blanks {
                    hunk.lines.push(HunkLine::new(LineKind::Context, ""));
                }
                pending_blanks = 0;
                hunk.lines.push(HunkLine::new(kind, &line[1..]));
            }
            None => mark_missing_newline(&mut hunk),
        }
        cursor = cursor.advance();
    }

    Ok((hunk, cursor))
}

/// Records a `\ No newline at end of file` marker against the side(s) of the
/// preceding body line.
fn mark_missing_newline(hunk: &mut Hunk) {
    match hunk.lines.last().map(|l| l.kind) {
        Some(LineKind::Removal) => hunk.old_missing_newline = true,
        Some(LineKind::Addition) => hunk.new_missing_newline = true,
        Some(LineKind::Context) => {
            hunk.old_missing_newline = true;
            hunk.new_missing_newline = true;
        }
        None => {}
    }
}

/// Folds sections that target the same file into one, in first-seen order.
fn merge_sections(sections: Vec<FileDiff>) -> Vec<FileDiff> {
    let mut merged: Vec<FileDiff> = Vec::new();
    for section in sections {
        if let Some(existing) = merged
            .iter_mut()
            .find(|d| d.target_path() == section.target_path())
        {
            trace!(
                "  Merging {} hunk(s) into earlier section for '{}'.",
                section.hunks.len(),
                existing.target_path().display()
            );
            existing.hunks.extend(section.hunks);
        } else {
            merged.push(section);
        }
    }
    merged
}
