//! Splits a post source file into its YAML front matter and its markdown body.
//! See [`split`] for the exact rules.

use std::fmt;

/// The line which opens and closes a front matter block.
pub const SEPARATOR: &str = "---";

/// The two halves of a source file. Both fields borrow from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Split<'a> {
    /// The lines strictly between the opening and closing separators, without
    /// the line ending that precedes the closing separator.
    pub metadata: &'a str,

    /// Everything after the closing separator line.
    pub body: &'a str,
}

/// Splits `input` into front matter and body.
///
/// If the first line is a separator, the front matter starts on the second
/// line; otherwise it starts on the first line (a file without front matter
/// is not an error on its own). Either way, the first separator line after the
/// first line closes the front matter and the body starts on the line right
/// after it. Nothing else is dropped, so a blank line following the closing
/// separator is part of the body.
///
/// Lines are separated by `\n`. A trailing `\r` is ignored when checking
/// whether a line is a separator.
pub fn split(input: &str) -> Result<Split<'_>, MissingSeparator> {
    let mut offset = 0;
    let mut metadata_start = 0;
    for (i, line) in input.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += line.len();
        let is_separator = trim_line_ending(line) == SEPARATOR;

        if i == 0 {
            if is_separator {
                metadata_start = offset;
            }
            continue;
        }

        if is_separator {
            return Ok(Split {
                metadata: trim_line_ending(&input[metadata_start..line_start]),
                body: &input[offset..],
            });
        }
    }
    Err(MissingSeparator)
}

fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Returned by [`split`] when no closing separator follows the front matter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissingSeparator;

impl fmt::Display for MissingSeparator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "missing closing `{}`", SEPARATOR)
    }
}

impl std::error::Error for MissingSeparator {}
