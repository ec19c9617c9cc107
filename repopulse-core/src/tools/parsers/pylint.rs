//! pylint text report parser
//!
//! Reads the default text reporter. The score comes from the evaluation
//! line:
//!
//! ```text
//! Your code has been rated at 7.50/10 (previous run: 7.25/10, +0.25)
//! ```
//!
//! Every `path:line:col: C0114: ...` line counts as one message.

use crate::error::{Error, Result};
use crate::tools::{ToolKind, ToolParser};
use std::collections::BTreeMap;

const RATING_MARKER: &str = "rated at ";

/// Parser for pylint text output.
pub struct PylintParser;

impl ToolParser for PylintParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Pylint
    }

    fn fields(&self) -> &'static [&'static str] {
        &["quality_score", "pylint_messages"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let score = content
            .lines()
            .find_map(parse_rating)
            .ok_or_else(|| Error::tool_output("pylint", "no evaluation score found"))?;

        let messages = content.lines().filter(|l| is_message_line(l)).count();

        Ok(BTreeMap::from([
            ("quality_score".to_string(), score),
            ("pylint_messages".to_string(), messages as f64),
        ]))
    }
}

fn parse_rating(line: &str) -> Option<f64> {
    let start = line.find(RATING_MARKER)? + RATING_MARKER.len();
    let rest = &line[start..];
    let end = rest.find('/')?;
    rest[..end].trim().parse().ok()
}

/// `path:line:col: X0000: message`, where X is a pylint category letter.
fn is_message_line(line: &str) -> bool {
    let mut parts = line.splitn(4, ':');
    let (Some(_path), Some(row), Some(col), Some(rest)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if row.trim().parse::<u64>().is_err() || col.trim().parse::<u64>().is_err() {
        return false;
    }
    let code: Vec<char> = rest.trim_start().chars().take(5).collect();
    code.len() == 5
        && matches!(code[0], 'C' | 'R' | 'W' | 'E' | 'F' | 'I')
        && code[1..].iter().all(char::is_ascii_digit)
}
