//! flake8 default-format parser
//!
//! flake8 prints one `path:line:col: CODE message` line per violation and
//! nothing at all for a clean tree.

use crate::error::{Error, Result};
use crate::tools::{ToolKind, ToolParser};
use std::collections::BTreeMap;

/// Parser for flake8 text output.
pub struct Flake8Parser;

impl ToolParser for Flake8Parser {
    fn tool(&self) -> ToolKind {
        ToolKind::Flake8
    }

    fn fields(&self) -> &'static [&'static str] {
        &["flake8_issues"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let mut issues = 0usize;
        let mut unrecognized = 0usize;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            if is_violation(line) {
                issues += 1;
            } else {
                unrecognized += 1;
            }
        }

        // Output with text but no violations is an error message, not a clean run.
        if issues == 0 && unrecognized > 0 {
            return Err(Error::tool_output(
                "flake8",
                format!("{unrecognized} unrecognized line(s) and no violations"),
            ));
        }

        Ok(BTreeMap::from([("flake8_issues".to_string(), issues as f64)]))
    }
}

fn is_violation(line: &str) -> bool {
    let mut parts = line.splitn(4, ':');
    let (Some(_), Some(row), Some(col), Some(rest)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Some(code) = rest.split_whitespace().next() else {
        return false;
    };
    row.trim().parse::<u64>().is_ok()
        && col.trim().parse::<u64>().is_ok()
        && code.len() >= 2
        && code.starts_with(|c: char| c.is_ascii_uppercase())
        && code.chars().skip(1).all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_violations() {
        let output = "\
app/main.py:1:1: F401 'os' imported but unused
app/main.py:10:80: E501 line too long (88 > 79 characters)
app/util.py:4:1: W391 blank line at end of file
";
        let fields = Flake8Parser.parse(output).unwrap();
        assert_eq!(fields["flake8_issues"], 3.0);
    }

    #[test]
    fn test_clean_run_is_zero() {
        let fields = Flake8Parser.parse("").unwrap();
        assert_eq!(fields["flake8_issues"], 0.0);
    }

    #[test]
    fn test_error_text_is_rejected() {
        assert!(Flake8Parser.parse("Traceback (most recent call last):\n  boom").is_err());
    }
}
