//! cloc `--json` parser
//!
//! Totals come from the `SUM` entry. Every other entry except `header` is a
//! language, recorded as `lines.<language>` with its code line count.

use super::from_json;
use crate::error::{Error, Result};
use crate::metrics::LANGUAGE_LINES_PREFIX;
use crate::tools::{ToolKind, ToolParser};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClocCounts {
    n_files: u64,
    blank: u64,
    comment: u64,
    code: u64,
}

/// Parser for cloc JSON output.
pub struct ClocParser;

impl ToolParser for ClocParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Cloc
    }

    fn fields(&self) -> &'static [&'static str] {
        &[
            "total_lines",
            "code_lines",
            "comment_lines",
            "blank_lines",
            "file_count",
        ]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let mut entries: BTreeMap<String, serde_json::Value> = from_json(self.tool(), content)?;
        entries.remove("header");

        let sum = entries
            .remove("SUM")
            .ok_or_else(|| Error::tool_output("cloc", "no SUM entry"))?;
        let sum: ClocCounts =
            serde_json::from_value(sum).map_err(|e| Error::tool_output("cloc", e.to_string()))?;

        let mut fields = BTreeMap::from([
            (
                "total_lines".to_string(),
                (sum.blank + sum.comment + sum.code) as f64,
            ),
            ("code_lines".to_string(), sum.code as f64),
            ("comment_lines".to_string(), sum.comment as f64),
            ("blank_lines".to_string(), sum.blank as f64),
            ("file_count".to_string(), sum.n_files as f64),
        ]);

        for (language, value) in entries {
            match serde_json::from_value::<ClocCounts>(value) {
                Ok(counts) => {
                    fields.insert(
                        format!("{LANGUAGE_LINES_PREFIX}{language}"),
                        counts.code as f64,
                    );
                }
                Err(e) => {
                    tracing::debug!(language = %language, error = %e, "Skipping cloc entry");
                }
            }
        }

        Ok(fields)
    }
}
