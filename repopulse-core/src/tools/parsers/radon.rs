//! radon `cc -j` and `mi -j` parsers

use super::from_json;
use crate::error::Result;
use crate::tools::{ToolKind, ToolParser};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Blocks above this cyclomatic complexity are counted as high.
const HIGH_COMPLEXITY: f64 = 10.0;

/// Maintainability ranks counted as low.
const LOW_MAINTAINABILITY_RANKS: &[&str] = &["C", "D", "F"];

/// Per-file entry: a list of blocks, or an error object for files radon
/// could not analyse.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CcFile {
    Blocks(Vec<CcBlock>),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct CcBlock {
    complexity: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MiFile {
    Scored { mi: f64, rank: String },
    Error { error: String },
}

/// Parser for `radon cc -j` output.
pub struct RadonCcParser;

impl ToolParser for RadonCcParser {
    fn tool(&self) -> ToolKind {
        ToolKind::RadonCc
    }

    fn fields(&self) -> &'static [&'static str] {
        &["avg_complexity", "high_complexity_blocks"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let files: BTreeMap<String, CcFile> = from_json(self.tool(), content)?;

        let mut complexities = Vec::new();
        for (path, file) in &files {
            match file {
                CcFile::Blocks(blocks) => complexities.extend(blocks.iter().map(|b| b.complexity)),
                CcFile::Error { error } => {
                    tracing::debug!(path = %path, error = %error, "radon could not analyse file")
                }
            }
        }

        let avg = if complexities.is_empty() {
            0.0
        } else {
            complexities.iter().sum::<f64>() / complexities.len() as f64
        };
        let high = complexities.iter().filter(|c| **c > HIGH_COMPLEXITY).count();

        Ok(BTreeMap::from([
            ("avg_complexity".to_string(), round2(avg)),
            ("high_complexity_blocks".to_string(), high as f64),
        ]))
    }
}

/// Parser for `radon mi -j` output.
pub struct RadonMiParser;

impl ToolParser for RadonMiParser {
    fn tool(&self) -> ToolKind {
        ToolKind::RadonMi
    }

    fn fields(&self) -> &'static [&'static str] {
        &["avg_maintainability", "low_maintainability_files"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let files: BTreeMap<String, MiFile> = from_json(self.tool(), content)?;

        let mut scored: Vec<(f64, &str)> = Vec::new();
        for (path, file) in &files {
            match file {
                MiFile::Scored { mi, rank } => scored.push((*mi, rank.as_str())),
                MiFile::Error { error } => {
                    tracing::debug!(path = %path, error = %error, "radon could not analyse file")
                }
            }
        }

        let mut fields = BTreeMap::new();
        let low = scored
            .iter()
            .filter(|(_, rank)| LOW_MAINTAINABILITY_RANKS.contains(rank))
            .count();
        fields.insert("low_maintainability_files".to_string(), low as f64);
        // With nothing scored there is no meaningful average.
        if !scored.is_empty() {
            let avg = scored.iter().map(|(mi, _)| mi).sum::<f64>() / scored.len() as f64;
            fields.insert("avg_maintainability".to_string(), round2(avg));
        }
        Ok(fields)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cc_average_and_high_blocks() {
        let output = r#"{
            "app/main.py": [
                {"type": "function", "name": "run", "complexity": 3, "rank": "A"},
                {"type": "function", "name": "dispatch", "complexity": 14, "rank": "C"}
            ],
            "app/util.py": [
                {"type": "function", "name": "helper", "complexity": 1, "rank": "A"}
            ],
            "app/broken.py": {"error": "invalid syntax (<unknown>, line 3)"}
        }"#;
        let fields = RadonCcParser.parse(output).unwrap();
        assert_eq!(fields["avg_complexity"], 6.0);
        assert_eq!(fields["high_complexity_blocks"], 1.0);
    }

    #[test]
    fn test_cc_empty_tree() {
        let fields = RadonCcParser.parse("{}").unwrap();
        assert_eq!(fields["avg_complexity"], 0.0);
    }

    #[test]
    fn test_mi_average_and_low_ranks() {
        let output = r#"{
            "app/main.py": {"mi": 72.5, "rank": "A"},
            "app/legacy.py": {"mi": 8.5, "rank": "C"}
        }"#;
        let fields = RadonMiParser.parse(output).unwrap();
        assert_eq!(fields["avg_maintainability"], 40.5);
        assert_eq!(fields["low_maintainability_files"], 1.0);
    }

    #[test]
    fn test_mi_rejects_wrong_shape() {
        assert!(RadonMiParser.parse("[1, 2, 3]").is_err());
    }
}
