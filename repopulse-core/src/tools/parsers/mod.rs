//! Tool-specific parsers
//!
//! Each supported tool has a parser implementing
//! [`ToolParser`](super::ToolParser).

mod audit;
mod bandit;
mod cloc;
mod coverage;
mod flake8;
mod pylint;
mod radon;

pub use audit::{PipAuditParser, SafetyParser};
pub use bandit::BanditParser;
pub use cloc::ClocParser;
pub use coverage::CoverageParser;
pub use flake8::Flake8Parser;
pub use pylint::PylintParser;
pub use radon::{RadonCcParser, RadonMiParser};

use super::{ToolKind, ToolParser};
use crate::error::{Error, Result};

/// Create parsers for every supported tool, in [`ToolKind::ALL`] order.
pub fn create_all_parsers() -> Vec<Box<dyn ToolParser>> {
    ToolKind::ALL.into_iter().map(parser_for).collect()
}

/// Get the parser for a specific tool.
pub fn parser_for(tool: ToolKind) -> Box<dyn ToolParser> {
    match tool {
        ToolKind::Pylint => Box::new(PylintParser),
        ToolKind::Flake8 => Box::new(Flake8Parser),
        ToolKind::RadonCc => Box::new(RadonCcParser),
        ToolKind::RadonMi => Box::new(RadonMiParser),
        ToolKind::Bandit => Box::new(BanditParser),
        ToolKind::PipAudit => Box::new(PipAuditParser),
        ToolKind::Safety => Box::new(SafetyParser),
        ToolKind::Coverage => Box::new(CoverageParser),
        ToolKind::Cloc => Box::new(ClocParser),
    }
}

/// Deserialize JSON tool output, naming the tool on failure.
fn from_json<T: serde::de::DeserializeOwned>(tool: ToolKind, content: &str) -> Result<T> {
    if content.trim().is_empty() {
        return Err(Error::tool_output(tool.as_str(), "output is empty"));
    }
    serde_json::from_str(content).map_err(|e| Error::tool_output(tool.as_str(), e.to_string()))
}
