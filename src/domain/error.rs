//! Domain error types.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for klinetrader.
#[derive(Debug, thiserror::Error)]
pub enum KlineTraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("kline panel is missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },

    #[error("failed to read kline data from {source_name}: {reason}")]
    DataRead { source_name: String, reason: String },

    #[error("no kline data{}", .interval.as_ref().map(|i| format!(" for interval {i}")).unwrap_or_default())]
    NoData { interval: Option<String> },

    #[error("failed to write {target}: {reason}")]
    ReportWrite { target: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&KlineTraderError> for std::process::ExitCode {
    fn from(err: &KlineTraderError) -> Self {
        let code: u8 = match err {
            KlineTraderError::Io(_) | KlineTraderError::ReportWrite { .. } => 1,
            KlineTraderError::ConfigParse { .. }
            | KlineTraderError::ConfigMissing { .. }
            | KlineTraderError::ConfigInvalid { .. } => 2,
            KlineTraderError::DataRead { .. } => 3,
            KlineTraderError::RuleParse(_) | KlineTraderError::RuleInvalid { .. } => 4,
            KlineTraderError::MissingColumns { .. } | KlineTraderError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
