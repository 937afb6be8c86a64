use serde::Serialize;
use thiserror::Error;

/// Errors raised while turning a dataset into a chart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{column}' row {row}: cannot use '{value}' as a number")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Column '{column}' row {row}: value is missing")]
    MissingNumber { column: String, row: usize },

    #[error("Column '{column}' row {row}: cannot read '{value}' as a date")]
    NonDate {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid value format '{0}'")]
    InvalidFormat(String),

    #[error("Invalid input data: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, DataError>;

/// Non-fatal conditions reported alongside a chart.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The dataset had no rows; the chart has no series.
    #[error("dataset is empty, chart has no series")]
    EmptyInput,

    #[error("{count} record(s) with a missing '{column}' value were skipped")]
    MissingValues { column: String, count: usize },

    /// Fewer than two strata to compare; the chart has no series.
    #[error("stratifying by '{column}' needs at least 2 values, found {found}")]
    TooFewStrata { column: String, found: usize },

    /// No column holds the yes / no answers looked for.
    #[error("no column holds '{yes}' / '{no}' answers")]
    NoAnswerColumns { yes: String, no: String },
}

/// Errors in a chart-command string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Syntax error near '{0}'")]
    Syntax(String),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{call}(): unknown argument '{arg}'")]
    UnknownArgument { call: String, arg: String },

    #[error("{call}(): argument '{arg}' given more than once")]
    DuplicateArgument { call: String, arg: String },

    #[error("{call}(): argument '{arg}' must be {expected}")]
    WrongType {
        call: String,
        arg: String,
        expected: &'static str,
    },

    #[error("{call}(): missing required argument '{arg}'")]
    MissingArgument { call: String, arg: String },

    #[error("No chart command given")]
    NoCommand,

    #[error("Only one chart command is allowed, found '{0}' after another")]
    MultipleCommands(String),

    #[error("{call}(): arguments '{first}' and '{second}' cannot be combined")]
    ConflictingArguments {
        call: String,
        first: String,
        second: String,
    },

    #[error("Unknown palette '{0}' (expected safe, plotly or category10)")]
    UnknownPalette(String),
}
