// Chart-command DSL parser module

pub mod ast;
pub mod command;
pub mod format;
pub mod labels;
pub mod lexer;
pub mod pipeline;

// Public API re-exports
pub use ast::{ChartCommand, ChartRequest, Filter, Labels, Size};
pub use pipeline::parse_chart_request;
