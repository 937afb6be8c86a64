// Abstract syntax tree for the chart-command DSL

use crate::builder::{
    BarOptions, BoxplotOptions, CountOptions, CumulativeOptions, GroupedOptions, HistogramOptions,
    HistogramSource, ProphylaxisOptions, StackedOptions, YesNoOptions,
};
use crate::scale::CategoryOrder;

/// A parsed `command | filter(...) | labs(...) | size(...)` string
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub command: ChartCommand,
    /// Shorten x labels to this many characters before building
    pub truncate: Option<usize>,
    /// Column whose sorted values fix the series colors
    pub colors_from: Option<String>,
    /// Applied in order before the chart is built
    pub filters: Vec<Filter>,
    pub labels: Option<Labels>,
    pub size: Option<Size>,
}

impl ChartRequest {
    pub fn new(command: ChartCommand) -> Self {
        Self {
            command,
            truncate: None,
            colors_from: None,
            filters: Vec::new(),
            labels: None,
            size: None,
        }
    }
}

/// `filter(column: COL, values: [...])`: keep records whose label is listed
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub values: Vec<String>,
}

/// Chart to build, with the columns it reads and its display options
#[derive(Debug, Clone, PartialEq)]
pub enum ChartCommand {
    Bar {
        x: String,
        y: String,
        options: BarOptions,
    },
    Count {
        x: String,
        options: CountOptions,
    },
    Share {
        x: String,
        options: CountOptions,
    },
    Cumulative {
        x: String,
        options: CumulativeOptions,
    },
    Stacked {
        x: String,
        stack: String,
        normalize: bool,
        options: StackedOptions,
    },
    Grouped {
        x: String,
        group: String,
        options: GroupedOptions,
    },
    Boxplot {
        x: String,
        y: String,
        options: BoxplotOptions,
    },
    YesNo {
        columns: Vec<String>,
        options: YesNoOptions,
    },
    /// Stratified when `by` is set
    Histogram {
        source: HistogramSource,
        by: Option<String>,
        options: HistogramOptions,
    },
    /// Empty `columns` means detect them
    Prophylaxis {
        columns: Vec<String>,
        options: ProphylaxisOptions,
    },
}

impl ChartCommand {
    /// Column plotted on the category axis, if the chart has one
    pub fn x_column(&self) -> Option<&str> {
        match self {
            ChartCommand::Bar { x, .. }
            | ChartCommand::Count { x, .. }
            | ChartCommand::Share { x, .. }
            | ChartCommand::Cumulative { x, .. }
            | ChartCommand::Stacked { x, .. }
            | ChartCommand::Grouped { x, .. }
            | ChartCommand::Boxplot { x, .. } => Some(x),
            ChartCommand::YesNo { .. } | ChartCommand::Histogram { .. } | ChartCommand::Prophylaxis { .. } => None,
        }
    }

    pub fn set_x_column(&mut self, column: String) {
        match self {
            ChartCommand::Bar { x, .. }
            | ChartCommand::Count { x, .. }
            | ChartCommand::Share { x, .. }
            | ChartCommand::Cumulative { x, .. }
            | ChartCommand::Stacked { x, .. }
            | ChartCommand::Grouped { x, .. }
            | ChartCommand::Boxplot { x, .. } => *x = column,
            ChartCommand::YesNo { .. } | ChartCommand::Histogram { .. } | ChartCommand::Prophylaxis { .. } => {}
        }
    }

    /// Explicit order of the x categories, if the chart takes one
    pub fn x_order_mut(&mut self) -> Option<&mut Option<CategoryOrder>> {
        match self {
            ChartCommand::Count { options, .. } | ChartCommand::Share { options, .. } => Some(&mut options.order),
            ChartCommand::Cumulative { options, .. } => Some(&mut options.order),
            ChartCommand::Stacked { options, .. } => Some(&mut options.x_order),
            ChartCommand::Grouped { options, .. } => Some(&mut options.x_order),
            ChartCommand::Boxplot { options, .. } => Some(&mut options.x_order),
            ChartCommand::Bar { .. }
            | ChartCommand::YesNo { .. }
            | ChartCommand::Histogram { .. }
            | ChartCommand::Prophylaxis { .. } => None,
        }
    }
}

/// Chart titles from `labs(...)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Labels {
    pub title: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
    /// Secondary (cumulative) axis
    pub y2: Option<String>,
}

/// Chart dimensions from `size(...)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: Option<u32>,
    pub height: Option<u32>,
}
