// Library exports for allochart

pub mod builder;
pub mod csv_reader;
pub mod data;
pub mod error;
pub mod ir;
pub mod palette;
pub mod parser;
pub mod runtime;
pub mod scale;
pub mod transform;

pub use builder::{
    build_boxplot, build_count_bar, build_cumulative_bar, build_grouped_bar_with_cumulative,
    build_histogram_with_density, build_normalized_stacked_bar, build_prophylaxis_bar, build_simple_bar,
    build_simple_normalized_bar, build_stacked_bar, build_stratified_histogram, build_yes_no_bar,
    prophylaxis_columns, BarOptions, BoxplotOptions, CountOptions, CumulativeOptions, GroupedOptions,
    HistogramOptions, HistogramSource, LayoutOptions, ProphylaxisOptions, StackedOptions, YesNoOptions,
};
pub use data::{truncate_label, Dataset, Value};
pub use error::{DataError, ParseError, Warning};
pub use ir::ChartSpec;
pub use palette::{color_map, ColorMap, ColorPalette};
pub use scale::{CategoryOrder, CategorySort};

use serde::Deserialize;

/// How the dataset on stdin is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum InputFormat {
    #[serde(rename = "csv")]
    #[default]
    Csv,
    #[serde(rename = "json")]
    Json,
}

impl std::str::FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            other => Err(format!("unknown input format '{}' (expected csv or json)", other)),
        }
    }
}

/// Options of one CLI run
#[derive(Debug, Clone, Deserialize)]
pub struct RenderOptions {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, rename = "input")]
    pub format: InputFormat,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool { true }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            format: InputFormat::Csv,
            pretty: true,
        }
    }
}

/// Read a dataset in `format` from any reader
pub fn read_dataset<R: std::io::Read>(reader: R, format: InputFormat) -> error::Result<Dataset> {
    match format {
        InputFormat::Csv => Ok(Dataset::from_csv(csv_reader::read_csv(reader)?)),
        InputFormat::Json => {
            let value: serde_json::Value = serde_json::from_reader(reader)
                .map_err(|e| DataError::InvalidInput(format!("invalid JSON: {}", e)))?;
            Dataset::from_json(&value)
        }
    }
}

/// Parse `dsl`, build the chart from `data`, and serialize it to JSON.
/// Width and height in `options` override the DSL's `size(...)`.
pub fn render_to_json(dsl: &str, data: &Dataset, options: &RenderOptions) -> anyhow::Result<(String, ChartSpec)> {
    let mut request = parser::parse_chart_request(dsl)?;
    if options.width.is_some() || options.height.is_some() {
        let size = request.size.get_or_insert_with(Default::default);
        if options.width.is_some() {
            size.width = options.width;
        }
        if options.height.is_some() {
            size.height = options.height;
        }
    }

    let chart = runtime::render_chart(&request, data)?;
    let json = if options.pretty {
        serde_json::to_string_pretty(&chart)?
    } else {
        serde_json::to_string(&chart)?
    };
    Ok((json, chart))
}
