//! Chart builders: pure functions from a [`Dataset`] and display options to a
//! [`ChartSpec`]. Every call is independent; the dataset is never modified.

use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::data::{number_label, Dataset};
use crate::error::{DataError, Result, Warning};
use crate::ir::{
    Axis, AxisRef, BarStyle, BoxStyle, ChartSpec, Grouping, LineStyle, Orientation, Series,
    SeriesStyle, TextPosition,
};
use crate::palette::{ColorMap, ColorPalette};
use crate::parser::format::NumberFormat;
use crate::scale::{natural_sort, order_categories, CategoryOrder, CategorySort};
use crate::transform::{
    complete_pairs, cumulative, kde, percentile, shares, silverman_bandwidth, Bins, CrossTab, Groups, Tally,
};

const DEFAULT_BAR_COLOR: &str = "#0D3182";
const DEFAULT_LINE_COLOR: &str = "#FF6B6B";
const DEFAULT_TEXT_COLOR: &str = "white";
const PATIENTS_TITLE: &str = "Nombre de patients";
const CUMULATIVE_TITLE: &str = "Effectif cumulé";
const PROPORTION_TITLE: &str = "Proportion (%)";
const DAYS_TITLE: &str = "Jours";
const DENSITY_NAME: &str = "Densité";

// =============================================================================
// Options
// =============================================================================

/// Titles and dimensions shared by every chart. Unset fields fall back to
/// chart-specific defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub title: Option<String>,
    pub x_axis_title: Option<String>,
    pub y_axis_title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub rotate_x_labels: bool,
    pub x_rotation_angle: i32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            title: None,
            x_axis_title: None,
            y_axis_title: None,
            width: None,
            height: None,
            rotate_x_labels: false,
            x_rotation_angle: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BarOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub bar_color: String,
    pub text_color: String,
    pub show_values: bool,
    pub value_format: String,
    pub orientation: Orientation,
    pub text_position: TextPosition,
}

impl Default for BarOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            bar_color: DEFAULT_BAR_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            show_values: true,
            value_format: ".1f".to_string(),
            orientation: Orientation::Vertical,
            text_position: TextPosition::Auto,
        }
    }
}

/// Options for single-series count charts (counts and shares).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub bar_color: String,
    pub text_color: String,
    pub show_values: bool,
    pub value_format: String,
    pub order: Option<CategoryOrder>,
    pub sort: CategorySort,
}

impl Default for CountOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            bar_color: DEFAULT_BAR_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            show_values: true,
            value_format: ".1f".to_string(),
            order: None,
            sort: CategorySort::Natural,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CumulativeOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub line_y_axis_title: Option<String>,
    pub bar_color: String,
    pub line_color: String,
    pub text_color: String,
    pub show_bar_values: bool,
    pub show_cumulative_values: bool,
    pub order: Option<CategoryOrder>,
    pub sort: CategorySort,
}

impl Default for CumulativeOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            line_y_axis_title: None,
            bar_color: DEFAULT_BAR_COLOR.to_string(),
            line_color: DEFAULT_LINE_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            show_bar_values: true,
            show_cumulative_values: true,
            order: None,
            sort: CategorySort::Natural,
        }
    }
}

/// Options for stacked bars, raw or normalized to 100%.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StackedOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub x_order: Option<CategoryOrder>,
    pub x_sort: CategorySort,
    pub stack_order: Option<CategoryOrder>,
    pub palette: ColorPalette,
    pub color_map: Option<ColorMap>,
    pub show_values: bool,
    /// Applied to the percentage of normalized segments.
    pub value_format: String,
    /// Keep x categories listed in `x_order` even when they have no records.
    pub keep_empty: bool,
}

impl Default for StackedOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            x_order: None,
            x_sort: CategorySort::Natural,
            stack_order: None,
            palette: ColorPalette::default(),
            color_map: None,
            show_values: true,
            value_format: ".1f".to_string(),
            keep_empty: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GroupedOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub line_y_axis_title: Option<String>,
    pub x_order: Option<CategoryOrder>,
    pub palette: ColorPalette,
    pub color_map: Option<ColorMap>,
    pub line_color: String,
    pub show_values: bool,
    pub show_cumulative_values: bool,
}

impl Default for GroupedOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            line_y_axis_title: None,
            x_order: None,
            palette: ColorPalette::default(),
            color_map: None,
            line_color: DEFAULT_LINE_COLOR.to_string(),
            show_values: true,
            show_cumulative_values: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BoxplotOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub auto_colors: bool,
    pub palette: Option<ColorPalette>,
    pub color_map: Option<ColorMap>,
    /// Split each box by a second categorical column.
    pub color_column: Option<String>,
    pub show_points: bool,
    pub point_size: f64,
    pub force_zero_start: bool,
    pub x_order: Option<CategoryOrder>,
}

impl Default for BoxplotOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            auto_colors: true,
            palette: None,
            color_map: None,
            color_column: None,
            show_points: true,
            point_size: 4.0,
            force_zero_start: false,
            x_order: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct YesNoOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub yes_label: String,
    pub no_label: String,
    /// Answers counted as yes, compared case-insensitively.
    pub yes_tokens: Vec<String>,
    pub yes_color: String,
    pub no_color: String,
    pub show_values: bool,
    pub value_format: String,
    /// Count a blank answer as no. Otherwise blank answers are left out of
    /// the column's total.
    pub missing_as_no: bool,
}

impl Default for YesNoOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            yes_label: "Oui".to_string(),
            no_label: "Non".to_string(),
            yes_tokens: ["yes", "oui", "true", "1"].iter().map(|s| s.to_string()).collect(),
            yes_color: DEFAULT_BAR_COLOR.to_string(),
            no_color: "#D3D3D3".to_string(),
            show_values: true,
            value_format: ".1f".to_string(),
            missing_as_no: true,
        }
    }
}

/// Where histogram values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum HistogramSource {
    /// A numeric column.
    Column(String),
    /// Whole days from `start` to `end`, two date columns.
    Duration { start: String, end: String },
}

impl HistogramSource {
    fn columns(&self) -> Vec<&str> {
        match self {
            HistogramSource::Column(c) => vec![c.as_str()],
            HistogramSource::Duration { start, end } => vec![start.as_str(), end.as_str()],
        }
    }

    fn axis_title(&self) -> &str {
        match self {
            HistogramSource::Column(c) => c,
            HistogramSource::Duration { .. } => DAYS_TITLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistogramOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub bin_size: f64,
    /// Values above this quantile (0 to 1) are dropped before binning.
    pub percentile_limit: Option<f64>,
    /// Only records whose `filter_column` label equals `filter_value`.
    pub filter_column: Option<String>,
    pub filter_value: Option<String>,
    pub bar_color: String,
    pub density_color: String,
    pub show_density: bool,
    /// Strata to compare. Unset means the last `max_strata` values in
    /// natural order.
    pub strata: Option<CategoryOrder>,
    pub max_strata: usize,
    pub opacity: f64,
    pub palette: ColorPalette,
}

impl Default for HistogramOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            bin_size: 2.0,
            percentile_limit: Some(0.99),
            filter_column: None,
            filter_value: None,
            bar_color: "#27BDBE".to_string(),
            density_color: DEFAULT_LINE_COLOR.to_string(),
            show_density: true,
            strata: None,
            max_strata: 3,
            opacity: 0.6,
            palette: ColorPalette::default(),
        }
    }
}

/// Share of yes answers per treatment column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProphylaxisOptions {
    #[serde(flatten)]
    pub layout: LayoutOptions,
    pub yes_value: String,
    pub no_value: String,
    /// Columns starting with one of these are never picked up as treatments.
    pub excluded_prefixes: Vec<String>,
    pub bar_color: String,
    pub text_color: String,
    pub show_values: bool,
    pub value_format: String,
    /// Highest share first. Otherwise columns keep their given order.
    pub sort_descending: bool,
}

impl Default for ProphylaxisOptions {
    fn default() -> Self {
        let excluded = [
            "Prep Regimen",
            "Age Groups",
            "Year",
            "Greffes",
            "Treatment Date",
            "Date Diagnosis",
            "Date Of Birth",
            "Age At Diagnosis",
            "Donor Type",
            "Source Stem Cells",
            "Main Diagnosis",
            "Subclass Diagnosis",
        ];
        Self {
            layout: LayoutOptions::default(),
            yes_value: "Oui".to_string(),
            no_value: "Non".to_string(),
            excluded_prefixes: excluded.iter().map(|s| s.to_string()).collect(),
            bar_color: DEFAULT_BAR_COLOR.to_string(),
            text_color: DEFAULT_TEXT_COLOR.to_string(),
            show_values: true,
            value_format: ".1f".to_string(),
            sort_descending: true,
        }
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Fail on the first absent column. A dataset without any columns has
/// nothing to check against and is treated as empty input.
fn require_columns(data: &Dataset, columns: &[&str]) -> Result<()> {
    if data.headers().is_empty() && data.is_empty() {
        return Ok(());
    }
    for column in columns {
        data.column_index(column)?;
    }
    Ok(())
}

/// Chart frame with titles, size and axes resolved; series filled in later.
fn frame(
    layout: &LayoutOptions,
    default_title: &str,
    x_title: &str,
    y_title: &str,
    default_size: (u32, u32),
) -> ChartSpec {
    let mut x_axis = Axis::titled(layout.x_axis_title.clone().unwrap_or_else(|| x_title.to_string()));
    if layout.rotate_x_labels {
        x_axis.tick_angle = Some(layout.x_rotation_angle);
    }

    ChartSpec {
        title: layout.title.clone().unwrap_or_else(|| default_title.to_string()),
        width: layout.width.unwrap_or(default_size.0),
        height: layout.height.unwrap_or(default_size.1),
        series: Vec::new(),
        x_axis,
        y_axis: Axis::titled(layout.y_axis_title.clone().unwrap_or_else(|| y_title.to_string())),
        y2_axis: None,
        grouping: None,
        orientation: Orientation::Vertical,
        show_legend: true,
        warnings: Vec::new(),
    }
}

fn warn_missing(chart: &mut ChartSpec, column: &str, count: usize) {
    if count > 0 {
        chart.warnings.push(Warning::MissingValues {
            column: column.to_string(),
            count,
        });
    }
}

fn bar_series(name: &str, x: Vec<String>, y: Vec<f64>, text: Option<Vec<String>>, style: BarStyle) -> Series {
    Series {
        name: name.to_string(),
        x,
        y,
        text,
        y_axis: AxisRef::Y,
        style: SeriesStyle::Bar(style),
    }
}

fn cumulative_line(name: &str, x: Vec<String>, totals: &[usize], color: &str, show_values: bool) -> Series {
    Series {
        name: name.to_string(),
        x,
        y: totals.iter().map(|&n| n as f64).collect(),
        text: show_values.then(|| totals.iter().map(|n| n.to_string()).collect()),
        y_axis: AxisRef::Y2,
        style: SeriesStyle::Line(LineStyle {
            color: Some(color.to_string()),
            width: 3.0,
            marker_size: 10.0,
            text_position: TextPosition::TopCenter,
        }),
    }
}

/// Count labels, blank where the count is zero.
fn count_labels(counts: &[usize]) -> Vec<String> {
    counts
        .iter()
        .map(|&n| if n == 0 { String::new() } else { n.to_string() })
        .collect()
}

/// `"{pct}% ({count})"`, blank where the count is zero.
fn share_labels(pcts: &[f64], counts: &[usize], fmt: &NumberFormat) -> Vec<String> {
    pcts.iter()
        .zip(counts.iter())
        .map(|(&p, &n)| if n == 0 { String::new() } else { format!("{}% ({})", fmt.apply(p), n) })
        .collect()
}

/// Distinct categories of a column in display order, with their tally.
fn ordered_tally(
    data: &Dataset,
    column: &str,
    order: Option<&CategoryOrder>,
    sort: CategorySort,
) -> Result<(Tally, Vec<String>)> {
    let labels = data.labels(column)?;
    let tally = Tally::from_labels(labels.iter().map(|l| l.as_deref()));
    let categories = order_categories(&tally.categories, &tally.counts, order, sort, false);
    Ok((tally, categories))
}

// =============================================================================
// Builders
// =============================================================================

/// One bar per record: `x_column` labels against numeric `y_column` values.
pub fn build_simple_bar(data: &Dataset, x_column: &str, y_column: &str, options: &BarOptions) -> Result<ChartSpec> {
    require_columns(data, &[x_column, y_column])?;
    let fmt = NumberFormat::parse(&options.value_format)?;

    let mut chart = frame(&options.layout, "", x_column, y_column, (800, 500));
    chart.orientation = options.orientation;
    chart.show_legend = false;
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let x: Vec<String> = data
        .labels(x_column)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();
    let y_idx = data.column_index(y_column)?;
    let y = data
        .numbers(y_column)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| DataError::MissingNumber {
                column: data.headers()[y_idx].clone(),
                row,
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let text = options.show_values.then(|| y.iter().map(|&v| fmt.apply(v)).collect());
    chart.series.push(bar_series(
        y_column,
        x,
        y,
        text,
        BarStyle {
            color: Some(options.bar_color.clone()),
            text_color: Some(options.text_color.clone()),
            text_position: options.text_position,
            opacity: None,
        },
    ));
    Ok(chart)
}

/// Per-category counts as bars plus their running total as a line on an
/// independent secondary axis.
pub fn build_cumulative_bar(data: &Dataset, category_column: &str, options: &CumulativeOptions) -> Result<ChartSpec> {
    require_columns(data, &[category_column])?;

    let line_title = options
        .line_y_axis_title
        .clone()
        .unwrap_or_else(|| CUMULATIVE_TITLE.to_string());
    let mut chart = frame(
        &options.layout,
        "Distribution et cumul des effectifs",
        category_column,
        PATIENTS_TITLE,
        (1500, 500),
    );
    chart.y2_axis = Some(Axis::titled(line_title.clone()));
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let (tally, categories) = ordered_tally(data, category_column, options.order.as_ref(), options.sort)?;
    warn_missing(&mut chart, category_column, tally.missing);

    let counts = tally.counts_in(&categories);
    let totals = cumulative(&counts);

    let bar_name = chart.y_axis.title.clone();
    chart.series.push(bar_series(
        &bar_name,
        categories.clone(),
        counts.iter().map(|&n| n as f64).collect(),
        options.show_bar_values.then(|| counts.iter().map(|n| n.to_string()).collect()),
        BarStyle {
            color: Some(options.bar_color.clone()),
            text_color: Some(options.text_color.clone()),
            text_position: TextPosition::Inside,
            opacity: None,
        },
    ));
    chart.series.push(cumulative_line(
        &line_title,
        categories,
        &totals,
        &options.line_color,
        options.show_cumulative_values,
    ));
    Ok(chart)
}

/// Stacked bars where each x category sums to 100%.
pub fn build_normalized_stacked_bar(
    data: &Dataset,
    x_column: &str,
    stack_column: &str,
    options: &StackedOptions,
) -> Result<ChartSpec> {
    stacked_chart(data, x_column, stack_column, options, true)
}

/// Stacked bars of raw record counts.
pub fn build_stacked_bar(
    data: &Dataset,
    x_column: &str,
    stack_column: &str,
    options: &StackedOptions,
) -> Result<ChartSpec> {
    stacked_chart(data, x_column, stack_column, options, false)
}

fn stacked_chart(
    data: &Dataset,
    x_column: &str,
    stack_column: &str,
    options: &StackedOptions,
    normalize: bool,
) -> Result<ChartSpec> {
    require_columns(data, &[x_column, stack_column])?;
    let fmt = NumberFormat::parse(&options.value_format)?;

    let y_title = if normalize { PROPORTION_TITLE } else { PATIENTS_TITLE };
    let mut chart = frame(&options.layout, "", x_column, y_title, (800, 500));
    chart.grouping = Some(Grouping::Stack);
    if normalize {
        chart.y_axis.range = Some((0.0, 100.0));
    }
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let (pairs, missing_x, missing_stack) = complete_pairs(&data.labels(x_column)?, &data.labels(stack_column)?);
    warn_missing(&mut chart, x_column, missing_x);
    warn_missing(&mut chart, stack_column, missing_stack);

    let x_tally = Tally::from_labels(pairs.iter().map(|(x, _)| Some(x.as_str())));
    let stack_tally = Tally::from_labels(pairs.iter().map(|(_, s)| Some(s.as_str())));
    let rows = order_categories(
        &x_tally.categories,
        &x_tally.counts,
        options.x_order.as_ref(),
        options.x_sort,
        options.keep_empty,
    );
    let columns = order_categories(
        &stack_tally.categories,
        &stack_tally.counts,
        options.stack_order.as_ref(),
        CategorySort::Natural,
        false,
    );

    let table = CrossTab::build(&pairs, &rows, &columns);
    let percentages = table.row_percentages();
    let colors = options.palette.resolve(&columns, options.color_map.as_ref());

    for (j, (name, color)) in columns.iter().zip(colors).enumerate() {
        let counts = table.column_counts(j);
        let (y, text) = if normalize {
            let pcts: Vec<f64> = percentages.iter().map(|row| row[j]).collect();
            let text = options.show_values.then(|| share_labels(&pcts, &counts, &fmt));
            (pcts, text)
        } else {
            let y: Vec<f64> = counts.iter().map(|&n| n as f64).collect();
            (y, options.show_values.then(|| count_labels(&counts)))
        };

        chart.series.push(bar_series(
            name,
            rows.clone(),
            y,
            text,
            BarStyle {
                color,
                text_color: Some(DEFAULT_TEXT_COLOR.to_string()),
                text_position: TextPosition::Inside,
                opacity: None,
            },
        ));
    }
    Ok(chart)
}

/// One box per category carrying every numeric value of that category.
pub fn build_boxplot(data: &Dataset, x_column: &str, y_column: &str, options: &BoxplotOptions) -> Result<ChartSpec> {
    let mut required = vec![x_column, y_column];
    if let Some(c) = options.color_column.as_deref() {
        required.push(c);
    }
    require_columns(data, &required)?;

    let mut chart = frame(&options.layout, "", x_column, y_column, (800, 500));
    chart.show_legend = options.color_column.is_some();
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let values = data.numbers(y_column)?;
    let x_labels = data.labels(x_column)?;

    let box_style = |color: Option<String>| BoxStyle {
        color,
        show_points: options.show_points,
        point_size: options.point_size,
    };

    match options.color_column.as_deref() {
        None => {
            let groups = Groups::build(&x_labels, &values);
            warn_missing(&mut chart, x_column, groups.missing_key);
            warn_missing(&mut chart, y_column, groups.missing_value);

            let categories = order_categories(
                &groups.categories,
                &groups.counts(),
                options.x_order.as_ref(),
                CategorySort::Natural,
                false,
            );
            let colors = box_colors(&categories, options);
            for (category, color) in categories.iter().zip(colors) {
                let ys = groups.get(category).to_vec();
                chart.series.push(Series {
                    name: category.clone(),
                    x: vec![category.clone(); ys.len()],
                    y: ys,
                    text: None,
                    y_axis: AxisRef::Y,
                    style: SeriesStyle::Box(box_style(color)),
                });
            }
        }
        Some(color_column) => {
            chart.grouping = Some(Grouping::Group);
            let color_labels = data.labels(color_column)?;

            // One series per color category; x keeps each record's category
            let mut by_color: HashMap<String, Vec<(String, f64)>> = HashMap::new();
            let mut x_tally = Tally::default();
            let (mut missing_x, mut missing_y, mut missing_color) = (0, 0, 0);
            for ((x, y), c) in x_labels.iter().zip(values.iter()).zip(color_labels.iter()) {
                match (x, y, c) {
                    (Some(x), Some(y), Some(c)) => {
                        by_color.entry(c.clone()).or_default().push((x.clone(), *y));
                        x_tally.add(x);
                    }
                    (None, _, _) => missing_x += 1,
                    (_, None, _) => missing_y += 1,
                    (_, _, None) => missing_color += 1,
                }
            }
            warn_missing(&mut chart, x_column, missing_x);
            warn_missing(&mut chart, y_column, missing_y);
            warn_missing(&mut chart, color_column, missing_color);

            let x_order = order_categories(
                &x_tally.categories,
                &x_tally.counts,
                options.x_order.as_ref(),
                CategorySort::Natural,
                false,
            );
            let x_position: HashMap<&str, usize> =
                x_order.iter().enumerate().map(|(i, x)| (x.as_str(), i)).collect();

            let present: Vec<String> = by_color.keys().cloned().collect();
            let counts: HashMap<String, usize> = by_color.iter().map(|(k, v)| (k.clone(), v.len())).collect();
            let categories = order_categories(&present, &counts, None, CategorySort::Natural, false);
            let colors = box_colors(&categories, options);
            for (category, color) in categories.iter().zip(colors) {
                let mut records = by_color.remove(category).unwrap_or_default();
                // Stable, so records of one x category keep file order
                records.sort_by_key(|(x, _)| x_position.get(x.as_str()).copied().unwrap_or(usize::MAX));
                let (xs, ys) = records.into_iter().unzip();
                chart.series.push(Series {
                    name: category.clone(),
                    x: xs,
                    y: ys,
                    text: None,
                    y_axis: AxisRef::Y,
                    style: SeriesStyle::Box(box_style(color)),
                });
            }
        }
    }

    if options.force_zero_start {
        let max = chart
            .series
            .iter()
            .flat_map(|s| s.y.iter().copied())
            .fold(0.0f64, f64::max);
        let top = if max > 0.0 { max * 1.05 } else { 1.0 };
        chart.y_axis.range = Some((0.0, top));
    }
    Ok(chart)
}

/// Explicit map first; otherwise the palette cycled over `categories` when
/// automatic coloring is on.
fn box_colors(categories: &[String], options: &BoxplotOptions) -> Vec<Option<String>> {
    let palette = options.palette.clone().unwrap_or_default();
    match (&options.color_map, options.auto_colors) {
        (Some(map), _) => palette.resolve(categories, Some(map)),
        (None, true) => palette.resolve(categories, None),
        (None, false) => vec![None; categories.len()],
    }
}

/// Record counts per category of one column.
pub fn build_count_bar(data: &Dataset, x_column: &str, options: &CountOptions) -> Result<ChartSpec> {
    count_chart(data, x_column, options, false)
}

/// Each category's share of all records, in percent.
pub fn build_simple_normalized_bar(data: &Dataset, x_column: &str, options: &CountOptions) -> Result<ChartSpec> {
    count_chart(data, x_column, options, true)
}

fn count_chart(data: &Dataset, x_column: &str, options: &CountOptions, normalize: bool) -> Result<ChartSpec> {
    require_columns(data, &[x_column])?;
    let fmt = NumberFormat::parse(&options.value_format)?;

    let y_title = if normalize { PROPORTION_TITLE } else { PATIENTS_TITLE };
    let mut chart = frame(&options.layout, "", x_column, y_title, (800, 500));
    chart.show_legend = false;
    if normalize {
        chart.y_axis.range = Some((0.0, 100.0));
    }
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let (tally, categories) = ordered_tally(data, x_column, options.order.as_ref(), options.sort)?;
    warn_missing(&mut chart, x_column, tally.missing);
    let counts = tally.counts_in(&categories);

    let (y, text) = if normalize {
        let pcts = shares(&counts);
        let text = options.show_values.then(|| share_labels(&pcts, &counts, &fmt));
        (pcts, text)
    } else {
        let y: Vec<f64> = counts.iter().map(|&n| n as f64).collect();
        (y, options.show_values.then(|| count_labels(&counts)))
    };

    let name = chart.y_axis.title.clone();
    chart.series.push(bar_series(
        &name,
        categories,
        y,
        text,
        BarStyle {
            color: Some(options.bar_color.clone()),
            text_color: Some(options.text_color.clone()),
            text_position: TextPosition::Inside,
            opacity: None,
        },
    ));
    Ok(chart)
}

/// Side-by-side bars per group for each x category, plus the cumulative
/// total across x on a secondary axis.
pub fn build_grouped_bar_with_cumulative(
    data: &Dataset,
    x_column: &str,
    group_column: &str,
    options: &GroupedOptions,
) -> Result<ChartSpec> {
    require_columns(data, &[x_column, group_column])?;

    let line_title = options
        .line_y_axis_title
        .clone()
        .unwrap_or_else(|| CUMULATIVE_TITLE.to_string());
    let mut chart = frame(&options.layout, "", x_column, PATIENTS_TITLE, (800, 500));
    chart.grouping = Some(Grouping::Group);
    chart.y2_axis = Some(Axis::titled(line_title.clone()));
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let (pairs, missing_x, missing_group) = complete_pairs(&data.labels(x_column)?, &data.labels(group_column)?);
    warn_missing(&mut chart, x_column, missing_x);
    warn_missing(&mut chart, group_column, missing_group);

    let x_tally = Tally::from_labels(pairs.iter().map(|(x, _)| Some(x.as_str())));
    let group_tally = Tally::from_labels(pairs.iter().map(|(_, g)| Some(g.as_str())));
    let rows = order_categories(
        &x_tally.categories,
        &x_tally.counts,
        options.x_order.as_ref(),
        CategorySort::Natural,
        false,
    );
    let groups = order_categories(
        &group_tally.categories,
        &group_tally.counts,
        None,
        CategorySort::Natural,
        false,
    );

    let table = CrossTab::build(&pairs, &rows, &groups);
    let colors = options.palette.resolve(&groups, options.color_map.as_ref());
    for (j, (name, color)) in groups.iter().zip(colors).enumerate() {
        let counts = table.column_counts(j);
        chart.series.push(bar_series(
            name,
            rows.clone(),
            counts.iter().map(|&n| n as f64).collect(),
            options.show_values.then(|| count_labels(&counts)),
            BarStyle {
                color,
                text_color: Some(DEFAULT_TEXT_COLOR.to_string()),
                text_position: TextPosition::Inside,
                opacity: None,
            },
        ));
    }

    let totals = cumulative(&table.row_totals());
    chart.series.push(cumulative_line(
        &line_title,
        rows,
        &totals,
        &options.line_color,
        options.show_cumulative_values,
    ));
    Ok(chart)
}

/// Share of yes / no answers for each listed column, stacked to 100%.
pub fn build_yes_no_bar(data: &Dataset, columns: &[String], options: &YesNoOptions) -> Result<ChartSpec> {
    let names: Vec<&str> = columns.iter().map(String::as_str).collect();
    require_columns(data, &names)?;
    let fmt = NumberFormat::parse(&options.value_format)?;

    let mut chart = frame(&options.layout, "", "", PROPORTION_TITLE, (800, 500));
    chart.grouping = Some(Grouping::Stack);
    chart.y_axis.range = Some((0.0, 100.0));
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let tokens: Vec<String> = options.yes_tokens.iter().map(|t| t.trim().to_lowercase()).collect();
    let mut yes_counts = Vec::with_capacity(columns.len());
    let mut no_counts = Vec::with_capacity(columns.len());
    for column in columns {
        let answers = data.labels(column)?;
        let yes = answers
            .iter()
            .flatten()
            .filter(|a| tokens.contains(&a.trim().to_lowercase()))
            .count();
        let total = if options.missing_as_no {
            answers.len()
        } else {
            answers.iter().flatten().count()
        };
        yes_counts.push(yes);
        no_counts.push(total - yes);
    }

    let mut yes_pcts = Vec::with_capacity(columns.len());
    let mut no_pcts = Vec::with_capacity(columns.len());
    for (&yes, &no) in yes_counts.iter().zip(no_counts.iter()) {
        let split = shares(&[yes, no]);
        yes_pcts.push(split[0]);
        no_pcts.push(split[1]);
    }

    let series = [
        (&options.yes_label, &options.yes_color, yes_pcts, yes_counts),
        (&options.no_label, &options.no_color, no_pcts, no_counts),
    ];
    for (label, color, pcts, counts) in series {
        let text = options.show_values.then(|| share_labels(&pcts, &counts, &fmt));
        chart.series.push(bar_series(
            label,
            columns.to_vec(),
            pcts,
            text,
            BarStyle {
                color: Some(color.clone()),
                text_color: Some(DEFAULT_TEXT_COLOR.to_string()),
                text_position: TextPosition::Inside,
                opacity: None,
            },
        ));
    }
    Ok(chart)
}

fn histogram_columns<'a>(source: &'a HistogramSource, options: &'a HistogramOptions) -> Vec<&'a str> {
    let mut columns = source.columns();
    if let Some(c) = options.filter_column.as_deref() {
        columns.push(c);
    }
    columns
}

fn check_bin_size(options: &HistogramOptions) -> Result<()> {
    if options.bin_size.is_finite() && options.bin_size > 0.0 {
        Ok(())
    } else {
        Err(DataError::InvalidInput(format!(
            "histogram bin size must be positive, got {}",
            options.bin_size
        )))
    }
}

/// Records passing the histogram's `filter_column == filter_value` test.
fn kept_records<'a>(data: &'a Dataset, options: &HistogramOptions) -> Result<Cow<'a, Dataset>> {
    match (&options.filter_column, &options.filter_value) {
        (Some(column), Some(value)) => Ok(Cow::Owned(data.filter_in(column, std::slice::from_ref(value))?)),
        _ => Ok(Cow::Borrowed(data)),
    }
}

/// Histogram value of every record, `None` where a cell is missing.
fn histogram_values(data: &Dataset, source: &HistogramSource, chart: &mut ChartSpec) -> Result<Vec<Option<f64>>> {
    match source {
        HistogramSource::Column(column) => {
            let values = data.numbers(column)?;
            warn_missing(chart, column, values.iter().filter(|v| v.is_none()).count());
            Ok(values)
        }
        HistogramSource::Duration { start, end } => {
            let starts = data.dates(start)?;
            let ends = data.dates(end)?;
            warn_missing(chart, start, starts.iter().filter(|d| d.is_none()).count());
            warn_missing(
                chart,
                end,
                starts.iter().zip(&ends).filter(|(s, e)| s.is_some() && e.is_none()).count(),
            );
            Ok(starts
                .into_iter()
                .zip(ends)
                .map(|(s, e)| Some((e? - s?).num_days() as f64))
                .collect())
        }
    }
}

/// Largest value kept under a quantile limit.
fn quantile_cap(values: &[f64], limit: Option<f64>) -> Option<f64> {
    let limit = limit?;
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile(&sorted, limit))
}

/// Names and colors of one histogram and its density curve.
struct HistogramLayer<'a> {
    name: &'a str,
    density_name: &'a str,
    color: Option<String>,
    density_color: Option<String>,
    opacity: Option<f64>,
}

/// Bars of per-bin counts, plus the kernel density scaled to counts.
fn push_histogram(chart: &mut ChartSpec, layer: HistogramLayer, values: &[f64], bins: &Bins, show_density: bool) {
    let centers = bins.centers();
    let labels: Vec<String> = centers.iter().map(|&c| number_label(c)).collect();
    let counts = bins.counts(values);

    chart.series.push(bar_series(
        layer.name,
        labels.clone(),
        counts.iter().map(|&n| n as f64).collect(),
        None,
        BarStyle {
            color: layer.color,
            text_color: None,
            text_position: TextPosition::Auto,
            opacity: layer.opacity,
        },
    ));

    if show_density && values.len() >= 2 {
        let scale = values.len() as f64 * bins.width;
        let density = kde(values, silverman_bandwidth(values), &centers);
        chart.series.push(Series {
            name: layer.density_name.to_string(),
            x: labels,
            y: density.into_iter().map(|d| d * scale).collect(),
            text: None,
            y_axis: AxisRef::Y,
            style: SeriesStyle::Line(LineStyle {
                color: layer.density_color,
                width: 2.0,
                marker_size: 0.0,
                text_position: TextPosition::Auto,
            }),
        });
    }
}

/// Distribution of one numeric value (or a duration in days) as a
/// fixed-width histogram with a density curve on the same axis.
pub fn build_histogram_with_density(
    data: &Dataset,
    source: &HistogramSource,
    options: &HistogramOptions,
) -> Result<ChartSpec> {
    require_columns(data, &histogram_columns(source, options))?;
    check_bin_size(options)?;

    let mut chart = frame(&options.layout, "", source.axis_title(), PATIENTS_TITLE, (800, 400));
    chart.show_legend = options.show_density;
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let kept = kept_records(data, options)?;
    let mut values: Vec<f64> = histogram_values(&kept, source, &mut chart)?.into_iter().flatten().collect();
    if let Some(cap) = quantile_cap(&values, options.percentile_limit) {
        values.retain(|&v| v <= cap);
    }
    let Some(bins) = Bins::covering(&values, options.bin_size) else {
        return Ok(chart);
    };

    let bar_name = chart.y_axis.title.clone();
    let layer = HistogramLayer {
        name: &bar_name,
        density_name: DENSITY_NAME,
        color: Some(options.bar_color.clone()),
        density_color: Some(options.density_color.clone()),
        opacity: None,
    };
    push_histogram(&mut chart, layer, &values, &bins, options.show_density);
    Ok(chart)
}

/// One translucent histogram (and density curve) per stratum, overlaid on
/// shared bins.
pub fn build_stratified_histogram(
    data: &Dataset,
    source: &HistogramSource,
    strata_column: &str,
    options: &HistogramOptions,
) -> Result<ChartSpec> {
    let mut required = histogram_columns(source, options);
    required.push(strata_column);
    require_columns(data, &required)?;
    check_bin_size(options)?;

    let mut chart = frame(&options.layout, "", source.axis_title(), PATIENTS_TITLE, (800, 400));
    chart.grouping = Some(Grouping::Overlay);
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let kept = kept_records(data, options)?;
    let values = histogram_values(&kept, source, &mut chart)?;
    let strata_labels = kept.labels(strata_column)?;

    let mut by_stratum: HashMap<String, Vec<f64>> = HashMap::new();
    let mut missing_stratum = 0;
    for (label, value) in strata_labels.into_iter().zip(values) {
        match (label, value) {
            (Some(label), Some(v)) => by_stratum.entry(label).or_default().push(v),
            (None, Some(_)) => missing_stratum += 1,
            (_, None) => {}
        }
    }
    warn_missing(&mut chart, strata_column, missing_stratum);

    let strata: Vec<String> = match &options.strata {
        Some(order) => {
            let mut listed: Vec<String> = Vec::new();
            for s in order.labels() {
                if by_stratum.contains_key(s) && !listed.contains(s) {
                    listed.push(s.clone());
                }
            }
            listed
        }
        None => {
            let mut present: Vec<String> = by_stratum.keys().cloned().collect();
            natural_sort(&mut present);
            let skip = present.len().saturating_sub(options.max_strata);
            present.split_off(skip)
        }
    };
    if strata.len() < 2 {
        chart.warnings.push(Warning::TooFewStrata {
            column: strata_column.to_string(),
            found: strata.len(),
        });
        return Ok(chart);
    }

    let pooled: Vec<f64> = strata.iter().flat_map(|s| by_stratum[s].iter().copied()).collect();
    let cap = quantile_cap(&pooled, options.percentile_limit).unwrap_or(f64::INFINITY);
    let kept_pooled: Vec<f64> = pooled.into_iter().filter(|&v| v <= cap).collect();
    let Some(bins) = Bins::covering(&kept_pooled, options.bin_size) else {
        return Ok(chart);
    };

    let colors = options.palette.resolve(&strata, None);
    for (stratum, color) in strata.iter().zip(colors) {
        let values: Vec<f64> = by_stratum[stratum].iter().copied().filter(|&v| v <= cap).collect();
        let density_name = format!("{} ({})", stratum, DENSITY_NAME.to_lowercase());
        let layer = HistogramLayer {
            name: stratum,
            density_name: &density_name,
            color: color.clone(),
            density_color: color,
            opacity: Some(options.opacity),
        };
        push_histogram(&mut chart, layer, &values, &bins, options.show_density);
    }
    Ok(chart)
}

/// Columns holding yes / no answers, in dataset order: any column with at
/// least one cell equal to either answer, minus the excluded prefixes.
pub fn prophylaxis_columns(data: &Dataset, options: &ProphylaxisOptions) -> Vec<String> {
    let yes = options.yes_value.trim();
    let no = options.no_value.trim();
    data.headers()
        .iter()
        .enumerate()
        .filter(|(_, h)| !options.excluded_prefixes.iter().any(|p| h.starts_with(p.as_str())))
        .filter(|(idx, _)| {
            data.rows().iter().any(|row| {
                row[*idx]
                    .label()
                    .is_some_and(|l| l.trim() == yes || l.trim() == no)
            })
        })
        .map(|(_, h)| h.clone())
        .collect()
}

/// Percentage of yes answers among answered records, one bar per column.
/// With no `columns` given, they are detected with [`prophylaxis_columns`].
pub fn build_prophylaxis_bar(data: &Dataset, columns: &[String], options: &ProphylaxisOptions) -> Result<ChartSpec> {
    let names: Vec<&str> = columns.iter().map(String::as_str).collect();
    require_columns(data, &names)?;
    let fmt = NumberFormat::parse(&options.value_format)?;

    let mut chart = frame(&options.layout, "", "Traitement", PROPORTION_TITLE, (800, 400));
    chart.show_legend = false;
    chart.y_axis.range = Some((0.0, 100.0));
    if data.is_empty() {
        chart.warnings.push(Warning::EmptyInput);
        return Ok(chart);
    }

    let columns = if columns.is_empty() {
        prophylaxis_columns(data, options)
    } else {
        columns.to_vec()
    };
    if columns.is_empty() {
        chart.warnings.push(Warning::NoAnswerColumns {
            yes: options.yes_value.clone(),
            no: options.no_value.clone(),
        });
        return Ok(chart);
    }

    let yes_value = options.yes_value.trim();
    let no_value = options.no_value.trim();
    let mut bars: Vec<(String, f64, usize)> = Vec::with_capacity(columns.len());
    for column in columns {
        let answers = data.labels(&column)?;
        let yes = answers.iter().flatten().filter(|a| a.trim() == yes_value).count();
        let no = answers.iter().flatten().filter(|a| a.trim() == no_value).count();
        let pct = shares(&[yes, no])[0];
        bars.push((column, pct, yes));
    }
    if options.sort_descending {
        bars.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    let x: Vec<String> = bars.iter().map(|b| b.0.clone()).collect();
    let pcts: Vec<f64> = bars.iter().map(|b| b.1).collect();
    let counts: Vec<usize> = bars.iter().map(|b| b.2).collect();
    let text = options.show_values.then(|| share_labels(&pcts, &counts, &fmt));
    let name = chart.y_axis.title.clone();
    chart.series.push(bar_series(
        &name,
        x,
        pcts,
        text,
        BarStyle {
            color: Some(options.bar_color.clone()),
            text_color: Some(options.text_color.clone()),
            text_position: TextPosition::Inside,
            opacity: None,
        },
    ));
    Ok(chart)
}
