// Runtime executor for the chart DSL

use crate::builder::{
    build_boxplot, build_count_bar, build_cumulative_bar, build_grouped_bar_with_cumulative,
    build_histogram_with_density, build_normalized_stacked_bar, build_prophylaxis_bar, build_simple_bar,
    build_simple_normalized_bar, build_stacked_bar, build_stratified_histogram, build_yes_no_bar,
    LayoutOptions,
};
use crate::data::{truncate_label, Dataset};
use crate::error::Result;
use crate::ir::ChartSpec;
use crate::palette::color_map;
use crate::parser::ast::{ChartCommand, ChartRequest, Filter, Labels, Size};
use crate::scale::CategoryOrder;
use std::borrow::Cow;

/// A dataset without columns is empty input; nothing can be looked up in it.
fn has_no_columns(data: &Dataset) -> bool {
    data.headers().is_empty() && data.is_empty()
}

/// Keep the records every filter lets through. A filter without values
/// keeps everything.
fn apply_filters<'a>(data: &'a Dataset, filters: &[Filter]) -> Result<Cow<'a, Dataset>> {
    let mut data = Cow::Borrowed(data);
    if has_no_columns(&data) {
        return Ok(data);
    }
    for filter in filters.iter().filter(|f| !f.values.is_empty()) {
        data = Cow::Owned(data.filter_in(&filter.column, &filter.values)?);
    }
    Ok(data)
}

/// Colors fixed by the sorted values of `column`, for charts with a palette.
fn apply_colors_from(command: &mut ChartCommand, data: &Dataset, column: &str) -> Result<()> {
    if has_no_columns(data) {
        return Ok(());
    }
    match command {
        ChartCommand::Stacked { options, .. } => {
            options.color_map = Some(color_map(data, column, &options.palette)?);
        }
        ChartCommand::Grouped { options, .. } => {
            options.color_map = Some(color_map(data, column, &options.palette)?);
        }
        ChartCommand::Boxplot { options, .. } => {
            let palette = options.palette.clone().unwrap_or_default();
            options.color_map = Some(color_map(data, column, &palette)?);
        }
        _ => {}
    }
    Ok(())
}

/// Build the chart a parsed request describes
pub fn render_chart(request: &ChartRequest, data: &Dataset) -> Result<ChartSpec> {
    let mut command = request.command.clone();
    let labels = request.labels.clone().unwrap_or_default();
    let size = request.size.unwrap_or_default();

    let data = apply_filters(data, &request.filters)?;
    if let Some(column) = request.colors_from.as_deref() {
        apply_colors_from(&mut command, &data, column)?;
    }

    // Truncated labels live in a derived column; the chart reads that instead
    let data = match (request.truncate, command.x_column()) {
        (Some(max_len), Some(x)) if !has_no_columns(&data) => {
            let (derived, column) = data.with_truncated_column(x, max_len)?;
            command.set_x_column(column);
            if let Some(Some(order)) = command.x_order_mut() {
                *order = CategoryOrder::new(order.labels().iter().map(|l| truncate_label(l, max_len)));
            }
            Cow::Owned(derived)
        }
        _ => data,
    };

    match command {
        ChartCommand::Bar { x, y, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_simple_bar(&data, &x, &y, &options)
        }
        ChartCommand::Count { x, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_count_bar(&data, &x, &options)
        }
        ChartCommand::Share { x, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_simple_normalized_bar(&data, &x, &options)
        }
        ChartCommand::Cumulative { x, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            if labels.y2.is_some() {
                options.line_y_axis_title = labels.y2.clone();
            }
            build_cumulative_bar(&data, &x, &options)
        }
        ChartCommand::Stacked {
            x,
            stack,
            normalize,
            mut options,
        } => {
            apply_layout(&mut options.layout, &labels, size);
            if normalize {
                build_normalized_stacked_bar(&data, &x, &stack, &options)
            } else {
                build_stacked_bar(&data, &x, &stack, &options)
            }
        }
        ChartCommand::Grouped { x, group, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            if labels.y2.is_some() {
                options.line_y_axis_title = labels.y2.clone();
            }
            build_grouped_bar_with_cumulative(&data, &x, &group, &options)
        }
        ChartCommand::Boxplot { x, y, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_boxplot(&data, &x, &y, &options)
        }
        ChartCommand::YesNo { columns, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_yes_no_bar(&data, &columns, &options)
        }
        ChartCommand::Histogram {
            source,
            by,
            mut options,
        } => {
            apply_layout(&mut options.layout, &labels, size);
            match by {
                Some(strata) => build_stratified_histogram(&data, &source, &strata, &options),
                None => build_histogram_with_density(&data, &source, &options),
            }
        }
        ChartCommand::Prophylaxis { columns, mut options } => {
            apply_layout(&mut options.layout, &labels, size);
            build_prophylaxis_bar(&data, &columns, &options)
        }
    }
}

/// `labs` wins over a command's own title; `size` fills the dimensions.
fn apply_layout(layout: &mut LayoutOptions, labels: &Labels, size: Size) {
    if labels.title.is_some() {
        layout.title = labels.title.clone();
    }
    if labels.x.is_some() {
        layout.x_axis_title = labels.x.clone();
    }
    if labels.y.is_some() {
        layout.y_axis_title = labels.y.clone();
    }
    if size.width.is_some() {
        layout.width = size.width;
    }
    if size.height.is_some() {
        layout.height = size.height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DataError, Warning};
    use crate::ir::SeriesKind;
    use crate::parser::parse_chart_request;
    use serde_json::json;

    fn patients() -> Dataset {
        Dataset::from_json(&json!([
            {"Year": 2021, "Sex": "M", "Main Diagnosis": "Acute myeloid leukemia"},
            {"Year": 2020, "Sex": "F", "Main Diagnosis": "Myelodysplastic syndrome"},
            {"Year": 2021, "Sex": "F", "Main Diagnosis": "Acute myeloid leukemia"},
        ]))
        .unwrap()
    }

    fn render(dsl: &str) -> Result<ChartSpec> {
        let request = parse_chart_request(dsl).unwrap();
        render_chart(&request, &patients())
    }

    #[test]
    fn test_render_cumulative_with_labels() {
        let chart = render(r#"cumulative(x: Year) | labs(title: "Greffes", y2: "Cumul") | size(width: 900)"#).unwrap();
        assert_eq!(chart.title, "Greffes");
        assert_eq!(chart.width, 900);
        assert_eq!(chart.height, 500);
        assert_eq!(chart.y2_axis.unwrap().title, "Cumul");
        assert_eq!(chart.series[1].kind(), SeriesKind::Line);
        assert_eq!(chart.series[1].y, vec![1.0, 3.0]);
    }

    #[test]
    fn test_render_labs_overrides_command_title() {
        let chart = render(r#"count(x: Sex, title: "Own") | labs(title: "Labs", x: "Sexe")"#).unwrap();
        assert_eq!(chart.title, "Labs");
        assert_eq!(chart.x_axis.title, "Sexe");
    }

    #[test]
    fn test_render_stacked_raw_and_normalized() {
        let raw = render("stacked(x: Year, stack: Sex)").unwrap();
        assert_eq!(raw.series_named("F").unwrap().y, vec![1.0, 1.0]);
        let normalized = render("stacked(x: Year, stack: Sex, normalize: true)").unwrap();
        assert_eq!(normalized.series_named("F").unwrap().y, vec![100.0, 50.0]);
    }

    #[test]
    fn test_render_truncated_labels() {
        let chart = render(r#"count(x: "Main Diagnosis", truncate: 10)"#).unwrap();
        assert_eq!(chart.series[0].x, vec!["Acute m...", "Myelody..."]);
        assert_eq!(chart.x_axis.title, "Main Diagnosis (truncated)");
    }

    #[test]
    fn test_render_truncated_labels_keep_order() {
        let chart =
            render(r#"count(x: "Main Diagnosis", truncate: 10, order: ["Myelodysplastic syndrome"])"#).unwrap();
        assert_eq!(chart.series[0].x, vec!["Myelody...", "Acute m..."]);
    }

    #[test]
    fn test_render_truncate_on_empty_input() {
        let request = parse_chart_request("count(x: Dx, truncate: 10)").unwrap();
        let chart = render_chart(&request, &Dataset::from_json(&json!([])).unwrap()).unwrap();
        assert!(chart.series.is_empty());
        assert_eq!(chart.warnings, vec![Warning::EmptyInput]);
    }

    #[test]
    fn test_render_filter_stages() {
        let chart = render(r#"filter(column: Sex, values: ["F"]) | count(x: Year)"#).unwrap();
        assert_eq!(chart.series[0].x, vec!["2020", "2021"]);
        assert_eq!(chart.series[0].y, vec![1.0, 1.0]);

        let chart = render(r#"filter(column: Year, values: [2021]) | filter(column: Sex, values: ["M"]) | count(x: Sex)"#)
            .unwrap();
        assert_eq!(chart.series[0].x, vec!["M"]);

        let unfiltered = render("filter(column: Year) | count(x: Year)").unwrap();
        assert_eq!(unfiltered.series[0].y, vec![1.0, 2.0]);

        let err = render("filter(column: Center, values: [Lyon]) | count(x: Year)").unwrap_err();
        assert_eq!(err, DataError::MissingColumn("Center".to_string()));
    }

    #[test]
    fn test_render_colors_from_column() {
        let dsl = r#"stacked(x: Year, stack: "Main Diagnosis", stack_order: ["Myelodysplastic syndrome"])"#;
        let plain = render(dsl).unwrap();
        assert_eq!(plain.series_named("Myelodysplastic syndrome").unwrap().color(), Some("#88CCEE"));

        let dsl = r#"stacked(x: Year, stack: "Main Diagnosis", stack_order: ["Myelodysplastic syndrome"], colors_from: "Main Diagnosis")"#;
        let chart = render(dsl).unwrap();
        assert_eq!(chart.series_named("Acute myeloid leukemia").unwrap().color(), Some("#88CCEE"));
        assert_eq!(chart.series_named("Myelodysplastic syndrome").unwrap().color(), Some("#CC6677"));
    }

    #[test]
    fn test_render_histogram() {
        let chart = render("histogram(x: Year, bin: 1, limit: false, density: false) | size(height: 300)").unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].y, vec![1.0, 2.0]);
        assert_eq!(chart.height, 300);
    }

    #[test]
    fn test_render_prophylaxis() {
        let data = Dataset::from_json(&json!([
            {"Year": 2021, "ATG": "Oui", "Methotrexate": "Non"},
            {"Year": 2022, "ATG": "Oui", "Methotrexate": "Oui"},
        ]))
        .unwrap();
        let request = parse_chart_request(r#"filter(column: Year, values: [2021]) | prophylaxis() | labs(title: "Prophylaxie")"#)
            .unwrap();
        let chart = render_chart(&request, &data).unwrap();
        assert_eq!(chart.title, "Prophylaxie");
        assert_eq!(chart.series[0].x, vec!["ATG", "Methotrexate"]);
        assert_eq!(chart.series[0].y, vec![100.0, 0.0]);
    }

    #[test]
    fn test_render_missing_column() {
        let err = render("grouped(x: Year, group: Center)").unwrap_err();
        assert_eq!(err, DataError::MissingColumn("Center".to_string()));
    }
}
