use serde::{Deserialize, Serialize};

use crate::error::Warning;

// =============================================================================
// Chart specification
// =============================================================================

/// Renderer-agnostic description of a chart: what to draw, not how.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub series: Vec<Series>,
    /// Category axis.
    pub x_axis: Axis,
    /// Value axis.
    pub y_axis: Axis,
    /// Independent value axis drawn on the right (cumulative lines).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y2_axis: Option<Axis>,
    /// How series sharing a category are laid out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouping: Option<Grouping>,
    /// Horizontal charts draw the category axis vertically.
    pub orientation: Orientation,
    pub show_legend: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl ChartSpec {
    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Axis {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    /// Tick label rotation in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_angle: Option<i32>,
}

impl Axis {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Stack,
    Group,
    /// Series drawn over each other, usually translucent.
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

// =============================================================================
// Series
// =============================================================================

/// One drawable primitive sequence. `x` holds category labels and `y` the
/// measured values, index-aligned (and aligned with `text` when present).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub x: Vec<String>,
    pub y: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    pub y_axis: AxisRef,
    #[serde(flatten)]
    pub style: SeriesStyle,
}

impl Series {
    pub fn kind(&self) -> SeriesKind {
        match self.style {
            SeriesStyle::Bar(_) => SeriesKind::Bar,
            SeriesStyle::Line(_) => SeriesKind::Line,
            SeriesStyle::Box(_) => SeriesKind::Box,
        }
    }

    pub fn color(&self) -> Option<&str> {
        match &self.style {
            SeriesStyle::Bar(s) => s.color.as_deref(),
            SeriesStyle::Line(s) => s.color.as_deref(),
            SeriesStyle::Box(s) => s.color.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesKind {
    Bar,
    Line,
    Box,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisRef {
    #[default]
    Y,
    Y2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeriesStyle {
    Bar(BarStyle),
    Line(LineStyle),
    Box(BoxStyle),
}

/// Style configuration for bar series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarStyle {
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub text_position: TextPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

/// Style configuration for line series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: Option<String>,
    pub width: f64,
    pub marker_size: f64,
    pub text_position: TextPosition,
}

/// Style configuration for box series. Quartiles and outliers are left to
/// the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStyle {
    pub color: Option<String>,
    pub show_points: bool,
    pub point_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextPosition {
    #[default]
    Auto,
    Inside,
    Outside,
    TopCenter,
}
