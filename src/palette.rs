use serde::Deserialize;
use std::collections::HashMap;

use crate::data::Dataset;
use crate::error::Result;
use crate::scale::natural_sort;

/// Explicit category -> color token mapping.
pub type ColorMap = HashMap<String, String>;

/// Ordered list of color tokens, assigned to categories by position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ColorPalette {
    colors: Vec<String>,
}

impl ColorPalette {
    pub fn new<S: Into<String>>(colors: impl IntoIterator<Item = S>) -> Self {
        Self {
            colors: colors.into_iter().map(Into::into).collect(),
        }
    }

    /// Color-blind safe qualitative palette (used by the dashboard pages).
    pub fn safe() -> Self {
        Self::new([
            "#88CCEE", "#CC6677", "#DDCC77", "#117733", "#332288", "#AA4499",
            "#44AA99", "#999933", "#882255", "#661100", "#6699CC", "#888888",
        ])
    }

    /// Default qualitative sequence of the charting front end.
    pub fn plotly() -> Self {
        Self::new([
            "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A",
            "#19D3F3", "#FF6692", "#B6E880", "#FF97FF", "#FECB52",
        ])
    }

    pub fn category10() -> Self {
        Self::new([
            "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
            "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
        ])
    }

    /// Look up a palette by name (case-insensitive).
    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "safe" => Some(Self::safe()),
            "plotly" => Some(Self::plotly()),
            "category10" => Some(Self::category10()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color at `index`, wrapping around the palette.
    pub fn color_at(&self, index: usize) -> Option<&str> {
        if self.colors.is_empty() {
            return None;
        }
        Some(self.colors[index % self.colors.len()].as_str())
    }

    /// Assign one color per category, by position in `categories`.
    pub fn assign_colors(&self, categories: &[String]) -> ColorMap {
        categories
            .iter()
            .enumerate()
            .filter_map(|(i, cat)| self.color_at(i).map(|c| (cat.clone(), c.to_string())))
            .collect()
    }

    /// Colors for `categories` in order: explicit map entries win, the rest
    /// cycle through the palette by position.
    pub fn resolve(&self, categories: &[String], explicit: Option<&ColorMap>) -> Vec<Option<String>> {
        categories
            .iter()
            .enumerate()
            .map(|(i, cat)| {
                explicit
                    .and_then(|m| m.get(cat).cloned())
                    .or_else(|| self.color_at(i).map(str::to_string))
            })
            .collect()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::safe()
    }
}

/// Consistent colors for one column: its distinct non-missing values in
/// natural order, mapped onto the palette.
pub fn color_map(data: &Dataset, column: &str, palette: &ColorPalette) -> Result<ColorMap> {
    let mut categories: Vec<String> = Vec::new();
    for label in data.labels(column)?.into_iter().flatten() {
        if !categories.contains(&label) {
            categories.push(label);
        }
    }
    natural_sort(&mut categories);
    Ok(palette.assign_colors(&categories))
}
