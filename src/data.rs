use crate::error::{DataError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

/// Accepted date layouts, tried in order. Datetimes keep their date part.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// A single cell of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Missing,
}

impl Value {
    /// Build a cell from raw text; blank text is a missing value.
    pub fn from_text(s: &str) -> Self {
        if s.trim().is_empty() {
            Value::Missing
        } else {
            Value::Text(s.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Category label of this cell, `None` when missing.
    /// Integral numbers drop their fractional part so `2020.0` reads `2020`.
    pub fn label(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(number_label(*n)),
            Value::Missing => None,
        }
    }

    /// Numeric coercion: `None` for missing or unparseable cells.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            Value::Missing => None,
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub(crate) fn number_label(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Patient-level tabular data: ordered rows over a fixed set of columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(DataError::InvalidInput(format!(
                "row {} has {} cells, expected {}",
                idx,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Create a Dataset from CSV text already split into cells
    pub fn from_csv(csv: crate::csv_reader::CsvData) -> Self {
        let rows = csv
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| Value::from_text(cell)).collect())
            .collect();
        Self {
            headers: csv.headers,
            rows,
        }
    }

    /// Create a Dataset from a JSON Array of Objects.
    /// Columns are the union of all object keys, in order of first appearance.
    pub fn from_json(value: &JsonValue) -> Result<Self> {
        let array = value.as_array().ok_or_else(|| {
            DataError::InvalidInput("input data must be a JSON array of objects".to_string())
        })?;

        let mut headers: Vec<String> = Vec::new();
        for item in array {
            let obj = item.as_object().ok_or_else(|| {
                DataError::InvalidInput("items in array must be objects".to_string())
            })?;
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(array.len());
        for item in array {
            // Checked above
            let Some(obj) = item.as_object() else { continue };
            let mut row = Vec::with_capacity(headers.len());
            for header in &headers {
                let cell = match obj.get(header) {
                    Some(JsonValue::String(s)) => Value::from_text(s),
                    Some(JsonValue::Number(n)) => n.as_f64().map(Value::Number).unwrap_or(Value::Missing),
                    Some(JsonValue::Bool(b)) => Value::Text(b.to_string()),
                    Some(JsonValue::Null) | None => Value::Missing,
                    _ => {
                        return Err(DataError::InvalidInput(format!(
                            "unsupported value type for field '{}'",
                            header
                        )))
                    }
                };
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact match first, then ASCII case-insensitive.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
            .ok_or_else(|| DataError::MissingColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_ok()
    }

    /// Category labels of a column, `None` for missing cells.
    pub fn labels(&self, column: &str) -> Result<Vec<Option<String>>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| row[idx].label()).collect())
    }

    /// Numeric values of a column, `None` for missing cells.
    /// Fails on the first cell that is present but not a number.
    pub fn numbers(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let cell = &row[idx];
                if cell.is_missing() {
                    return Ok(None);
                }
                cell.as_number().map(Some).ok_or_else(|| DataError::NonNumeric {
                    column: self.headers[idx].clone(),
                    row: i,
                    value: cell.label().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Calendar dates of a column, `None` for missing cells.
    /// Fails on the first cell that is present but not a date.
    pub fn dates(&self, column: &str) -> Result<Vec<Option<NaiveDate>>> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| match &row[idx] {
                Value::Missing => Ok(None),
                cell => {
                    let text = cell.label().unwrap_or_default();
                    parse_date(&text).map(Some).ok_or_else(|| DataError::NonDate {
                        column: self.headers[idx].clone(),
                        row: i,
                        value: text,
                    })
                }
            })
            .collect()
    }

    /// Copy of the dataset keeping only the records whose `column` label is
    /// one of `values`. Missing cells never match.
    pub fn filter_in(&self, column: &str, values: &[String]) -> Result<Dataset> {
        let idx = self.column_index(column)?;
        let rows = self
            .rows
            .iter()
            .filter(|row| row[idx].label().is_some_and(|label| values.contains(&label)))
            .cloned()
            .collect();
        Ok(Dataset {
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Copy of the dataset with an extra column holding shortened labels of
    /// `column`. Returns the dataset and the name of the added column.
    pub fn with_truncated_column(&self, column: &str, max_len: usize) -> Result<(Dataset, String)> {
        let idx = self.column_index(column)?;
        let name = format!("{} (truncated)", self.headers[idx]);

        let mut headers = self.headers.clone();
        let target = match headers.iter().position(|h| h == &name) {
            Some(existing) => existing,
            None => {
                headers.push(name.clone());
                headers.len() - 1
            }
        };

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                let cell = match row[idx].label() {
                    Some(label) => Value::Text(truncate_label(&label, max_len)),
                    None => Value::Missing,
                };
                if target < row.len() {
                    row[target] = cell;
                } else {
                    row.push(cell);
                }
                row
            })
            .collect();

        Ok((Dataset { headers, rows }, name))
    }
}

/// Shorten a label to at most `max_len` characters, ending in `...` when cut.
pub fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        return label.to_string();
    }
    if max_len <= 3 {
        return label.chars().take(max_len).collect();
    }
    let mut out: String = label.chars().take(max_len - 3).collect();
    out.push_str("...");
    out
}
