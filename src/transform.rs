use std::collections::HashMap;

/// Per-category record counts of one categorical column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    /// Distinct labels in order of first appearance
    pub categories: Vec<String>,
    pub counts: HashMap<String, usize>,
    /// Records with no label
    pub missing: usize,
}

impl Tally {
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut tally = Tally::default();
        for label in labels {
            match label {
                Some(l) => tally.add(l),
                None => tally.missing += 1,
            }
        }
        tally
    }

    pub fn add(&mut self, label: &str) {
        let count = self.counts.entry(label.to_string()).or_insert(0);
        if *count == 0 {
            self.categories.push(label.to_string());
        }
        *count += 1;
    }

    pub fn count(&self, category: &str) -> usize {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Counts of `order`, zero for categories never seen.
    pub fn counts_in(&self, order: &[String]) -> Vec<usize> {
        order.iter().map(|c| self.count(c)).collect()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Records where both labels are present, plus the number of records
/// dropped for a missing first / second label.
pub fn complete_pairs(
    first: &[Option<String>],
    second: &[Option<String>],
) -> (Vec<(String, String)>, usize, usize) {
    let mut pairs = Vec::with_capacity(first.len());
    let mut missing_first = 0;
    let mut missing_second = 0;
    for (a, b) in first.iter().zip(second.iter()) {
        match (a, b) {
            (Some(a), Some(b)) => pairs.push((a.clone(), b.clone())),
            (None, _) => missing_first += 1,
            (_, None) => missing_second += 1,
        }
    }
    (pairs, missing_first, missing_second)
}

/// Contingency table of record counts over rows x columns.
///
/// Built as an explicit outer join: every (row, column) cell of the cross
/// product exists and starts at zero, so combinations absent from the data
/// read as zero instead of being dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossTab {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    cells: Vec<Vec<usize>>,
}

impl CrossTab {
    /// Pairs whose row or column is not listed are ignored.
    pub fn build(pairs: &[(String, String)], rows: &[String], columns: &[String]) -> Self {
        let row_idx: HashMap<&str, usize> = rows.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect();
        let col_idx: HashMap<&str, usize> = columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

        let mut cells = vec![vec![0usize; columns.len()]; rows.len()];
        for (r, c) in pairs {
            if let (Some(&i), Some(&j)) = (row_idx.get(r.as_str()), col_idx.get(c.as_str())) {
                cells[i][j] += 1;
            }
        }

        Self {
            rows: rows.to_vec(),
            columns: columns.to_vec(),
            cells,
        }
    }

    pub fn count(&self, row: usize, column: usize) -> usize {
        self.cells[row][column]
    }

    /// Counts of one column down all rows.
    pub fn column_counts(&self, column: usize) -> Vec<usize> {
        self.cells.iter().map(|row| row[column]).collect()
    }

    pub fn row_totals(&self) -> Vec<usize> {
        self.cells.iter().map(|row| row.iter().sum()).collect()
    }

    /// Each cell as a percentage of its row total. Rows without records are
    /// all zero.
    pub fn row_percentages(&self) -> Vec<Vec<f64>> {
        self.cells
            .iter()
            .map(|row| {
                let total: usize = row.iter().sum();
                row.iter()
                    .map(|&n| if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 })
                    .collect()
            })
            .collect()
    }
}

/// Running total, in order.
pub fn cumulative(counts: &[usize]) -> Vec<usize> {
    counts
        .iter()
        .scan(0usize, |acc, &n| {
            *acc += n;
            Some(*acc)
        })
        .collect()
}

/// Each count as a percentage of the sum; all zero when the sum is zero.
pub fn shares(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    counts
        .iter()
        .map(|&n| if total == 0 { 0.0 } else { n as f64 / total as f64 * 100.0 })
        .collect()
}

/// Numeric values grouped by category label, keeping record order inside
/// each group. Records missing either side are counted and skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Groups {
    pub categories: Vec<String>,
    pub values: HashMap<String, Vec<f64>>,
    pub missing_key: usize,
    pub missing_value: usize,
}

impl Groups {
    pub fn build(keys: &[Option<String>], values: &[Option<f64>]) -> Self {
        let mut groups = Groups::default();
        for (key, value) in keys.iter().zip(values.iter()) {
            match (key, value) {
                (Some(k), Some(v)) => {
                    if !groups.values.contains_key(k) {
                        groups.categories.push(k.clone());
                    }
                    groups.values.entry(k.clone()).or_default().push(*v);
                }
                (None, _) => groups.missing_key += 1,
                (_, None) => groups.missing_value += 1,
            }
        }
        groups
    }

    pub fn counts(&self) -> HashMap<String, usize> {
        self.values.iter().map(|(k, v)| (k.clone(), v.len())).collect()
    }

    pub fn get(&self, category: &str) -> &[f64] {
        self.values.get(category).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Linear interpolation between closest ranks; `p` in [0, 1].
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;
    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

/// Silverman's rule of thumb for bandwidth selection
pub fn silverman_bandwidth(data: &[f64]) -> f64 {
    let n = data.len() as f64;
    if n < 2.0 {
        return 1.0;
    }

    let mean = data.iter().sum::<f64>() / n;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    let mut sorted = data.to_vec();
    sorted.sort_by(f64::total_cmp);
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);

    // h = 0.9 * min(std, IQR/1.34) * n^(-1/5)
    let scale = if iqr > 0.0 { std_dev.min(iqr / 1.34) } else { std_dev };
    if scale <= 0.0 {
        return 1.0;
    }
    0.9 * scale * n.powf(-0.2)
}

fn gaussian_kernel(u: f64) -> f64 {
    const SQRT_2PI: f64 = 2.5066282746310002;
    (-0.5 * u * u).exp() / SQRT_2PI
}

/// Gaussian kernel density of `data` at each point of `grid`.
pub fn kde(data: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
    let n = data.len() as f64;
    if n == 0.0 || bandwidth <= 0.0 {
        return vec![0.0; grid.len()];
    }
    grid.iter()
        .map(|&x| data.iter().map(|&xi| gaussian_kernel((x - xi) / bandwidth)).sum::<f64>() / (n * bandwidth))
        .collect()
}

/// Fixed-width histogram bins aligned on multiples of the width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bins {
    pub start: f64,
    pub width: f64,
    pub count: usize,
}

impl Bins {
    /// Smallest run of bins covering every value. `None` without values or
    /// with a width that is not positive.
    pub fn covering(values: &[f64], width: f64) -> Option<Self> {
        if values.is_empty() || width.is_nan() || width <= 0.0 {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let start = (min / width).floor() * width;
        let count = ((max - start) / width).floor() as usize + 1;
        Some(Self { start, width, count })
    }

    pub fn centers(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| self.start + (i as f64 + 0.5) * self.width)
            .collect()
    }

    /// Values per bin; values outside the bins are ignored.
    pub fn counts(&self, values: &[f64]) -> Vec<usize> {
        let mut counts = vec![0usize; self.count];
        for &v in values {
            let idx = ((v - self.start) / self.width).floor();
            if idx >= 0.0 && (idx as usize) < self.count {
                counts[idx as usize] += 1;
            }
        }
        counts
    }
}
