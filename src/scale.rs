use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// How categories are ordered when no explicit order covers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySort {
    /// Numeric ascending if every label is a number, else lexicographic.
    #[default]
    Natural,
    /// Most frequent first, ties in natural order.
    Frequency,
}

/// Explicit ordering of category labels for a categorical axis.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct CategoryOrder(Vec<String>);

impl CategoryOrder {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Listed labels first (present ones only, unless `keep_absent`), then the
    /// present-but-unlisted categories in natural order. Never duplicates.
    pub fn apply(&self, present: &[String], keep_absent: bool) -> Vec<String> {
        let present_set: HashSet<&String> = present.iter().collect();
        let mut seen: HashSet<&String> = HashSet::new();
        let mut ordered = Vec::with_capacity(present.len());

        for label in &self.0 {
            if (keep_absent || present_set.contains(label)) && seen.insert(label) {
                ordered.push(label.clone());
            }
        }

        let mut rest: Vec<String> = present
            .iter()
            .filter(|c| !seen.contains(c))
            .cloned()
            .collect();
        natural_sort(&mut rest);
        rest.dedup();
        ordered.extend(rest);
        ordered
    }
}

/// Sort labels numerically when all of them parse as numbers, else as strings.
pub fn natural_sort(categories: &mut [String]) {
    let numeric: Option<Vec<f64>> = categories.iter().map(|s| s.trim().parse::<f64>().ok()).collect();
    match numeric {
        Some(values) => {
            let mut pairs: Vec<(f64, String)> = values.into_iter().zip(categories.iter().cloned()).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            for (slot, (_, label)) in categories.iter_mut().zip(pairs) {
                *slot = label;
            }
        }
        None => categories.sort(),
    }
}

/// Final order of the distinct `present` categories for one axis.
/// `counts` is only consulted for frequency sorting.
pub fn order_categories(
    present: &[String],
    counts: &HashMap<String, usize>,
    order: Option<&CategoryOrder>,
    sort: CategorySort,
    keep_absent: bool,
) -> Vec<String> {
    if let Some(order) = order {
        return order.apply(present, keep_absent);
    }

    let mut categories: Vec<String> = present.to_vec();
    natural_sort(&mut categories);
    categories.dedup();
    if sort == CategorySort::Frequency {
        // Stable sort keeps natural order between equal counts
        categories.sort_by(|a, b| {
            let ca = counts.get(a).copied().unwrap_or(0);
            let cb = counts.get(b).copied().unwrap_or(0);
            cb.cmp(&ca)
        });
    }
    categories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_natural_sort_numeric() {
        let mut c = cats(&["10", "9", "2021", "1.5"]);
        natural_sort(&mut c);
        assert_eq!(c, cats(&["1.5", "9", "10", "2021"]));
    }

    #[test]
    fn test_natural_sort_lexicographic() {
        let mut c = cats(&["MDS", "AML", "10", "ALL"]);
        natural_sort(&mut c);
        assert_eq!(c, cats(&["10", "ALL", "AML", "MDS"]));
    }

    #[test]
    fn test_order_appends_unlisted_categories() {
        let order = CategoryOrder::new(["18-39", "18-"]);
        let present = cats(&["40-64", "18-", "18-39", "65-74"]);
        assert_eq!(order.apply(&present, false), cats(&["18-39", "18-", "40-64", "65-74"]));
    }

    #[test]
    fn test_order_skips_absent_and_duplicates() {
        let order = CategoryOrder::new(["b", "zzz", "b", "a"]);
        let present = cats(&["a", "b", "c"]);
        assert_eq!(order.apply(&present, false), cats(&["b", "a", "c"]));
        assert_eq!(order.apply(&present, true), cats(&["b", "zzz", "a", "c"]));
    }

    #[test]
    fn test_frequency_sort_breaks_ties_naturally() {
        let present = cats(&["c", "a", "b"]);
        let counts: HashMap<String, usize> =
            [("a", 1), ("b", 3), ("c", 1)].iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let ordered = order_categories(&present, &counts, None, CategorySort::Frequency, false);
        assert_eq!(ordered, cats(&["b", "a", "c"]));
    }

    #[test]
    fn test_explicit_order_wins_over_sort() {
        let present = cats(&["a", "b"]);
        let order = CategoryOrder::new(["b"]);
        let ordered = order_categories(&present, &HashMap::new(), Some(&order), CategorySort::Frequency, false);
        assert_eq!(ordered, cats(&["b", "a"]));
    }
}
