use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::dataset::{Dataset, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    #[default]
    Contains,
    Exact,
    StartsWith,
}

impl MatchMode {
    pub fn next(self) -> Self {
        match self {
            MatchMode::Contains => MatchMode::Exact,
            MatchMode::Exact => MatchMode::StartsWith,
            MatchMode::StartsWith => MatchMode::Contains,
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMode::Contains => "contains",
            MatchMode::Exact => "exact",
            MatchMode::StartsWith => "starts with",
        };
        f.write_str(s)
    }
}

/// Per column filter. An empty pattern matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPredicate {
    pub match_mode: MatchMode,
    pub case_sensitive: bool,
    pub pattern: String,
}

impl FilterPredicate {
    pub fn new(match_mode: MatchMode, case_sensitive: bool, pattern: impl Into<String>) -> Self {
        FilterPredicate {
            match_mode,
            case_sensitive,
            pattern: pattern.into(),
        }
    }

    pub fn contains(pattern: impl Into<String>) -> Self {
        Self::new(MatchMode::Contains, false, pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn matches(&self, value: &str) -> bool {
        if self.pattern.is_empty() {
            return true;
        }
        if self.case_sensitive {
            Self::apply(self.match_mode, value, &self.pattern)
        } else {
            Self::apply(
                self.match_mode,
                &value.to_lowercase(),
                &self.pattern.to_lowercase(),
            )
        }
    }

    fn apply(mode: MatchMode, value: &str, pattern: &str) -> bool {
        match mode {
            MatchMode::Contains => value.contains(pattern),
            MatchMode::Exact => value == pattern,
            MatchMode::StartsWith => value.starts_with(pattern),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub field: String,
    pub direction: SortDirection,
}

/// Column selection, filters and sort. Transitions return a new value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewConfig {
    selected: Vec<String>,
    filters: HashMap<String, FilterPredicate>,
    sort: Option<SortDirective>,
}

impl ViewConfig {
    /// All fields selected in dataset order, nothing filtered or sorted.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        ViewConfig::with_selection(dataset.fields().to_vec())
    }

    pub fn with_selection(selected: Vec<String>) -> Self {
        ViewConfig {
            selected,
            ..ViewConfig::default()
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn is_selected(&self, field: &str) -> bool {
        self.selected.iter().any(|f| f == field)
    }

    pub fn sort(&self) -> Option<&SortDirective> {
        self.sort.as_ref()
    }

    pub fn filter(&self, field: &str) -> Option<&FilterPredicate> {
        self.filters.get(field)
    }

    /// Current predicate of `field`, or the default one when none is set.
    pub fn filter_for(&self, field: &str) -> FilterPredicate {
        self.filters.get(field).cloned().unwrap_or_default()
    }

    /// Adds `field` at the end of the selection or removes it.
    pub fn toggle_column(&self, field: &str) -> Self {
        let mut next = self.clone();
        if let Some(pos) = next.selected.iter().position(|f| f == field) {
            next.selected.remove(pos);
        } else {
            next.selected.push(field.to_string());
        }
        next
    }

    pub fn set_filter(&self, field: &str, predicate: FilterPredicate) -> Self {
        let mut next = self.clone();
        if predicate.is_empty() {
            next.filters.remove(field);
        } else {
            next.filters.insert(field.to_string(), predicate);
        }
        next
    }

    /// Replace only the pattern. Mode and case stay, even when the pattern is cleared.
    pub fn with_filter_pattern(&self, field: &str, pattern: &str) -> Self {
        let mut predicate = self.filter_for(field);
        predicate.pattern = pattern.to_string();
        self.keep_filter(field, predicate)
    }

    pub fn cycle_match_mode(&self, field: &str) -> Self {
        let mut predicate = self.filter_for(field);
        predicate.match_mode = predicate.match_mode.next();
        self.keep_filter(field, predicate)
    }

    pub fn toggle_case_sensitive(&self, field: &str) -> Self {
        let mut predicate = self.filter_for(field);
        predicate.case_sensitive = !predicate.case_sensitive;
        self.keep_filter(field, predicate)
    }

    // Mode and case are kept even while the pattern is empty, like the pattern box in the ui.
    fn keep_filter(&self, field: &str, predicate: FilterPredicate) -> Self {
        let mut next = self.clone();
        next.filters.insert(field.to_string(), predicate);
        next
    }

    /// ascending -> descending -> none. Another field starts over at ascending.
    pub fn cycle_sort(&self, field: &str) -> Self {
        let mut next = self.clone();
        next.sort = match &self.sort {
            Some(SortDirective {
                field: f,
                direction: SortDirection::Ascending,
            }) if f == field => Some(SortDirective {
                field: field.to_string(),
                direction: SortDirection::Descending,
            }),
            Some(SortDirective {
                field: f,
                direction: SortDirection::Descending,
            }) if f == field => None,
            _ => Some(SortDirective {
                field: field.to_string(),
                direction: SortDirection::Ascending,
            }),
        };
        next
    }

    // Filters of hidden columns are kept but ignored.
    fn active_filters(&self) -> Vec<(&str, &FilterPredicate)> {
        self.selected
            .iter()
            .filter_map(|f| {
                self.filters
                    .get(f)
                    .filter(|p| !p.is_empty())
                    .map(|p| (f.as_str(), p))
            })
            .collect()
    }

    fn active_sort(&self) -> Option<&SortDirective> {
        self.sort.as_ref().filter(|s| self.is_selected(&s.field))
    }
}

/// Filter, then sort. Returns indices into `dataset.records()`.
pub fn compute_view(dataset: &Dataset, config: &ViewConfig) -> Vec<usize> {
    let filters = config.active_filters();
    let records = dataset.records();

    let mut rows: Vec<usize> = (0..records.len())
        .filter(|&idx| passes(&records[idx], &filters))
        .collect();

    if let Some(sort) = config.active_sort() {
        let field = sort.field.as_str();
        // sort_by is stable, equal keys keep their filtered order.
        rows.sort_by(|&a, &b| {
            let ord = compare(&records[a], &records[b], field);
            match sort.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }

    debug!(
        "Computed view: {} of {} rows, {} active filters, sort {:?}",
        rows.len(),
        records.len(),
        filters.len(),
        config.active_sort()
    );
    rows
}

fn passes(record: &Record, filters: &[(&str, &FilterPredicate)]) -> bool {
    filters
        .iter()
        .all(|(field, predicate)| predicate.matches(record.get(field)))
}

fn compare(a: &Record, b: &Record, field: &str) -> Ordering {
    a.get(field).cmp(b.get(field))
}
