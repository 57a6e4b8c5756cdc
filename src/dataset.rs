use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::TVError;

/// One input row. Field names are shared between records of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: HashMap<Arc<str>, String>,
}

impl Record {
    /// Value of `field`, missing fields read as the empty string.
    pub fn get(&self, field: &str) -> &str {
        self.values.get(field).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<Arc<str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A loaded table. Never mutated after construction.
#[derive(Debug, PartialEq)]
pub struct Dataset {
    fields: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>, fields: Vec<String>) -> Result<Self, TVError> {
        if records.is_empty() || fields.is_empty() {
            return Err(TVError::EmptyDataset);
        }
        Ok(Dataset { fields, records })
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolve view indices into records. Out of range indices are skipped.
    pub fn rows<'a>(&'a self, indices: &'a [usize]) -> impl Iterator<Item = &'a Record> + 'a {
        indices.iter().filter_map(|&idx| self.records.get(idx))
    }

    /// Longest value per field in characters, header included.
    pub fn max_widths(&self) -> HashMap<String, usize> {
        self.fields
            .iter()
            .map(|f| {
                let widest = self
                    .records
                    .iter()
                    .map(|r| r.get(f).chars().count())
                    .max()
                    .unwrap_or(0);
                (f.clone(), widest.max(f.chars().count()))
            })
            .collect()
    }
}

/// Holds the current dataset. A load either replaces it completely or leaves it untouched.
#[derive(Debug, Default)]
pub struct DatasetStore {
    current: Option<Arc<Dataset>>,
}

impl DatasetStore {
    pub fn load(&mut self, records: Vec<Record>, fields: Vec<String>) -> Result<Arc<Dataset>, TVError> {
        let dataset = match Dataset::new(records, fields) {
            Ok(dataset) => Arc::new(dataset),
            Err(e) => {
                warn!(
                    "Rejected load ({e}), previous dataset kept: {}",
                    self.current.is_some()
                );
                return Err(e);
            }
        };
        info!(
            "Loaded dataset with {} rows and {} columns",
            dataset.len(),
            dataset.fields().len()
        );
        self.current = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn current(&self) -> Option<&Arc<Dataset>> {
        self.current.as_ref()
    }
}
