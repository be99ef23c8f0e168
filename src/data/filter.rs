use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use super::model::{CellValue, Dataset, Record};
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Filter selection: at most one selected value per field
// ---------------------------------------------------------------------------

/// What a single filter control asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// No constraint on the field.
    Any,
    /// Keep only records whose value equals this one exactly.
    Equals(String),
}

/// Field name → selected value.  Fields absent from the map are unconstrained.
///
/// A selection is rebuilt on every control change and never mutated while a
/// computation is using it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    constraints: BTreeMap<String, String>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set) with an equality constraint.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, Constraint::Equals(value.into()));
        self
    }

    pub fn set(&mut self, field: impl Into<String>, constraint: Constraint) {
        let field = field.into();
        match constraint {
            Constraint::Any => {
                self.constraints.remove(&field);
            }
            Constraint::Equals(value) => {
                self.constraints.insert(field, value);
            }
        }
    }

    pub fn get(&self, field: &str) -> Constraint {
        self.constraints
            .get(field)
            .map_or(Constraint::Any, |v| Constraint::Equals(v.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.constraints.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Filtered view: row indices into a borrowed dataset
// ---------------------------------------------------------------------------

/// The records of a dataset that satisfy a [`FilterSelection`].
///
/// An empty view is a normal outcome, not an error.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    dataset: &'a Dataset,
    rows: Cow<'a, [usize]>,
}

impl<'a> FilteredView<'a> {
    /// View over every record, in dataset order.
    pub fn all(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            rows: Cow::Owned((0..dataset.len()).collect()),
        }
    }

    /// Re-borrow rows that an earlier [`apply`] produced over the same
    /// dataset (the session's memoized rows).  Panics on an index outside
    /// the dataset.
    pub(crate) fn from_rows(dataset: &'a Dataset, rows: &'a [usize]) -> Self {
        assert!(
            rows.iter().all(|&i| i < dataset.len()),
            "row index out of range for a dataset of {} records",
            dataset.len()
        );
        Self {
            dataset,
            rows: Cow::Borrowed(rows),
        }
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Indices into [`Dataset::records`].
    pub fn row_indices(&self) -> &[usize] {
        &self.rows
    }

    pub fn into_row_indices(self) -> Vec<usize> {
        self.rows.into_owned()
    }

    pub fn records(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let dataset: &'a Dataset = self.dataset;
        let records = &dataset.records;
        self.rows.iter().map(move |&i| &records[i])
    }

    /// Values of column `idx` for every record in the view.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &'a CellValue> + '_ {
        self.records().map(move |rec| rec.get(idx))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Return the records that pass every constraint in `selection`.
///
/// Constraints compose with AND; each is an exact string match on the
/// normalised value.  An empty selection keeps every record.
pub fn apply<'a>(
    dataset: &'a Dataset,
    selection: &FilterSelection,
) -> Result<FilteredView<'a>, QueryError> {
    let constraints = selection
        .iter()
        .map(|(field, value)| dataset.require_column(field).map(|idx| (idx, value)))
        .collect::<Result<Vec<_>, QueryError>>()?;

    if constraints.is_empty() {
        return Ok(FilteredView::all(dataset));
    }

    let rows: Vec<usize> = dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            constraints
                .iter()
                .all(|&(idx, value)| rec.get(idx).matches(value))
        })
        .map(|(i, _)| i)
        .collect();

    Ok(FilteredView {
        dataset,
        rows: Cow::Owned(rows),
    })
}

// ---------------------------------------------------------------------------
// Filter control options
// ---------------------------------------------------------------------------

/// One entry of a filter control.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterOption {
    All,
    Value(String),
}

impl FilterOption {
    pub fn to_constraint(&self) -> Constraint {
        match self {
            FilterOption::All => Constraint::Any,
            FilterOption::Value(v) => Constraint::Equals(v.clone()),
        }
    }
}

/// `All` followed by the sorted distinct values of `field` over the whole
/// (unfiltered) dataset.
pub fn filter_options(dataset: &Dataset, field: &str) -> Result<Vec<FilterOption>, QueryError> {
    let idx = dataset.require_column(field)?;
    let distinct: BTreeSet<&CellValue> = dataset.records.iter().map(|r| r.get(idx)).collect();

    let mut options = Vec::with_capacity(distinct.len() + 1);
    options.push(FilterOption::All);
    options.extend(distinct.into_iter().map(|v| FilterOption::Value(v.to_string())));
    Ok(options)
}
