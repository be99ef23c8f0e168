use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::filter::FilteredView;
use super::model::{CellValue, Record};
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Group counts
// ---------------------------------------------------------------------------

/// One bar / slice: a category label and how many records carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub label: String,
    pub count: usize,
}

impl GroupCount {
    pub fn new(label: impl Into<String>, count: usize) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// Per-category counts of one field, largest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregationResult {
    pub field: String,
    pub groups: Vec<GroupCount>,
}

impl AggregationResult {
    pub fn new(field: impl Into<String>, groups: Vec<GroupCount>) -> Self {
        Self {
            field: field.into(),
            groups,
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupCount> {
        self.groups.iter()
    }
}

/// Count the records of `view` per distinct value of `field`.
///
/// Sorted by count, descending.  Equal counts keep the order in which the
/// values were first seen in the view.
pub fn group_count(view: &FilteredView<'_>, field: &str) -> Result<AggregationResult, QueryError> {
    let idx = view.dataset().require_column(field)?;

    let mut position: HashMap<&CellValue, usize> = HashMap::new();
    let mut groups: Vec<GroupCount> = Vec::new();
    for value in view.column(idx) {
        match position.entry(value) {
            Entry::Occupied(slot) => groups[*slot.get()].count += 1,
            Entry::Vacant(slot) => {
                slot.insert(groups.len());
                groups.push(GroupCount::new(value.to_string(), 1));
            }
        }
    }

    // stable: ties stay in first-seen order
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(AggregationResult::new(field, groups))
}

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

/// A "% of records where `field` == `value`" indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDefinition {
    pub label: String,
    pub field: String,
    pub value: String,
}

/// A computed share.  `percent` is kept at full precision.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareKpi {
    pub label: String,
    pub percent: f64,
}

/// Summary figures of a filtered view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KpiSet {
    /// Number of follow-up records.
    pub total: usize,
    /// Records left after dropping exact duplicates.  Approximates the number
    /// of patients; rows are not keyed by a patient identifier.
    pub distinct_total: usize,
    pub shares: Vec<ShareKpi>,
}

/// Compute the KPI set of `view`.  All shares are `0.0` on an empty view.
pub fn kpis(view: &FilteredView<'_>, shares: &[ShareDefinition]) -> Result<KpiSet, QueryError> {
    let shares = shares
        .iter()
        .map(|def| {
            percent_match(view, &def.field, &def.value).map(|percent| ShareKpi {
                label: def.label.clone(),
                percent,
            })
        })
        .collect::<Result<Vec<_>, QueryError>>()?;

    Ok(KpiSet {
        total: view.len(),
        distinct_total: distinct_count(view),
        shares,
    })
}

/// Number of distinct records in the view (all fields equal ⇒ same record).
pub fn distinct_count(view: &FilteredView<'_>) -> usize {
    view.records().collect::<HashSet<&Record>>().len()
}

/// `100 * matches / total`, or `0.0` for an empty view.
pub fn percent_match(view: &FilteredView<'_>, field: &str, value: &str) -> Result<f64, QueryError> {
    let idx = view.dataset().require_column(field)?;
    let total = view.len();
    if total == 0 {
        return Ok(0.0);
    }
    let matches = view.column(idx).filter(|v| v.matches(value)).count();
    Ok(100.0 * matches as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{apply, FilterSelection};
    use crate::data::loader::{clean, CleaningRules};
    use crate::data::model::Dataset;

    fn estados() -> Dataset {
        let raw: Vec<&str> = std::iter::repeat("Activo")
            .take(7)
            .chain(std::iter::repeat("Inactivo").take(3))
            .chain(std::iter::repeat("[NULL]").take(2))
            .collect();
        let raw = Dataset::new(
            vec!["Estado".into()],
            raw.into_iter()
                .map(|s| Record::new(vec![CellValue::text(s)]))
                .collect(),
        );
        clean(raw, &CleaningRules::default()).unwrap()
    }

    #[test]
    fn groups_are_sorted_by_count() {
        let ds = estados();
        let view = FilteredView::all(&ds);
        let result = group_count(&view, "Estado").unwrap();
        assert_eq!(
            result.groups,
            vec![
                GroupCount::new("Activo", 7),
                GroupCount::new("Inactivo", 3),
                GroupCount::new("Not recorded", 2),
            ]
        );
        assert_eq!(result.total(), 12);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let ds = Dataset::new(
            vec!["gender".into()],
            ["Otro", "Masculino", "Femenino", "Masculino", "Otro", "Femenino"]
                .iter()
                .map(|s| Record::new(vec![CellValue::text(*s)]))
                .collect(),
        );
        let result = group_count(&FilteredView::all(&ds), "gender").unwrap();
        let labels: Vec<_> = result.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Otro", "Masculino", "Femenino"]);
    }

    #[test]
    fn active_share_of_twelve_records() {
        let ds = estados();
        let view = FilteredView::all(&ds);
        let pct = percent_match(&view, "Estado", "Activo").unwrap();
        assert!((pct - 700.0 / 12.0).abs() < 1e-9);
        assert_eq!(format!("{pct:.1}"), "58.3");
    }

    #[test]
    fn distinct_total_drops_exact_duplicates() {
        let ds = estados();
        let kpi = kpis(&FilteredView::all(&ds), &[]).unwrap();
        assert_eq!(kpi.total, 12);
        assert_eq!(kpi.distinct_total, 3);
    }

    #[test]
    fn empty_view_yields_zeroes() {
        let ds = estados();
        let view = apply(&ds, &FilterSelection::new().with("Estado", "Suspendido")).unwrap();
        assert!(view.is_empty());

        let defs = vec![ShareDefinition {
            label: "% Active".into(),
            field: "Estado".into(),
            value: "Activo".into(),
        }];
        let kpi = kpis(&view, &defs).unwrap();
        assert_eq!(kpi.total, 0);
        assert_eq!(kpi.distinct_total, 0);
        assert_eq!(kpi.shares[0].percent, 0.0);
        assert!(group_count(&view, "Estado").unwrap().is_empty());
    }

    #[test]
    fn unknown_field_is_reported() {
        let ds = estados();
        let view = FilteredView::all(&ds);
        assert_eq!(
            group_count(&view, "EPS1").unwrap_err(),
            QueryError::UnknownField("EPS1".into())
        );
        assert!(percent_match(&view, "EPS1", "Sura").is_err());
    }
}
