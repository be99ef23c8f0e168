use std::sync::Arc;

use crate::color::ChartColors;
use crate::config::{ChartSpec, DashboardConfig};
use crate::data::aggregate::{group_count, kpis, AggregationResult, KpiSet};
use crate::data::filter::{apply, filter_options, Constraint, FilterOption, FilterSelection, FilteredView};
use crate::data::model::Dataset;
use crate::data::top_n::top_n_with_others;
use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Session outputs
// ---------------------------------------------------------------------------

/// A filter control: the field, its caption and every selectable option.
#[derive(Debug, Clone)]
pub struct FilterControl {
    pub field: String,
    pub label: String,
    pub options: Vec<FilterOption>,
}

/// A chart ready to draw: layout, colours and (already capped) counts.
#[derive(Debug, Clone)]
pub struct ChartData {
    pub spec: ChartSpec,
    pub colors: ChartColors,
    pub result: AggregationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// No record matches the current selection.
    Empty,
    Ready { rows: usize },
}

/// Everything derived from one selection.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    rows: Vec<usize>,
    kpis: KpiSet,
    /// Charts per tab; empty vectors when the view is empty.
    charts: Vec<Vec<ChartData>>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-user dashboard context over a shared, immutable dataset.
///
/// Holds the current selection and the memoized results for it.  Every
/// selection change recomputes filter → KPIs → group counts → top-N in one
/// pass; nothing is computed lazily while drawing.
#[derive(Debug)]
pub struct Session {
    dataset: Arc<Dataset>,
    config: Arc<DashboardConfig>,
    controls: Vec<FilterControl>,
    selection: FilterSelection,
    snapshot: Snapshot,
}

impl Session {
    /// Start a session with no constraints.
    ///
    /// Every field the configuration mentions must exist in the dataset.
    pub fn new(dataset: Arc<Dataset>, config: Arc<DashboardConfig>) -> Result<Self, QueryError> {
        let controls = config
            .filters
            .iter()
            .map(|f| {
                filter_options(&dataset, &f.field).map(|options| FilterControl {
                    field: f.field.clone(),
                    label: f.label.clone(),
                    options,
                })
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        for share in &config.kpi_shares {
            dataset.require_column(&share.field)?;
        }
        for chart in config.tabs.iter().flat_map(|t| &t.charts) {
            dataset.require_column(&chart.field)?;
        }

        let selection = FilterSelection::new();
        let snapshot = compute(&dataset, &config, &selection)?;
        Ok(Self {
            dataset,
            config,
            controls,
            selection,
            snapshot,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Filter controls, built once from the unfiltered dataset.
    pub fn controls(&self) -> &[FilterControl] {
        &self.controls
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    /// Change one field's constraint and recompute.
    pub fn set_filter(&mut self, field: &str, constraint: Constraint) -> Result<(), QueryError> {
        let mut next = self.selection.clone();
        next.set(field, constraint);
        if next == self.selection {
            return Ok(());
        }
        self.apply_selection(next)
    }

    /// Replace the whole selection.  On error the session is left unchanged.
    pub fn apply_selection(&mut self, selection: FilterSelection) -> Result<(), QueryError> {
        let snapshot = compute(&self.dataset, &self.config, &selection)?;
        self.selection = selection;
        self.snapshot = snapshot;
        Ok(())
    }

    pub fn reset_filters(&mut self) -> Result<(), QueryError> {
        self.apply_selection(FilterSelection::new())
    }

    /// The memoized filtered view.
    pub fn view(&self) -> FilteredView<'_> {
        FilteredView::from_rows(&self.dataset, &self.snapshot.rows)
    }

    pub fn view_state(&self) -> ViewState {
        match self.snapshot.rows.len() {
            0 => ViewState::Empty,
            rows => ViewState::Ready { rows },
        }
    }

    pub fn kpis(&self) -> &KpiSet {
        &self.snapshot.kpis
    }

    /// Charts of tab `tab`; empty for an unknown tab or an empty view.
    pub fn charts(&self, tab: usize) -> &[ChartData] {
        self.snapshot.charts.get(tab).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn compute(
    dataset: &Dataset,
    config: &DashboardConfig,
    selection: &FilterSelection,
) -> Result<Snapshot, QueryError> {
    let view = apply(dataset, selection)?;
    let kpis = kpis(&view, &config.kpi_shares)?;

    let mut charts = Vec::with_capacity(config.tabs.len());
    for tab in &config.tabs {
        let mut tab_charts = Vec::new();
        if !view.is_empty() {
            for spec in &tab.charts {
                let mut result = group_count(&view, &spec.field)?;
                if let Some(n) = spec.top_n {
                    result = top_n_with_others(result, n, &config.other_label);
                }
                tab_charts.push(ChartData {
                    spec: spec.clone(),
                    colors: ChartColors::new(spec, &config.palette),
                    result,
                });
            }
        }
        charts.push(tab_charts);
    }

    log::debug!(
        "Selection {:?}: {} of {} records",
        selection,
        view.len(),
        dataset.len()
    );

    Ok(Snapshot {
        rows: view.into_row_indices(),
        kpis,
        charts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChartKind, FilterField, TabSpec};
    use crate::data::aggregate::{GroupCount, ShareDefinition};
    use crate::data::model::{CellValue, Record};

    fn dataset() -> Arc<Dataset> {
        let rows = [
            ("Activo", "Femenino", "Sura"),
            ("Activo", "Masculino", "Sanitas"),
            ("Inactivo", "Femenino", "Sura"),
            ("Activo", "Femenino", "Nueva EPS"),
            ("Activo", "Femenino", "Nueva EPS"),
            ("Not recorded", "Masculino", "Sura"),
        ];
        Arc::new(Dataset::new(
            vec!["Estado".into(), "gender".into(), "EPS1".into()],
            rows.iter()
                .map(|(a, b, c)| {
                    Record::new(vec![CellValue::text(*a), CellValue::text(*b), CellValue::text(*c)])
                })
                .collect(),
        ))
    }

    fn config() -> Arc<DashboardConfig> {
        let filter = |field: &str| FilterField {
            field: field.into(),
            label: field.into(),
        };
        let chart = |field: &str, top_n| ChartSpec {
            title: field.into(),
            field: field.into(),
            kind: ChartKind::Bar,
            top_n,
            color: None,
            colors: Default::default(),
        };
        Arc::new(DashboardConfig {
            filters: vec![filter("Estado"), filter("gender"), filter("EPS1")],
            kpi_shares: vec![ShareDefinition {
                label: "% Active".into(),
                field: "Estado".into(),
                value: "Activo".into(),
            }],
            tabs: vec![TabSpec {
                title: "Overview".into(),
                charts: vec![chart("Estado", None), chart("EPS1", Some(1))],
                show_detail: true,
            }],
            ..DashboardConfig::default()
        })
    }

    #[test]
    fn starts_unfiltered() {
        let session = Session::new(dataset(), config()).unwrap();
        assert_eq!(session.view_state(), ViewState::Ready { rows: 6 });
        assert_eq!(session.kpis().total, 6);
        assert_eq!(session.kpis().distinct_total, 5);
        assert!((session.kpis().shares[0].percent - 400.0 / 6.0).abs() < 1e-9);

        let charts = session.charts(0);
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].result.groups[0], GroupCount::new("Activo", 4));
        // EPS1 capped at one category plus "Other"
        assert_eq!(
            charts[1].result.groups,
            vec![GroupCount::new("Sura", 3), GroupCount::new("Other", 3)]
        );
    }

    #[test]
    fn filter_change_recomputes_everything() {
        let mut session = Session::new(dataset(), config()).unwrap();
        session
            .set_filter("gender", Constraint::Equals("Femenino".into()))
            .unwrap();

        assert_eq!(session.view().row_indices(), &[0, 2, 3, 4]);
        assert_eq!(session.kpis().total, 4);
        assert!((session.kpis().shares[0].percent - 75.0).abs() < 1e-9);
        // options come from the full dataset and do not shrink
        let gender = &session.controls()[1];
        assert_eq!(gender.options.len(), 3);
    }

    #[test]
    fn empty_view_has_zero_kpis_and_no_charts() {
        let mut session = Session::new(dataset(), config()).unwrap();
        let selection = FilterSelection::new()
            .with("Estado", "Inactivo")
            .with("EPS1", "Sanitas");
        session.apply_selection(selection).unwrap();

        assert_eq!(session.view_state(), ViewState::Empty);
        assert_eq!(session.kpis().total, 0);
        assert_eq!(session.kpis().shares[0].percent, 0.0);
        assert!(session.charts(0).is_empty());

        session.reset_filters().unwrap();
        assert_eq!(session.view_state(), ViewState::Ready { rows: 6 });
    }

    #[test]
    fn bad_selection_leaves_session_untouched() {
        let mut session = Session::new(dataset(), config()).unwrap();
        session
            .set_filter("Estado", Constraint::Equals("Activo".into()))
            .unwrap();
        let err = session
            .set_filter("region", Constraint::Equals("Norte".into()))
            .unwrap_err();
        assert_eq!(err, QueryError::UnknownField("region".into()));
        assert_eq!(session.kpis().total, 4);
        assert_eq!(session.selection().get("region"), Constraint::Any);
    }

    #[test]
    fn config_fields_missing_from_the_data_fail_at_start() {
        let mut cfg = (*config()).clone();
        cfg.tabs[0].charts[0].field = "regional_ips".into();
        let err = Session::new(dataset(), Arc::new(cfg)).unwrap_err();
        assert_eq!(err, QueryError::UnknownField("regional_ips".into()));
    }
}
