use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::parse_hex;
use crate::data::aggregate::ShareDefinition;
use crate::data::loader::{CleaningRules, JUNK_INDEX_COLUMN, NOT_RECORDED, NULL_MARKER};
use crate::data::top_n::OTHER_LABEL;

// ---------------------------------------------------------------------------
// Column names of the production spreadsheet
// ---------------------------------------------------------------------------

pub const COL_STATUS: &str = "Estado Real  1";
pub const COL_STATUS_TYPE: &str = "Estado Real  2";
pub const COL_PRESCRIBER: &str = "prescriptor  HMLG";
pub const COL_REGION: &str = "regional_ips";
pub const COL_GENDER: &str = "gender";
pub const COL_PAYER: &str = "EPS1";

// ---------------------------------------------------------------------------
// Layout types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Donut,
}

/// One chart: counts of `field` over the filtered records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub title: String,
    pub field: String,
    pub kind: ChartKind,
    /// Show at most this many categories, folding the rest into "Other".
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Single fill colour for every bar.
    #[serde(default)]
    pub color: Option<String>,
    /// Per-category colour overrides (`label → "#rrggbb"`).
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSpec {
    pub title: String,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
    /// Show the table of filtered records under the charts.
    #[serde(default)]
    pub show_detail: bool,
}

/// A categorical field and the caption of its filter control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterField {
    pub field: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// DashboardConfig
// ---------------------------------------------------------------------------

/// Everything about the dashboard that is data, not code.
///
/// Every key is optional in the JSON file; missing keys take the defaults
/// below, which describe the production follow-up spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_file: PathBuf,
    pub title: String,
    pub subtitle: String,
    pub logo: Option<PathBuf>,

    pub sentinel: String,
    pub null_markers: Vec<String>,
    pub junk_columns: Vec<String>,

    pub all_label: String,
    pub other_label: String,

    pub filters: Vec<FilterField>,
    pub kpi_shares: Vec<ShareDefinition>,
    pub tabs: Vec<TabSpec>,
    pub palette: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let filter = |field: &str, label: &str| FilterField {
            field: field.to_string(),
            label: label.to_string(),
        };
        let chart = |title: &str, field: &str, kind: ChartKind| ChartSpec {
            title: title.to_string(),
            field: field.to_string(),
            kind,
            top_n: None,
            color: None,
            colors: BTreeMap::new(),
        };
        let colors = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        let top_ten = |mut spec: ChartSpec| {
            spec.top_n = Some(10);
            spec.color = Some("#1F6FB2".to_string());
            spec
        };

        Self {
            data_file: PathBuf::from("Datos prueba.xlsx"),
            title: "Follow-up dashboard".to_string(),
            subtitle: "Patient follow-ups".to_string(),
            logo: None,

            sentinel: NOT_RECORDED.to_string(),
            null_markers: vec![NULL_MARKER.to_string()],
            junk_columns: vec![JUNK_INDEX_COLUMN.to_string()],

            all_label: "All".to_string(),
            other_label: OTHER_LABEL.to_string(),

            filters: vec![
                filter(COL_PRESCRIBER, "Prescriber"),
                filter(COL_STATUS, "Status"),
                filter(COL_STATUS_TYPE, "Status type"),
                filter(COL_GENDER, "Gender"),
                filter(COL_PAYER, "Payer (EPS)"),
                filter(COL_REGION, "Care region"),
            ],
            kpi_shares: vec![
                ShareDefinition {
                    label: "% Active".to_string(),
                    field: COL_STATUS.to_string(),
                    value: "Activo".to_string(),
                },
                ShareDefinition {
                    label: "% With barrier".to_string(),
                    field: COL_STATUS_TYPE.to_string(),
                    value: "Con Barrera".to_string(),
                },
            ],
            tabs: vec![
                TabSpec {
                    title: "Overview".to_string(),
                    charts: vec![
                        top_ten(chart(
                            "Records by prescriber (top 10)",
                            COL_PRESCRIBER,
                            ChartKind::HorizontalBar,
                        )),
                        ChartSpec {
                            colors: colors(&[
                                ("Activo", "#20A5AA"),
                                ("Inactivo", "#4A4A4A"),
                                (NOT_RECORDED, "#9B9B9B"),
                            ]),
                            ..chart("Patients by status", COL_STATUS, ChartKind::Bar)
                        },
                        ChartSpec {
                            colors: colors(&[
                                ("Con Barrera", "#F5A623"),
                                ("Sin Barrera", "#1F6FB2"),
                                ("Activo", "#20A5AA"),
                                ("Inactivo", "#4A4A4A"),
                                (NOT_RECORDED, "#9B9B9B"),
                            ]),
                            ..chart("Distribution by status type", COL_STATUS_TYPE, ChartKind::Donut)
                        },
                    ],
                    show_detail: false,
                },
                TabSpec {
                    title: "Information".to_string(),
                    charts: vec![
                        top_ten(chart(
                            "Patients by payer (top 10)",
                            COL_PAYER,
                            ChartKind::HorizontalBar,
                        )),
                        ChartSpec {
                            colors: colors(&[
                                ("Femenino", "#1F6FB2"),
                                ("Masculino", "#20A5AA"),
                                ("Otro", "#F5A623"),
                                (NOT_RECORDED, "#9B9B9B"),
                            ]),
                            ..chart("Records by gender", COL_GENDER, ChartKind::Bar)
                        },
                        chart("Records by care region", COL_REGION, ChartKind::Donut),
                    ],
                    show_detail: true,
                },
            ],
            palette: ["#1F6FB2", "#20A5AA", "#F5A623", "#4A4A4A", "#9B9B9B"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl DashboardConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every chart and KPI refers to a filter field and that all
    /// colours parse.
    pub fn validate(&self) -> Result<()> {
        if self.sentinel.is_empty() || self.sentinel.trim() != self.sentinel {
            bail!("sentinel must be non-empty without surrounding whitespace");
        }

        let mut fields = HashSet::new();
        for f in &self.filters {
            if !fields.insert(f.field.as_str()) {
                bail!("filter field '{}' is listed twice", f.field);
            }
        }

        for share in &self.kpi_shares {
            if !fields.contains(share.field.as_str()) {
                bail!("KPI '{}' uses '{}', which is not a filter field", share.label, share.field);
            }
        }

        for tab in &self.tabs {
            for chart in &tab.charts {
                if !fields.contains(chart.field.as_str()) {
                    bail!(
                        "chart '{}' groups by '{}', which is not a filter field",
                        chart.title,
                        chart.field
                    );
                }
                for hex in chart.color.iter().chain(chart.colors.values()) {
                    if parse_hex(hex).is_none() {
                        bail!("chart '{}': invalid colour '{hex}'", chart.title);
                    }
                }
            }
        }

        for hex in &self.palette {
            if parse_hex(hex).is_none() {
                bail!("palette: invalid colour '{hex}'");
            }
        }
        Ok(())
    }

    /// The categorical fields, in filter-panel order.
    pub fn categorical_fields(&self) -> Vec<String> {
        self.filters.iter().map(|f| f.field.clone()).collect()
    }

    pub fn cleaning_rules(&self) -> CleaningRules {
        CleaningRules {
            sentinel: self.sentinel.clone(),
            null_markers: self.null_markers.clone(),
            junk_columns: self.junk_columns.clone(),
            categorical: self.categorical_fields(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DashboardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.filters.len(), 6);
        assert_eq!(config.tabs.len(), 2);
        assert_eq!(config.tabs[0].charts[0].top_n, Some(10));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = DashboardConfig::from_json_str(
            r#"{ "data_file": "seguimientos.csv", "other_label": "Otros" }"#,
        )
        .unwrap();
        assert_eq!(config.data_file, PathBuf::from("seguimientos.csv"));
        assert_eq!(config.other_label, "Otros");
        assert_eq!(config.sentinel, NOT_RECORDED);
        assert_eq!(config.filters, DashboardConfig::default().filters);
    }

    #[test]
    fn chart_on_a_non_filter_field_is_rejected() {
        let json = r#"{
            "filters": [{ "field": "gender", "label": "Gender" }],
            "kpi_shares": [],
            "tabs": [{ "title": "T", "charts": [
                { "title": "By age", "field": "edad", "kind": "bar" }
            ]}]
        }"#;
        let err = DashboardConfig::from_json_str(json).unwrap_err();
        assert!(format!("{err:#}").contains("edad"));
    }

    #[test]
    fn bad_colour_is_rejected() {
        let json = r#"{
            "filters": [{ "field": "gender", "label": "Gender" }],
            "kpi_shares": [],
            "tabs": [{ "title": "T", "charts": [
                { "title": "G", "field": "gender", "kind": "donut", "colors": { "Otro": "orange" } }
            ]}]
        }"#;
        assert!(DashboardConfig::from_json_str(json).is_err());
    }

    #[test]
    fn duplicate_filter_fields_are_rejected() {
        let json = r#"{
            "filters": [
                { "field": "gender", "label": "Gender" },
                { "field": "gender", "label": "Sex" }
            ],
            "kpi_shares": [],
            "tabs": []
        }"#;
        assert!(DashboardConfig::from_json_str(json).is_err());
    }

    #[test]
    fn cleaning_rules_follow_the_filters() {
        let rules = DashboardConfig::default().cleaning_rules();
        assert_eq!(rules.sentinel, NOT_RECORDED);
        assert!(rules.categorical.iter().any(|f| f == COL_PAYER));
        assert_eq!(rules.junk_columns, vec![JUNK_INDEX_COLUMN.to_string()]);
    }
}
