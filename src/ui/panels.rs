use std::sync::Arc;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::config::DashboardConfig;
use crate::data::aggregate::KpiSet;
use crate::data::filter::{Constraint, FilterOption};
use crate::data::loader::SPREADSHEET_EXTENSIONS;
use crate::session::ViewState;
use crate::state::AppState;
use crate::ui::{plot, table};

const BRAND_BLUE: Color32 = Color32::from_rgb(0x1F, 0x6F, 0xB2);

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let Some(session) = &state.session else {
        ui.label("No dataset loaded.");
        return;
    };

    let all_label = &state.config.all_label;
    let mut change: Option<(String, FilterOption)> = None;
    let mut reset = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for control in session.controls() {
                let current = session.selection().get(&control.field);
                let selected_text = match &current {
                    Constraint::Any => all_label.clone(),
                    Constraint::Equals(v) => v.clone(),
                };

                ui.strong(control.label.as_str());
                egui::ComboBox::from_id_salt(&control.field)
                    .selected_text(selected_text)
                    .width(ui.available_width())
                    .show_ui(ui, |ui: &mut Ui| {
                        for option in &control.options {
                            let is_selected = option.to_constraint() == current;
                            let text = match option {
                                FilterOption::All => all_label.as_str(),
                                FilterOption::Value(v) => v.as_str(),
                            };
                            if ui.selectable_label(is_selected, text).clicked() && !is_selected {
                                change = Some((control.field.clone(), option.clone()));
                            }
                        }
                    });
                ui.add_space(6.0);
            }

            ui.separator();
            if ui.button("Reset filters").clicked() {
                reset = true;
            }
        });

    if let Some((field, option)) = change {
        state.set_filter(&field, &option);
    }
    if reset {
        state.reset_filters();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.source.is_some(), egui::Button::new("Reload"))
                .clicked()
            {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(session) = &state.session {
            ui.label(format!(
                "{} records loaded, {} visible",
                session.dataset().len(),
                session.view().len()
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Header, KPIs and the active tab's charts.
pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    let config = Arc::clone(&state.config);

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            header(ui, &config);

            let Some(session) = &state.session else {
                ui.add_space(24.0);
                ui.vertical_centered(|ui: &mut Ui| match &state.status_message {
                    Some(msg) => {
                        ui.label(RichText::new(msg).color(Color32::RED).size(16.0));
                        ui.label("Fix the source file, then use File → Reload or File → Open….");
                    }
                    None => {
                        ui.heading("Open a follow-up table  (File → Open…)");
                    }
                });
                return;
            };

            if session.view_state() == ViewState::Empty {
                ui.add_space(12.0);
                ui.label(
                    RichText::new("No records match the selected filters.")
                        .color(Color32::from_rgb(0xF5, 0xA6, 0x23))
                        .size(16.0),
                );
                return;
            }

            kpi_row(ui, session.kpis());
            ui.label(
                RichText::new("Figures are computed over the subset selected in the sidebar.")
                    .small()
                    .weak(),
            );
            ui.separator();

            ui.horizontal(|ui: &mut Ui| {
                for (i, tab) in config.tabs.iter().enumerate() {
                    ui.selectable_value(&mut state.active_tab, i, tab.title.as_str());
                }
            });
            ui.add_space(8.0);

            let Some(tab) = config.tabs.get(state.active_tab) else {
                return;
            };
            for (i, chart) in session.charts(state.active_tab).iter().enumerate() {
                ui.label(RichText::new(&chart.spec.title).strong().size(15.0));
                plot::chart(ui, &format!("chart_{}_{i}", state.active_tab), chart);
                ui.add_space(12.0);
            }

            if tab.show_detail {
                ui.label(RichText::new("Filtered records").strong().size(15.0));
                table::detail_table(ui, &session.view());
            }
        });
}

fn header(ui: &mut Ui, config: &DashboardConfig) {
    ui.vertical_centered(|ui: &mut Ui| {
        if let Some(logo) = &config.logo {
            ui.add(
                egui::Image::new(format!("file://{}", logo.display()))
                    .max_width(420.0)
                    .max_height(120.0),
            );
        }
        ui.label(RichText::new(&config.title).color(BRAND_BLUE).size(28.0).strong());
        ui.label(RichText::new(&config.subtitle).color(BRAND_BLUE).size(15.0));
    });
    ui.add_space(8.0);
}

fn kpi_row(ui: &mut Ui, kpis: &KpiSet) {
    let mut metrics = vec![
        ("Follow-ups".to_string(), format_count(kpis.total)),
        ("Patients (approx.)".to_string(), format_count(kpis.distinct_total)),
    ];
    metrics.extend(
        kpis.shares
            .iter()
            .map(|s| (s.label.clone(), format_percent(s.percent))),
    );

    ui.columns(metrics.len(), |cols: &mut [Ui]| {
        for (col, (label, value)) in cols.iter_mut().zip(&metrics) {
            col.label(RichText::new(label).weak());
            col.label(RichText::new(value).size(26.0).strong());
        }
    });
}

/// `12345` → `"12.345"` (dot as thousands separator).
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// One decimal place, e.g. `58.3 %`.
pub fn format_percent(p: f64) -> String {
    format!("{p:.1} %")
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let mut supported = SPREADSHEET_EXTENSIONS.to_vec();
    supported.extend(["csv", "json", "parquet", "pq"]);

    let file = rfd::FileDialog::new()
        .set_title("Open follow-up table")
        .add_filter("Supported files", supported.as_slice())
        .add_filter("Spreadsheets", SPREADSHEET_EXTENSIONS.as_slice())
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.active_tab = 0;
        state.open(path);
    }
}
