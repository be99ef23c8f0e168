use eframe::egui::{Align, Layout, Ui};
use egui_extras::{Column, TableBuilder};

use crate::data::filter::FilteredView;

const ROW_HEIGHT: f32 = 18.0;

/// Every filtered record, one row per record, columns in source order.
pub fn detail_table(ui: &mut Ui, view: &FilteredView<'_>) {
    let dataset = view.dataset();
    let rows = view.row_indices();

    let mut table = TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .max_scroll_height(420.0)
        .cell_layout(Layout::left_to_right(Align::Center));
    for _ in &dataset.columns {
        table = table.column(Column::auto().at_least(60.0).clip(true));
    }

    table
        .header(ROW_HEIGHT + 4.0, |mut header| {
            for name in &dataset.columns {
                header.col(|ui| {
                    ui.strong(name.as_str());
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                let record = &dataset.records[rows[row.index()]];
                for value in &record.values {
                    row.col(|ui| {
                        ui.label(value.to_string());
                    });
                }
            });
        });
}
