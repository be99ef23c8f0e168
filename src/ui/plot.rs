use std::f64::consts::{FRAC_PI_2, TAU};

use eframe::egui::{Align2, Color32, RichText, Stroke, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot, PlotPoint, PlotPoints, Polygon, Text};

use crate::config::ChartKind;
use crate::session::ChartData;

const DONUT_INNER: f64 = 0.6;
const DONUT_OUTER: f64 = 1.0;
/// Angular step used to approximate arcs (egui fills convex shapes only).
const ARC_STEP: f64 = TAU / 180.0;

// ---------------------------------------------------------------------------
// Charts (central panel)
// ---------------------------------------------------------------------------

/// Render one chart of the active tab.
pub fn chart(ui: &mut Ui, id: &str, chart: &ChartData) {
    match chart.spec.kind {
        ChartKind::Bar => bar_chart(ui, id, chart, false),
        ChartKind::HorizontalBar => bar_chart(ui, id, chart, true),
        ChartKind::Donut => donut_chart(ui, id, chart),
    }
}

fn bar_chart(ui: &mut Ui, id: &str, chart: &ChartData, horizontal: bool) {
    let n = chart.result.len();
    let max = chart.result.iter().map(|g| g.count).max().unwrap_or(0) as f64;

    // Horizontal charts list the largest category at the top.
    let position = |i: usize| if horizontal { (n - 1 - i) as f64 } else { i as f64 };

    let bars: Vec<Bar> = chart
        .result
        .iter()
        .enumerate()
        .map(|(i, g)| {
            Bar::new(position(i), g.count as f64)
                .name(&g.label)
                .fill(chart.colors.color_for(&g.label, i))
                .width(0.7)
        })
        .collect();

    let mut bar_chart = BarChart::new(bars).name(&chart.spec.title);
    if horizontal {
        bar_chart = bar_chart.horizontal();
    }

    let height = if horizontal {
        (28.0 * n as f32 + 40.0).max(160.0)
    } else {
        280.0
    };

    let mut plot = Plot::new(id)
        .height(height)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .show_grid(false);
    // leave room for the value labels
    plot = if horizontal {
        plot.include_x(0.0).include_x(max * 1.6)
    } else {
        plot.include_y(0.0).include_y(max * 1.2)
    };

    plot.show(ui, |plot_ui| {
        plot_ui.bar_chart(bar_chart);

        for (i, g) in chart.result.iter().enumerate() {
            let (point, anchor) = if horizontal {
                (PlotPoint::new(g.count as f64, position(i)), Align2::LEFT_CENTER)
            } else {
                (PlotPoint::new(position(i), g.count as f64), Align2::CENTER_BOTTOM)
            };
            let text = if horizontal {
                format!("  {}  {}", g.label, g.count)
            } else {
                format!("{}\n{}", g.count, g.label)
            };
            plot_ui.text(Text::new(point, RichText::new(text).size(12.0)).anchor(anchor));
        }
    });
}

fn donut_chart(ui: &mut Ui, id: &str, chart: &ChartData) {
    let counts: Vec<usize> = chart.result.iter().map(|g| g.count).collect();
    let slices = slice_angles(&counts);

    Plot::new(id)
        .height(320.0)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .show_x(false)
        .show_y(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .allow_boxed_zoom(false)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            let total = chart.result.total().max(1) as f64;
            for (i, (g, &(start, sweep))) in chart.result.iter().zip(&slices).enumerate() {
                let color = chart.colors.color_for(&g.label, i);
                let share = 100.0 * g.count as f64 / total;
                let name = format!("{} ({share:.1} %)", g.label);

                for piece in ring_pieces(start, sweep) {
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(piece))
                            .fill_color(color)
                            .stroke(Stroke::new(0.5, color))
                            .name(&name),
                    );
                }

                if share >= 5.0 {
                    let mid = FRAC_PI_2 - (start + sweep / 2.0);
                    let r = (DONUT_INNER + DONUT_OUTER) / 2.0;
                    plot_ui.text(
                        Text::new(
                            PlotPoint::new(r * mid.cos(), r * mid.sin()),
                            RichText::new(format!("{share:.1}%")).color(Color32::WHITE).size(12.0),
                        )
                        .anchor(Align2::CENTER_CENTER),
                    );
                }
            }
        });
}

/// `(start, sweep)` angles per slice, clockwise from twelve o'clock.
/// The sweeps of a non-empty input add up to a full turn.
fn slice_angles(counts: &[usize]) -> Vec<(f64, f64)> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![(0.0, 0.0); counts.len()];
    }
    let mut start = 0.0;
    counts
        .iter()
        .map(|&c| {
            let sweep = TAU * c as f64 / total as f64;
            let slice = (start, sweep);
            start += sweep;
            slice
        })
        .collect()
}

/// Split a ring segment into convex quads.
fn ring_pieces(start: f64, sweep: f64) -> Vec<Vec<[f64; 2]>> {
    if sweep <= 0.0 {
        return Vec::new();
    }
    let steps = (sweep / ARC_STEP - 1e-9).ceil().max(1.0) as usize;
    let step = sweep / steps as f64;
    let at = |angle: f64, r: f64| {
        let a = FRAC_PI_2 - angle;
        [r * a.cos(), r * a.sin()]
    };

    (0..steps)
        .map(|k| {
            let a0 = start + k as f64 * step;
            let a1 = a0 + step;
            vec![
                at(a0, DONUT_OUTER),
                at(a1, DONUT_OUTER),
                at(a1, DONUT_INNER),
                at(a0, DONUT_INNER),
            ]
        })
        .collect()
}
