use std::collections::BTreeMap;
use std::str::FromStr;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::config::ChartSpec;

// ---------------------------------------------------------------------------
// Color parsing / generation
// ---------------------------------------------------------------------------

/// Parse `#rrggbb` / `#rgb` (leading `#` optional).
pub fn parse_hex(hex: &str) -> Option<Color32> {
    let rgb = Srgb::<u8>::from_str(hex.trim()).ok()?;
    Some(Color32::from_rgb(rgb.red, rgb.green, rgb.blue))
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chart colours: category label → Color32
// ---------------------------------------------------------------------------

/// Colouring rule for one chart.
///
/// Precedence: the chart's single `color`, then its per-category overrides,
/// then the dashboard palette cycled by the category's position.
#[derive(Debug, Clone)]
pub struct ChartColors {
    single: Option<Color32>,
    mapping: BTreeMap<String, Color32>,
    sequence: Vec<Color32>,
}

impl ChartColors {
    pub fn new(spec: &ChartSpec, palette: &[String]) -> Self {
        let mut sequence: Vec<Color32> = palette.iter().filter_map(|c| parse_hex(c)).collect();
        if sequence.is_empty() {
            log::warn!("Chart '{}': no usable palette colours, using generated hues", spec.title);
            sequence = generate_palette(8);
        }

        ChartColors {
            single: spec.color.as_deref().and_then(parse_hex),
            mapping: spec
                .colors
                .iter()
                .filter_map(|(label, hex)| Some((label.clone(), parse_hex(hex)?)))
                .collect(),
            sequence,
        }
    }

    /// Colour of the category `label` drawn at `position`.
    pub fn color_for(&self, label: &str, position: usize) -> Color32 {
        if let Some(c) = self.single {
            return c;
        }
        self.mapping
            .get(label)
            .copied()
            .unwrap_or_else(|| self.sequence[position % self.sequence.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChartKind;

    fn spec() -> ChartSpec {
        ChartSpec {
            title: "Records by gender".into(),
            field: "gender".into(),
            kind: ChartKind::Bar,
            top_n: None,
            color: None,
            colors: [("Otro".to_string(), "#F5A623".to_string())].into_iter().collect(),
        }
    }

    #[test]
    fn hex_codes_parse() {
        assert_eq!(parse_hex("#1F6FB2"), Some(Color32::from_rgb(0x1F, 0x6F, 0xB2)));
        assert_eq!(parse_hex("20A5AA"), Some(Color32::from_rgb(0x20, 0xA5, 0xAA)));
        assert_eq!(parse_hex("teal"), None);
    }

    #[test]
    fn overrides_win_and_the_palette_cycles() {
        let palette = vec!["#000000".to_string(), "#FFFFFF".to_string()];
        let colors = ChartColors::new(&spec(), &palette);
        assert_eq!(colors.color_for("Otro", 0), Color32::from_rgb(0xF5, 0xA6, 0x23));
        assert_eq!(colors.color_for("Femenino", 0), Color32::BLACK);
        assert_eq!(colors.color_for("Masculino", 1), Color32::WHITE);
        assert_eq!(colors.color_for("Not recorded", 2), Color32::BLACK);
    }

    #[test]
    fn single_colour_applies_to_every_category() {
        let mut s = spec();
        s.color = Some("#1F6FB2".into());
        let colors = ChartColors::new(&s, &[]);
        assert_eq!(colors.color_for("Otro", 3), Color32::from_rgb(0x1F, 0x6F, 0xB2));
    }

    #[test]
    fn empty_palette_falls_back_to_generated_hues() {
        let colors = ChartColors::new(&spec(), &[]);
        // no panic on modulo, and distinct neighbours
        assert_ne!(colors.color_for("a", 0), colors.color_for("b", 1));
        assert_eq!(generate_palette(5).len(), 5);
    }
}
