use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Colour of the `index`-th series added to a chart.
///
/// Hues advance by the golden angle so that neighbouring series stay distinct
/// however many are added.
pub fn series_color(index: usize) -> Color32 {
    const GOLDEN_ANGLE: f32 = 137.507_77;
    hue_color((index as f32 * GOLDEN_ANGLE) % 360.0)
}

fn hue_color(hue: f32) -> Color32 {
    let hsl = Hsl::new(hue, 0.75, 0.55);
    let rgb: Srgb = hsl.into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_colors_differ() {
        let colors: Vec<Color32> = (0..8).map(series_color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
