use eframe::egui::Color32;

const PALETTE: [Color32; 12] = [
    Color32::from_rgb(33, 102, 172),
    Color32::from_rgb(178, 24, 43),
    Color32::from_rgb(65, 171, 93),
    Color32::from_rgb(217, 95, 14),
    Color32::from_rgb(117, 107, 177),
    Color32::from_rgb(230, 171, 2),
    Color32::from_rgb(27, 158, 119),
    Color32::from_rgb(102, 166, 30),
    Color32::from_rgb(231, 41, 138),
    Color32::from_rgb(166, 118, 29),
    Color32::from_rgb(102, 102, 102),
    Color32::from_rgb(1, 133, 113),
];

/// Cyclic palette lookup by first-seen index.
pub fn palette_color(index: usize) -> Color32 {
    PALETTE[index % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_wraps_around() {
        assert_eq!(palette_color(0), palette_color(12));
        assert_ne!(palette_color(0), palette_color(1));
    }
}
