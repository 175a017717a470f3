use eframe::egui::Color32;

pub trait HexColor: Sized {
    /// Accepts `rgb`, `rrggbb` or `rrggbbaa`, with or without a leading `#`.
    fn parse_hex(hex: &str) -> Option<Self>;
}

impl HexColor for Color32 {
    fn parse_hex(hex: &str) -> Option<Self> {
        let digits = hex
            .strip_prefix('#')
            .unwrap_or(hex)
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<u8>>>()?;

        let channels: Vec<u8> = match digits.len() {
            3 => digits.iter().map(|d| d * 17).collect(),
            6 | 8 => digits.chunks(2).map(|pair| pair[0] * 16 + pair[1]).collect(),
            _ => return None,
        };
        let alpha = channels.get(3).copied().unwrap_or(u8::MAX);
        Some(Color32::from_rgba_unmultiplied(
            channels[0],
            channels[1],
            channels[2],
            alpha,
        ))
    }
}

/// Widget palette. Unparseable entries fall back to gray.
pub struct Palette;

impl Palette {
    pub const ACCENT: &'static str = "#f97316";
    pub const SUCCESS: &'static str = "#22c55e";
    pub const DANGER: &'static str = "#ef4444";
    pub const MUTED: &'static str = "#9ca3af";
    pub const PLACEHOLDER: &'static str = "#d1d5db";
    pub const LINK: &'static str = "#3b82f6";
    /// Translucent so it reads on light and dark themes.
    pub const DROP_ACTIVE: &'static str = "#3b82f633";

    pub fn color(hex: &str) -> Color32 {
        Color32::parse_hex(hex).unwrap_or(Color32::GRAY)
    }
}
