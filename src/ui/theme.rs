use ratatui::style::Color;

// Dark grays plus one color per session type.
pub const FG: Color = Color::Rgb(229, 231, 235);
pub const MUTED: Color = Color::Rgb(156, 163, 175);
pub const DIM: Color = Color::Rgb(107, 114, 128);
pub const BORDER: Color = Color::Rgb(55, 65, 81);
pub const GAUGE_BG: Color = Color::Rgb(23, 28, 36);

pub const WORK: Color = Color::Rgb(134, 239, 172);
pub const REST: Color = Color::Rgb(125, 175, 255);
pub const WARN: Color = Color::Rgb(255, 159, 26);
pub const OVERRUN: Color = Color::Rgb(248, 113, 113);
