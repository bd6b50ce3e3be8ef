// Dark theme, 24-bit colors.

use cellar_core::{NICK_PALETTE_SIZE, Tone};

pub const ACCENT: (u8, u8, u8) = (0x8a, 0xbe, 0xb7);
pub const BORDER: (u8, u8, u8) = (0x5f, 0x87, 0xff);
pub const BORDER_MUTED: (u8, u8, u8) = (0x50, 0x50, 0x50);
pub const SUCCESS: (u8, u8, u8) = (0xb5, 0xbd, 0x68);
pub const ERROR: (u8, u8, u8) = (0xcc, 0x66, 0x66);
pub const WARNING: (u8, u8, u8) = (0xff, 0xff, 0x00);
pub const MUTED: (u8, u8, u8) = (0x80, 0x80, 0x80);
pub const DIM: (u8, u8, u8) = (0x66, 0x66, 0x66);
pub const TEXT: (u8, u8, u8) = (0xd0, 0xd0, 0xd0);

pub const OWN: (u8, u8, u8) = (0x81, 0xa2, 0xbe);
pub const HIGHLIGHT: (u8, u8, u8) = (0xf0, 0xc6, 0x74);
pub const AUDIT: (u8, u8, u8) = (0xde, 0x93, 0x5f);
pub const PANEL_BG: (u8, u8, u8) = (0x28, 0x28, 0x32);
pub const TAB_ACTIVE_BG: (u8, u8, u8) = (0x34, 0x35, 0x41);

pub const NICK_PALETTE: [(u8, u8, u8); NICK_PALETTE_SIZE as usize] = [
    (0xcc, 0x66, 0x66),
    (0xb5, 0xbd, 0x68),
    (0xf0, 0xc6, 0x74),
    (0x81, 0xa2, 0xbe),
    (0xb2, 0x94, 0xbb),
    (0x8a, 0xbe, 0xb7),
    (0xde, 0x93, 0x5f),
    (0x5f, 0xaf, 0x87),
    (0xd7, 0x87, 0xaf),
    (0x87, 0xaf, 0xd7),
    (0xaf, 0xaf, 0x5f),
    (0x5f, 0xd7, 0xd7),
];

pub fn nick_color(slot: u8) -> (u8, u8, u8) {
    NICK_PALETTE[usize::from(slot) % NICK_PALETTE.len()]
}

pub fn tone_color(tone: Tone) -> (u8, u8, u8) {
    match tone {
        Tone::Plain => TEXT,
        Tone::Own => OWN,
        Tone::Nick(slot) => nick_color(slot),
        Tone::Highlight => HIGHLIGHT,
        Tone::Notice => MUTED,
        Tone::Join => SUCCESS,
        Tone::Part => DIM,
        Tone::Audit => AUDIT,
        Tone::Error => ERROR,
    }
}

/// Foreground color wrapper.
pub fn fg(color: (u8, u8, u8), text: &str) -> String {
    let (r, g, b) = color;
    format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m")
}

/// Background color wrapper.
pub fn bg(color: (u8, u8, u8), text: &str) -> String {
    let (r, g, b) = color;
    format!("\x1b[48;2;{r};{g};{b}m{text}\x1b[0m")
}

pub fn bold(text: &str) -> String {
    format!("\x1b[1m{text}\x1b[0m")
}

pub fn inverse(text: &str) -> String {
    format!("\x1b[7m{text}\x1b[0m")
}

pub const RESET: &str = "\x1b[0m";
