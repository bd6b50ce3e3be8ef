use std::fmt::Write as _;
use std::io::{self, Write};

use crossterm::{cursor, terminal};

use crate::theme;
use crate::utils::{fit, visible_width};

/// A styled line of text containing ANSI escape sequences.
/// Each line must not exceed the width passed to render().
pub type StyledLine = String;

/// Anything that draws itself as a block of lines.
pub trait Component {
    /// Render the component at the given width.
    /// Returns lines of ANSI-styled text, each at most `width` visible columns.
    fn render(&self, width: usize) -> Vec<StyledLine>;
}

/// Segment reset sequence appended to every row so styles never bleed.
const SEGMENT_RESET: &str = "\x1b[0m\x1b]8;;\x07";

/// Join two columns side by side with a muted vertical rule between them.
/// Both sides are fitted to their widths; the shorter side is padded.
pub fn compose_columns(
    left: &[StyledLine],
    left_width: usize,
    right: &[StyledLine],
    right_width: usize,
) -> Vec<StyledLine> {
    let rule = theme::fg(theme::BORDER_MUTED, "│");
    let rows = left.len().max(right.len());
    (0..rows)
        .map(|row| {
            let l = left.get(row).map_or("", String::as_str);
            let r = right.get(row).map_or("", String::as_str);
            format!("{}{rule}{}", fit(l, left_width), fit(r, right_width))
        })
        .collect()
}

/// Full-screen frame renderer.
///
/// Runs on the alternate screen and redraws only rows whose content changed
/// since the previous frame. A resize forces a full redraw.
#[derive(Debug, Default)]
pub struct Screen {
    previous_lines: Vec<String>,
    previous_size: (usize, usize),
    active: bool,
}

impl Screen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter raw mode and the alternate screen, hide the cursor.
    pub fn start(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        if let Err(error) = crossterm::execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide) {
            let _ = terminal::disable_raw_mode();
            return Err(error);
        }
        self.active = true;
        self.force_redraw();
        Ok(())
    }

    /// Restore the terminal. Safe to call more than once.
    pub fn stop(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()?;
        stdout.flush()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn force_redraw(&mut self) {
        self.previous_lines.clear();
        self.previous_size = (0, 0);
    }

    /// Get the terminal size as `(width, height)`.
    pub fn size() -> io::Result<(usize, usize)> {
        let (w, h) = terminal::size()?;
        Ok((usize::from(w), usize::from(h)))
    }

    /// Draw a frame to stdout.
    pub fn draw(&mut self, lines: &[StyledLine]) -> io::Result<()> {
        let (width, height) = Self::size()?;
        let mut stdout = io::stdout();
        self.draw_to(&mut stdout, lines, width, height)
    }

    /// Ring the terminal bell.
    pub fn bell(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(b"\x07")?;
        stdout.flush()
    }

    /// Diff `lines` against the previous frame and write the changed rows.
    /// Returns without writing when nothing changed.
    pub fn draw_to<W: Write>(
        &mut self,
        out: &mut W,
        lines: &[StyledLine],
        width: usize,
        height: usize,
    ) -> io::Result<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let full = self.previous_size != (width, height);
        let frame: Vec<String> = (0..height)
            .map(|row| {
                let line = lines.get(row).map_or("", String::as_str);
                let mut fitted = if visible_width(line) == width {
                    line.to_owned()
                } else {
                    fit(line, width)
                };
                fitted.push_str(SEGMENT_RESET);
                fitted
            })
            .collect();

        let mut buffer = String::from("\x1b[?2026h");
        if full {
            buffer.push_str("\x1b[2J");
        }
        let mut changed = full;
        for (row, line) in frame.iter().enumerate() {
            if !full && self.previous_lines.get(row) == Some(line) {
                continue;
            }
            changed = true;
            let _ = write!(buffer, "\x1b[{};1H\x1b[2K{line}", row + 1);
        }
        buffer.push_str("\x1b[?2026l");

        if changed {
            out.write_all(buffer.as_bytes())?;
            out.flush()?;
        }

        self.previous_lines = frame;
        self.previous_size = (width, height);
        Ok(())
    }
}
