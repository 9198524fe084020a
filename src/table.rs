use std::io::{self, Write};

use chrono::{Local, TimeZone};
use owo_colors::OwoColorize;

use crate::display::{display_width, pad_end, printable, truncate_end, truncate_middle};
use crate::sessions::SessionSummary;

/// Width used when stdout is not a terminal or its size is unknown.
pub const FALLBACK_TERM_WIDTH: usize = 120;

const TIME_WIDTH: usize = 16; // "YYYY-MM-DD HH:MM"
const SEP: &str = "  ";
const SEP_COUNT: usize = 3;

const CWD_MIN: usize = 10;
const ASK_MIN: usize = 6;
const PATH_MIN: usize = 4;
const CWD_MAX: usize = 25;

const MISSING: &str = "-";

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub color: bool,
    /// Never truncate; columns grow to fit their widest cell.
    pub full: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidths {
    pub time: usize,
    pub cwd: usize,
    pub ask: usize,
    pub path: usize,
}

impl ColumnWidths {
    pub fn total(&self) -> usize {
        self.time + self.cwd + self.ask + self.path + SEP.len() * SEP_COUNT
    }
}

/// Terminal columns available on stdout, or [`FALLBACK_TERM_WIDTH`].
pub fn terminal_width() -> usize {
    if !atty::is(atty::Stream::Stdout) {
        return FALLBACK_TERM_WIDTH;
    }
    crossterm::terminal::size()
        .ok()
        .map(|(cols, _rows)| cols as usize)
        .filter(|&cols| cols > 0)
        .unwrap_or(FALLBACK_TERM_WIDTH)
}

/// Decide column widths for `rows` on a terminal `term_width` columns wide.
///
/// Paths get their full width first so they stay copy-pasteable; cwd takes up to 40% of
/// what is left (capped at 25) and ask the rest. If the table is still too wide, columns
/// give way in the order ask, cwd, path, never below their minimums.
pub fn layout(rows: &[SessionSummary], term_width: usize, full: bool) -> ColumnWidths {
    let path = rows
        .iter()
        .map(|r| display_width(&printable(&r.path)))
        .max()
        .unwrap_or(PATH_MIN)
        .max(PATH_MIN);

    if full {
        return ColumnWidths {
            time: TIME_WIDTH,
            cwd: widest(rows, |r| r.cwd.as_deref()).max(CWD_MIN),
            ask: widest(rows, |r| r.ask.as_deref()).max(ASK_MIN),
            path,
        };
    }

    let fixed = TIME_WIDTH + SEP.len() * SEP_COUNT;
    let available = term_width
        .saturating_sub(fixed)
        .max(CWD_MIN + ASK_MIN + PATH_MIN);

    let remaining = available.saturating_sub(path);
    let cwd = (remaining * 2 / 5).min(CWD_MAX).max(CWD_MIN);
    let ask = remaining.saturating_sub(cwd).max(ASK_MIN);

    let mut widths = ColumnWidths {
        time: TIME_WIDTH,
        cwd,
        ask,
        path,
    };
    shrink_to_fit(&mut widths, term_width);
    widths
}

fn widest<F>(rows: &[SessionSummary], field: F) -> usize
where
    F: Fn(&SessionSummary) -> Option<&str>,
{
    rows.iter()
        .map(|r| display_width(&printable(field(r).unwrap_or(MISSING))))
        .max()
        .unwrap_or(0)
}

fn shrink_to_fit(widths: &mut ColumnWidths, term_width: usize) {
    let mut excess = widths.total().saturating_sub(term_width);
    for (width, min) in [
        (&mut widths.ask, ASK_MIN),
        (&mut widths.cwd, CWD_MIN),
        (&mut widths.path, PATH_MIN),
    ] {
        if excess == 0 {
            break;
        }
        let cut = width.saturating_sub(min).min(excess);
        *width -= cut;
        excess -= cut;
    }
}

/// Local `YYYY-MM-DD HH:MM` for an epoch-millisecond time, or `-` if it cannot be shown.
pub fn format_time(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| MISSING.to_string())
}

fn header_cell(name: &str, width: usize, color: bool) -> String {
    let pad = " ".repeat(width.saturating_sub(display_width(name)));
    if color {
        format!("{}{}", name.bold(), pad)
    } else {
        format!("{name}{pad}")
    }
}

/// Write the aligned table: bold header, a dash rule, then one line per row.
pub fn render_table<W: Write>(
    out: &mut W,
    rows: &[SessionSummary],
    term_width: usize,
    opts: RenderOptions,
) -> io::Result<()> {
    let w = layout(rows, term_width, opts.full);

    let header = [
        header_cell("time", w.time, opts.color),
        header_cell("cwd", w.cwd, opts.color),
        header_cell("ask", w.ask, opts.color),
        header_cell("path", w.path, opts.color),
    ]
    .join(SEP);
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(term_width.min(w.total())))?;

    for row in rows {
        let cwd = printable(row.cwd.as_deref().unwrap_or(MISSING));
        let ask = printable(row.ask.as_deref().unwrap_or(MISSING));
        let path = printable(&row.path);
        let (cwd, ask, path) = if opts.full {
            (cwd.into_owned(), ask.into_owned(), path.into_owned())
        } else {
            (
                truncate_middle(&cwd, w.cwd),
                truncate_end(&ask, w.ask),
                truncate_end(&path, w.path),
            )
        };
        let line = [
            pad_end(&format_time(row.mtime), w.time),
            pad_end(&cwd, w.cwd),
            pad_end(&ask, w.ask),
            pad_end(&path, w.path),
        ]
        .join(SEP);
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Write `rows` as a pretty-printed JSON array followed by a newline.
pub fn render_json<W: Write>(out: &mut W, rows: &[SessionSummary]) -> io::Result<()> {
    let text = serde_json::to_string_pretty(rows).map_err(io::Error::other)?;
    writeln!(out, "{text}")
}
