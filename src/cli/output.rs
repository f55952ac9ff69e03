use std::io::IsTerminal;
use crate::board::SegmentSnapshot;
use crate::models::{Entity, LeadHistoryEntry, SegmentKey};

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_RED: &str = "\x1b[31m";

const MIN_COLUMN_WIDTH: usize = 14;
const COLUMN_GAP: &str = "  ";

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate, falling back to `COLUMNS` and then 120.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

fn bold_if_tty(text: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn segment_color(segment: SegmentKey) -> Option<&'static str> {
    match segment {
        SegmentKey::Won => Some(ANSI_FG_GREEN),
        SegmentKey::Lost => Some(ANSI_FG_RED),
        _ => None,
    }
}

/// Truncate to `width` characters, marking the cut with `~`
fn truncate(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(width - 1).collect();
    cut.push('~');
    cut
}

fn pad(text: &str, width: usize) -> String {
    let count = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(count)))
}

/// One card line: `<id> <name>` plus the deal value when present
pub fn format_card(entity: &Entity) -> String {
    let name = entity.payload["name"].as_str().unwrap_or("");
    let mut line = format!("{} {}", entity.id, name);
    if let Some(value) = entity.payload["value"].as_f64() {
        line.push_str(&format!(" ({:.2})", value));
    }
    line
}

fn column_header(column: &SegmentSnapshot<'_>) -> String {
    format!("{} {}/{}", column.segment.label(), column.entities.len(), column.paging.known_total)
}

/// Render board columns side by side, sized to `width`
pub fn format_board(columns: &[SegmentSnapshot<'_>], width: usize, is_tty: bool) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let gaps = COLUMN_GAP.len() * (columns.len() - 1);
    let col_width = (width.saturating_sub(gaps) / columns.len()).max(MIN_COLUMN_WIDTH);

    let mut out = String::new();

    let headers: Vec<String> = columns
        .iter()
        .map(|column| {
            let header = pad(&truncate(&column_header(column), col_width), col_width);
            match segment_color(column.segment) {
                Some(color) if is_tty => format!("{}{}{}", color, bold_if_tty(&header, true), ANSI_RESET),
                _ => bold_if_tty(&header, is_tty),
            }
        })
        .collect();
    out.push_str(headers.join(COLUMN_GAP).trim_end());
    out.push('\n');
    out.push_str(&vec!["-".repeat(col_width); columns.len()].join(COLUMN_GAP));
    out.push('\n');

    let rows = columns.iter().map(|c| c.entities.len()).max().unwrap_or(0);
    for row in 0..rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|column| {
                let text = column.entities.get(row).map(format_card).unwrap_or_default();
                pad(&truncate(&text, col_width), col_width)
            })
            .collect();
        out.push_str(cells.join(COLUMN_GAP).trim_end());
        out.push('\n');
    }

    out
}

/// Render the stage history of a lead, one line per change
pub fn format_history(entries: &[LeadHistoryEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let when = chrono::DateTime::from_timestamp(entry.created_ts, 0)
            .map(|dt| dt.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| entry.created_ts.to_string());
        let stages = match entry.from_segment {
            Some(from) => format!("{} -> {}", from.label(), entry.to_segment.label()),
            None => entry.to_segment.label().to_string(),
        };
        out.push_str(&format!("{}  {:<14} {}", when, entry.action, stages));
        if let Some(value) = entry.value {
            out.push_str(&format!("  value={:.2}", value));
        }
        if let Some(notes) = &entry.notes {
            out.push_str(&format!("  {}", notes));
        }
        out.push('\n');
    }
    out
}
