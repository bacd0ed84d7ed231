//! Terminal output: notes and table rendering.

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn note(symbol: &str, color: &str, plain: &str, msg: &str) -> String {
    if supports_color() {
        format!("{color}{BOLD}{symbol}{RESET} {msg}")
    } else {
        format!("{plain}: {msg}")
    }
}

pub fn note_info(msg: &str) {
    println!("{}", note("ℹ", CYAN, "INFO", msg));
}

pub fn note_warn(msg: &str) {
    println!("{}", note("⚠", YELLOW, "WARN", msg));
}

pub fn note_error(msg: &str) {
    eprintln!("{}", note("✗", RED, "ERROR", msg));
}

pub fn note_success(msg: &str) {
    println!("{}", note("✓", GREEN, "OK", msg));
}

/// Render left-aligned columns with a header and a dashed separator.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(strip_ansi(cell).chars().count());
        }
    }

    let line = |cells: Vec<String>| format!("  {}\n", cells.join("  ").trim_end());
    let pad = |s: &str, width: usize| {
        let fill = width.saturating_sub(strip_ansi(s).chars().count());
        format!("{s}{}", " ".repeat(fill))
    };

    let mut out = line(headers.iter().zip(&widths).map(|(h, w)| pad(*h, *w)).collect());
    out.push_str(&line(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        let cells = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        out.push_str(&line(cells));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi() {
        let colored = format!("{GREEN}hello{RESET}");
        assert_eq!(strip_ansi(&colored), "hello");
    }

    #[test]
    fn table_columns_line_up() {
        let rows = vec![
            vec!["greeter".to_string(), "1".to_string()],
            vec!["a".to_string(), "12".to_string()],
        ];
        let table = render_table(&["Name", "Gen"], &rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "  Name     Gen");
        assert_eq!(lines[1], "  -------  ---");
        assert_eq!(lines[3], "  a        12");
    }
}
