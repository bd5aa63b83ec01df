//! Output formatting for CLI commands

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};

/// Build a table with cyan headers.
pub fn render_table(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        let cells: Vec<Cell> = row
            .into_iter()
            .map(|(text, color)| match color {
                Some(c) => Cell::new(text).fg(c),
                None => Cell::new(text),
            })
            .collect();
        table.add_row(cells);
    }
    table
}

/// Print a table with per-cell colors.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    println!("{}", render_table(headers, rows));
}

/// `"1 column"` / `"3 columns"`.
pub fn plural(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plural() {
        assert_eq!(plural(1, "column"), "1 column");
        assert_eq!(plural(0, "key"), "0 keys");
        assert_eq!(plural(3, "constraint"), "3 constraints");
    }

    #[test]
    fn test_render_table_contains_cells() {
        let table = render_table(
            &["Table", "Status"],
            vec![vec![("user".to_string(), None), ("ok".to_string(), Some(Color::Green))]],
        );
        let text = table.to_string();
        assert!(text.contains("Table"));
        assert!(text.contains("user"));
        assert!(text.contains("ok"));
    }
}
