use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    for line in table_lines(headers, &rows) {
        println!("{line}");
    }
}

/// Header, dashed rule, then one line per row. Columns are sized by character
/// count; the last column is never padded.
fn table_lines(headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(pad_row(headers.iter().copied(), &widths));
    lines.push(pad_row(rule.iter().map(String::as_str), &widths));
    for row in rows {
        lines.push(pad_row(row.iter().map(String::as_str), &widths));
    }
    lines
}

fn pad_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    padded.join("  ").trim_end().to_string()
}
