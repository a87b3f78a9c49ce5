//! Table serializers

use std::io::Write;

use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use super::{OutputFormat, ProcessorError, Row};

/// Union of row keys in first-seen order, or only the first row's keys
pub fn columns_of(rows: &[Row], first_row_only: bool) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let rows = if first_row_only {
        &rows[..rows.len().min(1)]
    } else {
        rows
    };
    for row in rows {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Text of a single cell. Nested values are rendered as JSON.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub fn html_header_row(columns: &[String]) -> String {
    let cells: String = columns
        .iter()
        .map(|c| format!("<th>{}</th>", escape_html(c)))
        .collect();
    format!("<tr>{}</tr>", cells)
}

pub fn html_row(columns: &[String], row: &Row) -> String {
    let cells: String = columns
        .iter()
        .map(|c| format!("<td>{}</td>", escape_html(&cell_text(row.get(c)))))
        .collect();
    format!("<tr>{}</tr>", cells)
}

/// Serialize `rows` in `format`, using the union of their columns
pub fn write_rows<W: Write + ?Sized>(
    format: OutputFormat,
    rows: &[Row],
    writer: &mut W,
) -> Result<(), ProcessorError> {
    let columns = columns_of(rows, false);
    write_rows_with_columns(format, rows, &columns, writer)
}

pub fn write_rows_with_columns<W: Write + ?Sized>(
    format: OutputFormat,
    rows: &[Row],
    columns: &[String],
    writer: &mut W,
) -> Result<(), ProcessorError> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, rows)?;
            writeln!(writer)?;
        }
        OutputFormat::Yaml => serde_yaml::to_writer(&mut *writer, rows)?,
        OutputFormat::Ascii => write_ascii(rows, columns, writer)?,
        OutputFormat::Markdown => write_markdown(rows, columns, writer)?,
        OutputFormat::Html => write_html(rows, columns, writer)?,
        OutputFormat::Csv => write_delimited(rows, columns, b',', writer)?,
        OutputFormat::Tsv => write_delimited(rows, columns, b'\t', writer)?,
    }
    writer.flush()?;
    Ok(())
}

fn write_ascii<W: Write + ?Sized>(rows: &[Row], columns: &[String], w: &mut W) -> std::io::Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell_text(row.get(c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].width())
                .chain(std::iter::once(c.width()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+";

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("| {}{} ", v, " ".repeat(w.saturating_sub(v.width()))))
            .collect::<String>()
            + "|"
    };

    writeln!(w, "{}", separator)?;
    writeln!(w, "{}", line(columns))?;
    writeln!(w, "{}", separator)?;
    for row in &cells {
        writeln!(w, "{}", line(&row[..]))?;
    }
    writeln!(w, "{}", separator)?;
    Ok(())
}

fn write_markdown<W: Write + ?Sized>(rows: &[Row], columns: &[String], w: &mut W) -> std::io::Result<()> {
    if columns.is_empty() {
        return Ok(());
    }
    let escape = |s: &str| s.replace('|', "\\|").replace('\n', " ");

    let header: Vec<String> = columns.iter().map(|c| escape(c)).collect();
    writeln!(w, "| {} |", header.join(" | "))?;
    writeln!(w, "|{}", " --- |".repeat(columns.len()))?;
    for row in rows {
        let cells: Vec<String> = columns.iter().map(|c| escape(&cell_text(row.get(c)))).collect();
        writeln!(w, "| {} |", cells.join(" | "))?;
    }
    Ok(())
}

fn write_html<W: Write + ?Sized>(rows: &[Row], columns: &[String], w: &mut W) -> std::io::Result<()> {
    writeln!(w, "<table>")?;
    writeln!(w, "<thead>\n{}\n</thead>", html_header_row(columns))?;
    writeln!(w, "<tbody>")?;
    for row in rows {
        writeln!(w, "{}", html_row(columns, row))?;
    }
    writeln!(w, "</tbody>")?;
    writeln!(w, "</table>")?;
    Ok(())
}

fn write_delimited<W: Write + ?Sized>(
    rows: &[Row],
    columns: &[String],
    delimiter: u8,
    w: &mut W,
) -> Result<(), ProcessorError> {
    let mut out = csv::WriterBuilder::new().delimiter(delimiter).from_writer(w);
    out.write_record(columns)?;
    for row in rows {
        out.write_record(columns.iter().map(|c| cell_text(row.get(c))))?;
    }
    out.flush()?;
    Ok(())
}
