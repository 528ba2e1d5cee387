use std::fmt::Write as _;

use crate::error::{PipelineError, PipelineResult};

pub type Cell = Option<String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> PipelineResult<Self> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(PipelineError::Parse(format!(
                    "Row {} has {} field(s) but the header defines {}",
                    idx + 1,
                    row.len(),
                    headers.len()
                )));
            }
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = Option<&str>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| row[idx].as_deref()))
    }

    /// Sets `name` to `values`, replacing an existing column of that name or
    /// appending a new one.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> PipelineResult<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Internal(format!(
                "Column '{name}' has {} value(s) for {} row(s)",
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }
}

/// Renders `rows` under `headers` as whitespace-aligned columns.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let flat = value.replace(['\n', '\r', '\t'], " ");
            format!("{flat:<width$}")
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|v| (!v.is_empty()).then(|| v.to_string()))
            .collect()
    }

    #[test]
    fn new_rejects_ragged_rows() {
        let err = Table::new(
            vec!["a".into(), "b".into()],
            vec![cells(&["1", "2"]), cells(&["3"])],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Row 2 has 1 field(s)"));
    }

    #[test]
    fn set_column_appends_then_replaces() {
        let mut table = Table::new(vec!["a".into()], vec![cells(&["1"]), cells(&["2"])]).unwrap();
        table
            .set_column("p", vec![Some("0.5".into()), None])
            .unwrap();
        assert_eq!(table.headers(), ["a", "p"]);
        table
            .set_column("p", vec![None, Some("1".into())])
            .unwrap();
        assert_eq!(table.column_count(), 2);
        let values = table.column("p").unwrap().collect::<Vec<_>>();
        assert_eq!(values, vec![None, Some("1")]);
    }

    #[test]
    fn set_column_rejects_length_mismatch() {
        let mut table = Table::new(vec!["a".into()], vec![cells(&["1"])]).unwrap();
        assert!(table.set_column("p", Vec::new()).is_err());
    }

    #[test]
    fn render_table_pads_columns() {
        let rendered = render_table(
            &["name".to_string(), "count".to_string()],
            &[vec!["default".to_string(), "11".to_string()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "name     count");
        assert_eq!(lines[1], "-------  -----");
        assert_eq!(lines[2], "default  11");
    }
}
