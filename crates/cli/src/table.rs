// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared table renderer for CLI list views.
//!
//! Consistent column alignment and truncation across `wave list`,
//! `wave status`, and `wave artifacts`.

/// Column text alignment.
pub enum Align {
    Left,
    Right,
}

/// A column definition in a [`Table`].
pub struct Column {
    pub name: &'static str,
    pub align: Align,
    /// Maximum width (`None` = unlimited). Values exceeding this are truncated.
    pub max_width: Option<usize>,
}

impl Column {
    /// Left-aligned column.
    pub fn left(name: &'static str) -> Self {
        Self {
            name,
            align: Align::Left,
            max_width: None,
        }
    }

    /// Right-aligned column.
    pub fn right(name: &'static str) -> Self {
        Self {
            name,
            align: Align::Right,
            max_width: None,
        }
    }

    /// Cap the column width.
    pub fn max(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Simple monospace table.
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add one row; missing cells render empty, extra cells are dropped.
    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    /// Render with a header line; returns the full text.
    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.name.len()).collect();
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(self.rows.len());

        for raw in &self.rows {
            let mut row = Vec::with_capacity(self.columns.len());
            for (i, column) in self.columns.iter().enumerate() {
                let mut cell = raw.get(i).cloned().unwrap_or_default();
                if let Some(max) = column.max_width {
                    if cell.len() > max {
                        let mut end = max.saturating_sub(1);
                        while end > 0 && !cell.is_char_boundary(end) {
                            end -= 1;
                        }
                        cell.truncate(end);
                        cell.push('…');
                    }
                }
                widths[i] = widths[i].max(cell.len());
                row.push(cell);
            }
            rows.push(row);
        }

        let mut out = String::new();
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str(&pad(column.name, widths[i], &Align::Left));
        }
        out.push('\n');

        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    out.push_str("  ");
                }
                out.push_str(&pad(cell, widths[i], &self.columns[i].align));
            }
            // Keep lines clean for empty trailing cells
            while out.ends_with(' ') {
                out.pop();
            }
            out.push('\n');
        }
        out
    }
}

fn pad(text: &str, width: usize, align: &Align) -> String {
    match align {
        Align::Left => format!("{text:<width$}"),
        Align::Right => format!("{text:>width$}"),
    }
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
