//! Raw history table as captured from the brokerage, before any typing.
//!
//! Headers are kept verbatim and cells keep whatever the page carried: most
//! are text tokens such as `"20.390,00"`, some sources already hand over
//! numbers. Interpretation (column matching, number and date parsing) happens
//! downstream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One cell of a raw table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Already-numeric value.
    Number(f64),
    /// Text token exactly as scraped.
    Text(String),
}

impl Cell {
    /// Text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Header row plus data rows. `null` cells deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column headers, verbatim.
    pub headers: Vec<String>,
    /// Data rows; a row may be shorter than `headers`.
    #[serde(default)]
    pub rows: Vec<Vec<Option<Cell>>>,
}

impl RawTable {
    /// Builds a table from text-only rows.
    pub fn from_text<'a, H, R>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = Vec<&'a str>>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| Some(Cell::from(c))).collect())
                .collect(),
        }
    }

    /// True when the table carries no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Cell at (`row`, `col`); `None` when missing, `null`, or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row)?.get(col)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mixed_cells_and_nulls() {
        let t: RawTable = serde_json::from_str(
            r#"{"headers":["Fecha","Cierre","Volumen"],
                "rows":[["01/02/2024","1.234,50",1200],["01/03/2024",null]]}"#,
        )
        .unwrap();

        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, 1), Some(&Cell::Text("1.234,50".into())));
        assert_eq!(t.cell(0, 2), Some(&Cell::Number(1200.0)));
        assert_eq!(t.cell(1, 1), None);
        // short row
        assert_eq!(t.cell(1, 2), None);
    }

    #[test]
    fn headers_only_table_is_empty() {
        let t: RawTable = serde_json::from_str(r#"{"headers":["Fecha"]}"#).unwrap();
        assert!(t.is_empty());
    }
}
