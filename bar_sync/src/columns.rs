//! Mapping from scraped table headers to bar fields.
//!
//! Headers come straight from the brokerage page ("Fecha", "Apertura",
//! "Máximo", "Volumen Nominal", ...). A [`ColumnTable`] lists, for every
//! [`BarField`], the substrings that identify it; [`ColumnTable::resolve`]
//! matches them once per table against normalized headers and produces a
//! [`ResolvedColumns`] index.
//!
//! Header normalization: trim, spaces to `_`, acute-accented vowels to plain
//! vowels, lowercase. Matching is substring containment; within a field the
//! accepted substrings are tried in order, and for each one the first header
//! (left to right) that contains it wins.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The semantic columns a history table can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarField {
    Date,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl BarField {
    /// All fields, in table order.
    pub const ALL: [BarField; 6] = [
        BarField::Date,
        BarField::Open,
        BarField::High,
        BarField::Low,
        BarField::Close,
        BarField::Volume,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BarField::Date => "date",
            BarField::Open => "open",
            BarField::High => "high",
            BarField::Low => "low",
            BarField::Close => "close",
            BarField::Volume => "volume",
        };
        f.write_str(s)
    }
}

/// Accepted header substrings per field.
///
/// Deserializes from a TOML table such as
/// `volume = ["volumen", "volumen_nominal"]`; fields left out keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndexMap<BarField, Vec<String>>", into = "IndexMap<BarField, Vec<String>>")]
pub struct ColumnTable {
    accepted: IndexMap<BarField, Vec<String>>,
}

impl Default for ColumnTable {
    fn default() -> Self {
        let accepted = [
            (BarField::Date, vec!["fecha"]),
            (BarField::Open, vec!["apertura"]),
            (BarField::High, vec!["maximo"]),
            (BarField::Low, vec!["minimo"]),
            (BarField::Close, vec!["cierre"]),
            (BarField::Volume, vec!["volumen", "volumen_nominal"]),
        ]
        .into_iter()
        .map(|(f, subs)| (f, subs.into_iter().map(String::from).collect()))
        .collect();
        Self { accepted }
    }
}

impl From<IndexMap<BarField, Vec<String>>> for ColumnTable {
    fn from(overrides: IndexMap<BarField, Vec<String>>) -> Self {
        let mut table = ColumnTable::default();
        for (field, subs) in overrides {
            let subs: Vec<String> = subs
                .iter()
                .map(|s| normalize_header(s))
                .filter(|s| !s.is_empty())
                .collect();
            if !subs.is_empty() {
                table.accepted.insert(field, subs);
            }
        }
        table
    }
}

impl From<ColumnTable> for IndexMap<BarField, Vec<String>> {
    fn from(t: ColumnTable) -> Self {
        t.accepted
    }
}

impl ColumnTable {
    /// Accepted substrings for `field`.
    pub fn accepted(&self, field: BarField) -> &[String] {
        self.accepted.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolves every field against `headers`.
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> ResolvedColumns {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();

        let mut slots = [None; 6];
        for field in BarField::ALL {
            slots[field.index()] = self.accepted(field).iter().find_map(|needle| {
                normalized.iter().position(|h| h.contains(needle.as_str()))
            });
        }
        ResolvedColumns { slots }
    }
}

/// Column index per field for one concrete table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedColumns {
    slots: [Option<usize>; 6],
}

impl ResolvedColumns {
    /// Column index of `field`, if the table carries it.
    pub fn get(&self, field: BarField) -> Option<usize> {
        self.slots[field.index()]
    }

    /// Column index of the date; `None` makes the table unusable.
    pub fn date(&self) -> Option<usize> {
        self.get(BarField::Date)
    }

    /// Fields the table does not carry.
    pub fn missing(&self) -> Vec<BarField> {
        BarField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }
}

/// Trim, spaces to underscores, strip acute accents, lowercase.
pub fn normalize_header(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOL_HEADERS: [&str; 7] = [
        "Fecha",
        "Apertura",
        "Máximo",
        "Mínimo",
        "Cierre",
        "Cierre ajustado",
        "Volumen Nominal",
    ];

    #[test]
    fn resolves_brokerage_headers() {
        let cols = ColumnTable::default().resolve(&IOL_HEADERS);
        assert_eq!(cols.date(), Some(0));
        assert_eq!(cols.get(BarField::Open), Some(1));
        assert_eq!(cols.get(BarField::High), Some(2));
        assert_eq!(cols.get(BarField::Low), Some(3));
        // first match wins over "Cierre ajustado"
        assert_eq!(cols.get(BarField::Close), Some(4));
        assert_eq!(cols.get(BarField::Volume), Some(6));
        assert!(cols.missing().is_empty());
    }

    #[test]
    fn missing_date_is_visible() {
        let cols = ColumnTable::default().resolve(&["Apertura", "Cierre"]);
        assert_eq!(cols.date(), None);
        assert_eq!(
            cols.missing(),
            vec![BarField::Date, BarField::High, BarField::Low, BarField::Volume]
        );
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("  Volumen Nominal "), "volumen_nominal");
        assert_eq!(normalize_header("MÁXIMO"), "maximo");
        assert_eq!(normalize_header("Mínimo"), "minimo");
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let toml_src = r#"
date = ["Date", "fecha"]
close = ["Último"]
"#;
        let table: ColumnTable = toml::from_str(toml_src).unwrap();
        assert_eq!(table.accepted(BarField::Date), ["date", "fecha"]);
        assert_eq!(table.accepted(BarField::Close), ["ultimo"]);
        assert_eq!(table.accepted(BarField::Open), ["apertura"]);

        let cols = table.resolve(&["Trade Date", "Ultimo", "Apertura"]);
        assert_eq!(cols.date(), Some(0));
        assert_eq!(cols.get(BarField::Close), Some(1));
        assert_eq!(cols.get(BarField::Open), Some(2));
    }
}
