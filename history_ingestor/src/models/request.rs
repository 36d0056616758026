use chrono::NaiveDate;

/// One history download: a symbol and an inclusive date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Upstream symbol (e.g. "GGAL", "AL30").
    pub symbol: String,
    /// Inclusive first date.
    pub from: NaiveDate,
    /// Inclusive last date.
    pub to: NaiveDate,
}

impl HistoryRequest {
    /// Builds a request for `symbol` covering `from..=to`.
    pub fn new(symbol: impl Into<String>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            from,
            to,
        }
    }

    /// The window in the `dd/mm/yyyy - dd/mm/yyyy` form the brokerage expects.
    pub fn range_label(&self) -> String {
        format!(
            "{} - {}",
            self.from.format("%d/%m/%Y"),
            self.to.format("%d/%m/%Y")
        )
    }
}
