//! Sort direction and page window types shared by list queries

use serde::{Deserialize, Serialize};

/// Largest number of rows a single page may request
pub const MAX_PAGE_SIZE: i64 = 500;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending
    #[default]
    Asc,

    /// Descending
    Desc,
}

impl SortDirection {
    /// SQL keyword for this direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Error raised for an unusable page window
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageWindowError {
    /// End index precedes start index
    #[error("Page window end ({end}) is before start ({start})")]
    Inverted { start: i64, end: i64 },

    /// Start index is negative
    #[error("Page window start must not be negative, got {0}")]
    NegativeStart(i64),

    /// Window covers more rows than allowed
    #[error("Page window covers {0} rows, the maximum is {max}", max = MAX_PAGE_SIZE)]
    TooLarge(i64),

    /// Window end does not fit in a row index
    #[error("Page window end is out of range")]
    OutOfRange,
}

/// Zero-based, inclusive row window (`start..=end`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// First row index (zero-based)
    pub start: i64,

    /// Last row index (inclusive)
    pub end: i64,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

impl PageWindow {
    /// Creates a window, rejecting inverted, negative or oversized ranges
    pub fn new(start: i64, end: i64) -> Result<Self, PageWindowError> {
        let window = Self { start, end };
        window.validate()?;
        Ok(window)
    }

    /// Window for a zero-based page number of the given size
    pub fn page(page: i64, per_page: i64) -> Result<Self, PageWindowError> {
        let start = page.saturating_mul(per_page);
        let end = start
            .checked_add(per_page.saturating_sub(1))
            .ok_or(PageWindowError::OutOfRange)?;
        Self::new(start, end)
    }

    /// Checks the window invariants
    pub fn validate(&self) -> Result<(), PageWindowError> {
        if self.start < 0 {
            return Err(PageWindowError::NegativeStart(self.start));
        }
        if self.end < self.start {
            return Err(PageWindowError::Inverted {
                start: self.start,
                end: self.end,
            });
        }
        if self.limit() > MAX_PAGE_SIZE {
            return Err(PageWindowError::TooLarge(self.limit()));
        }
        Ok(())
    }

    /// SQL LIMIT for this window
    ///
    /// Saturates for windows wider than `i64::MAX` rows.
    pub fn limit(&self) -> i64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// SQL OFFSET for this window
    pub fn offset(&self) -> i64 {
        self.start
    }
}

/// A page of rows plus the total number of matching rows
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Rows inside the requested window
    pub rows: Vec<T>,

    /// Count of all rows matching the filters
    pub total: i64,

    /// Window the rows were taken from
    pub window: PageWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_limit_offset() {
        let window = PageWindow::new(10, 19).unwrap();
        assert_eq!(window.limit(), 10);
        assert_eq!(window.offset(), 10);

        let single = PageWindow::new(0, 0).unwrap();
        assert_eq!(single.limit(), 1);
    }

    #[test]
    fn test_window_rejects_bad_ranges() {
        assert_eq!(
            PageWindow::new(5, 4),
            Err(PageWindowError::Inverted { start: 5, end: 4 })
        );
        assert_eq!(PageWindow::new(-1, 4), Err(PageWindowError::NegativeStart(-1)));
        assert!(matches!(
            PageWindow::new(0, MAX_PAGE_SIZE),
            Err(PageWindowError::TooLarge(_))
        ));
    }

    #[test]
    fn test_page_helper() {
        let window = PageWindow::page(2, 25).unwrap();
        assert_eq!(window, PageWindow { start: 50, end: 74 });
    }

    #[test]
    fn test_huge_windows_rejected_without_overflow() {
        let window: PageWindow =
            serde_json::from_str(r#"{"start":0,"end":9223372036854775807}"#).unwrap();
        assert_eq!(window.limit(), i64::MAX);
        assert_eq!(window.validate(), Err(PageWindowError::TooLarge(i64::MAX)));

        assert_eq!(
            PageWindow::page(i64::MAX, 25),
            Err(PageWindowError::OutOfRange)
        );
        assert_eq!(
            PageWindow::page(1, i64::MAX),
            Err(PageWindowError::OutOfRange)
        );
    }

    #[test]
    fn test_sort_direction_sql() {
        assert_eq!(SortDirection::Asc.as_sql(), "ASC");
        assert_eq!(SortDirection::Desc.as_sql(), "DESC");
        assert_eq!(
            serde_json::from_str::<SortDirection>("\"desc\"").unwrap(),
            SortDirection::Desc
        );
    }
}
