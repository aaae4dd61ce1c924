//! Forward-only, page-at-a-time query results.
//!
//! [`QueryIterator`] pulls one page at a time from a [`PageSource`] and
//! decodes it on request, so only the current page is held in memory.
//! It cannot be restarted. The first fetch or decode failure is kept in
//! [`error`](QueryIterator::error) and stops any further advancement.
//!
//! ```rust,ignore
//! let mut rows = client.query_iter("SELECT Id, Name FROM Account")?;
//! while rows.next().await {
//!     let page: Vec<Account> = rows.decode()?;
//!     // ...
//! }
//! if let Some(err) = rows.error() {
//!     return Err(err.into());
//! }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use forcelink_client::{codec, Row};

use crate::error::{Error, Result};

/// Undecoded rows of one page.
#[derive(Debug, Clone)]
pub enum RawRows {
    /// REST query `records`.
    Json(Vec<Value>),
    /// Bulk query result CSV, header line included.
    Csv(Bytes),
}

/// One page handed out by a [`PageSource`].
#[derive(Debug, Clone)]
pub struct Page {
    pub rows: RawRows,
    pub row_count: usize,
    /// Cursor of the following page; `None` on the last page.
    pub next: Option<String>,
}

impl Page {
    pub fn json(rows: Vec<Value>, next: Option<String>) -> Self {
        Self {
            row_count: rows.len(),
            rows: RawRows::Json(rows),
            next,
        }
    }

    pub fn csv(data: Bytes, row_count: usize, next: Option<String>) -> Self {
        Self {
            rows: RawRows::Csv(data),
            row_count,
            next,
        }
    }
}

/// Where pages come from: REST `nextRecordsUrl` paging or bulk query
/// result locators.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `cursor`, or the first page when `cursor` is `None`.
    async fn fetch(&mut self, cursor: Option<&str>) -> forcelink_client::Result<Page>;
}

/// Continuation state of an iterator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCursor {
    /// Cursor of the next page to fetch.
    pub position: Option<String>,
    pub done: bool,
}

/// Pull-based iterator over query pages.
pub struct QueryIterator {
    source: Box<dyn PageSource>,
    cursor: QueryCursor,
    current: Option<Page>,
    /// Result-set index of the current page's first row.
    first_row: usize,
    pages: usize,
    error: Option<Error>,
}

impl std::fmt::Debug for QueryIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryIterator")
            .field("cursor", &self.cursor)
            .field("pages", &self.pages)
            .field("first_row", &self.first_row)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl QueryIterator {
    pub fn new(source: impl PageSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cursor: QueryCursor::default(),
            current: None,
            first_row: 0,
            pages: 0,
            error: None,
        }
    }

    /// Advance to the next page.
    ///
    /// Returns false once the results are exhausted or after the first
    /// error; see [`error`](Self::error).
    pub async fn next(&mut self) -> bool {
        if self.error.is_some() || self.cursor.done {
            self.current = None;
            return false;
        }

        let position = self.cursor.position.take();
        match self.source.fetch(position.as_deref()).await {
            Ok(page) => {
                if let Some(previous) = &self.current {
                    self.first_row += previous.row_count;
                }
                self.pages += 1;
                self.cursor.done = page.next.is_none();
                self.cursor.position = page.next.clone();
                debug!(page = self.pages, rows = page.row_count, done = self.cursor.done, "Fetched query page");

                if page.row_count == 0 && self.cursor.done {
                    self.current = None;
                    return false;
                }
                self.current = Some(page);
                true
            }
            Err(err) => {
                self.error = Some(err.into());
                self.current = None;
                self.cursor.done = true;
                false
            }
        }
    }

    /// Decode the current page.
    ///
    /// A decode failure is also kept as the iterator's error, so the next
    /// [`next`](Self::next) returns false.
    pub fn decode<T: Row>(&mut self) -> Result<Vec<T>> {
        let Some(page) = &self.current else {
            return Err(forcelink_client::Error::state("no current page; call next() first").into());
        };

        let decoded = match &page.rows {
            RawRows::Json(rows) => codec::decode_json_rows(rows, self.first_row),
            RawRows::Csv(data) => codec::decode_csv(data, self.first_row),
        };

        decoded.map_err(|err| {
            let err = Error::from(err);
            self.error = Some(err.detached());
            self.cursor.done = true;
            err
        })
    }

    /// The error that stopped iteration, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn cursor(&self) -> &QueryCursor {
        &self.cursor
    }

    /// The page most recently returned by [`next`](Self::next).
    pub fn current_page(&self) -> Option<&Page> {
        self.current.as_ref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Drain every remaining page into one vector.
    pub async fn collect_all<T: Row>(mut self) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        while self.next().await {
            rows.extend(self.decode::<T>()?);
        }
        match self.error {
            Some(err) => Err(err),
            None => Ok(rows),
        }
    }
}
