//! Lazy page-by-page iteration.

use crate::builder::Builder;
use crate::error::OrmResult;
use crate::gateway::Connection;
use crate::row::Row;
use futures_core::Stream;
use std::collections::VecDeque;

type RowMap<'a, T> = Box<dyn FnMut(Row) -> OrmResult<T> + Send + 'a>;

/// A pull-based sequence over the rows of a query, fetched one page at a time.
///
/// Pages are requested in increasing order, each only after the previous
/// one has been fully handed out. The sequence ends at the first empty page
/// or at the first page shorter than the page size, whichever comes first.
/// Page state lives in the iterator, so iterating again means building a
/// new one from the query.
///
/// Pages start at the query's own offset, and a limit on the query caps the
/// total number of rows handed out.
///
/// Every page fetch fires `before-select` and bypasses the result cache.
///
/// # Example
/// ```ignore
/// let mut pages = db.table("events").order_by("id").lazy(500);
/// while let Some(row) = pages.next().await? {
///     handle(row);
/// }
/// ```
pub struct RowPages<'a, C, T = Row> {
    builder: Builder<'a, C>,
    page_size: u64,
    page: u64,
    exhausted: bool,
    buffer: VecDeque<Row>,
    fetches: usize,
    map: RowMap<'a, T>,
}

impl<'a, C: Connection> RowPages<'a, C> {
    /// Start at page 1. A zero page size is treated as one.
    pub(crate) fn new(builder: Builder<'a, C>, page_size: u64) -> Self {
        Self {
            builder,
            page_size: page_size.max(1),
            page: 1,
            exhausted: false,
            buffer: VecDeque::new(),
            fetches: 0,
            map: Box::new(Ok),
        }
    }
}

impl<'a, C: Connection, T: 'a> RowPages<'a, C, T> {
    /// Transform every row on its way out.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U + Send + 'a) -> RowPages<'a, C, U> {
        self.try_map(move |item| Ok(f(item)))
    }

    /// Transform every row with a fallible function; an error is yielded in place of the row.
    pub fn try_map<U>(self, mut f: impl FnMut(T) -> OrmResult<U> + Send + 'a) -> RowPages<'a, C, U> {
        let mut prev = self.map;
        RowPages {
            builder: self.builder,
            page_size: self.page_size,
            page: self.page,
            exhausted: self.exhausted,
            buffer: self.buffer,
            fetches: self.fetches,
            map: Box::new(move |row| f(prev(row)?)),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The page the next fetch will request (1-based).
    pub fn current_page(&self) -> u64 {
        self.page
    }

    /// Number of page requests issued so far.
    pub fn page_fetches(&self) -> usize {
        self.fetches
    }

    /// Whether no further page will be requested.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Request the next page into the buffer. Returns `false` once exhausted.
    async fn fill(&mut self) -> OrmResult<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let Some(rows) = self.builder.fetch_page(self.page, self.page_size).await? else {
            self.exhausted = true;
            return Ok(false);
        };
        self.fetches += 1;
        tracing::trace!(
            target: "hookqb.paginate",
            table = self.builder.state().table(),
            page = self.page,
            rows = rows.len(),
            "page fetched"
        );
        if rows.is_empty() {
            self.exhausted = true;
            return Ok(false);
        }
        if (rows.len() as u64) < self.page_size {
            self.exhausted = true;
        }
        self.page += 1;
        self.buffer.extend(rows);
        Ok(true)
    }

    /// The next row, fetching a page when the buffer runs dry.
    #[allow(clippy::should_implement_trait)]
    pub async fn next(&mut self) -> OrmResult<Option<T>> {
        if self.buffer.is_empty() && !self.fill().await? {
            return Ok(None);
        }
        match self.buffer.pop_front() {
            Some(row) => (self.map)(row).map(Some),
            None => Ok(None),
        }
    }

    /// The rest of the current page, or the next page when nothing is buffered.
    pub async fn next_page(&mut self) -> OrmResult<Option<Vec<T>>> {
        if self.buffer.is_empty() && !self.fill().await? {
            return Ok(None);
        }
        let rows: Vec<Row> = self.buffer.drain(..).collect();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((self.map)(row)?);
        }
        Ok(Some(out))
    }

    /// Drain every remaining row.
    pub async fn try_collect(mut self) -> OrmResult<Vec<T>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Adapt into a [`Stream`] of rows.
    pub fn into_stream(self) -> impl Stream<Item = OrmResult<T>> + 'a
    where
        C: 'a,
    {
        futures_util::stream::try_unfold(self, |mut pages| async move {
            match pages.next().await? {
                Some(item) => Ok(Some((item, pages))),
                None => Ok(None),
            }
        })
    }
}
