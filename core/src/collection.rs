//! Paginated, filterable view over a list endpoint.
//!
//! # Design
//! A `Collection<S>` owns the materialized entities, the total-count hint
//! reported by the server, a [`Cursor`] and at most one [`Filter`].
//!
//! Every fetch builds its result off to the side and commits it in one
//! assignment after the last request succeeded. A failed or abandoned fetch
//! therefore leaves the previous content, total, cursor and extent intact.
//!
//! Page indices are zero-based. `fetch_next_page` and `fetch_previous_page`
//! clamp their target into `[0, last_page]` once the total is known, so
//! stepping past either end re-fetches the boundary page. Before the first
//! fetch the total is unknown and "next" is not clamped upwards. A direct
//! `fetch_page(i)` is never clamped: a page past the end is simply empty.

use std::ops::Index;

use futures::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::cursor::Cursor;
use crate::entity::{describe, Entity};
use crate::error::ApiError;
use crate::query::Filter;
use crate::schema::Schema;
use crate::types::{Listing, Page};

/// What the last successful fetch materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Unfetched,
    Page(u32),
    All,
    Unused,
}

/// Construction options: page size and an optional filter.
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    pub nb_per_page: Option<u32>,
    pub filter: Option<Filter>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_per_page(mut self, n: u32) -> Self {
        self.nb_per_page = Some(n);
        self
    }

    pub fn filter(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        self.filter = Some(Filter::new(key, value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Collection<S> {
    items: Vec<Entity<S>>,
    total: Option<u64>,
    cursor: Cursor,
    filter: Option<Filter>,
    extent: Extent,
}

impl<S: Schema> Default for Collection<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Collection<S> {
    /// An empty, unfiltered collection whose page size is left to the server.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            total: None,
            cursor: Cursor::default(),
            filter: None,
            extent: Extent::Unfetched,
        }
    }

    pub fn with_options(options: CollectionOptions) -> Result<Self, ApiError> {
        let mut collection = Self::new();
        collection.cursor.page_size = options.nb_per_page.unwrap_or(0);
        if let Some(filter) = options.filter {
            filter.check::<S>()?;
            collection.filter = Some(filter);
        }
        Ok(collection)
    }

    /// Build a collection and materialize its whole result set.
    pub async fn load_all(client: &ApiClient, options: CollectionOptions) -> Result<Self, ApiError> {
        let mut collection = Self::with_options(options)?;
        collection.fetch_all(client, None).await?;
        Ok(collection)
    }

    /// Build a collection and materialize its unused entities.
    pub async fn load_unused(client: &ApiClient, options: CollectionOptions) -> Result<Self, ApiError> {
        let mut collection = Self::with_options(options)?;
        collection.fetch_unused(client).await?;
        Ok(collection)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of materialized entities (not the remote total).
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity<S>> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Entity<S>> {
        self.items.get(index)
    }

    pub fn as_slice(&self) -> &[Entity<S>] {
        &self.items
    }

    /// Total reported by the server on the last fetch, if any.
    pub fn total_count(&self) -> Option<u64> {
        self.total
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn cur_page(&self) -> u32 {
        self.cursor.current_page
    }

    pub fn set_cur_page(&mut self, page: u32) {
        self.cursor.current_page = page;
    }

    pub fn page_size(&self) -> u32 {
        self.cursor.page_size
    }

    pub fn set_page_size(&mut self, page_size: u32) {
        self.cursor.page_size = page_size;
    }

    /// Last page index, once a fetch has reported the total.
    pub fn last_page(&self) -> Option<u32> {
        self.total.map(|total| self.cursor.last_page(total))
    }

    /// Total of the listing `fetch_page` walks: the plain listing under the
    /// current filter. An unused total belongs to another result set.
    fn page_total(&self) -> Option<u64> {
        match self.extent {
            Extent::Unused => None,
            _ => self.total,
        }
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn set_filter(&mut self, key: &str, value: impl std::fmt::Display) -> Result<(), ApiError> {
        let filter = Filter::new(key, value);
        filter.check::<S>()?;
        self.filter = Some(filter);
        self.total = None;
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.total = None;
    }

    // ------------------------------------------------------------------
    // Local mutation
    // ------------------------------------------------------------------

    pub fn push(&mut self, entity: Entity<S>) {
        self.items.push(entity);
    }

    /// Append an untyped value. Only objects tagged with `S::CLASS` are
    /// accepted; anything else fails with `TypeMismatch` and the collection
    /// is left unchanged.
    pub fn push_value(&mut self, value: Value) -> Result<(), ApiError> {
        if value.get("class").and_then(Value::as_str) != Some(S::CLASS) {
            return Err(ApiError::TypeMismatch {
                expected: S::CLASS,
                found: describe(&value),
            });
        }
        let entity = Entity::from_wire(value)?;
        self.items.push(entity);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    /// Materialize the entire result set, whatever number of pages it spans.
    ///
    /// `nb_per_page` overrides the cursor's page size for this call only.
    pub async fn fetch_all(&mut self, client: &ApiClient, nb_per_page: Option<u32>) -> Result<(), ApiError> {
        let page_size = nb_per_page.unwrap_or(self.cursor.page_size);
        let (items, total) = self.aggregate(client, Listing::All, page_size).await?;
        self.commit(items, total, Extent::All);
        Ok(())
    }

    /// Same as [`fetch_all`](Self::fetch_all), on the unused-entities endpoint.
    pub async fn fetch_unused(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        if !S::SUPPORTS_UNUSED {
            return Err(ApiError::Unsupported {
                resource: S::RESOURCE,
                operation: "fetch_unused",
            });
        }
        let (items, total) = self
            .aggregate(client, Listing::Unused, self.cursor.page_size)
            .await?;
        self.commit(items, total, Extent::Unused);
        Ok(())
    }

    /// Replace the content with one page (the current one when `page` is
    /// `None`) and move the cursor there.
    pub async fn fetch_page(&mut self, client: &ApiClient, page: Option<u32>) -> Result<(), ApiError> {
        let index = page.unwrap_or(self.cursor.current_page);

        // Without a page size only page 0 exists.
        if self.cursor.page_size == 0 && index > 0 {
            debug!(resource = S::RESOURCE, index, "page past the single unbounded page");
            self.items.clear();
            self.cursor.current_page = index;
            self.extent = Extent::Page(index);
            return Ok(());
        }

        let page = self
            .request_page(client, Listing::All, self.cursor.max(), self.cursor.offset(index))
            .await?;
        self.commit(page.items, page.total, Extent::Page(index));
        self.cursor.current_page = index;
        Ok(())
    }

    pub async fn fetch_next_page(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        let next = self.cursor.current_page.saturating_add(1);
        let target = match self.page_total() {
            Some(total) => self.cursor.clamp(next, total),
            None => next,
        };
        self.fetch_page(client, Some(target)).await
    }

    pub async fn fetch_previous_page(&mut self, client: &ApiClient) -> Result<(), ApiError> {
        let previous = self.cursor.current_page.saturating_sub(1);
        let target = match self.page_total() {
            Some(total) => self.cursor.clamp(previous, total),
            None => previous,
        };
        self.fetch_page(client, Some(target)).await
    }

    /// Multi-page aggregation shared by `fetch_all` and `fetch_unused`.
    ///
    /// The first page discloses the total and the page size the server
    /// really applies; the remaining pages are then requested with bounded
    /// concurrency and reassembled in page order.
    async fn aggregate(
        &self,
        client: &ApiClient,
        listing: Listing,
        page_size: u32,
    ) -> Result<(Vec<Entity<S>>, u64), ApiError> {
        let max = (page_size > 0).then(|| u64::from(page_size));
        let first = self.request_page(client, listing, max, 0).await?;
        let total = first.total;
        let mut items = first.items;
        let received = items.len() as u64;

        if received >= total {
            return Ok((items, total));
        }

        // A short first page means the server capped it, whatever it reports.
        let effective = if first.per_page > 0 {
            first.per_page.min(received)
        } else {
            received
        };
        if effective == 0 {
            return Err(ApiError::InvalidResponse(format!(
                "empty first page for {} with {total} items",
                S::RESOURCE
            )));
        }
        if max.is_some_and(|m| effective < m) {
            warn!(
                resource = S::RESOURCE,
                requested = page_size,
                applied = effective,
                "server capped page size"
            );
        }

        let pages = total.div_ceil(effective);
        debug!(
            resource = S::RESOURCE,
            total,
            page_size = effective,
            pages,
            "fetching remaining pages"
        );

        let rest: Vec<Page<Entity<S>>> = stream::iter(1..pages)
            .map(|page| self.request_page(client, listing, Some(effective), page * effective))
            .buffered(client.max_concurrent_requests())
            .try_collect()
            .await?;

        items.reserve(total.saturating_sub(received) as usize);
        for page in rest {
            items.extend(page.items);
        }
        if items.len() as u64 != total {
            return Err(ApiError::InvalidResponse(format!(
                "assembled {} of {total} {} items",
                items.len(),
                S::RESOURCE
            )));
        }
        Ok((items, total))
    }

    async fn request_page(
        &self,
        client: &ApiClient,
        listing: Listing,
        max: Option<u64>,
        offset: u64,
    ) -> Result<Page<Entity<S>>, ApiError> {
        let request = client.build_list::<S>(listing, self.filter.as_ref(), max, offset);
        let response = client.execute(request).await?;
        client.parse_list::<S>(response)
    }

    fn commit(&mut self, items: Vec<Entity<S>>, total: u64, extent: Extent) {
        self.items = items;
        self.total = Some(total);
        self.extent = extent;
    }
}

impl<S> Index<usize> for Collection<S> {
    type Output = Entity<S>;

    fn index(&self, index: usize) -> &Entity<S> {
        &self.items[index]
    }
}

impl<'a, S> IntoIterator for &'a Collection<S> {
    type Item = &'a Entity<S>;
    type IntoIter = std::slice::Iter<'a, Entity<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<S> IntoIterator for Collection<S> {
    type Item = Entity<S>;
    type IntoIter = std::vec::IntoIter<Entity<S>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<S> Extend<Entity<S>> for Collection<S> {
    fn extend<I: IntoIterator<Item = Entity<S>>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}
