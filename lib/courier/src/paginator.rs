//! Restartable pagination.
//!
//! A [`Paginator`] derives each page request from the original request plus a
//! [`Pagination`] strategy, sends it through the normal resolution pipeline and
//! keeps the last response to decide whether another page exists.
//!
//! Restarting an iteration ([`Paginator::rewind`], done by [`Paginator::pages`]
//! and [`Paginator::collect_items`]) starts over from the first page, unless
//! `continue_on_new_loop` is set: then the paginator resumes after the last page
//! it fetched.
//!
//! # Example
//!
//! ```no_run
//! use courier::prelude::*;
//! use courier::{PageHooks, Pagination, Paginator};
//!
//! # struct Api;
//! # impl Connector for Api {
//! #     fn resolve_base_url(&self) -> String { "https://api.example.com".into() }
//! # }
//! struct ListUsers;
//!
//! impl Request for ListUsers {
//!     fn method(&self) -> Method {
//!         Method::Get
//!     }
//!
//!     fn resolve_endpoint(&self) -> String {
//!         "/users".to_string()
//!     }
//! }
//!
//! # async fn run() -> courier::Result<()> {
//! let mut paginator = Paginator::new(Api, ListUsers, Pagination::paged(Some(50)))
//!     .with_hooks(PageHooks::new().total_pages(|response| {
//!         response.json::<serde_json::Value>().ok()?["last_page"].as_u64()?.try_into().ok()
//!     }))
//!     .with_limit(10);
//!
//! let users: Vec<serde_json::Value> = paginator.items().await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream;
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::pool::{Concurrency, Pool, PoolSummary};
use crate::{
    Authenticator, Body, Capability, ConfigStore, Connector, ConnectorExt, Delay, Error, Headers,
    Hydrator, MiddlewarePipeline, MockClient, PendingRequest, Query, Request, Response,
    ResponseType, Result,
};
use courier_core::{Method, from_json_value};

// ============================================================================
// Strategy
// ============================================================================

/// How page requests are derived from the original request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pagination {
    /// Page number: `?page=<n>&per_page=<size>`.
    Paged {
        /// Page number parameter.
        page_param: String,
        /// Page size parameter.
        per_page_param: String,
        /// Page size, sent only when set.
        per_page: Option<usize>,
        /// Number of the first page.
        start_page: usize,
    },
    /// Offset: `?offset=<n * size>&limit=<size>`.
    Offset {
        /// Offset parameter.
        offset_param: String,
        /// Page size parameter.
        limit_param: String,
        /// Page size.
        per_page: usize,
    },
    /// Cursor: `?cursor=<token>`, the token coming from the previous response.
    Cursor {
        /// Cursor parameter.
        cursor_param: String,
        /// Page size parameter.
        per_page_param: Option<String>,
        /// Page size, sent only when set.
        per_page: Option<usize>,
    },
}

impl Pagination {
    /// Page number pagination starting at page 1.
    #[must_use]
    pub fn paged(per_page: Option<usize>) -> Self {
        Self::Paged {
            page_param: "page".to_string(),
            per_page_param: "per_page".to_string(),
            per_page,
            start_page: 1,
        }
    }

    /// Offset pagination.
    #[must_use]
    pub fn offset(per_page: usize) -> Self {
        Self::Offset {
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            per_page,
        }
    }

    /// Cursor pagination using the `cursor` parameter.
    #[must_use]
    pub fn cursor() -> Self {
        Self::Cursor {
            cursor_param: "cursor".to_string(),
            per_page_param: None,
            per_page: None,
        }
    }

    /// Page size, if known.
    #[must_use]
    pub const fn per_page(&self) -> Option<usize> {
        match self {
            Self::Paged { per_page, .. } | Self::Cursor { per_page, .. } => *per_page,
            Self::Offset { per_page, .. } => Some(*per_page),
        }
    }

    /// Query for the page at `index` (0-based).
    fn page_query(&self, index: usize, cursor: Option<&str>) -> Query {
        let mut query = Query::new();
        match self {
            Self::Paged {
                page_param,
                per_page_param,
                per_page,
                start_page,
            } => {
                query.add(page_param.as_str(), (start_page + index).to_string());
                if let Some(per_page) = per_page {
                    query.add(per_page_param.as_str(), per_page.to_string());
                }
            }
            Self::Offset {
                offset_param,
                limit_param,
                per_page,
            } => {
                query.add(offset_param.as_str(), (index * per_page).to_string());
                query.add(limit_param.as_str(), per_page.to_string());
            }
            Self::Cursor {
                cursor_param,
                per_page_param,
                per_page,
            } => {
                if let Some(cursor) = cursor {
                    query.add(cursor_param.as_str(), cursor);
                }
                if let (Some(param), Some(per_page)) = (per_page_param, per_page) {
                    query.add(param.as_str(), per_page.to_string());
                }
            }
        }
        query
    }

    const fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }
}

// ============================================================================
// Hooks
// ============================================================================

type PagePredicate = Arc<dyn Fn(&Response) -> bool + Send + Sync>;
type PageItems = Arc<dyn Fn(&Response) -> Result<Vec<Value>> + Send + Sync>;
type TotalPages = Arc<dyn Fn(&Response) -> Option<usize> + Send + Sync>;
type NextCursor = Arc<dyn Fn(&Response) -> Option<String> + Send + Sync>;

/// Variant-specific decisions taken from a page response.
///
/// Every hook has a default:
/// - `page_items`: the body if it is a JSON array, else its `data` array,
///   else nothing,
/// - `is_last_page`: no items, or fewer items than the page size; for cursor
///   pagination, no next cursor,
/// - `next_cursor`: the top-level `next_cursor` string,
/// - `total_pages`: none, which makes [`Paginator::pool`] fail.
///
/// Hooks are closures and are not serialized with the paginator.
#[derive(Clone, Default)]
pub struct PageHooks {
    is_last_page: Option<PagePredicate>,
    page_items: Option<PageItems>,
    total_pages: Option<TotalPages>,
    next_cursor: Option<NextCursor>,
}

impl fmt::Debug for PageHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHooks")
            .field("is_last_page", &self.is_last_page.is_some())
            .field("page_items", &self.page_items.is_some())
            .field("total_pages", &self.total_pages.is_some())
            .field("next_cursor", &self.next_cursor.is_some())
            .finish()
    }
}

impl PageHooks {
    /// Default hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether `response` is the last page.
    #[must_use]
    pub fn is_last_page<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        self.is_last_page = Some(Arc::new(hook));
        self
    }

    /// Extracts the items of a page.
    #[must_use]
    pub fn page_items<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.page_items = Some(Arc::new(hook));
        self
    }

    /// Reads the total number of pages, required by [`Paginator::pool`].
    #[must_use]
    pub fn total_pages<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Option<usize> + Send + Sync + 'static,
    {
        self.total_pages = Some(Arc::new(hook));
        self
    }

    /// Reads the cursor of the next page.
    #[must_use]
    pub fn next_cursor<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Option<String> + Send + Sync + 'static,
    {
        self.next_cursor = Some(Arc::new(hook));
        self
    }

    fn items(&self, response: &Response) -> Result<Vec<Value>> {
        if let Some(hook) = &self.page_items {
            return hook(response);
        }
        let items = match response.json::<Value>().unwrap_or(Value::Null) {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        Ok(items)
    }

    fn cursor(&self, response: &Response) -> Option<String> {
        if let Some(hook) = &self.next_cursor {
            return hook(response);
        }
        response
            .json::<Value>()
            .ok()?
            .get("next_cursor")?
            .as_str()
            .map(str::to_string)
    }
}

// ============================================================================
// Page request
// ============================================================================

/// The original request with the page query merged on top.
struct PageRequest<'a, R: ?Sized> {
    inner: &'a R,
    page_query: Query,
}

impl<R: Request + ?Sized> Request for PageRequest<'_, R> {
    fn method(&self) -> Method {
        self.inner.method()
    }

    fn resolve_endpoint(&self) -> String {
        self.inner.resolve_endpoint()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn headers(&self) -> Headers {
        self.inner.headers()
    }

    fn query(&self) -> Query {
        let mut query = self.inner.query();
        query.merge(&self.page_query);
        query
    }

    fn config(&self) -> ConfigStore {
        self.inner.config()
    }

    fn middleware(&self) -> MiddlewarePipeline {
        self.inner.middleware()
    }

    fn body(&self) -> Option<Body> {
        self.inner.body()
    }

    fn delay(&self) -> Delay {
        self.inner.delay()
    }

    fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.inner.authenticator()
    }

    fn mock_client(&self) -> Option<MockClient> {
        self.inner.mock_client()
    }

    fn response_type(&self) -> Option<ResponseType> {
        self.inner.response_type()
    }

    fn hydrator(&self) -> Option<Hydrator> {
        self.inner.hydrator()
    }

    fn capabilities(&self) -> Vec<Arc<dyn Capability>> {
        self.inner.capabilities()
    }

    fn boot(&self, pending: &mut PendingRequest) -> Result<()> {
        self.inner.boot(pending)
    }
}

// ============================================================================
// Paginator
// ============================================================================

/// Stateful driver sending one page request after the other.
pub struct Paginator<C, R> {
    connector: C,
    original_request: R,
    pagination: Pagination,
    hooks: PageHooks,
    limit: Option<usize>,
    continue_on_new_loop: bool,
    current_page: usize,
    cursor: Option<String>,
    finished: bool,
    last_response: Option<Response>,
    total_results: usize,
}

impl<C, R> fmt::Debug for Paginator<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("pagination", &self.pagination)
            .field("hooks", &self.hooks)
            .field("limit", &self.limit)
            .field("continue_on_new_loop", &self.continue_on_new_loop)
            .field("current_page", &self.current_page)
            .field("cursor", &self.cursor)
            .field("finished", &self.finished)
            .field("total_results", &self.total_results)
            .finish_non_exhaustive()
    }
}

impl<C, R> Paginator<C, R>
where
    C: Connector,
    R: Request,
{
    /// Creates a paginator with default hooks, no limit, restarting from the
    /// first page on each new loop.
    #[must_use]
    pub fn new(connector: C, original_request: R, pagination: Pagination) -> Self {
        Self {
            connector,
            original_request,
            pagination,
            hooks: PageHooks::default(),
            limit: None,
            continue_on_new_loop: false,
            current_page: 0,
            cursor: None,
            finished: false,
            last_response: None,
            total_results: 0,
        }
    }

    /// Replaces the hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: PageHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Stops after `limit` pages.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume after the last fetched page when a new loop starts.
    #[must_use]
    pub const fn continue_on_new_loop(mut self, enabled: bool) -> Self {
        self.continue_on_new_loop = enabled;
        self
    }

    /// Page limit.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of pages fetched since the last reset.
    #[must_use]
    pub const fn current_page(&self) -> usize {
        self.current_page
    }

    /// Number of items seen since the last reset.
    #[must_use]
    pub const fn total_results(&self) -> usize {
        self.total_results
    }

    /// Last page response.
    #[must_use]
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// The request every page is derived from.
    #[must_use]
    pub const fn original_request(&self) -> &R {
        &self.original_request
    }

    /// The connector pages are sent through.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns `true` if another page may be fetched.
    #[must_use]
    pub fn has_next(&self) -> bool {
        !self.finished && self.limit.is_none_or(|limit| self.current_page < limit)
    }

    /// Prepares a new loop.
    ///
    /// Resets to the first page and clears the last response, unless
    /// `continue_on_new_loop` is set, in which case nothing changes.
    pub fn rewind(&mut self) {
        if self.continue_on_new_loop {
            return;
        }
        self.current_page = 0;
        self.cursor = None;
        self.finished = false;
        self.last_response = None;
        self.total_results = 0;
    }

    /// Fetches the next page, or `None` once exhausted or the limit is reached.
    ///
    /// # Errors
    ///
    /// Returns resolution and transport errors, and item extraction errors.
    pub async fn next_page(&mut self) -> Result<Option<Response>> {
        if !self.has_next() {
            return Ok(None);
        }

        let sending = {
            let page = PageRequest {
                inner: &self.original_request,
                page_query: self
                    .pagination
                    .page_query(self.current_page, self.cursor.as_deref()),
            };
            self.connector.send(&page)
        }?;
        let response = sending.await?;
        let items = self.hooks.items(&response)?;

        self.current_page += 1;
        self.total_results += items.len();
        self.finished = self.is_last_page(&response, items.len());
        tracing::debug!(
            page = self.current_page,
            items = items.len(),
            last = self.finished,
            "page fetched"
        );

        self.last_response = Some(response.clone());
        Ok(Some(response))
    }

    fn is_last_page(&mut self, response: &Response, item_count: usize) -> bool {
        if self.pagination.is_cursor() {
            self.cursor = self.hooks.cursor(response);
        }
        if let Some(hook) = &self.hooks.is_last_page {
            return hook(response);
        }
        if self.pagination.is_cursor() {
            return self.cursor.is_none();
        }
        item_count == 0
            || self
                .pagination
                .per_page()
                .is_some_and(|per_page| item_count < per_page)
    }

    /// Rewinds, then streams pages until exhausted; stops after the first error.
    pub fn pages(&mut self) -> impl Stream<Item = Result<Response>> + '_ {
        self.rewind();
        stream::unfold((self, false), |(paginator, failed)| async move {
            if failed {
                return None;
            }
            match paginator.next_page().await {
                Ok(Some(response)) => Some((Ok(response), (paginator, false))),
                Ok(None) => None,
                Err(error) => Some((Err(error), (paginator, true))),
            }
        })
    }

    /// Rewinds, then collects the items of every page.
    ///
    /// # Errors
    ///
    /// Returns the first page error.
    pub async fn collect_items(&mut self) -> Result<Vec<Value>> {
        self.rewind();
        let mut items = Vec::new();
        while let Some(response) = self.next_page().await? {
            items.extend(self.hooks.items(&response)?);
        }
        Ok(items)
    }

    /// Like [`Paginator::collect_items`], deserializing each item.
    ///
    /// # Errors
    ///
    /// Returns the first page or deserialization error.
    pub async fn items<T: DeserializeOwned>(&mut self) -> Result<Vec<T>> {
        self.collect_items()
            .await?
            .into_iter()
            .map(from_json_value)
            .collect()
    }

    /// Fetches the first page, then every remaining page concurrently.
    ///
    /// Every response is delivered with its page index, counted from the
    /// first page. The `total_pages` hook decides how many pages exist; the
    /// page limit still applies.
    ///
    /// Pooled pages count towards [`Paginator::total_results`]. Pages settle
    /// out of order, so [`Paginator::last_response`] is the successful page
    /// with the highest index.
    ///
    /// # Errors
    ///
    /// - [`Error::Pagination`] for cursor pagination or without a `total_pages` hook,
    /// - errors of the first page. Later page failures go to `on_error`.
    pub async fn pool<F, E>(
        &mut self,
        concurrency: impl Into<Concurrency>,
        mut on_response: F,
        mut on_error: E,
    ) -> Result<PoolSummary>
    where
        F: FnMut(Response, usize) + Send,
        E: FnMut(Error, usize) + Send,
    {
        if self.pagination.is_cursor() {
            return Err(Error::pagination(
                "cursor pagination cannot be pooled: each page needs the previous cursor",
            ));
        }
        let Some(total_pages_hook) = self.hooks.total_pages.clone() else {
            return Err(Error::pagination("pooling pages requires a `total_pages` hook"));
        };

        self.rewind();
        let start = self.current_page;
        let Some(first) = self.next_page().await? else {
            return Ok(PoolSummary::default());
        };
        let total_pages = total_pages_hook(&first).unwrap_or(self.current_page);
        on_response(first, start);

        let end = self.limit.map_or(total_pages, |limit| limit.min(total_pages));
        let pages = (self.current_page..end)
            .map(|index| PageRequest {
                inner: &self.original_request,
                page_query: self.pagination.page_query(index, None),
            })
            .collect::<Vec<_>>();
        tracing::debug!(total_pages, remaining = pages.len(), "pooling pages");

        let offset = self.current_page;
        let hooks = self.hooks.clone();
        let mut total_results = 0;
        let mut last: Option<(usize, Response)> = None;
        let summary = Pool::new(&self.connector, pages)
            .concurrency(concurrency)
            .on_response(|response, index| {
                let index = offset + index;
                match hooks.items(&response) {
                    Ok(items) => total_results += items.len(),
                    Err(error) => tracing::debug!(index, %error, "page items unavailable"),
                }
                if last.as_ref().is_none_or(|(highest, _)| index > *highest) {
                    last = Some((index, response.clone()));
                }
                on_response(response, index);
            })
            .on_error(|error, index| on_error(error, offset + index))
            .send()
            .await;

        self.total_results += total_results;
        if let Some((_, response)) = last {
            self.last_response = Some(response);
        }
        self.current_page = end.max(self.current_page);
        self.finished = true;
        Ok(PoolSummary {
            succeeded: summary.succeeded + 1,
            failed: summary.failed,
        })
    }
}

// ============================================================================
// Serialization
// ============================================================================

/// Serializable part of a paginator: connector, original request, limit and
/// the `continue_on_new_loop` flag.
///
/// The strategy hooks are closures and are supplied again on
/// [`Paginator::restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatorState<C, R> {
    /// Connector.
    pub connector: C,
    /// Original request.
    pub original_request: R,
    /// Page limit.
    pub limit: Option<usize>,
    /// Resume-on-new-loop flag.
    pub continue_on_new_loop: bool,
}

impl<C, R> Paginator<C, R>
where
    C: Connector + Clone,
    R: Request + Clone,
{
    /// Snapshot of the serializable state.
    #[must_use]
    pub fn state(&self) -> PaginatorState<C, R> {
        PaginatorState {
            connector: self.connector.clone(),
            original_request: self.original_request.clone(),
            limit: self.limit,
            continue_on_new_loop: self.continue_on_new_loop,
        }
    }
}

impl<C, R> Paginator<C, R>
where
    C: Connector,
    R: Request,
{
    /// Rebuilds a paginator from a saved state.
    #[must_use]
    pub fn restore(state: PaginatorState<C, R>, pagination: Pagination, hooks: PageHooks) -> Self {
        let mut paginator = Self::new(state.connector, state.original_request, pagination)
            .with_hooks(hooks)
            .continue_on_new_loop(state.continue_on_new_loop);
        paginator.limit = state.limit;
        paginator
    }
}

impl<C: Serialize, R: Serialize> Serialize for Paginator<C, R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Paginator", 4)?;
        state.serialize_field("connector", &self.connector)?;
        state.serialize_field("original_request", &self.original_request)?;
        state.serialize_field("limit", &self.limit)?;
        state.serialize_field("continue_on_new_loop", &self.continue_on_new_loop)?;
        state.end()
    }
}
