//! Model lists.
//!
//! [`ModelList`] is the interface callers depend on. It has two
//! implementations:
//!
//! - [`MaterializedList`] holds in-memory elements and never fetches.
//! - [`LazyQueryList`] is backed by a remote list query. It starts either
//!   `Pending` (nothing fetched yet) or `Loaded`, and loads its first page
//!   on first access.
//!
//! ## Single flight
//!
//! A `LazyQueryList` lets only one fetch run at a time. Callers queue on a
//! per-instance gate; a caller that finds a fetch completed while it waited
//! returns that fetch's outcome instead of issuing another request.

use crate::error::CoreError;
use crate::request::{
    DocumentBuilder, ListAssociation, PageRequest, PageRequestBuilder, Transport,
    DEFAULT_PAGE_SIZE,
};
use crate::response::ResponseDecoder;
use crate::schema::{Model, ModelSchema};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Data state of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// No fetch has completed for the current cursor
    Pending,
    /// Elements reflect the most recent completed fetch
    Loaded,
}

/// One page of a list query response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// A list that may or may not be backed by a remote query.
#[async_trait]
pub trait ModelList<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    fn load_state(&self) -> LoadState;

    /// Elements of the current page, loading them first if needed.
    async fn elements(&self) -> Result<Arc<Vec<T>>, CoreError>;

    /// (Re)load the first page, regardless of the current state.
    async fn fetch_first_page(&self) -> Result<(), CoreError>;

    fn next_token(&self) -> Option<String>;

    fn has_next_page(&self) -> bool {
        self.next_token().is_some()
    }
}

/// A list built from in-memory elements.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedList<T> {
    elements: Arc<Vec<T>>,
}

impl<T> MaterializedList<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            elements: Arc::new(elements),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn as_slice(&self) -> &[T] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> Default for MaterializedList<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for MaterializedList<T> {
    fn from(elements: Vec<T>) -> Self {
        Self::new(elements)
    }
}

#[async_trait]
impl<T> ModelList<T> for MaterializedList<T>
where
    T: Send + Sync + 'static,
{
    fn load_state(&self) -> LoadState {
        LoadState::Loaded
    }

    async fn elements(&self) -> Result<Arc<Vec<T>>, CoreError> {
        Ok(self.elements.clone())
    }

    /// No backing query: nothing to reload.
    async fn fetch_first_page(&self) -> Result<(), CoreError> {
        Ok(())
    }

    fn next_token(&self) -> Option<String> {
        None
    }
}

/// Collaborators used by query-backed lists to fetch pages.
#[derive(Clone)]
pub struct ListSource {
    transport: Arc<dyn Transport>,
    documents: Arc<dyn DocumentBuilder>,
    page_size: usize,
}

impl ListSource {
    pub fn new(transport: Arc<dyn Transport>, documents: Arc<dyn DocumentBuilder>) -> Self {
        Self {
            transport,
            documents,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Builder method to set the page size of lists created from this source.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch and decode one page.
    pub async fn fetch_page<T>(
        &self,
        schema: &ModelSchema,
        page: &PageRequest,
    ) -> Result<ListPage<T>, CoreError>
    where
        T: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let mut request = self.documents.build(schema, page);
        request.response_type = std::any::type_name::<ListPage<T>>();
        let mut decoder = ResponseDecoder::new(request.decode_path.clone());

        self.transport
            .execute(&request, &mut decoder)
            .await
            .map_err(|e| {
                CoreError::list_operation(
                    "The list request failed.",
                    "Check the underlying transport error.",
                    e,
                )
            })?;

        match decoder.decode::<ListPage<T>>() {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(response_error)) => Err(CoreError::list_operation(
                "The response returned successfully with GraphQL errors.",
                "Check the underlying error for the failed GraphQL response.",
                response_error,
            )),
            Err(e) => Err(CoreError::list_operation(
                "The list response could not be decoded.",
                "Check that the response matches the requested list shape.",
                e,
            )),
        }
    }
}

impl fmt::Debug for ListSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListSource")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

struct PageState<T> {
    requests: PageRequestBuilder,
    load_state: LoadState,
    elements: Arc<Vec<T>>,
    next_token: Option<String>,
    /// Incremented by every completed fetch
    generation: u64,
    last_outcome: Option<Result<(), CoreError>>,
}

struct Inner<T> {
    source: ListSource,
    state: RwLock<PageState<T>>,
    fetch_gate: Mutex<()>,
}

/// A list backed by a remote list query.
///
/// Clones share state: they are the same list.
pub struct LazyQueryList<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for LazyQueryList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for LazyQueryList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("LazyQueryList")
            .field("model", &state.requests.schema().name)
            .field("load_state", &state.load_state)
            .field("len", &state.elements.len())
            .field("next_token", &state.next_token)
            .finish()
    }
}

impl<T> LazyQueryList<T>
where
    T: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    /// Create a pending list. Without an association it lists every record.
    pub fn new(
        source: ListSource,
        schema: Arc<ModelSchema>,
        association: Option<ListAssociation>,
    ) -> Self {
        let requests = PageRequestBuilder::new(schema, association, source.page_size());
        Self::from_parts(source, requests, LoadState::Pending, Vec::new(), None)
    }

    /// Create a pending list of every record.
    pub fn root(source: ListSource, schema: Arc<ModelSchema>) -> Self {
        Self::new(source, schema, None)
    }

    /// Create a pending list of records belonging to an owner.
    pub fn associated(
        source: ListSource,
        schema: Arc<ModelSchema>,
        association: ListAssociation,
    ) -> Self {
        Self::new(source, schema, Some(association))
    }

    /// Create a list that already holds its first page.
    pub fn loaded(
        source: ListSource,
        schema: Arc<ModelSchema>,
        association: Option<ListAssociation>,
        elements: Vec<T>,
        next_token: Option<String>,
    ) -> Self {
        let requests = PageRequestBuilder::new(schema, association, source.page_size());
        Self::from_parts(source, requests, LoadState::Loaded, elements, next_token)
    }

    fn from_parts(
        source: ListSource,
        requests: PageRequestBuilder,
        load_state: LoadState,
        elements: Vec<T>,
        next_token: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: RwLock::new(PageState {
                    requests,
                    load_state,
                    elements: Arc::new(elements),
                    next_token,
                    generation: 0,
                    last_outcome: None,
                }),
                fetch_gate: Mutex::new(()),
            }),
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.state.read().load_state
    }

    pub fn next_token(&self) -> Option<String> {
        self.inner.state.read().next_token.clone()
    }

    pub fn has_next_page(&self) -> bool {
        self.inner.state.read().next_token.is_some()
    }

    pub fn association(&self) -> Option<ListAssociation> {
        self.inner.state.read().requests.association().cloned()
    }

    pub fn limit(&self) -> usize {
        self.inner.state.read().requests.limit()
    }

    /// The request the next first-page fetch will issue.
    pub fn first_page_request(&self) -> PageRequest {
        self.inner.state.read().requests.first_page()
    }

    /// Elements of the current page, fetching the first page if still pending.
    pub async fn elements(&self) -> Result<Arc<Vec<T>>, CoreError> {
        if let Some(elements) = self.loaded_elements() {
            return Ok(elements);
        }

        let observed = self.generation();
        let _gate = self.inner.fetch_gate.lock().await;

        if let Some(elements) = self.loaded_elements() {
            return Ok(elements);
        }
        if let Some(Err(e)) = self.outcome_since(observed) {
            return Err(e);
        }

        self.run_fetch().await?;
        Ok(self.inner.state.read().elements.clone())
    }

    /// Fetch the first page, replacing the current one.
    ///
    /// Always issues a request unless another fetch of this list is in
    /// flight, in which case its outcome is shared. A failed fetch leaves the
    /// previous elements in place and does not revert to `Pending`.
    pub async fn fetch_first_page(&self) -> Result<(), CoreError> {
        let observed = self.generation();
        let _gate = self.inner.fetch_gate.lock().await;

        if let Some(outcome) = self.outcome_since(observed) {
            tracing::trace!("Joined in-flight fetch");
            return outcome;
        }

        self.run_fetch().await
    }

    /// Fetch the page after the current one as a new list.
    ///
    /// The new list is `Loaded`; this list is left untouched.
    pub async fn next_page(&self) -> Result<LazyQueryList<T>, CoreError> {
        self.elements().await?;

        let (requests, next_token) = {
            let state = self.inner.state.read();
            (state.requests.clone(), state.next_token.clone())
        };
        let next_token = next_token.ok_or_else(|| {
            CoreError::new(
                "There is no next page.",
                "Only call next_page() when has_next_page() is true.",
            )
        })?;

        let page = requests.page_after(next_token);
        let fetched = self
            .inner
            .source
            .fetch_page::<T>(requests.schema(), &page)
            .await?;

        tracing::debug!(
            model = %page.model_name,
            count = fetched.items.len(),
            has_next = fetched.next_token.is_some(),
            "Loaded next page"
        );

        Ok(Self::from_parts(
            self.inner.source.clone(),
            requests,
            LoadState::Loaded,
            fetched.items,
            fetched.next_token,
        ))
    }

    /// Change the page size. The list returns to `Pending` so the next
    /// access refetches with the new bound.
    pub async fn set_limit(&self, limit: usize) {
        let _gate = self.inner.fetch_gate.lock().await;
        let mut state = self.inner.state.write();
        state.requests = state.requests.clone().with_limit(limit);
        state.load_state = LoadState::Pending;
        // Callers queued before the reset must not reuse an older outcome
        state.generation += 1;
        state.last_outcome = None;
    }

    /// Blocking fallback for [`LazyQueryList::elements`].
    ///
    /// Blocks the calling thread until the first page is loaded. Prefer the
    /// async API, especially for large result sets. Inside a tokio runtime
    /// this only works on the multi-thread flavor.
    pub fn load_blocking(&self) -> Result<Arc<Vec<T>>, CoreError> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::CurrentThread {
                    return Err(CoreError::new(
                        "Blocking load is not supported on a current-thread runtime.",
                        "Await elements() instead.",
                    ));
                }
                tokio::task::block_in_place(|| handle.block_on(self.elements()))
            }
            Err(_) => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|e| {
                        CoreError::list_operation(
                            "Failed to start a runtime for the blocking load.",
                            "Await elements() from an async context instead.",
                            e,
                        )
                    })?;
                runtime.block_on(self.elements())
            }
        }
    }

    /// Element at `index`, loading first if needed.
    pub async fn get(&self, index: usize) -> Result<Option<T>, CoreError>
    where
        T: Clone,
    {
        Ok(self.elements().await?.get(index).cloned())
    }

    pub async fn first(&self) -> Result<Option<T>, CoreError>
    where
        T: Clone,
    {
        self.get(0).await
    }

    pub async fn len(&self) -> Result<usize, CoreError> {
        Ok(self.elements().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, CoreError> {
        Ok(self.elements().await?.is_empty())
    }

    pub async fn to_vec(&self) -> Result<Vec<T>, CoreError>
    where
        T: Clone,
    {
        Ok(self.elements().await?.as_ref().clone())
    }

    fn generation(&self) -> u64 {
        self.inner.state.read().generation
    }

    fn loaded_elements(&self) -> Option<Arc<Vec<T>>> {
        let state = self.inner.state.read();
        (state.load_state == LoadState::Loaded).then(|| state.elements.clone())
    }

    /// Outcome of a fetch that completed after `observed`, if any.
    fn outcome_since(&self, observed: u64) -> Option<Result<(), CoreError>> {
        let state = self.inner.state.read();
        if state.generation == observed {
            return None;
        }
        state.last_outcome.clone()
    }

    /// Fetch the first page. Callers hold the fetch gate.
    async fn run_fetch(&self) -> Result<(), CoreError> {
        let requests = self.inner.state.read().requests.clone();
        let page = requests.first_page();

        tracing::debug!(
            model = %page.model_name,
            decode_path = %page.decode_path,
            limit = page.limit,
            "Fetching first page"
        );

        let result = self
            .inner
            .source
            .fetch_page::<T>(requests.schema(), &page)
            .await;

        let mut state = self.inner.state.write();
        state.generation += 1;

        match result {
            Ok(fetched) => {
                tracing::debug!(
                    model = %page.model_name,
                    count = fetched.items.len(),
                    has_next = fetched.next_token.is_some(),
                    "Loaded first page"
                );
                state.elements = Arc::new(fetched.items);
                state.next_token = fetched.next_token;
                state.load_state = LoadState::Loaded;
                state.last_outcome = Some(Ok(()));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(model = %page.model_name, error = %e, "First page fetch failed");
                state.last_outcome = Some(Err(e.clone()));
                Err(e)
            }
        }
    }
}

impl<T> LazyQueryList<T>
where
    T: Model + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    /// Create a pending list of `T`, using `T`'s schema.
    pub fn for_model(source: ListSource, association: Option<ListAssociation>) -> Self {
        Self::new(source, Arc::new(T::schema()), association)
    }
}

#[async_trait]
impl<T> ModelList<T> for LazyQueryList<T>
where
    T: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    fn load_state(&self) -> LoadState {
        LazyQueryList::load_state(self)
    }

    async fn elements(&self) -> Result<Arc<Vec<T>>, CoreError> {
        LazyQueryList::elements(self).await
    }

    async fn fetch_first_page(&self) -> Result<(), CoreError> {
        LazyQueryList::fetch_first_page(self).await
    }

    fn next_token(&self) -> Option<String> {
        LazyQueryList::next_token(self)
    }
}
