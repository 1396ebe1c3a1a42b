//! Lazy list behaviour against a scripted transport.
//!
//! Covers load-if-needed, explicit refetch, single flight, error surfaces,
//! paging, and list encodings resolved into lists.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use trellis_engine::{
    CoreError, DocumentBuilder, Error, FieldType, GraphQLRequest, GraphQLResponseError,
    LazyQueryList, ListAssociation, ListEncoding, ListPage, ListSource, LoadState, Model,
    ModelField, ModelList, ModelSchema, PageRequest, ResponseDecoder, Transport, TransportError,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Comment {
    id: String,
    content: String,
}

impl Model for Comment {
    fn schema() -> ModelSchema {
        ModelSchema::new(
            "Comment",
            vec![
                ModelField::id(),
                ModelField::required("content", FieldType::String),
                ModelField::belongs_to("post", "Post", None),
            ],
        )
    }
}

fn comment(id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        content: format!("content of {}", id),
    }
}

fn page(ids: &[&str], next_token: Option<&str>) -> Value {
    let items: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "content": format!("content of {}", id)}))
        .collect();
    json!({"data": {"listComments": {"items": items, "nextToken": next_token}}})
}

/// Transport answering from a queue of canned outcomes, recording requests.
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<GraphQLRequest>>,
    delay: Duration,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
    }

    fn slow(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            delay: Duration::from_millis(50),
            ..Default::default()
        })
    }

    fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn request(&self, index: usize) -> GraphQLRequest {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: &GraphQLRequest,
        response: &mut ResponseDecoder,
    ) -> Result<(), TransportError> {
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::permanent("no scripted response")));
        let body = next?.to_string();

        // Deliver in two chunks, like a streamed body.
        let (head, tail) = body.as_bytes().split_at(body.len() / 2);
        response.append_response(head);
        response.append_response(tail);
        Ok(())
    }
}

/// Puts page parameters into variables so tests can inspect them.
struct VariablesDocuments;

impl DocumentBuilder for VariablesDocuments {
    fn build(&self, schema: &ModelSchema, page: &PageRequest) -> GraphQLRequest {
        let mut variables = Map::new();
        variables.insert("limit".into(), json!(page.limit));
        if let Some(filter) = &page.filter {
            variables.insert("filter".into(), filter.to_graphql_filter());
        }
        if let Some(token) = &page.next_token {
            variables.insert("nextToken".into(), json!(token));
        }
        GraphQLRequest {
            document: format!("query List{}", schema.plural_name),
            variables,
            response_type: std::any::type_name::<ListPage<Comment>>(),
            decode_path: page.decode_path.clone(),
        }
    }
}

fn source(transport: Arc<ScriptedTransport>) -> ListSource {
    ListSource::new(transport, Arc::new(VariablesDocuments))
}

fn post_association(post_id: &str) -> ListAssociation {
    let schema = Comment::schema();
    ListAssociation::new(post_id, schema.field("post").unwrap().clone())
}

// ============================================================================
// Load state
// ============================================================================

#[tokio::test]
async fn compact_reference_starts_pending_and_fetches_once() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1", "c2"], None))]);
    let encoding = ListEncoding::<Comment>::from_value(
        json!({"associatedId": "post-1", "associatedField": "post"}),
    );

    let list = source(transport.clone()).resolve(encoding);
    assert_eq!(list.load_state(), LoadState::Pending);
    assert_eq!(transport.request_count(), 0);

    let elements = list.elements().await.unwrap();
    assert_eq!(*elements, vec![comment("c1"), comment("c2")]);
    assert_eq!(list.load_state(), LoadState::Loaded);

    // Further access stays local
    list.elements().await.unwrap();
    assert_eq!(transport.request_count(), 1);

    let request = transport.request(0);
    assert_eq!(request.decode_path, "listComments");
    assert_eq!(
        request.variables["filter"],
        json!({"commentPostId": {"eq": "post-1"}})
    );
    assert_eq!(request.variables["limit"], json!(100));
}

#[tokio::test]
async fn array_encoding_never_fetches() {
    let transport = ScriptedTransport::new(vec![]);
    let encoding = ListEncoding::<Comment>::from_value(json!([
        {"id": "c1", "content": "content of c1"}
    ]));

    let list = source(transport.clone()).resolve(encoding);
    assert_eq!(list.load_state(), LoadState::Loaded);
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
    list.fetch_first_page().await.unwrap();
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn unknown_associated_field_resolves_to_empty_list() {
    let transport = ScriptedTransport::new(vec![]);
    let encoding = ListEncoding::<Comment>::from_value(
        json!({"associatedId": "post-1", "associatedField": "blog"}),
    );

    let list = source(transport.clone()).resolve(encoding);
    assert_eq!(list.load_state(), LoadState::Loaded);
    assert!(list.elements().await.unwrap().is_empty());
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn root_list_has_no_filter() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    list.elements().await.unwrap();
    let request = transport.request(0);
    assert!(!request.variables.contains_key("filter"));
    assert_eq!(request.document, "query ListComments");
}

#[tokio::test]
async fn fetch_first_page_always_refetches() {
    let transport = ScriptedTransport::new(vec![
        Ok(page(&["c1"], Some("t1"))),
        Ok(page(&["c2", "c3"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(
        source(transport.clone()),
        Some(post_association("post-1")),
    );

    list.fetch_first_page().await.unwrap();
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
    assert_eq!(list.next_token().as_deref(), Some("t1"));

    list.fetch_first_page().await.unwrap();
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c2"), comment("c3")]);
    assert_eq!(list.next_token(), None);

    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.request(0), transport.request(1));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn transport_failure_is_wrapped() {
    let transport = ScriptedTransport::new(vec![Err(TransportError::new("connection reset"))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let err = list.elements().await.unwrap_err();
    assert_eq!(err.title, "The list request failed.");
    assert!(!err.recovery_suggestion.is_empty());
    let cause = err.underlying_as::<TransportError>().unwrap();
    assert_eq!(cause.message, "connection reset");

    // A failed first load leaves the list pending
    assert_eq!(list.load_state(), LoadState::Pending);
}

#[tokio::test]
async fn failed_first_load_is_retried_on_next_access() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::new("timeout")),
        Ok(page(&["c1"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    assert!(list.elements().await.is_err());
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn error_response_is_never_an_empty_list() {
    let transport = ScriptedTransport::new(vec![Ok(json!({
        "data": {"listComments": null},
        "errors": [{"message": "Unauthorized"}]
    }))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let err = list.elements().await.unwrap_err();
    match err.underlying_as::<GraphQLResponseError<ListPage<Comment>>>() {
        Some(GraphQLResponseError::ErrorResponse(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, "Unauthorized");
        }
        other => panic!("expected error response, got {:?}", other),
    }
}

#[tokio::test]
async fn partial_response_keeps_partial_page() {
    let mut body = page(&["c1"], None);
    body["errors"] = json!([{"message": "Field 'author' failed"}]);
    let transport = ScriptedTransport::new(vec![Ok(body)]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let err = list.fetch_first_page().await.unwrap_err();
    let response_error = err
        .underlying_as::<GraphQLResponseError<ListPage<Comment>>>()
        .unwrap();
    let partial = response_error.partial_data().unwrap();
    assert_eq!(partial.items, vec![comment("c1")]);
    assert_eq!(response_error.errors()[0].message, "Field 'author' failed");
}

#[tokio::test]
async fn malformed_response_is_surfaced() {
    let transport = ScriptedTransport::new(vec![Ok(json!({"unexpected": true}))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let err = list.elements().await.unwrap_err();
    assert!(matches!(
        err.underlying_as::<Error>(),
        Some(Error::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn failed_refetch_keeps_stale_elements() {
    let transport = ScriptedTransport::new(vec![
        Ok(page(&["c1"], Some("t1"))),
        Err(TransportError::new("offline")),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    list.fetch_first_page().await.unwrap();
    assert!(list.fetch_first_page().await.is_err());

    assert_eq!(list.load_state(), LoadState::Loaded);
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
    assert_eq!(list.next_token().as_deref(), Some("t1"));
}

// ============================================================================
// Single flight
// ============================================================================

#[tokio::test]
async fn concurrent_fetches_share_one_request() {
    let transport = ScriptedTransport::slow(vec![
        Ok(page(&["c1"], None)),
        Ok(page(&["unexpected"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let (a, b) = tokio::join!(list.fetch_first_page(), list.fetch_first_page());
    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(transport.request_count(), 1);
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
}

#[tokio::test]
async fn concurrent_access_shares_one_request() {
    let transport = ScriptedTransport::slow(vec![Ok(page(&["c1", "c2"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);
    let other = list.clone();

    let (a, b, c) = tokio::join!(list.elements(), other.elements(), list.first());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(c.unwrap(), Some(comment("c1")));
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_a_failure() {
    let transport = ScriptedTransport::slow(vec![
        Err(TransportError::new("offline")),
        Ok(page(&["c1"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let (a, b) = tokio::join!(list.elements(), list.elements());
    let (a, b): (CoreError, CoreError) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a.title, b.title);
    assert_eq!(transport.request_count(), 1);
    assert_eq!(list.load_state(), LoadState::Pending);
}

#[tokio::test]
async fn shared_across_tasks() {
    let transport = ScriptedTransport::slow(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let list = list.clone();
            tokio::spawn(async move { list.len().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 1);
    }
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn cancelled_load_leaves_list_pending() {
    let transport = ScriptedTransport::slow(vec![
        Ok(page(&["c1"], None)),
        Ok(page(&["unexpected"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let cancelled = tokio::time::timeout(Duration::from_millis(10), list.elements()).await;
    assert!(cancelled.is_err());
    assert_eq!(list.load_state(), LoadState::Pending);
    assert_eq!(transport.request_count(), 1);

    // The gate was released; a later caller issues one fresh request
    let elements = tokio::time::timeout(Duration::from_secs(1), list.elements())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*elements, vec![comment("c1")]);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(list.load_state(), LoadState::Loaded);
}

#[tokio::test]
async fn waiting_caller_fetches_after_cancellation() {
    let transport = ScriptedTransport::slow(vec![
        Ok(page(&["c1"], None)),
        Ok(page(&["unexpected"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);
    let waiting = list.clone();

    let (cancelled, waited) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(10), list.elements()),
        tokio::time::timeout(Duration::from_secs(1), waiting.elements()),
    );

    assert!(cancelled.is_err());
    assert_eq!(*waited.unwrap().unwrap(), vec![comment("c1")]);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(list.load_state(), LoadState::Loaded);
}

// ============================================================================
// Paging
// ============================================================================

#[tokio::test]
async fn next_page_returns_new_loaded_list() {
    let transport = ScriptedTransport::new(vec![
        Ok(page(&["c1"], Some("t1"))),
        Ok(page(&["c2"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(
        source(transport.clone()),
        Some(post_association("post-1")),
    );

    assert!(list.elements().await.is_ok());
    assert!(list.has_next_page());

    let next = list.next_page().await.unwrap();
    assert_eq!(next.load_state(), LoadState::Loaded);
    assert_eq!(*next.elements().await.unwrap(), vec![comment("c2")]);
    assert!(!next.has_next_page());
    assert_eq!(next.association(), list.association());

    // Original list is untouched
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);

    let request = transport.request(1);
    assert_eq!(request.variables["nextToken"], json!("t1"));
    assert_eq!(
        request.variables["filter"],
        json!({"commentPostId": {"eq": "post-1"}})
    );
}

#[tokio::test]
async fn next_page_loads_pending_list_first() {
    let transport = ScriptedTransport::new(vec![
        Ok(page(&["c1"], Some("t1"))),
        Ok(page(&["c2"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let next = list.next_page().await.unwrap();
    assert_eq!(*next.elements().await.unwrap(), vec![comment("c2")]);
    assert_eq!(transport.request_count(), 2);
}

#[tokio::test]
async fn next_page_without_token_fails() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let err = list.next_page().await.unwrap_err();
    assert_eq!(err.title, "There is no next page.");
    assert!(err.underlying.is_none());
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn set_limit_returns_to_pending() {
    let transport = ScriptedTransport::new(vec![
        Ok(page(&["c1", "c2"], None)),
        Ok(page(&["c1"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    list.elements().await.unwrap();
    list.set_limit(1).await;
    assert_eq!(list.load_state(), LoadState::Pending);
    assert_eq!(list.limit(), 1);

    assert_eq!(list.len().await.unwrap(), 1);
    assert_eq!(transport.request(1).variables["limit"], json!(1));
}

#[tokio::test]
async fn reload_queued_behind_set_limit_refetches() {
    let transport = ScriptedTransport::slow(vec![
        Ok(page(&["c1", "c2"], None)),
        Ok(page(&["c1"], None)),
    ]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    let loading = tokio::spawn({
        let list = list.clone();
        async move { list.len().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    let limiting = tokio::spawn({
        let list = list.clone();
        async move { list.set_limit(5).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Queued behind the limit change, so the first fetch's outcome is stale
    list.fetch_first_page().await.unwrap();

    assert_eq!(loading.await.unwrap().unwrap(), 2);
    limiting.await.unwrap();
    assert_eq!(list.load_state(), LoadState::Loaded);
    assert_eq!(transport.request_count(), 2);
    assert_eq!(transport.request(1).variables["limit"], json!(5));
    assert_eq!(*list.elements().await.unwrap(), vec![comment("c1")]);
}

#[tokio::test]
async fn page_size_comes_from_source() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()).with_page_size(25), None);

    assert_eq!(list.first_page_request().limit, 25);
    list.elements().await.unwrap();
    assert_eq!(transport.request(0).variables["limit"], json!(25));
}

// ============================================================================
// Blocking fallback
// ============================================================================

#[test]
fn load_blocking_outside_runtime() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let elements = list.load_blocking().unwrap();
    assert_eq!(*elements, vec![comment("c1")]);
    assert_eq!(list.load_state(), LoadState::Loaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn load_blocking_on_multi_thread_runtime() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport), None);

    let elements = list.load_blocking().unwrap();
    assert_eq!(elements.len(), 1);
}

#[tokio::test]
async fn load_blocking_refuses_current_thread_runtime() {
    let transport = ScriptedTransport::new(vec![Ok(page(&["c1"], None))]);
    let list = LazyQueryList::<Comment>::for_model(source(transport.clone()), None);

    assert!(list.load_blocking().is_err());
    assert_eq!(transport.request_count(), 0);
}

// ============================================================================
// Interface
// ============================================================================

#[tokio::test]
async fn callers_depend_only_on_the_interface() {
    async fn count(list: &dyn ModelList<Comment>) -> usize {
        list.elements().await.map(|e| e.len()).unwrap_or(0)
    }

    let transport = ScriptedTransport::new(vec![Ok(page(&["c1", "c2"], None))]);
    let lazy: Arc<dyn ModelList<Comment>> = Arc::new(LazyQueryList::<Comment>::for_model(
        source(transport),
        None,
    ));
    let materialized: Arc<dyn ModelList<Comment>> =
        Arc::new(trellis_engine::MaterializedList::new(vec![comment("c9")]));

    assert_eq!(count(lazy.as_ref()).await, 2);
    assert_eq!(count(materialized.as_ref()).await, 1);
}
