//! Page requests and the collaborators that execute them.
//!
//! [`PageRequestBuilder`] derives the parameters of a list page from a list's
//! association metadata. A [`DocumentBuilder`] turns those parameters into a
//! [`GraphQLRequest`], and a [`Transport`] executes it.

use crate::error::TransportError;
use crate::response::ResponseDecoder;
use crate::schema::{ModelField, ModelSchema};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Default number of elements fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Maximum number of elements fetched per page.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Links a list to the record that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAssociation {
    /// Identifier of the owning record
    pub associated_id: String,
    /// Field on the listed model pointing back at the owner
    pub associated_field: ModelField,
}

impl ListAssociation {
    pub fn new(associated_id: impl Into<String>, associated_field: ModelField) -> Self {
        Self {
            associated_id: associated_id.into(),
            associated_field,
        }
    }
}

/// Directive naming the style of query a page request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperation {
    List,
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPredicate {
    pub field: String,
    pub value: String,
}

impl FilterPredicate {
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Render as a GraphQL filter input: `{"<field>": {"eq": "<value>"}}`.
    pub fn to_graphql_filter(&self) -> Value {
        let mut filter = Map::new();
        filter.insert(self.field.clone(), json!({ "eq": self.value }));
        Value::Object(filter)
    }
}

/// Parameters of one list page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub model_name: String,
    pub operation: QueryOperation,
    pub filter: Option<FilterPredicate>,
    pub limit: usize,
    pub next_token: Option<String>,
    /// Key locating the page inside the response's `data` section
    pub decode_path: String,
}

/// Derives page requests from a list's association metadata.
///
/// Construction is pure: the same builder always yields the same requests.
#[derive(Debug, Clone)]
pub struct PageRequestBuilder {
    schema: Arc<ModelSchema>,
    association: Option<ListAssociation>,
    limit: usize,
}

impl PageRequestBuilder {
    pub fn new(
        schema: Arc<ModelSchema>,
        association: Option<ListAssociation>,
        limit: usize,
    ) -> Self {
        Self {
            schema,
            association,
            limit: clamp_limit(limit),
        }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn association(&self) -> Option<&ListAssociation> {
        self.association.as_ref()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Builder method to change the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = clamp_limit(limit);
        self
    }

    /// Request for the first page.
    pub fn first_page(&self) -> PageRequest {
        self.build(None)
    }

    /// Request for the page identified by `next_token`.
    pub fn page_after(&self, next_token: impl Into<String>) -> PageRequest {
        self.build(Some(next_token.into()))
    }

    fn build(&self, next_token: Option<String>) -> PageRequest {
        let filter = self.association.as_ref().map(|association| {
            FilterPredicate::eq(
                self.schema.foreign_key_name(&association.associated_field),
                association.associated_id.clone(),
            )
        });

        PageRequest {
            model_name: self.schema.name.clone(),
            operation: QueryOperation::List,
            filter,
            limit: self.limit,
            next_token,
            decode_path: format!("list{}", self.schema.plural_name),
        }
    }
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// A request ready for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLRequest {
    /// Query document
    pub document: String,
    /// Variable bindings
    pub variables: Map<String, Value>,
    /// Name of the type the response decodes into
    pub response_type: &'static str,
    /// Key locating the result inside `data`
    pub decode_path: String,
}

impl GraphQLRequest {
    /// JSON body as sent over HTTP.
    pub fn to_body(&self) -> Value {
        json!({
            "query": self.document,
            "variables": self.variables,
        })
    }
}

/// Turns page parameters into a query document. Implemented outside the engine.
pub trait DocumentBuilder: Send + Sync {
    fn build(&self, schema: &ModelSchema, page: &PageRequest) -> GraphQLRequest;
}

/// Executes requests. Implemented outside the engine.
///
/// Implementations append the raw response body into `response`, in as many
/// chunks as the transport delivers it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &GraphQLRequest,
        response: &mut ResponseDecoder,
    ) -> std::result::Result<(), TransportError>;
}
