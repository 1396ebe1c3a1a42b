//! # Trellis Engine
//!
//! Lazy-loading model lists backed by GraphQL list queries.
//!
//! This crate provides the client-side core for lists that may not have been
//! fetched yet: a list that belongs to a record (the comments of a post) or
//! the result of a root list query. It also reconciles raw GraphQL responses
//! into typed success, partial, or failure results.
//!
//! ## Design Principles
//!
//! - **No wire code**: transports and query documents are collaborators
//!   behind the [`Transport`] and [`DocumentBuilder`] traits
//! - **Single flight**: at most one fetch per list is in flight; concurrent
//!   callers share its outcome
//! - **Never silent**: fetch errors always reach the caller; only wire-shape
//!   parsing of list fields falls back to an empty list
//!
//! ## Core Concepts
//!
//! ### Responses
//!
//! [`ResponseDecoder`] buffers a response body and classifies it into a
//! [`ResultEnvelope`]: `Ok(T)`, or a [`GraphQLResponseError`] that is either
//! an error-only response or a partial response carrying usable data.
//!
//! ### Lists
//!
//! [`ModelList`] is the list interface. [`MaterializedList`] holds in-memory
//! elements; [`LazyQueryList`] loads its first page on first access and
//! tracks the continuation token of the next one.
//!
//! ### Encodings
//!
//! A list field arrives as an array or as a compact
//! `{"associatedId", "associatedField"}` reference. [`ListEncoding`] parses
//! either, and [`ListSource::resolve`] turns it into a list.
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis_engine::{ListEncoding, ModelField, ModelSchema, ResponseDecoder, FieldType};
//! use serde_json::json;
//!
//! // 1. Describe a model
//! let schema = ModelSchema::new(
//!     "Comment",
//!     vec![
//!         ModelField::id(),
//!         ModelField::required("content", FieldType::String),
//!         ModelField::belongs_to("post", "Post", None),
//!     ],
//! );
//! assert_eq!(schema.foreign_key_name(schema.field("post").unwrap()), "commentPostId");
//!
//! // 2. Decode a response
//! let mut decoder = ResponseDecoder::new("getComment");
//! decoder.append_response(br#"{"data":{"getComment":{"id":"1"}}}"#);
//! let comment: serde_json::Value = decoder.decode().unwrap().unwrap();
//! assert_eq!(comment, json!({"id": "1"}));
//!
//! // 3. Parse a list field
//! let comments = ListEncoding::<serde_json::Value>::from_value(
//!     json!({"associatedId": "post-1", "associatedField": "post"}),
//! );
//! assert!(comments.is_pending());
//! ```

pub mod encoding;
pub mod error;
pub mod list;
pub mod request;
pub mod response;
pub mod schema;

// Re-export main types at crate root
pub use encoding::ListEncoding;
pub use error::{CoreError, Error, TransportError};
pub use list::{LazyQueryList, ListPage, ListSource, LoadState, MaterializedList, ModelList};
pub use request::{
    DocumentBuilder, FilterPredicate, GraphQLRequest, ListAssociation, PageRequest,
    PageRequestBuilder, QueryOperation, Transport, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use response::{GraphQLError, GraphQLResponseError, ResponseDecoder, ResultEnvelope};
pub use schema::{Association, FieldType, Model, ModelField, ModelSchema};
