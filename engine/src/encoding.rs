//! Wire encodings of list fields.
//!
//! A list field inside a model payload arrives either as a plain array of
//! elements or as a compact reference to its owner:
//!
//! ```json
//! [{"id": "c1"}, {"id": "c2"}]
//! {"associatedId": "post-1", "associatedField": "post"}
//! ```
//!
//! Parsing never fails: anything else becomes [`ListEncoding::Empty`].

use crate::list::{LazyQueryList, ListSource, MaterializedList, ModelList};
use crate::request::ListAssociation;
use crate::schema::{Model, ModelSchema};
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const ASSOCIATED_ID: &str = "associatedId";
const ASSOCIATED_FIELD: &str = "associatedField";

/// The shape a list field was encoded in.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEncoding<T> {
    /// Fully materialized elements
    Elements(Vec<T>),
    /// Reference to an owner; elements are fetched on demand
    Association {
        associated_id: String,
        associated_field: String,
    },
    /// Unrecognized or unparseable input
    Empty,
}

impl<T: DeserializeOwned> ListEncoding<T> {
    /// Parse a JSON value, trying the compact reference first, then the
    /// array form, then falling back to `Empty`.
    pub fn from_value(value: Value) -> Self {
        if let Some((associated_id, associated_field)) = compact_reference(&value) {
            return Self::Association {
                associated_id: associated_id.to_string(),
                associated_field: associated_field.to_string(),
            };
        }

        if value.is_array() {
            match serde_json::from_value::<Vec<T>>(value) {
                Ok(elements) => return Self::Elements(elements),
                Err(e) => {
                    tracing::debug!(error = %e, "List elements failed to decode; using empty list");
                }
            }
        }

        Self::Empty
    }
}

impl<T> ListEncoding<T> {
    /// Whether `value` has one of the two recognized list shapes.
    pub fn should_decode(value: &Value) -> bool {
        value.is_array() || compact_reference(value).is_some()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Association { .. })
    }
}

fn compact_reference(value: &Value) -> Option<(&str, &str)> {
    let object = value.as_object()?;
    let associated_id = object.get(ASSOCIATED_ID)?.as_str()?;
    let associated_field = object.get(ASSOCIATED_FIELD)?.as_str()?;
    Some((associated_id, associated_field))
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for ListEncoding<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(value))
    }
}

impl<T: Serialize> Serialize for ListEncoding<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Elements(elements) => elements.serialize(serializer),
            Self::Association {
                associated_id,
                associated_field,
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(ASSOCIATED_ID, associated_id)?;
                map.serialize_entry(ASSOCIATED_FIELD, associated_field)?;
                map.end()
            }
            Self::Empty => serializer.collect_seq(std::iter::empty::<&T>()),
        }
    }
}

impl ListSource {
    /// Turn a decoded list field into a list, looking up the associated
    /// field on `schema`.
    ///
    /// A reference naming a field `schema` does not have yields an empty
    /// materialized list.
    pub fn resolve_with_schema<T>(
        &self,
        schema: Arc<ModelSchema>,
        encoding: ListEncoding<T>,
    ) -> Arc<dyn ModelList<T>>
    where
        T: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        match encoding {
            ListEncoding::Elements(elements) => Arc::new(MaterializedList::new(elements)),
            ListEncoding::Association {
                associated_id,
                associated_field,
            } => match schema.field(&associated_field).cloned() {
                Some(field) => Arc::new(LazyQueryList::<T>::associated(
                    self.clone(),
                    schema,
                    ListAssociation::new(associated_id, field),
                )),
                None => {
                    tracing::warn!(
                        model = %schema.name,
                        field = %associated_field,
                        "Associated field not found in schema; using empty list"
                    );
                    Arc::new(MaterializedList::empty())
                }
            },
            ListEncoding::Empty => Arc::new(MaterializedList::empty()),
        }
    }

    /// Turn a decoded list field of `T` into a list.
    pub fn resolve<T>(&self, encoding: ListEncoding<T>) -> Arc<dyn ModelList<T>>
    where
        T: Model + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        self.resolve_with_schema(Arc::new(T::schema()), encoding)
    }
}
