//! Model schema descriptors.
//!
//! Schemas describe a model's name, its fields, and how fields associate
//! with other models. Lists use them to resolve the foreign key that links
//! an associated page back to its owner.

use serde::{Deserialize, Serialize};

/// Field types supported in schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Id,
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    /// Arbitrary nested JSON
    Json,
    /// Reference to another model, by model name
    Model(String),
    /// List of another model, by model name
    Collection(String),
}

/// How a field relates to another model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Association {
    /// This model holds a reference to its owner.
    #[serde(rename_all = "camelCase")]
    BelongsTo {
        /// Explicit foreign key field name, if the service declares one
        target_name: Option<String>,
    },
    /// The owner side of a one-to-many relationship.
    #[serde(rename_all = "camelCase")]
    HasMany {
        /// Field on the associated model pointing back at this one
        associated_with: String,
    },
    /// The owner side of a one-to-one relationship.
    #[serde(rename_all = "camelCase")]
    HasOne {
        associated_with: String,
    },
}

/// Definition of a field in a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelField {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
    /// Association with another model, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub association: Option<Association>,
}

impl ModelField {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            association: None,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            association: None,
        }
    }

    /// Create the `id` field every model carries.
    pub fn id() -> Self {
        Self::required("id", FieldType::Id)
    }

    /// Create a `belongs_to` reference to `model`.
    pub fn belongs_to(
        name: impl Into<String>,
        model: impl Into<String>,
        target_name: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Model(model.into()),
            required: false,
            association: Some(Association::BelongsTo {
                target_name: target_name.map(str::to_string),
            }),
        }
    }

    /// Create a `has_many` list of `model` linked through `associated_with`.
    pub fn has_many(
        name: impl Into<String>,
        model: impl Into<String>,
        associated_with: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Collection(model.into()),
            required: false,
            association: Some(Association::HasMany {
                associated_with: associated_with.into(),
            }),
        }
    }

    /// Create a `has_one` link to `model` through `associated_with`.
    pub fn has_one(
        name: impl Into<String>,
        model: impl Into<String>,
        associated_with: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Model(model.into()),
            required: false,
            association: Some(Association::HasOne {
                associated_with: associated_with.into(),
            }),
        }
    }

    /// Whether this field is a plain value rather than a link to another model.
    pub fn is_scalar(&self) -> bool {
        self.association.is_none()
    }
}

/// Schema for a model type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    /// Model name, e.g. `Comment`
    pub name: String,
    /// Plural name used by list queries, e.g. `Comments`
    pub plural_name: String,
    /// Field definitions
    pub fields: Vec<ModelField>,
}

impl ModelSchema {
    /// Create a new model schema. The plural name defaults to `name + "s"`.
    pub fn new(name: impl Into<String>, fields: Vec<ModelField>) -> Self {
        let name = name.into();
        Self {
            plural_name: format!("{}s", name),
            name,
            fields,
        }
    }

    /// Builder method to override the plural name.
    pub fn with_plural_name(mut self, plural_name: impl Into<String>) -> Self {
        self.plural_name = plural_name.into();
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&ModelField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve the name of the field used to filter this model by its owner.
    ///
    /// A `belongs_to` field uses its explicit target name when present, and
    /// otherwise the service default `<model><Field>Id`. Any other field is
    /// filtered by its own name.
    pub fn foreign_key_name(&self, field: &ModelField) -> String {
        match &field.association {
            Some(Association::BelongsTo {
                target_name: Some(target),
            }) => target.clone(),
            Some(Association::BelongsTo { target_name: None }) => format!(
                "{}{}Id",
                camel_case(&self.name),
                pascal_case(&field.name)
            ),
            _ => field.name.clone(),
        }
    }
}

/// A type that can be listed through a [`crate::LazyQueryList`].
pub trait Model {
    fn schema() -> ModelSchema;
}

/// Lowercase the first character: `BlogPost` → `blogPost`.
pub fn camel_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Uppercase the first character: `post` → `Post`.
pub fn pascal_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
