//! AppSync-style list query documents.

use serde_json::{json, Map};
use trellis_engine::schema::pascal_case;
use trellis_engine::{
    DocumentBuilder, GraphQLRequest, ListPage, ModelSchema, PageRequest,
};

/// Builds `list<Plural>` queries with `filter`, `limit` and `nextToken` variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppSyncDocumentBuilder;

impl DocumentBuilder for AppSyncDocumentBuilder {
    fn build(&self, schema: &ModelSchema, page: &PageRequest) -> GraphQLRequest {
        let selection: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.is_scalar())
            .map(|f| f.name.as_str())
            .collect();

        let document = format!(
            "query {op}($filter: Model{model}FilterInput, $limit: Int, $nextToken: String) {{\n  \
             {path}(filter: $filter, limit: $limit, nextToken: $nextToken) {{\n    \
             items {{\n      {fields}\n    }}\n    nextToken\n  }}\n}}",
            op = pascal_case(&page.decode_path),
            model = schema.name,
            path = page.decode_path,
            fields = selection.join("\n      "),
        );

        let mut variables = Map::new();
        variables.insert("limit".into(), json!(page.limit));
        if let Some(filter) = &page.filter {
            variables.insert("filter".into(), filter.to_graphql_filter());
        }
        if let Some(token) = &page.next_token {
            variables.insert("nextToken".into(), json!(token));
        }

        GraphQLRequest {
            document,
            variables,
            response_type: std::any::type_name::<ListPage<serde_json::Value>>(),
            decode_path: page.decode_path.clone(),
        }
    }
}
