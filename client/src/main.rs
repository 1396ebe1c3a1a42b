//! Trellis Client - pages through a GraphQL list and prints each item.
//!
//! Items are written to stdout as JSON lines. Configuration comes from
//! `TRELLIS_*` environment variables, optionally loaded from a `.env` file.

use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_client::{list_source, Config, Result};
use trellis_engine::{LazyQueryList, ListAssociation};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis_client=info,trellis_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!(
        endpoint = %config.endpoint,
        model = %config.model.name,
        page_size = config.page_size,
        "Starting Trellis client"
    );

    let schema = Arc::new(config.model.schema());
    let source = list_source(&config)?;

    let association = match (&config.model.owner_field, &config.model.owner_id) {
        (Some(field), Some(id)) => schema
            .field(field)
            .map(|field| ListAssociation::new(id.clone(), field.clone())),
        _ => None,
    };

    let mut list: LazyQueryList<Value> = LazyQueryList::new(source, schema, association);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut pages = 0usize;
    let mut total = 0usize;

    loop {
        let items = list.elements().await?;
        pages += 1;
        total += items.len();

        for item in items.iter() {
            serde_json::to_writer(&mut out, item)?;
            writeln!(out)?;
        }

        if pages >= config.max_pages || !list.has_next_page() {
            break;
        }
        list = list.next_page().await?;
    }

    out.flush()?;
    tracing::info!(pages, items = total, more = list.has_next_page(), "Done");

    Ok(())
}
