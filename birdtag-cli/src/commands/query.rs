//! Query command implementation.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::info;

use crate::client::ApiClient;
use crate::utils::{print_results, Output};

/// Execute the query command.
pub async fn execute(
    client: &ApiClient,
    user_id: &str,
    tags: Vec<(String, u32)>,
    output: Output,
) -> Result<()> {
    // Later duplicates win, as on the server.
    let tags: BTreeMap<String, u32> = tags.into_iter().collect();
    let request = json!({"user_id": user_id, "tags": tags});

    let response: Value = client
        .post_json("/query", &request)
        .await
        .context("Tag query failed")?;
    let results = response["results"].as_array().cloned().unwrap_or_default();
    info!(user_id, matched = results.len(), "Query finished");

    if output.is_json() {
        return output.json(&response);
    }
    print_results(&output, &results);
    Ok(())
}
