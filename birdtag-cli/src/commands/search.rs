//! Search and poll command implementations.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use birdtag_core::{BirdtagError, FileType, TagMap};
use colored::Colorize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::utils::{format_tags, print_results, read_input, Output};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Execute the search command.
///
/// With `wait`, polls until the job is terminal or the wait runs out.
pub async fn execute(
    client: &ApiClient,
    file: PathBuf,
    user_id: &str,
    wait: Option<Duration>,
    output: Output,
) -> Result<()> {
    // Reject what the server would reject before uploading.
    let name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    FileType::classify(name)?;
    let data = read_input(&file)?;
    info!(path = %file.display(), bytes = data.len(), "Uploading probe");

    let accepted: Value = client
        .upload("/search", &file, data, user_id)
        .await
        .context("Search upload failed")?;
    let job_id = accepted["job_id"]
        .as_str()
        .context("Server response has no job_id")?
        .to_string();

    let Some(limit) = wait else {
        if output.is_json() {
            return output.json(&accepted);
        }
        output.line(format!("{} {}", "Search submitted, job id:".green(), job_id.bold()));
        output.line(format!(
            "   {} birdtag poll --user {user_id} {job_id}",
            "Check with:".dimmed()
        ));
        return Ok(());
    };

    let started = Instant::now();
    loop {
        let state = fetch(client, user_id, &job_id).await?;
        if state["status"] != "PROCESSING" {
            return report(&state, output);
        }
        if started.elapsed() >= limit {
            bail!(
                "Search {job_id} still processing after {}s",
                limit.as_secs()
            );
        }
        debug!(job_id = %job_id, "Still processing");
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Execute the poll command.
pub async fn poll(client: &ApiClient, user_id: &str, job_id: &str, output: Output) -> Result<()> {
    let state = fetch(client, user_id, job_id).await?;
    report(&state, output)
}

async fn fetch(client: &ApiClient, user_id: &str, job_id: &str) -> Result<Value> {
    client
        .post_json(
            "/search/results",
            &json!({"user_id": user_id, "job_id": job_id}),
        )
        .await
        .context("Polling search job failed")
}

/// Print a job state. A FAILED job is an error.
fn report(state: &Value, output: Output) -> Result<()> {
    let status = state["status"].as_str().unwrap_or("UNKNOWN");
    let job_id = state["job_id"].as_str().unwrap_or("?");

    if output.is_json() {
        output.json(state)?;
    } else {
        match status {
            "COMPLETED" => {
                let discovered: TagMap =
                    serde_json::from_value(state["discovered_tags"].clone()).unwrap_or_default();
                output.line(format!("{} {}", "Search completed:".green().bold(), job_id));
                output.line(format!(
                    "   {} {}",
                    "Species in probe:".dimmed(),
                    format_tags(&discovered)
                ));
                let results = state["results"].as_array().cloned().unwrap_or_default();
                print_results(&output, &results);
            }
            "FAILED" => {}
            _ => output.line(format!(
                "{} {} ({})",
                "Search still processing:".yellow(),
                job_id,
                state["message"].as_str().unwrap_or("check again later")
            )),
        }
    }

    if status == "FAILED" {
        let reason = state["error"].as_str().unwrap_or("unknown error");
        return Err(BirdtagError::detection(reason.to_string()))
            .with_context(|| format!("Search {job_id} failed"));
    }
    Ok(())
}
