use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::PlatformClient;

/// Identity of an aggregated pull request, carried into the report.
#[derive(Debug, Clone)]
pub struct PrSummary {
    pub id: u64,
    pub title: String,
}

/// Outcome of aggregating one pull request's latest iteration.
#[derive(Debug)]
pub enum PrContent {
    /// Concatenated readable text of the latest iteration's files.
    Code { pr: PrSummary, context: String },
    /// The PR exists but has no iterations yet. A valid terminal state.
    NoIterations { pr: PrSummary },
    /// Every changed file was skipped (binary, folder, delete, unreadable).
    NoReadableCode { pr: PrSummary },
}

fn file_header(path: &str) -> String {
    format!("\n--- FILE: {path} ---\n")
}

/// Fetch the latest iteration of a PR and concatenate the readable text of
/// its changed files, in entry order, each behind a file-boundary marker.
///
/// Per-file read failures and binary content are skipped, never fatal.
/// Errors returned here (missing PR, iteration/change list fetch failures)
/// are absorbed by the report composer, one level up.
pub fn aggregate(client: &dyn PlatformClient, pr_id: u64) -> Result<PrContent> {
    let pull_request = client.get_pull_request(pr_id)?;
    let repo_id = pull_request.repository.id;
    let project = pull_request.repository.project.name;
    let pr = PrSummary {
        id: pull_request.pull_request_id,
        title: pull_request.title,
    };

    info!(pr_id, title = %pr.title, "aggregating pull request");

    let iterations = client.get_iterations(&repo_id, pr_id)?;
    let Some(latest) = iterations.iter().max_by_key(|it| it.id) else {
        return Ok(PrContent::NoIterations { pr });
    };

    debug!(pr_id, iteration = latest.id, "selected latest iteration");

    let changes = client.get_iteration_changes(&repo_id, pr_id, latest.id)?;

    let mut context = String::new();
    for entry in &changes {
        let Some(item) = &entry.item else { continue };
        if entry.change_type.is_delete() || item.is_folder {
            continue;
        }
        let Some(object_id) = &item.object_id else {
            warn!(path = %item.path, "change entry without content object, skipping");
            continue;
        };

        let bytes = match client.get_blob(&repo_id, object_id, &project) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %item.path, error = %e, "failed to read file, skipping");
                continue;
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        if text.contains('\0') {
            debug!(path = %item.path, "binary content, skipping");
            continue;
        }

        context.push_str(&file_header(&item.path));
        context.push_str(&text);
        context.push('\n');
        debug!(path = %item.path, bytes = bytes.len(), "read file");
    }

    if context.is_empty() {
        return Ok(PrContent::NoReadableCode { pr });
    }

    Ok(PrContent::Code { pr, context })
}
