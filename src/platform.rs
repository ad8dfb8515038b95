use std::io::Read;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

const API_VERSION: &str = "7.1";

/// Maximum blob size read into memory (64 MiB).
const MAX_BLOB_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    pub title: String,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub id: String,
    pub project: Project,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Iteration {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub item: Option<ChangeItem>,
    #[serde(default)]
    pub change_type: ChangeType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    #[serde(default)]
    pub path: String,
    pub object_id: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
}

/// Change kind of one entry in a pull-request iteration.
///
/// The platform encodes this as a numeric enum in its client libraries
/// (delete = 16) and as a string on the REST wire (`"edit"`,
/// `"delete, sourceRename"`, ...); both forms deserialize here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeType {
    Add,
    Edit,
    Rename,
    Delete,
    #[default]
    Other,
}

impl ChangeType {
    const DELETE_SENTINEL: u64 = 16;

    pub fn is_delete(self) -> bool {
        self == ChangeType::Delete
    }

    fn from_numeric(n: u64) -> Self {
        match n {
            1 => ChangeType::Add,
            2 => ChangeType::Edit,
            8 => ChangeType::Rename,
            Self::DELETE_SENTINEL => ChangeType::Delete,
            _ => ChangeType::Other,
        }
    }

    fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("delete") {
            ChangeType::Delete
        } else if lower.contains("rename") {
            ChangeType::Rename
        } else {
            match lower.as_str() {
                "add" => ChangeType::Add,
                "edit" => ChangeType::Edit,
                _ => ChangeType::Other,
            }
        }
    }
}

impl<'de> Deserialize<'de> for ChangeType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ChangeTypeVisitor;

        impl serde::de::Visitor<'_> for ChangeTypeVisitor {
            type Value = ChangeType;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a change type number or name")
            }

            fn visit_u64<E: serde::de::Error>(
                self,
                v: u64,
            ) -> std::result::Result<ChangeType, E> {
                Ok(ChangeType::from_numeric(v))
            }

            fn visit_i64<E: serde::de::Error>(
                self,
                v: i64,
            ) -> std::result::Result<ChangeType, E> {
                Ok(ChangeType::from_numeric(v.max(0) as u64))
            }

            fn visit_str<E: serde::de::Error>(
                self,
                v: &str,
            ) -> std::result::Result<ChangeType, E> {
                Ok(ChangeType::from_name(v))
            }
        }

        deserializer.deserialize_any(ChangeTypeVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl WorkItem {
    /// String value of a field, empty if absent or not a string.
    pub fn field_str(&self, name: &str) -> &str {
        self.fields
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relation {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkItemRef {
    pub url: String,
}

/// One JSON-Patch operation against a work item.
#[derive(Debug, Clone, Serialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    pub value: String,
}

impl PatchOp {
    /// `add` operation replacing the given field's value.
    pub fn add_field(field: &str, value: impl Into<String>) -> Self {
        Self {
            op: "add".to_string(),
            path: format!("/fields/{field}"),
            value: value.into(),
        }
    }
}

pub trait PlatformClient {
    fn get_pull_request(&self, pr_id: u64) -> Result<PullRequest>;

    fn get_iterations(&self, repo_id: &str, pr_id: u64) -> Result<Vec<Iteration>>;

    fn get_iteration_changes(
        &self,
        repo_id: &str,
        pr_id: u64,
        iteration_id: u64,
    ) -> Result<Vec<ChangeEntry>>;

    fn get_blob(&self, repo_id: &str, object_id: &str, project: &str) -> Result<Vec<u8>>;

    fn get_work_item_refs(&self, repo_id: &str, pr_id: u64) -> Result<Vec<WorkItemRef>>;

    fn get_work_item(&self, id: u64, expand_relations: bool) -> Result<WorkItem>;

    /// Apply a JSON-Patch document to a work item.
    /// A rejected patch maps to `Error::Update`.
    fn update_work_item(&self, id: u64, ops: &[PatchOp]) -> Result<()>;
}

// --- Wire envelopes ---

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesEnvelope {
    #[serde(default)]
    change_entries: Vec<ChangeEntry>,
}

/// Azure DevOps REST client over blocking HTTP, authenticated with a
/// personal access token.
pub struct AdoClient {
    org_url: String,
    auth_header: String,
}

impl AdoClient {
    pub fn new(org_url: &str, pat: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!(":{pat}"));
        Self {
            org_url: org_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {token}"),
        }
    }

    fn pull_request_url(&self, pr_id: u64) -> String {
        format!(
            "{}/_apis/git/pullrequests/{pr_id}?api-version={API_VERSION}",
            self.org_url
        )
    }

    fn iterations_url(&self, repo_id: &str, pr_id: u64) -> String {
        format!(
            "{}/_apis/git/repositories/{repo_id}/pullRequests/{pr_id}/iterations?api-version={API_VERSION}",
            self.org_url
        )
    }

    fn changes_url(&self, repo_id: &str, pr_id: u64, iteration_id: u64) -> String {
        format!(
            "{}/_apis/git/repositories/{repo_id}/pullRequests/{pr_id}/iterations/{iteration_id}/changes?api-version={API_VERSION}",
            self.org_url
        )
    }

    fn blob_url(&self, repo_id: &str, object_id: &str, project: &str) -> String {
        format!(
            "{}/{}/_apis/git/repositories/{repo_id}/blobs/{object_id}?api-version={API_VERSION}&$format=octetStream",
            self.org_url,
            urlencoding::encode(project)
        )
    }

    fn work_item_refs_url(&self, repo_id: &str, pr_id: u64) -> String {
        format!(
            "{}/_apis/git/repositories/{repo_id}/pullRequests/{pr_id}/workitems?api-version={API_VERSION}",
            self.org_url
        )
    }

    fn work_item_url(&self, id: u64, expand_relations: bool) -> String {
        let expand = if expand_relations {
            "&$expand=relations"
        } else {
            ""
        };
        format!(
            "{}/_apis/wit/workitems/{id}?api-version={API_VERSION}{expand}",
            self.org_url
        )
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = ureq::get(url)
            .set("Authorization", &self.auth_header)
            .set("Accept", "application/json")
            .call()
            .map_err(|e| Error::Platform(format!("failed to fetch {what}: {e}")))?;

        response
            .into_json()
            .map_err(|e| Error::Platform(format!("failed to parse {what} response: {e}")))
    }
}

impl PlatformClient for AdoClient {
    fn get_pull_request(&self, pr_id: u64) -> Result<PullRequest> {
        let url = self.pull_request_url(pr_id);
        match ureq::get(&url)
            .set("Authorization", &self.auth_header)
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response.into_json().map_err(|e| {
                Error::Platform(format!("failed to parse pull request #{pr_id}: {e}"))
            }),
            Err(ureq::Error::Status(404, _)) => Err(Error::PrNotFound(pr_id)),
            Err(e) => Err(Error::Platform(format!(
                "failed to fetch pull request #{pr_id}: {e}"
            ))),
        }
    }

    fn get_iterations(&self, repo_id: &str, pr_id: u64) -> Result<Vec<Iteration>> {
        let url = self.iterations_url(repo_id, pr_id);
        let envelope: ListEnvelope<Iteration> =
            self.get_json(&url, &format!("iterations of pull request #{pr_id}"))?;
        debug!(pr_id, count = envelope.value.len(), "fetched iterations");
        Ok(envelope.value)
    }

    fn get_iteration_changes(
        &self,
        repo_id: &str,
        pr_id: u64,
        iteration_id: u64,
    ) -> Result<Vec<ChangeEntry>> {
        let url = self.changes_url(repo_id, pr_id, iteration_id);
        let envelope: ChangesEnvelope = self.get_json(
            &url,
            &format!("changes of pull request #{pr_id} iteration {iteration_id}"),
        )?;
        Ok(envelope.change_entries)
    }

    fn get_blob(&self, repo_id: &str, object_id: &str, project: &str) -> Result<Vec<u8>> {
        let url = self.blob_url(repo_id, object_id, project);
        let response = ureq::get(&url)
            .set("Authorization", &self.auth_header)
            .call()
            .map_err(|e| Error::Platform(format!("failed to fetch blob {object_id}: {e}")))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BLOB_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Platform(format!("failed to read blob {object_id}: {e}")))?;
        Ok(bytes)
    }

    fn get_work_item_refs(&self, repo_id: &str, pr_id: u64) -> Result<Vec<WorkItemRef>> {
        let url = self.work_item_refs_url(repo_id, pr_id);
        let envelope: ListEnvelope<WorkItemRef> =
            self.get_json(&url, &format!("work item refs of pull request #{pr_id}"))?;
        Ok(envelope.value)
    }

    fn get_work_item(&self, id: u64, expand_relations: bool) -> Result<WorkItem> {
        let url = self.work_item_url(id, expand_relations);
        self.get_json(&url, &format!("work item #{id}"))
    }

    fn update_work_item(&self, id: u64, ops: &[PatchOp]) -> Result<()> {
        let url = format!(
            "{}/_apis/wit/workitems/{id}?api-version={API_VERSION}",
            self.org_url
        );
        let body = serde_json::to_string(ops)
            .map_err(|e| Error::Update(format!("failed to serialize patch document: {e}")))?;

        ureq::request("PATCH", &url)
            .set("Authorization", &self.auth_header)
            .set("Content-Type", "application/json-patch+json")
            .send_string(&body)
            .map_err(|e| Error::Update(format!("work item #{id} patch rejected: {e}")))?;

        debug!(work_item_id = id, ops = ops.len(), "work item patched");
        Ok(())
    }
}

// --- Test support ---
