#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use cardlens::config::Config;
use cardlens::error::{Error, Result};
use cardlens::generate::GenerationClient;
use cardlens::platform::{
    ChangeEntry, ChangeItem, ChangeType, Iteration, PatchOp, PlatformClient, Project, PullRequest,
    Relation, Repository, WorkItem, WorkItemRef,
};

pub fn test_config() -> Config {
    Config {
        org_url: "https://dev.example.com/org".to_string(),
        field: "Custom.ReviewAnalysis".to_string(),
        model: "gemini-2.5-flash".to_string(),
        pat_env: "ADO_PAT".to_string(),
        api_key_env: "GOOGLE_API_KEY".to_string(),
        prompt_dir: None,
    }
}

// --- Builders ---

pub fn pull_request(id: u64, title: &str) -> PullRequest {
    PullRequest {
        pull_request_id: id,
        title: title.to_string(),
        repository: Repository {
            id: "repo-1".to_string(),
            project: Project {
                name: "Proj".to_string(),
            },
        },
    }
}

pub fn change(path: &str, object_id: &str) -> ChangeEntry {
    ChangeEntry {
        item: Some(ChangeItem {
            path: path.to_string(),
            object_id: Some(object_id.to_string()),
            is_folder: false,
        }),
        change_type: ChangeType::Edit,
    }
}

pub fn work_item(id: u64, relation_urls: &[&str]) -> WorkItem {
    let mut fields = serde_json::Map::new();
    fields.insert("System.Title".to_string(), "Login page".into());
    fields.insert(
        "System.Description".to_string(),
        "Users can sign in with email".into(),
    );
    fields.insert(
        "Microsoft.VSTS.Common.AcceptanceCriteria".to_string(),
        "Valid users reach the dashboard".into(),
    );
    WorkItem {
        id,
        fields,
        relations: relation_urls
            .iter()
            .map(|url| Relation {
                url: (*url).to_string(),
            })
            .collect(),
    }
}

// --- Mock platform ---

#[derive(Default)]
pub struct MockPlatform {
    pub pull_requests: HashMap<u64, PullRequest>,
    pub iterations: HashMap<u64, Vec<Iteration>>,
    pub changes: HashMap<(u64, u64), Vec<ChangeEntry>>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub failing_blobs: HashSet<String>,
    pub work_item_refs: HashMap<u64, Vec<WorkItemRef>>,
    pub work_items: HashMap<u64, WorkItem>,
    pub update_error: Option<String>,
    /// Shared so tests keep a handle after the pipeline takes ownership.
    pub updates: Arc<Mutex<Vec<(u64, Vec<PatchOp>)>>>,
}

impl MockPlatform {
    /// Seed a PR whose latest iteration changes one readable file.
    pub fn seed_pr_with_code(&mut self, id: u64, title: &str, code: &str) {
        self.pull_requests.insert(id, pull_request(id, title));
        self.iterations
            .insert(id, vec![Iteration { id: 1 }, Iteration { id: 2 }]);
        let object_id = format!("obj-{id}");
        self.changes
            .insert((id, 2), vec![change("/src/main.rs", &object_id)]);
        self.blobs.insert(object_id, code.as_bytes().to_vec());
    }

    pub fn update_tracker(&self) -> Arc<Mutex<Vec<(u64, Vec<PatchOp>)>>> {
        Arc::clone(&self.updates)
    }
}

impl PlatformClient for MockPlatform {
    fn get_pull_request(&self, pr_id: u64) -> Result<PullRequest> {
        self.pull_requests
            .get(&pr_id)
            .cloned()
            .ok_or(Error::PrNotFound(pr_id))
    }

    fn get_iterations(&self, _repo_id: &str, pr_id: u64) -> Result<Vec<Iteration>> {
        Ok(self.iterations.get(&pr_id).cloned().unwrap_or_default())
    }

    fn get_iteration_changes(
        &self,
        _repo_id: &str,
        pr_id: u64,
        iteration_id: u64,
    ) -> Result<Vec<ChangeEntry>> {
        Ok(self
            .changes
            .get(&(pr_id, iteration_id))
            .cloned()
            .unwrap_or_default())
    }

    fn get_blob(&self, _repo_id: &str, object_id: &str, _project: &str) -> Result<Vec<u8>> {
        if self.failing_blobs.contains(object_id) {
            return Err(Error::Platform(format!("blob {object_id} unreadable")));
        }
        self.blobs
            .get(object_id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("blob {object_id} not found")))
    }

    fn get_work_item_refs(&self, _repo_id: &str, pr_id: u64) -> Result<Vec<WorkItemRef>> {
        Ok(self.work_item_refs.get(&pr_id).cloned().unwrap_or_default())
    }

    fn get_work_item(&self, id: u64, _expand_relations: bool) -> Result<WorkItem> {
        self.work_items
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Platform(format!("work item #{id} not found")))
    }

    fn update_work_item(&self, id: u64, ops: &[PatchOp]) -> Result<()> {
        if let Some(ref msg) = self.update_error {
            return Err(Error::Update(msg.clone()));
        }
        self.updates.lock().unwrap().push((id, ops.to_vec()));
        Ok(())
    }
}

// --- Mock generator ---

#[derive(Default)]
pub struct MockGenerator {
    pub responses: Mutex<Vec<Result<String>>>,
    /// Shared so tests keep a handle after the pipeline takes ownership.
    pub prompts_seen: Arc<Mutex<Vec<String>>>,
}

impl MockGenerator {
    pub fn new(responses: Vec<Result<String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            prompts_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompt_tracker(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts_seen)
    }
}

impl GenerationClient for MockGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts_seen.lock().unwrap().push(prompt.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Err(Error::Generation("no more mock responses".to_string()))
        } else {
            responses.remove(0)
        }
    }
}
