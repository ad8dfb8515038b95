use std::collections::BTreeSet;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::platform::{PlatformClient, WorkItem};

/// Case-insensitive marker distinguishing pull-request relations from
/// other artifact links (parent/child work items, commits, ...).
const PR_URL_MARKER: &str = "pullrequestid";

pub const TITLE_FIELD: &str = "System.Title";
pub const DESCRIPTION_FIELD: &str = "System.Description";
pub const ACCEPTANCE_FIELD: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";

/// Resolution entry mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Start from a pull request; the work set is exactly that PR.
    SinglePr,
    /// Start from a card; the work set is every PR it links to.
    WholeCard,
}

impl Mode {
    pub fn label(self) -> &'static str {
        match self {
            Mode::SinglePr => "single PR",
            Mode::WholeCard => "whole card",
        }
    }
}

/// Classification of one work-item relation URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationLink {
    PullRequest(u64),
    Other,
}

/// Classify a relation URL. Relations without the pull-request marker,
/// and marked relations whose id cannot be extracted, are `Other`.
pub fn classify_relation(url: &str) -> RelationLink {
    if !url.to_lowercase().contains(PR_URL_MARKER) {
        return RelationLink::Other;
    }

    match trailing_id(url) {
        Some(id) => RelationLink::PullRequest(id),
        None => {
            warn!(url, "pull-request relation without extractable id, skipping");
            RelationLink::Other
        }
    }
}

/// Trailing integer of a (possibly percent-encoded) URL: the decoded form
/// is matched against `/(\d+)$` first, then the last `/`-separated segment
/// is tried as a plain integer.
fn trailing_id(url: &str) -> Option<u64> {
    let decoded = match urlencoding::decode(url) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => url.to_string(),
    };

    let suffix_re = Regex::new(r"/(\d+)$").unwrap();
    if let Some(cap) = suffix_re.captures(&decoded) {
        return cap[1].parse().ok();
    }

    decoded.rsplit('/').next().and_then(|s| s.parse().ok())
}

/// The resolved unit of work: one work item, an ordered deduplicated set
/// of PR ids, and the card's requirements text.
#[derive(Debug, Clone)]
pub struct Scope {
    pub work_item_id: u64,
    /// Ascending PR ids; iteration order is the report's fragment order.
    pub pr_ids: Vec<u64>,
    pub requirements: String,
}

pub fn resolve(client: &dyn PlatformClient, mode: Mode, id: u64) -> Result<Scope> {
    match mode {
        Mode::SinglePr => resolve_pr_first(client, id),
        Mode::WholeCard => resolve_card_first(client, id),
    }
}

/// PR-first: find the card the PR references; the work set is `{pr_id}`.
pub fn resolve_pr_first(client: &dyn PlatformClient, pr_id: u64) -> Result<Scope> {
    let pr = client.get_pull_request(pr_id)?;
    let refs = client.get_work_item_refs(&pr.repository.id, pr_id)?;

    let work_item_id = refs
        .iter()
        .find_map(|r| trailing_id(&r.url))
        .ok_or(Error::NotLinked(pr_id))?;

    debug!(pr_id, work_item_id, "resolved linked work item");

    let work_item = client.get_work_item(work_item_id, false)?;
    Ok(Scope {
        work_item_id,
        pr_ids: vec![pr_id],
        requirements: requirements_text(&work_item),
    })
}

/// Card-first: scan the card's relations for pull-request links.
pub fn resolve_card_first(client: &dyn PlatformClient, work_item_id: u64) -> Result<Scope> {
    let work_item = client.get_work_item(work_item_id, true)?;

    debug!(
        work_item_id,
        relations = work_item.relations.len(),
        "scanning relations"
    );

    let mut pr_ids = BTreeSet::new();
    for relation in &work_item.relations {
        if let RelationLink::PullRequest(id) = classify_relation(&relation.url) {
            debug!(pr_id = id, "identified linked pull request");
            pr_ids.insert(id);
        }
    }

    if pr_ids.is_empty() {
        return Err(Error::NoLinkedPrs(work_item_id));
    }

    Ok(Scope {
        work_item_id,
        pr_ids: pr_ids.into_iter().collect(),
        requirements: requirements_text(&work_item),
    })
}

/// Requirements block handed to the review prompt.
pub fn requirements_text(work_item: &WorkItem) -> String {
    format!(
        "TITLE: {}\nDESCRIPTION: {}\nACCEPTANCE CRITERIA: {}",
        work_item.field_str(TITLE_FIELD),
        work_item.field_str(DESCRIPTION_FIELD),
        work_item.field_str(ACCEPTANCE_FIELD),
    )
}
