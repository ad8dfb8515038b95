use chrono::Local;
use tracing::{info, warn};

use crate::aggregate::{self, PrContent, PrSummary};
use crate::generate::GenerationClient;
use crate::links::{Mode, Scope};
use crate::platform::PlatformClient;
use crate::prompts::PromptEngine;

/// Why a PR produced no verdict, without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoIterations,
    NoReadableCode,
}

impl SkipReason {
    fn message(self) -> &'static str {
        match self {
            SkipReason::NoIterations => "No iterations found.",
            SkipReason::NoReadableCode => "No readable code.",
        }
    }
}

/// Terminal outcome of one PR's aggregate-then-review pipeline.
/// Every PR in the work set yields exactly one of these.
#[derive(Debug)]
pub enum PrOutcome {
    Analyzed { pr: PrSummary, verdict: String },
    Skipped { pr: PrSummary, reason: SkipReason },
    Failed { pr_id: u64, title: Option<String>, error: String },
}

impl PrOutcome {
    pub fn pr_id(&self) -> u64 {
        match self {
            PrOutcome::Analyzed { pr, .. } | PrOutcome::Skipped { pr, .. } => pr.id,
            PrOutcome::Failed { pr_id, .. } => *pr_id,
        }
    }
}

/// The composed review document. Immutable once built.
#[derive(Debug)]
pub struct Report {
    pub html: String,
    pub fragment_count: usize,
}

/// Run one PR through aggregation and review. Infallible by design: every
/// failure becomes a `Failed` outcome so later PRs still get processed.
pub fn analyze_pr(
    platform: &dyn PlatformClient,
    generator: &dyn GenerationClient,
    prompts: &PromptEngine,
    pr_id: u64,
    requirements: &str,
) -> PrOutcome {
    let content = match aggregate::aggregate(platform, pr_id) {
        Ok(content) => content,
        Err(e) => {
            warn!(pr_id, error = %e, "aggregation failed");
            return PrOutcome::Failed {
                pr_id,
                title: None,
                error: e.to_string(),
            };
        }
    };

    let (pr, context) = match content {
        PrContent::Code { pr, context } => (pr, context),
        PrContent::NoIterations { pr } => {
            return PrOutcome::Skipped {
                pr,
                reason: SkipReason::NoIterations,
            };
        }
        PrContent::NoReadableCode { pr } => {
            return PrOutcome::Skipped {
                pr,
                reason: SkipReason::NoReadableCode,
            };
        }
    };

    let prompt = match prompts.render_review(requirements, &context) {
        Ok(prompt) => prompt,
        Err(e) => {
            return PrOutcome::Failed {
                pr_id,
                title: Some(pr.title),
                error: e.to_string(),
            };
        }
    };

    info!(pr_id, "submitting for review");

    match generator.generate(&prompt) {
        Ok(verdict) => PrOutcome::Analyzed { pr, verdict },
        Err(e) => {
            warn!(pr_id, error = %e, "generation failed");
            PrOutcome::Failed {
                pr_id,
                title: Some(pr.title),
                error: e.to_string(),
            }
        }
    }
}

/// Fold the work set into a report, strictly in iteration order. One
/// fragment per PR, always; a failed PR never blocks the ones after it.
pub fn compose(
    platform: &dyn PlatformClient,
    generator: &dyn GenerationClient,
    prompts: &PromptEngine,
    scope: &Scope,
    mode: Mode,
) -> Report {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut html = render_header(mode, &timestamp);
    let mut fragment_count = 0;

    for &pr_id in &scope.pr_ids {
        info!(
            pr_id,
            position = fragment_count + 1,
            total = scope.pr_ids.len(),
            "processing pull request"
        );
        let outcome = analyze_pr(platform, generator, prompts, pr_id, &scope.requirements);
        html.push_str(&render_fragment(&outcome));
        fragment_count += 1;
    }

    Report {
        html,
        fragment_count,
    }
}

pub fn render_header(mode: Mode, timestamp: &str) -> String {
    format!(
        "<h2>Code review report ({})</h2><p>Generated: {timestamp}</p><hr>",
        mode.label()
    )
}

pub fn render_fragment(outcome: &PrOutcome) -> String {
    match outcome {
        PrOutcome::Analyzed { pr, verdict } => format!(
            "<div style=\"margin-bottom: 20px; border-bottom: 1px solid #ccc; padding-bottom: 10px;\">\
             <h3>Analysis PR #{}: {}</h3>{}</div>",
            pr.id,
            pr.title,
            verdict.replace('\n', "<br>")
        ),
        PrOutcome::Skipped { pr, reason } => format!(
            "<h3>PR #{}: {}</h3><p><em>{}</em></p><hr>",
            pr.id,
            pr.title,
            reason.message()
        ),
        PrOutcome::Failed { pr_id, title, error } => format!(
            "<p style=\"color:red\">Error analyzing PR #{pr_id} ({}): {error}</p>",
            title.as_deref().unwrap_or("unknown")
        ),
    }
}
