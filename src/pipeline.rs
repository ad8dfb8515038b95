use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::generate::GenerationClient;
use crate::links::{self, Mode};
use crate::platform::PlatformClient;
use crate::prompts::PromptEngine;
use crate::report;
use crate::update;

#[derive(Debug)]
pub struct RunSummary {
    pub work_item_id: u64,
    pub fragment_count: usize,
}

/// End-to-end run: resolve the work scope, compose the review report,
/// write it back onto the work item.
pub struct Pipeline<P, G> {
    platform: P,
    generator: G,
    prompts: PromptEngine,
    config: Config,
}

impl<P: PlatformClient, G: GenerationClient> Pipeline<P, G> {
    pub fn new(platform: P, generator: G, prompts: PromptEngine, config: Config) -> Self {
        Self {
            platform,
            generator,
            prompts,
            config,
        }
    }

    /// Only resolution failures and the final write-back failure escape
    /// here; per-PR failures are folded into the report.
    pub fn run(&self, mode: Mode, id: u64) -> Result<RunSummary> {
        let scope = links::resolve(&self.platform, mode, id)?;
        info!(
            work_item_id = scope.work_item_id,
            pr_count = scope.pr_ids.len(),
            mode = mode.label(),
            "scope resolved"
        );

        let report = report::compose(&self.platform, &self.generator, &self.prompts, &scope, mode);

        update::write_report(
            &self.platform,
            scope.work_item_id,
            &self.config.field,
            &report.html,
        )?;

        Ok(RunSummary {
            work_item_id: scope.work_item_id,
            fragment_count: report.fragment_count,
        })
    }
}
