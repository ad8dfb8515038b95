use tracing::info;

use crate::error::Result;
use crate::platform::{PatchOp, PlatformClient};

/// Overwrite the configured report field on the work item with the full
/// composed report. One `add` patch operation; no merge with prior content.
pub fn write_report(
    client: &dyn PlatformClient,
    work_item_id: u64,
    field: &str,
    report_html: &str,
) -> Result<()> {
    let ops = [PatchOp::add_field(field, report_html)];
    client.update_work_item(work_item_id, &ops)?;
    info!(work_item_id, field, "work item updated with review report");
    Ok(())
}
