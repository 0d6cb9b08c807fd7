use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::state::AppState;

pub async fn handle(config: AppConfig, days: Option<u32>, output_format: OutputFormat) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.audit.retention_days);
    let state = AppState::connect(config).await?;
    let removed = state.audit().purge_older_than(days).await?;

    output_success(
        output_format,
        &format!("Removed {} log entries older than {} days", removed, days),
        Some(json!({ "removed": removed, "days": days })),
    )
}
