use anyhow::anyhow;
use serde_json::json;

use crate::cli::utils::{output_error, output_success, print_fields};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::NodeKind;
use crate::services::ServiceError;
use crate::state::AppState;

/// Build each requested hierarchy. Cycles and stale levels are reported;
/// the command fails if any kind has a problem.
pub async fn handle(config: AppConfig, kind: Option<&str>, output_format: OutputFormat) -> anyhow::Result<()> {
    let kinds: Vec<NodeKind> = match kind {
        Some(k) => vec![k.parse().map_err(|e: String| anyhow!(e))?],
        None => NodeKind::ALL.to_vec(),
    };

    let state = AppState::connect(config).await?;
    let mut failures = 0;

    for kind in kinds {
        match state.nodes(kind).check().await {
            Ok(report) if report.stale_levels.is_empty() => {
                output_success(
                    output_format,
                    &format!("{} tree is consistent", kind.label()),
                    Some(json!({ "report": report })),
                )?;
                if matches!(output_format, OutputFormat::Text) {
                    print_fields(&[
                        ("nodes", report.nodes.to_string()),
                        ("roots", report.roots.to_string()),
                    ]);
                }
            }
            Ok(report) => {
                failures += 1;
                output_error(
                    output_format,
                    &format!("{} tree has stale levels on nodes {:?}", kind.label(), report.stale_levels),
                    Some("STALE_LEVELS"),
                )?;
            }
            Err(ServiceError::DataIntegrity(e)) => {
                failures += 1;
                output_error(
                    output_format,
                    &format!("{} tree is broken: {}", kind.label(), e),
                    Some("DATA_INTEGRITY"),
                )?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} hierarchy check(s) failed", failures));
    }
    Ok(())
}
