use serde_json::json;

use crate::cli::utils::{output_success, print_fields};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::state::AppState;

pub async fn handle(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = AppState::connect(config).await?;
    let report = state.bootstrap().seed().await?;

    let message = if report.is_noop() {
        "Default data already present"
    } else {
        "Seeded default data"
    };

    output_success(output_format, message, Some(json!({ "report": report })))?;
    if matches!(output_format, OutputFormat::Text) && !report.is_noop() {
        print_fields(&[
            ("permissions", report.permissions_created.to_string()),
            ("menus", report.menus_created.to_string()),
            ("roles", report.roles_created.to_string()),
            ("admin user", report.admin_created.to_string()),
        ]);
    }
    Ok(())
}
