use anyhow::bail;
use serde_json::json;

use crate::auth::{Argon2Verifier, CredentialVerifier};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::user_service::MIN_PASSWORD_LEN;

/// Hash for seeding accounts by hand, e.g. straight into the users table
pub fn handle(password: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {} characters", MIN_PASSWORD_LEN);
    }

    let hash = Argon2Verifier.hash(password)?;
    match output_format {
        OutputFormat::Json => output_success(output_format, "Password hashed", Some(json!({ "hash": hash }))),
        OutputFormat::Text => {
            println!("{}", hash);
            Ok(())
        }
    }
}
