//! Error handling and display for the CLI.

use std::path::PathBuf;

use colored::Colorize;
use meshform_id::ObjectIdentity;
use meshform_model::ValidationError;
use meshform_reconcile::ReconcileError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{}: spec for {identity} is invalid", .path.display())]
    InvalidSpec {
        path: PathBuf,
        identity: ObjectIdentity,
        source: ValidationError,
    },
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    // Library errors already render their causes.
    if err.is::<CliError>() || err.is::<ReconcileError>() {
        eprintln!("{} {}", "Error:".red().bold(), err);
    } else {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
    }

    if let Some(CliError::InvalidSpec { source, .. }) = err.downcast_ref::<CliError>() {
        for violation in &source.violations {
            eprintln!("  - {}", violation);
        }
    }

    let hint = match err.downcast_ref::<CliError>() {
        Some(CliError::InvalidSpec { path, .. }) => Some(format!(
            "Hint: Fix the listed attributes, then run `meshctl validate {}`.",
            path.display()
        )),
        None => err.downcast_ref::<ReconcileError>().and_then(reconcile_hint),
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", hint.yellow());
    }
}

fn reconcile_hint(err: &ReconcileError) -> Option<String> {
    match err {
        ReconcileError::MalformedIdentity { .. } => {
            Some(
                "Hint: Identities have the form <mesh_name>/<name>, e.g. simpleapp/servicebv1."
                    .to_string(),
            )
        }
        ReconcileError::NotFound { identity } => Some(format!(
            "Hint: Nothing named {identity} exists in the sandbox. Run `meshctl apply` first."
        )),
        ReconcileError::PartialReplacement { target, .. } => Some(format!(
            "Hint: The old virtual node is gone. Re-run `meshctl apply` to create {target}."
        )),
        e if e.is_retryable() => {
            Some("Hint: This failure is transient; retry the command.".to_string())
        }
        _ => None,
    }
}
