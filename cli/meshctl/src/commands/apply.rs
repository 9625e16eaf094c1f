//! Apply command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use meshform_reconcile::ReconcileOutcome;
use serde::Serialize;

use crate::output::{print_output, print_single, print_success, OutputFormat};

use super::plan::{rows, ChangeRow};
use super::{load_object, CommandContext};

/// Reconcile the sandbox toward a manifest.
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Path to the manifest.
    file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApplyView {
    identity: String,
    outcome: &'static str,
    arn: Option<String>,
    phase: String,
    version: Option<i64>,
    changes: Vec<ChangeRow>,
}

fn outcome_name(outcome: &ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::Created { .. } => "created",
        ReconcileOutcome::Adopted { .. } => "adopted",
        ReconcileOutcome::Updated { .. } => "updated",
        ReconcileOutcome::Unchanged => "unchanged",
        ReconcileOutcome::Replaced { .. } => "replaced",
        ReconcileOutcome::Deleted => "deleted",
        ReconcileOutcome::AlreadyAbsent => "already_absent",
        ReconcileOutcome::Refreshed { .. } => "refreshed",
        ReconcileOutcome::Vanished => "vanished",
    }
}

impl ApplyCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (client, reconciler) = ctx.sandbox()?;
        let mut object = load_object(&self.file, &reconciler).await?;

        let result = reconciler.reconcile(&mut object).await;
        // Persist whatever reached the remote, even on failure.
        ctx.save_sandbox(&client)?;
        let outcome = result?;

        let observed = object.observed();
        let arn = observed.map(|o| o.metadata.arn.to_string());
        let changes = match &outcome {
            ReconcileOutcome::Updated { changes } => rows(changes),
            _ => Vec::new(),
        };

        match ctx.format {
            OutputFormat::Json => print_single(&ApplyView {
                identity: object.identity().to_string(),
                outcome: outcome_name(&outcome),
                arn,
                phase: object.phase().to_string(),
                version: observed.map(|o| o.metadata.version),
                changes,
            }),
            OutputFormat::Table => {
                let arn = arn.unwrap_or_else(|| "-".to_string());
                match &outcome {
                    ReconcileOutcome::Unchanged => {
                        print_success(&format!("{} is up to date", object.identity()))
                    }
                    ReconcileOutcome::Updated { changes: set } => {
                        print_output(&changes, ctx.format);
                        print_success(&format!("Updated {} ({})", object.identity(), set.summary()))
                    }
                    ReconcileOutcome::Replaced { previous, .. } => print_success(&format!(
                        "Replaced {previous} with {} ({arn})",
                        object.identity()
                    )),
                    ReconcileOutcome::Adopted { updated, .. } => print_success(&format!(
                        "Adopted existing {}{} ({arn})",
                        object.identity(),
                        if *updated { " and updated it" } else { "" }
                    )),
                    other => print_success(&format!(
                        "{} {} ({arn})",
                        capitalize(outcome_name(other)),
                        object.identity()
                    )),
                }
            }
        }

        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
