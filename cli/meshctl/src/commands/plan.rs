//! Plan command.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use meshform_reconcile::{Change, ChangeSet, Plan, SpecHash};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_info, print_output, print_single, OutputFormat};

use super::{load_object, CommandContext};

/// Diff a manifest against the sandbox without changing anything.
#[derive(Debug, Args)]
pub struct PlanCommand {
    /// Path to the manifest.
    file: PathBuf,
}

#[derive(Debug, Serialize, Tabled)]
pub(super) struct ChangeRow {
    #[tabled(rename = "")]
    symbol: &'static str,

    #[tabled(rename = "Kind")]
    kind: &'static str,

    #[tabled(rename = "Attribute")]
    path: String,

    #[tabled(rename = "Before", display = "display_value")]
    before: Option<serde_json::Value>,

    #[tabled(rename = "After", display = "display_value")]
    after: Option<serde_json::Value>,
}

fn display_value(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => format!("{s:?}"),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

impl From<&Change> for ChangeRow {
    fn from(change: &Change) -> Self {
        Self {
            symbol: change.kind.symbol(),
            kind: change.kind.as_str(),
            path: change.path.to_string(),
            before: change.before.as_ref().map(|v| v.to_json()),
            after: change.after.as_ref().map(|v| v.to_json()),
        }
    }
}

pub(super) fn rows(changes: &ChangeSet) -> Vec<ChangeRow> {
    changes.iter().map(ChangeRow::from).collect()
}

#[derive(Debug, Serialize)]
struct PlanView {
    identity: String,
    action: &'static str,
    spec_hash: String,
    summary: String,
    changes: Vec<ChangeRow>,
}

impl PlanCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let (_client, reconciler) = ctx.sandbox()?;
        let object = load_object(&self.file, &reconciler).await?;
        let plan = reconciler.plan(&object)?;
        let empty = ChangeSet::default();
        let changes = plan.changes().unwrap_or(&empty);

        match ctx.format {
            OutputFormat::Json => print_single(&PlanView {
                identity: object.identity().to_string(),
                action: plan.action(),
                spec_hash: SpecHash::of(object.desired()).to_string(),
                summary: changes.summary(),
                changes: rows(changes),
            }),
            OutputFormat::Table => {
                match &plan {
                    Plan::Unchanged => {
                        print_info(&format!("{} is up to date.", object.identity()));
                        return Ok(());
                    }
                    Plan::Create(_) => {
                        print_info(&format!("{} will be created.", object.identity()))
                    }
                    Plan::Update(_) => {
                        print_info(&format!("{} will be updated in place.", object.identity()))
                    }
                    Plan::Replace(_) => print_info(&format!(
                        "{} will be deleted and re-created.",
                        object.identity()
                    )),
                }
                print_output(&rows(changes), ctx.format);
                println!("Plan: {}", changes.summary());
            }
        }

        Ok(())
    }
}
