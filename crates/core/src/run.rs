use crate::apply::{apply_plan, ApplyOptions, ApplyResult};
use crate::confirm::Confirm;
use crate::planner::{generate_plan, PlanOptions, RenamePlan};
use crate::tags::TagReader;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plan: PlanOptions,
    /// Plan only; nothing on disk changes.
    pub test: bool,
    pub no_confirm: bool,
    pub undo_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    DryRun,
    NothingToRename,
    Declined,
    Applied(ApplyResult),
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: RenamePlan,
    pub outcome: RunOutcome,
}

pub fn run_batch(
    options: &RunOptions,
    reader: &dyn TagReader,
    confirm: &mut dyn Confirm,
) -> Result<RunReport> {
    let plan = generate_plan(&options.plan, reader)?;

    if options.test {
        return Ok(RunReport {
            plan,
            outcome: RunOutcome::DryRun,
        });
    }

    let pending = plan.changed().count();
    if pending == 0 {
        return Ok(RunReport {
            plan,
            outcome: RunOutcome::NothingToRename,
        });
    }

    if !options.no_confirm {
        let message = format!(
            "{pending} audio file(s) in {} will be renamed",
            plan.root.display()
        );
        if !confirm.confirm_plan(&plan, &message)? {
            info!("batch declined; nothing renamed");
            return Ok(RunReport {
                plan,
                outcome: RunOutcome::Declined,
            });
        }
    }

    let result = apply_plan(
        &plan,
        &ApplyOptions {
            undo_log: options.undo_log.clone(),
        },
    )?;
    Ok(RunReport {
        plan,
        outcome: RunOutcome::Applied(result),
    })
}
