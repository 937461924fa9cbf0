use crate::planner::RenamePlan;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UndoLog {
    applied_at: DateTime<Local>,
    root: PathBuf,
    operations: Vec<RenameOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RenameOperation {
    from: PathBuf,
    to: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Where to journal the batch for `undo_last`; `None` disables the journal.
    pub undo_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub from: PathBuf,
    pub to: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub failed: Vec<ApplyFailure>,
    /// Set when the moves went through but the undo journal could not be saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoResult {
    pub restored: usize,
    pub skipped: usize,
}

/// Moves every changed candidate. A failed move is recorded and the rest of
/// the batch still runs, and so does a failure to write the undo journal.
pub fn apply_plan(plan: &RenamePlan, options: &ApplyOptions) -> Result<ApplyResult> {
    let total = plan.changed().count();
    let mut operations = Vec::with_capacity(total);
    let mut failed = Vec::new();

    for (index, candidate) in plan.changed().enumerate() {
        let from = &candidate.original_path;
        let to = &candidate.target_path;
        match move_file(from, to) {
            Ok(()) => {
                info!(
                    from = %from.display(),
                    to = %to.display(),
                    "renamed {} of {}",
                    index + 1,
                    total
                );
                if let Some(parent) = from.parent() {
                    prune_empty_dirs(parent, &plan.root);
                }
                operations.push(RenameOperation {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            Err(err) => {
                error!(from = %from.display(), to = %to.display(), "{err:#}");
                failed.push(ApplyFailure {
                    from: from.clone(),
                    to: to.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    let mut journal_error = None;
    if let Some(log_path) = options.undo_log.as_deref() {
        if !operations.is_empty() {
            if let Err(err) = persist_undo(log_path, &plan.root, &operations) {
                error!(path = %log_path.display(), "{err:#}; this batch cannot be undone");
                journal_error = Some(format!("{err:#}"));
            }
        }
    }

    Ok(ApplyResult {
        applied: operations.len(),
        unchanged: plan.candidates.len().saturating_sub(total),
        failed,
        journal_error,
    })
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("could not create directory: {}", parent.display()))?;
    }
    if to.exists() {
        bail!("target already exists: {}", to.display());
    }
    fs::rename(from, to)
        .with_context(|| format!("could not move {} -> {}", from.display(), to.display()))
}

fn prune_empty_dirs(start: &Path, root: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) || !is_empty_dir(dir) {
            break;
        }
        if let Err(err) = fs::remove_dir(dir) {
            warn!(dir = %dir.display(), error = %err, "could not remove empty directory");
            break;
        }
        debug!(dir = %dir.display(), "removed empty directory");
        current = dir.parent();
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

pub fn undo_last(log_path: &Path) -> Result<UndoResult> {
    if !log_path.exists() {
        bail!("there is no rename batch to undo");
    }

    let raw = fs::read_to_string(log_path)
        .with_context(|| format!("could not read undo log: {}", log_path.display()))?;
    let log = serde_json::from_str::<UndoLog>(&raw).context("undo log is corrupted")?;
    info!(
        applied_at = %log.applied_at,
        operations = log.operations.len(),
        "undoing rename batch"
    );

    let result = restore_operations(&log)?;

    fs::remove_file(log_path)
        .with_context(|| format!("could not delete undo log: {}", log_path.display()))?;

    Ok(result)
}

fn restore_operations(log: &UndoLog) -> Result<UndoResult> {
    let mut restored = 0usize;
    let mut skipped = 0usize;
    for op in log.operations.iter().rev() {
        if !op.to.exists() {
            warn!(path = %op.to.display(), "renamed file is gone; cannot restore");
            skipped += 1;
            continue;
        }
        if op.from.exists() {
            warn!(path = %op.from.display(), "original path is occupied; not restoring");
            skipped += 1;
            continue;
        }
        move_file(&op.to, &op.from)?;
        if let Some(parent) = op.to.parent() {
            prune_empty_dirs(parent, &log.root);
        }
        restored += 1;
    }
    Ok(UndoResult { restored, skipped })
}

fn persist_undo(log_path: &Path, root: &Path, operations: &[RenameOperation]) -> Result<()> {
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create directory: {}", dir.display()))?;
    }

    let log = UndoLog {
        applied_at: Local::now(),
        root: root.to_path_buf(),
        operations: operations.to_vec(),
    };
    let body = serde_json::to_string_pretty(&log).context("could not serialize undo log")?;
    fs::write(log_path, body)
        .with_context(|| format!("could not write undo log: {}", log_path.display()))?;
    Ok(())
}
