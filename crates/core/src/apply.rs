use crate::planner::{RenameCandidate, RenamePlan};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplyResult {
    pub applied: usize,
    pub unchanged: usize,
    pub refused: usize,
    pub failed: usize,
}

/// Moves every changed candidate to its target. A target that exists by the
/// time of the move belongs to someone else and is never overwritten; such
/// files, and files whose rename fails, are logged and skipped.
pub fn apply_plan(plan: &RenamePlan) -> ApplyResult {
    let mut result = ApplyResult::default();

    for candidate in &plan.candidates {
        if !candidate.changed {
            result.unchanged += 1;
            continue;
        }
        match apply_one(candidate) {
            Outcome::Applied => result.applied += 1,
            Outcome::Refused => result.refused += 1,
            Outcome::Failed => result.failed += 1,
        }
    }

    result
}

enum Outcome {
    Applied,
    Refused,
    Failed,
}

fn apply_one(candidate: &RenameCandidate) -> Outcome {
    let from = &candidate.original_path;
    let to = &candidate.target_path;

    match to.try_exists() {
        Ok(false) => {}
        Ok(true) => {
            warn!(
                from = %from.display(),
                to = %to.display(),
                "リネーム先に別のファイルが存在するためスキップします"
            );
            return Outcome::Refused;
        }
        Err(err) => {
            warn!(to = %to.display(), "リネーム先を確認できませんでした: {err}");
            return Outcome::Failed;
        }
    }

    match fs::rename(from, to) {
        Ok(()) => {
            info!(from = %from.display(), to = %to.display(), "リネームしました");
            Outcome::Applied
        }
        Err(err) => {
            warn!(
                from = %from.display(),
                to = %to.display(),
                "リネームに失敗しました: {err}"
            );
            Outcome::Failed
        }
    }
}
