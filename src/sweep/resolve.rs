//! Conflict resolution on the pull request's own branch
//!
//! The base branch is merged into a clone of the head branch, markers are
//! stripped and the result pushed. While the forge still refuses the merge,
//! the deletion ladder escalates one level per iteration. When the cap runs
//! out the head branch stays as the last push left it.

use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{SweepError, Sweeper};
use crate::conflicts::{apply_level, level_name, EscalationSchedule};
use crate::external::{Checkout, MergeState};
use crate::github::{MergeableState, PullRequestDetail, PullRequestRef};
use crate::report::{Operation, OperationResult};

impl Sweeper<'_> {
    pub async fn resolve_all(&self, prs: &[PullRequestRef]) -> Result<Vec<OperationResult>, SweepError> {
        self.sweep_each(Operation::Resolve, prs, move |pr| async move {
            let detail = self.github.pull_request(&pr.repo, pr.number).await?;
            self.resolve_detail(pr, &detail).await
        })
        .await
    }

    pub(crate) async fn resolve_detail(
        &self,
        pr: &PullRequestRef,
        detail: &PullRequestDetail,
    ) -> Result<OperationResult, SweepError> {
        let refreshed;
        let detail = if detail.mergeable_state == MergeableState::Unknown {
            // GitHub answers `unknown` until it has computed mergeability
            if !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }
            refreshed = self.github.pull_request(&pr.repo, pr.number).await?;
            info!(state = %refreshed.mergeable_state, "Re-read mergeability");
            &refreshed
        } else {
            detail
        };

        if !detail.has_conflicts() {
            return Ok(OperationResult::skipped(
                Operation::Resolve,
                pr,
                format!("Skipped: not conflicted (state: {})", detail.mergeable_state),
            ));
        }
        if self.settings.dry_run {
            return Ok(OperationResult::dry_run(
                Operation::Resolve,
                pr,
                format!(
                    "Would merge {} into {} and strip conflict markers",
                    detail.base.name, detail.head.name
                ),
            ));
        }

        let workspace = self.workspace()?;
        let checkout = workspace.checkout(&pr.repo, &detail.head.name, pr.number).await?;
        let result = self.resolve_in(&checkout, pr, detail).await;
        checkout.discard().await;
        result
    }

    async fn resolve_in(
        &self,
        checkout: &Checkout<'_>,
        pr: &PullRequestRef,
        detail: &PullRequestDetail,
    ) -> Result<OperationResult, SweepError> {
        let head = detail.head.name.as_str();
        let base = detail.base.name.as_str();
        let method = self.settings.merge_method;

        checkout.fetch(base).await?;
        let conflicted = match checkout.merge_no_commit(&format!("origin/{base}")).await? {
            MergeState::Clean => Vec::new(),
            MergeState::Conflicted(paths) => paths,
        };
        info!(files = conflicted.len(), "Merged base into head");

        self.strip_markers(checkout, &conflicted).await?;
        checkout.stage_all().await?;
        checkout
            .commit(&format!("Merge {base} into {head} and resolve conflict markers"))
            .await?;
        checkout.push(head, false).await?;

        if self.try_merge(pr).await? {
            return Ok(OperationResult::succeeded(
                Operation::Resolve,
                pr,
                format!("Merged with {method} after stripping conflict markers"),
            )
            .with_method(method));
        }

        let files = self.ladder_targets(pr, conflicted).await?;
        let mut schedule = EscalationSchedule::new(self.settings.start_level, self.settings.max_iterations);
        while let Some(level) = schedule.next() {
            let removed = self.apply_ladder(checkout, &files, level).await?;
            info!(level, name = level_name(level), removed, "🪜 Applied deletion ladder");

            checkout.stage_all().await?;
            let committed = checkout
                .commit(&format!("Deletion ladder level {level} ({})", level_name(level)))
                .await?;
            if committed {
                checkout.push(head, false).await?;
            }

            if !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }
            if self.try_merge(pr).await? {
                return Ok(OperationResult::succeeded(
                    Operation::Resolve,
                    pr,
                    format!("Merged with {method} after ladder level {level}"),
                )
                .with_method(method)
                .with_ladder_levels(schedule.applied()));
            }
        }

        warn!(levels = ?schedule.applied(), head, "Ladder exhausted, head branch left modified");
        Ok(OperationResult::failed(
            Operation::Resolve,
            pr,
            format!(
                "Still not mergeable after {} ladder iterations; {head} keeps the pushed changes",
                schedule.applied().len()
            ),
        )
        .with_method(method)
        .with_ladder_levels(schedule.applied()))
    }

    async fn try_merge(&self, pr: &PullRequestRef) -> Result<bool, SweepError> {
        let outcome = self
            .github
            .merge_pull_request(&pr.repo, pr.number, self.settings.merge_method)
            .await?;
        if !outcome.merged {
            info!(message = %outcome.message, "Merge still rejected");
        }
        Ok(outcome.merged)
    }

    /// Files the ladder may edit: everything the pull request changes, plus
    /// anything the base merge left conflicted
    async fn ladder_targets(&self, pr: &PullRequestRef, conflicted: Vec<String>) -> Result<Vec<String>, SweepError> {
        let changed = self.github.pull_request_files(&pr.repo, pr.number).await?;
        let targets: BTreeSet<String> = changed
            .into_iter()
            .filter(|file| !file.is_removed())
            .map(|file| file.filename)
            .chain(conflicted)
            .collect();
        Ok(targets.into_iter().collect())
    }

    async fn apply_ladder(&self, checkout: &Checkout<'_>, files: &[String], level: u8) -> Result<usize, SweepError> {
        let mut removed = 0;
        for file in files {
            let Some(text) = checkout.read_file(file).await? else {
                continue;
            };
            let pass = apply_level(&text, level);
            if pass.removed_lines > 0 {
                checkout.write_file(file, &pass.text).await?;
                removed += pass.removed_lines;
            }
        }
        Ok(removed)
    }
}
