//! Resume-context builder.
//!
//! When a turn starts with an issue already in progress, the agent gets a
//! prompt block describing where it left off. Building that block takes one
//! sequential lookup (which issue?) followed by four independent ones that
//! run concurrently. Any lookup may fail; failures only empty out their own
//! section.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::client::TrackerClient;
use crate::format::format_checkpoint_trail;
use crate::parser::{parse_dep_list, parse_issue_list, parse_porcelain, parse_show, RelatedField};
use crate::types::{DependencyEdge, IssueSummary};

/// Everything needed to render a resume message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryContext {
    pub issue: IssueSummary,
    pub checkpoint_trail: Vec<String>,
    /// First parent reported by the tracker, if any.
    pub parent: Option<IssueSummary>,
    /// Issues that depend on this one.
    pub unblocks: Vec<IssueSummary>,
    /// `"<path> (<tag>)"` entries from the working tree.
    pub uncommitted_files: Vec<String>,
}

/// Builds the resume context for the most recently updated in-progress issue.
///
/// Returns `None` when nothing is in progress or the list call fails.
pub async fn build_recovery_context(client: &TrackerClient) -> Option<RecoveryContext> {
    build_recovery_context_at(client, Utc::now()).await
}

/// As [`build_recovery_context`], with an explicit clock for the trail.
pub async fn build_recovery_context_at(
    client: &TrackerClient,
    now: DateTime<Utc>,
) -> Option<RecoveryContext> {
    let listed = client
        .br(&["list", "--status", "in_progress", "--sort", "updated_at", "--json"])
        .await;
    if !listed.success() {
        debug!("In-progress lookup failed; nothing to resume");
        return None;
    }
    let issue = parse_issue_list(&listed.stdout).into_iter().next()?;
    let id = issue.id.as_str();

    let show_args = ["show", id, "--json"];
    let status_args = ["status", "--porcelain"];
    let (show, (parent, unblocks), status) = tokio::join!(
        client.br(&show_args),
        dependency_neighbourhood(client, id, None),
        client.git(&status_args),
    );

    let detail = show.success().then(|| parse_show(&show.stdout)).flatten();
    let checkpoint_trail = detail
        .as_ref()
        .map(|d| format_checkpoint_trail(d.comments(), now))
        .unwrap_or_default();
    let issue = detail.map(|d| d.summary).unwrap_or(issue);

    let uncommitted_files = if status.success() {
        parse_porcelain(&status.stdout)
    } else {
        Vec::new()
    };

    info!(
        issue_id = %issue.id,
        has_parent = parent.is_some(),
        unblocks = unblocks.len(),
        trail = checkpoint_trail.len(),
        uncommitted = uncommitted_files.len(),
        "Built recovery context"
    );

    Some(RecoveryContext {
        issue,
        checkpoint_trail,
        parent,
        unblocks,
        uncommitted_files,
    })
}

/// Parent and dependents of `issue_id`, looked up concurrently.
///
/// Edges are classified by orientation rather than by the query that
/// returned them: `{issue_id: self, depends_on_id: X}` makes X a parent
/// candidate, `{issue_id: X, depends_on_id: self}` makes X a dependent.
/// Rows carrying only a plain `id` fall back to the query direction (up for
/// parents, down for dependents). `timeout` overrides the client's default.
/// A failed lookup contributes nothing; self-references are dropped.
pub(crate) async fn dependency_neighbourhood(
    client: &TrackerClient,
    issue_id: &str,
    timeout: Option<Duration>,
) -> (Option<IssueSummary>, Vec<IssueSummary>) {
    let up_args = ["dep", "list", issue_id, "--direction", "up", "--json"];
    let down_args = ["dep", "list", issue_id, "--direction", "down", "--json"];
    let (up, down) = match timeout {
        Some(t) => {
            tokio::join!(
                client.br_with_timeout(&up_args, t),
                client.br_with_timeout(&down_args, t)
            )
        }
        None => tokio::join!(client.br(&up_args), client.br(&down_args)),
    };

    let mut parents = Vec::new();
    let mut dependents = Vec::new();
    for (result, plain_is_parent) in [(&up, true), (&down, false)] {
        if !result.success() {
            continue;
        }
        for edge in parse_dep_list(&result.stdout, RelatedField::DependsOnId) {
            match orient(edge, issue_id, plain_is_parent) {
                Some(Neighbour::Parent(issue)) => parents.push(issue),
                Some(Neighbour::Dependent(issue)) => dependents.push(issue),
                None => {}
            }
        }
    }

    dependents.dedup_by(|a, b| a.id == b.id);
    (parents.into_iter().next(), dependents)
}

enum Neighbour {
    Parent(IssueSummary),
    Dependent(IssueSummary),
}

fn orient(edge: DependencyEdge, issue_id: &str, plain_is_parent: bool) -> Option<Neighbour> {
    match edge.depends_on_id.as_deref() {
        Some(target) if edge.issue_id == issue_id && target != issue_id => {
            Some(Neighbour::Parent(edge.related))
        }
        Some(target) if target == issue_id && edge.issue_id != issue_id => {
            Some(Neighbour::Dependent(IssueSummary {
                id: edge.issue_id,
                ..edge.related
            }))
        }
        Some(_) => None,
        None if edge.related_id == issue_id => None,
        None if plain_is_parent => Some(Neighbour::Parent(edge.related)),
        None => Some(Neighbour::Dependent(edge.related)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;
    use crate::types::IssueStatus;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 19, 12, 0, 0).unwrap()
    }

    fn active_issue() -> serde_json::Value {
        json!({
            "id": "bd-1",
            "title": "Fix parser",
            "status": "in_progress",
            "issue_type": "task",
            "priority": 2,
            "comments": [
                {"id": 1, "issue_id": "bd-1", "author": "agent", "text": "Started work", "created_at": "2026-02-19T10:00:00Z"}
            ]
        })
    }

    #[tokio::test]
    async fn test_none_when_nothing_in_progress() {
        let runner = ScriptedRunner::new().ok("list --status in_progress", "[]");
        assert!(build_recovery_context_at(&runner.client(), noon()).await.is_none());
    }

    #[tokio::test]
    async fn test_none_when_list_fails() {
        let runner = ScriptedRunner::new().fail("list --status in_progress", "boom");
        assert!(build_recovery_context_at(&runner.client(), noon()).await.is_none());
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_full_context() {
        let issue = active_issue();
        let runner = ScriptedRunner::new()
            .ok("list --status in_progress", json!([issue]).to_string())
            .ok("show bd-1 --json", json!([issue]).to_string())
            .ok("dep list bd-1 --direction up", "[]")
            .ok(
                "dep list bd-1 --direction down",
                json!([{"issue_id": "bd-1", "depends_on_id": "bd-parent", "type": "blocks", "title": "Parent", "status": "open", "priority": 1}]).to_string(),
            )
            .ok("status --porcelain", " M src/parser.rs\n");

        let ctx = build_recovery_context_at(&runner.client(), noon()).await.unwrap();
        assert_eq!(ctx.issue.id, "bd-1");
        assert_eq!(ctx.issue.status, IssueStatus::InProgress);
        assert_eq!(ctx.parent.as_ref().map(|p| p.id.as_str()), Some("bd-parent"));
        assert_eq!(ctx.parent.as_ref().map(|p| p.title.as_str()), Some("Parent"));
        assert!(ctx.unblocks.is_empty());
        assert_eq!(ctx.checkpoint_trail, vec!["- [2h ago] Started work"]);
        assert_eq!(ctx.uncommitted_files, vec!["src/parser.rs (M)"]);
    }

    #[tokio::test]
    async fn test_first_parent_wins() {
        let issue = active_issue();
        let runner = ScriptedRunner::new()
            .ok("list --status in_progress", json!([issue]).to_string())
            .ok("show bd-1 --json", json!([issue]).to_string())
            .ok(
                "dep list bd-1 --direction up",
                json!([
                    {"issue_id": "bd-1", "depends_on_id": "bd-p1", "title": "First"},
                    {"issue_id": "bd-1", "depends_on_id": "bd-p2", "title": "Second"}
                ])
                .to_string(),
            )
            .ok("dep list bd-1 --direction down", "[]")
            .ok("status --porcelain", "");

        let ctx = build_recovery_context_at(&runner.client(), noon()).await.unwrap();
        assert_eq!(ctx.parent.unwrap().id, "bd-p1");
    }

    #[tokio::test]
    async fn test_degrades_when_lookups_fail() {
        let issue = json!({"id": "bd-1", "title": "Test", "status": "in_progress", "issue_type": "task", "priority": 2});
        let runner = ScriptedRunner::new()
            .ok("list --status in_progress", json!([issue]).to_string())
            .fail("show bd-1", "gone")
            .fail("dep list bd-1 --direction up", "")
            .fail("dep list bd-1 --direction down", "")
            .fail("status --porcelain", "not a repo");

        let ctx = build_recovery_context_at(&runner.client(), noon()).await.unwrap();
        assert_eq!(ctx.issue.title, "Test");
        assert!(ctx.parent.is_none());
        assert!(ctx.unblocks.is_empty());
        assert!(ctx.checkpoint_trail.is_empty());
        assert!(ctx.uncommitted_files.is_empty());
    }

    #[tokio::test]
    async fn test_lookups_run_concurrently() {
        let issue = active_issue();
        let runner = ScriptedRunner::new()
            .with_delay(std::time::Duration::from_millis(30))
            .ok("list --status in_progress", json!([issue]).to_string())
            .ok("show bd-1 --json", json!([issue]).to_string())
            .ok("dep list", "[]")
            .ok("status --porcelain", "");

        build_recovery_context_at(&runner.client(), noon()).await.unwrap();
        assert_eq!(runner.peak_in_flight(), 4);
    }

    #[tokio::test]
    async fn test_neighbourhood_orients_edges_by_their_ids() {
        let runner = ScriptedRunner::new()
            .ok(
                "--direction up",
                json!([{"issue_id": "bd-7", "depends_on_id": "bd-1", "type": "blocks", "issue_type": "bug", "title": "Crash on save"}]).to_string(),
            )
            .ok(
                "--direction down",
                json!([{"issue_id": "bd-1", "depends_on_id": "bd-epic", "type": "parent-child", "issue_type": "epic", "title": "Editor"}]).to_string(),
            );

        let (parent, unblocks) = dependency_neighbourhood(&runner.client(), "bd-1", None).await;
        let parent = parent.unwrap();
        assert_eq!(parent.id, "bd-epic");
        assert_eq!(parent.issue_type, "epic");
        assert_eq!(unblocks.len(), 1);
        assert_eq!(unblocks[0].id, "bd-7");
        assert_eq!(unblocks[0].title, "Crash on save");
        assert_eq!(unblocks[0].issue_type, "bug");
    }

    #[tokio::test]
    async fn test_neighbourhood_plain_rows_follow_direction() {
        let runner = ScriptedRunner::new()
            .ok("--direction up", json!([{"id": "bd-epic", "title": "Editor"}]).to_string())
            .ok("--direction down", json!([{"id": "bd-7", "title": "Crash"}]).to_string());

        let (parent, unblocks) = dependency_neighbourhood(&runner.client(), "bd-1", None).await;
        assert_eq!(parent.unwrap().id, "bd-epic");
        assert_eq!(unblocks[0].id, "bd-7");
    }

    #[tokio::test]
    async fn test_neighbourhood_drops_self_references() {
        let runner = ScriptedRunner::new()
            .ok(
                "--direction up",
                json!([{"issue_id": "bd-1", "depends_on_id": "bd-1", "title": "Itself"}]).to_string(),
            )
            .ok(
                "--direction down",
                json!([
                    {"issue_id": "bd-1", "depends_on_id": "bd-1", "title": "Itself"},
                    {"issue_id": "bd-9", "depends_on_id": "bd-1", "title": "Follow-up"}
                ])
                .to_string(),
            );

        let (parent, unblocks) =
            dependency_neighbourhood(&runner.client(), "bd-1", Some(Duration::from_millis(5_000))).await;
        assert!(parent.is_none());
        assert_eq!(unblocks.len(), 1);
        assert_eq!(unblocks[0].id, "bd-9");
        assert!(runner
            .calls()
            .iter()
            .all(|call| call.timeout == Duration::from_millis(5_000)));
    }
}
