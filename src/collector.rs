//! Sequential sampling of metrics across the requested dates.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::git::{Vcs, Workspace};
use crate::stats::{parse_languages, LanguageMetrics, StatsTool, SCC_ALIASES};

/// Metrics per sample date (`YYYY-MM-DD`), in sampling order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsTable {
    rows: IndexMap<String, LanguageMetrics>,
}

impl MetricsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `date`, keeping its original position
    pub fn insert(&mut self, date: NaiveDate, languages: LanguageMetrics) {
        self.rows
            .insert(date.format("%Y-%m-%d").to_string(), languages);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Entries sorted by date ascending
    pub fn sorted(&self) -> Vec<(&String, &LanguageMetrics)> {
        let mut rows: Vec<_> = self.rows.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    /// Every language seen on any date, sorted lexicographically
    pub fn languages(&self) -> Vec<&str> {
        let languages: BTreeSet<&str> = self
            .rows
            .values()
            .flat_map(|per_lang| per_lang.keys().map(String::as_str))
            .collect();
        languages.into_iter().collect()
    }
}

/// Probe the statistics tool, then clone `url` into a fresh workspace.
///
/// Nothing is created or cloned when the tool is unavailable. `on_created`
/// runs once the workspace directory exists, before the clone starts.
pub fn prepare_workspace(
    vcs: &dyn Vcs,
    stats: &dyn StatsTool,
    url: &str,
    on_created: impl FnOnce(&Workspace) -> Result<()>,
) -> Result<Workspace> {
    let version = stats.check_available()?;
    info!("Using {}", version);

    let workspace = Workspace::create()?;
    on_created(&workspace)?;

    info!("Cloning {} into {}...", url, workspace.path().display());
    vcs.clone_repo(url, &workspace)?;

    Ok(workspace)
}

/// Sample every date in order: resolve the commit, check it out, run the
/// statistics tool and record its per-language output.
///
/// Dates without a commit, failed tool runs and unparsable payloads leave no
/// entry. A failed checkout aborts the whole run.
pub fn collect(
    vcs: &dyn Vcs,
    stats: &dyn StatsTool,
    workspace: &Workspace,
    dates: &[NaiveDate],
    branch: &str,
    debug: bool,
) -> Result<MetricsTable> {
    let pb = if debug {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(dates.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut table = MetricsTable::new();

    for date in dates {
        let ds = date.format("%Y-%m-%d").to_string();
        pb.set_message(format!("Sampling {}...", ds));
        pb.inc(1);

        let Some(commit) = vcs.commit_before(workspace, branch, *date)? else {
            debug!("No commit on {} at or before {}, skipping", branch, ds);
            continue;
        };

        vcs.checkout(workspace, &commit)?;
        if debug {
            info!("=== {} commit {} ===", ds, commit);
        }

        let raw = match stats.run(workspace) {
            Ok(raw) => raw,
            Err(e) => {
                pb.suspend(|| warn!("Error running scc at {}: {}", ds, e));
                continue;
            }
        };
        if debug {
            info!("{}", raw);
        }

        match parse_languages(&raw, &SCC_ALIASES) {
            Ok(languages) => table.insert(*date, languages),
            Err(e) => pb.suspend(|| warn!("Error parsing scc JSON at {}: {}", ds, e)),
        }
    }

    pb.finish_with_message("Sampling complete");
    info!("Collected metrics for {} of {} dates", table.len(), dates.len());

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;
    use crate::stats::LanguageMetric;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// Commits keyed by as-of date; unknown dates have no commit
    #[derive(Default)]
    struct FakeVcs {
        commits: HashMap<NaiveDate, String>,
        failing_checkout: Option<String>,
        checkouts: RefCell<Vec<String>>,
        clones: RefCell<Vec<String>>,
    }

    impl Vcs for FakeVcs {
        fn clone_repo(&self, url: &str, _workspace: &Workspace) -> Result<()> {
            self.clones.borrow_mut().push(url.to_string());
            Ok(())
        }

        fn checkout(&self, _workspace: &Workspace, rev: &str) -> Result<()> {
            if self.failing_checkout.as_deref() == Some(rev) {
                return Err(MetricsError::Command("checkout failed".to_string()));
            }
            self.checkouts.borrow_mut().push(rev.to_string());
            Ok(())
        }

        fn resolve_branch(&self, _workspace: &Workspace, branch: &str) -> Result<String> {
            Ok(branch.to_string())
        }

        fn commit_date_range(
            &self,
            _workspace: &Workspace,
            _branch: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate)>> {
            Ok(None)
        }

        fn commit_before(
            &self,
            _workspace: &Workspace,
            _branch: &str,
            as_of: NaiveDate,
        ) -> Result<Option<String>> {
            Ok(self.commits.get(&as_of).cloned())
        }
    }

    /// Hands out queued payloads, one per run
    struct FakeStats {
        available: bool,
        payloads: RefCell<VecDeque<Result<String>>>,
    }

    impl FakeStats {
        fn new(payloads: Vec<Result<String>>) -> Self {
            FakeStats {
                available: true,
                payloads: RefCell::new(payloads.into()),
            }
        }

        fn missing() -> Self {
            FakeStats {
                available: false,
                ..FakeStats::new(vec![])
            }
        }
    }

    impl StatsTool for FakeStats {
        fn check_available(&self) -> Result<String> {
            if self.available {
                Ok("scc version 3.3.0".to_string())
            } else {
                Err(MetricsError::StatsUnavailable("not found".to_string()))
            }
        }

        fn run(&self, _workspace: &Workspace) -> Result<String> {
            self.payloads
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(MetricsError::Command("unexpected scc run".to_string())))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vcs_with(commits: &[(NaiveDate, &str)]) -> FakeVcs {
        FakeVcs {
            commits: commits
                .iter()
                .map(|(d, c)| (*d, c.to_string()))
                .collect(),
            ..FakeVcs::default()
        }
    }

    #[test]
    fn test_missing_stats_tool_stops_before_clone() {
        let vcs = FakeVcs::default();
        let mut workspace_created = false;

        let result = prepare_workspace(&vcs, &FakeStats::missing(), "repo.git", |_| {
            workspace_created = true;
            Ok(())
        });

        assert!(matches!(result, Err(MetricsError::StatsUnavailable(_))));
        assert!(!workspace_created);
        assert!(vcs.clones.borrow().is_empty());
    }

    #[test]
    fn test_prepare_workspace_clones_after_probe() {
        let vcs = FakeVcs::default();
        let mut created = None;

        let workspace = prepare_workspace(&vcs, &FakeStats::new(vec![]), "repo.git", |ws| {
            created = Some(ws.path().to_path_buf());
            Ok(())
        })
        .unwrap();

        assert_eq!(created.as_deref(), Some(workspace.path()));
        assert_eq!(*vcs.clones.borrow(), vec!["repo.git".to_string()]);
    }

    #[test]
    fn test_collect_parses_json() {
        let workspace = Workspace::create().unwrap();
        let vcs = vcs_with(&[(date(2024, 1, 1), "deadbeef")]);
        let stats = FakeStats::new(vec![Ok(
            r#"[{"Name": "Python", "Lines": 10, "Complexity": 2}]"#.to_string(),
        )]);

        let table = collect(&vcs, &stats, &workspace, &[date(2024, 1, 1)], "main", false).unwrap();

        assert_eq!(
            serde_json::to_value(&table).unwrap(),
            serde_json::json!({"2024-01-01": {"Python": {"lines": 10, "complexity": 2}}})
        );
        assert_eq!(*vcs.checkouts.borrow(), vec!["deadbeef".to_string()]);
    }

    #[test]
    fn test_dates_without_commit_are_omitted() {
        let workspace = Workspace::create().unwrap();
        let vcs = vcs_with(&[(date(2024, 3, 1), "c0ffee")]);
        let stats = FakeStats::new(vec![Ok(r#"[{"Name": "Rust", "Code": 5}]"#.to_string())]);

        let dates = [date(2024, 2, 1), date(2024, 3, 1)];
        let table = collect(&vcs, &stats, &workspace, &dates, "main", false).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.rows.get("2024-02-01").is_none());
        assert!(table.rows.get("2024-03-01").is_some());
        assert_eq!(*vcs.checkouts.borrow(), vec!["c0ffee".to_string()]);
    }

    #[test]
    fn test_name_without_numbers_is_recorded_as_absent() {
        let workspace = Workspace::create().unwrap();
        let vcs = vcs_with(&[(date(2024, 1, 1), "abc")]);
        let stats = FakeStats::new(vec![Ok(r#"[{"Name": "Text", "Files": 2}]"#.to_string())]);

        let table = collect(&vcs, &stats, &workspace, &[date(2024, 1, 1)], "main", false).unwrap();

        assert_eq!(
            table.rows.get("2024-01-01").unwrap()["Text"],
            LanguageMetric {
                lines: None,
                complexity: None
            }
        );
    }

    #[test]
    fn test_bad_payload_and_failed_run_skip_only_that_date() {
        let workspace = Workspace::create().unwrap();
        let vcs = vcs_with(&[
            (date(2024, 1, 1), "a"),
            (date(2024, 1, 2), "b"),
            (date(2024, 1, 3), "c"),
        ]);
        let stats = FakeStats::new(vec![
            Ok("this is not json".to_string()),
            Err(MetricsError::Command("scc crashed".to_string())),
            Ok(r#"[{"Name": "Go", "Code": 1, "Complexity": 0}]"#.to_string()),
        ]);

        let dates = [date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)];
        let table = collect(&vcs, &stats, &workspace, &dates, "main", false).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows.get("2024-01-03").unwrap()["Go"].complexity, Some(0));
    }

    #[test]
    fn test_failed_checkout_aborts() {
        let workspace = Workspace::create().unwrap();
        let vcs = FakeVcs {
            failing_checkout: Some("bad".to_string()),
            ..vcs_with(&[(date(2024, 1, 1), "bad")])
        };
        let stats = FakeStats::new(vec![]);

        let result = collect(&vcs, &stats, &workspace, &[date(2024, 1, 1)], "main", false);
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_does_not_change_table() {
        let payload = r#"[{"Name": "C", "Code": 3, "Complexity": 1}]"#;
        let dates = [date(2024, 1, 1)];
        let run = |debug| {
            let workspace = Workspace::create().unwrap();
            let vcs = vcs_with(&[(date(2024, 1, 1), "x")]);
            let stats = FakeStats::new(vec![Ok(payload.to_string())]);
            collect(&vcs, &stats, &workspace, &dates, "main", debug).unwrap()
        };
        assert_eq!(run(true), run(false));
    }

    #[test]
    fn test_table_keeps_insertion_order_and_sorts_on_demand() {
        let mut table = MetricsTable::new();
        let go = LanguageMetrics::from([("Go".to_string(), LanguageMetric::default())]);
        let rust = LanguageMetrics::from([("Rust".to_string(), LanguageMetric::default())]);
        table.insert(date(2024, 5, 1), rust);
        table.insert(date(2024, 1, 1), go.clone());
        table.insert(date(2024, 5, 1), go);

        let order: Vec<_> = table.rows.iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(order, vec!["2024-05-01", "2024-01-01"]);
        let sorted: Vec<_> = table.sorted().into_iter().map(|(d, _)| d.as_str()).collect();
        assert_eq!(sorted, vec!["2024-01-01", "2024-05-01"]);
        assert_eq!(table.languages(), vec!["Go"]);
    }
}
