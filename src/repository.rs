//! Scenario repository
//!
//! Holds scenarios registered under a group with tags and a concurrency,
//! selects them by regular expressions and runs them one after another.

use regex::Regex;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::executor::{collect, run_parallel};
use crate::models::{Execution, Scenario, ScenarioReport};

/// A scenario registered in a repository
#[derive(Clone, Debug)]
pub struct Entry {
    pub scenario: Scenario,
    pub group: String,
    pub concurrency: usize,
    pub tags: Vec<String>,
}

impl Entry {
    /// Whether this entry is selected by the given patterns.
    ///
    /// Name and group must match their pattern and every tag pattern must
    /// match at least one tag. A malformed pattern matches nothing.
    pub fn matches(&self, group_pattern: &str, name_pattern: &str, tag_patterns: &[&str]) -> bool {
        is_match(name_pattern, &self.scenario.name)
            && is_match(group_pattern, &self.group)
            && tag_patterns
                .iter()
                .all(|pattern| self.tags.iter().any(|tag| is_match(pattern, tag)))
    }

    async fn run(&self) -> Vec<Execution> {
        let start = Instant::now();
        info!(
            "Running scenario {} ({} workers)",
            self.scenario.name,
            self.concurrency.max(1)
        );

        let stream = run_parallel(
            self.concurrency,
            self.scenario.step.clone(),
            self.scenario.contexts(),
        );
        let executions = collect(stream).await;

        for execution in &executions {
            if execution.error().is_some() {
                warn!("{}", execution);
            } else {
                info!("{}", execution);
            }
        }

        info!(
            "Scenario {} finished in {}ms: {} executions",
            self.scenario.name,
            start.elapsed().as_millis(),
            executions.len()
        );
        executions
    }
}

fn is_match(pattern: &str, text: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            debug!("Ignoring invalid pattern {:?}: {}", pattern, e);
            false
        }
    }
}

/// Executions produced by one entry during a run
#[derive(Debug)]
pub struct RunResult {
    pub entry: Entry,
    pub executions: Vec<Execution>,
}

impl RunResult {
    pub fn error_executions(&self) -> impl Iterator<Item = &Execution> {
        self.executions.iter().filter(|e| e.error().is_some())
    }

    pub fn report(&self) -> ScenarioReport {
        ScenarioReport::new(
            self.entry.scenario.name.clone(),
            self.entry.group.clone(),
            self.entry.tags.clone(),
            &self.executions,
        )
    }
}

/// A set of test groups with scenarios
#[derive(Debug, Default)]
pub struct Repository {
    entries: Vec<Entry>,
    run_results: Option<Vec<RunResult>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scenario` in `group`; names need not be unique
    pub fn add<I, T>(
        &mut self,
        scenario: Scenario,
        group: impl Into<String>,
        concurrency: usize,
        tags: I,
    ) where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.entries.push(Entry {
            scenario,
            group: group.into(),
            concurrency,
            tags: tags.into_iter().map(Into::into).collect(),
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries selected by the patterns, without running them
    pub fn matching<'a>(
        &'a self,
        group_pattern: &'a str,
        name_pattern: &'a str,
        tag_patterns: &'a [&'a str],
    ) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.matches(group_pattern, name_pattern, tag_patterns))
    }

    /// Run every scenario selected by the patterns, one scenario at a time.
    ///
    /// Results replace those of any previous run.
    pub async fn run_scenarios(
        &mut self,
        group_pattern: &str,
        name_pattern: &str,
        tag_patterns: &[&str],
    ) {
        let mut results = Vec::new();

        for entry in &self.entries {
            if !entry.matches(group_pattern, name_pattern, tag_patterns) {
                continue;
            }
            let executions = entry.run().await;
            results.push(RunResult {
                entry: entry.clone(),
                executions,
            });
        }

        info!(
            "Ran {} of {} scenarios (group={:?}, name={:?}, tags={:?})",
            results.len(),
            self.entries.len(),
            group_pattern,
            name_pattern,
            tag_patterns
        );
        self.run_results = Some(results);
    }

    /// Results of the last run, `None` before the first run
    pub fn run_results(&self) -> Option<&[RunResult]> {
        self.run_results.as_deref()
    }

    /// Failed executions of the last run in entry order, `None` before the
    /// first run
    pub fn error_executions(&self) -> Option<Vec<&Execution>> {
        self.run_results.as_ref().map(|results| {
            results
                .iter()
                .flat_map(RunResult::error_executions)
                .collect()
        })
    }

    /// Per scenario reports of the last run
    pub fn reports(&self) -> Vec<ScenarioReport> {
        self.run_results
            .iter()
            .flatten()
            .map(RunResult::report)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ExecutionContext;
    use crate::executor::context_stream;
    use crate::step::func;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    fn single_context() -> crate::context::ContextStream {
        context_stream([ExecutionContext::new()])
    }

    fn recording_scenario(log: &Log, name: &str) -> Scenario {
        let log = log.clone();
        let recorded = name.to_string();
        Scenario::new(
            name,
            func(name, move || {
                log.lock().unwrap().push(recorded.clone());
                Ok(())
            }),
            single_context,
        )
    }

    fn failing_scenario(name: &str) -> Scenario {
        let message = format!("Wanted error on {name:?}");
        Scenario::new(
            name,
            func(name, move || Err(anyhow::anyhow!(message.clone()))),
            single_context,
        )
    }

    fn repository(log: &Log) -> Repository {
        let mut repo = Repository::new();
        repo.add(recording_scenario(log, "spec11"), "group1", 1, ["foo", "bar"]);
        repo.add(recording_scenario(log, "spec12"), "group1", 1, ["foo", "bazz"]);
        repo.add(recording_scenario(log, "spec21"), "group2", 1, Vec::<String>::new());
        repo
    }

    async fn run(
        repo: &mut Repository,
        log: &Log,
        group: &str,
        name: &str,
        tags: &[&str],
    ) -> Vec<String> {
        log.lock().unwrap().clear();
        repo.run_scenarios(group, name, tags).await;
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_repository_filters() {
        let log = Log::default();
        let mut repo = repository(&log);

        assert_eq!(run(&mut repo, &log, "group1", "", &[]).await, ["spec11", "spec12"]);
        assert_eq!(run(&mut repo, &log, "", "", &[]).await, ["spec11", "spec12", "spec21"]);
        assert_eq!(run(&mut repo, &log, "", "spec12", &[]).await, ["spec12"]);
        assert_eq!(run(&mut repo, &log, "", "spec.1", &[]).await, ["spec11", "spec21"]);
        assert!(run(&mut repo, &log, "", "Spec21", &[]).await.is_empty());
        assert_eq!(run(&mut repo, &log, "", "", &["foo"]).await, ["spec11", "spec12"]);
        assert_eq!(run(&mut repo, &log, "", "", &["bazz"]).await, ["spec12"]);
    }

    #[tokio::test]
    async fn test_every_tag_pattern_must_match() {
        let log = Log::default();
        let mut repo = repository(&log);

        assert_eq!(run(&mut repo, &log, "", "", &["foo", "ba.*"]).await, ["spec11", "spec12"]);
        assert_eq!(run(&mut repo, &log, "", "", &["foo", "bar"]).await, ["spec11"]);
        assert!(run(&mut repo, &log, "", "", &["bar", "bazz"]).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_pattern_matches_nothing() {
        let log = Log::default();
        let mut repo = repository(&log);

        assert!(run(&mut repo, &log, "(", "", &[]).await.is_empty());
        assert!(run(&mut repo, &log, "", "", &["[foo"]).await.is_empty());
        assert_eq!(repo.error_executions().map(|e| e.len()), Some(0));
    }

    #[tokio::test]
    async fn test_unmatched_factories_not_invoked() {
        let invoked = Arc::new(Mutex::new(0));
        let counter = invoked.clone();
        let mut repo = Repository::new();
        repo.add(
            Scenario::new("counted", func("counted", || Ok(())), move || {
                *counter.lock().unwrap() += 1;
                single_context()
            }),
            "g",
            1,
            ["t"],
        );

        repo.run_scenarios("other", "", &[]).await;
        assert_eq!(*invoked.lock().unwrap(), 0);

        repo.run_scenarios("g", "", &[]).await;
        repo.run_scenarios("g", "", &[]).await;
        assert_eq!(*invoked.lock().unwrap(), 2);
    }

    #[test]
    fn test_error_executions_nil() {
        let repo = Repository::new();
        assert!(repo.error_executions().is_none());
        assert!(repo.run_results().is_none());
        assert!(repo.reports().is_empty());
    }

    #[tokio::test]
    async fn test_error_executions_empty() {
        let log = Log::default();
        let mut repo = Repository::new();
        repo.add(recording_scenario(&log, ""), "groupppp", 0, Vec::<String>::new());
        repo.run_scenarios("groupppp", "", &[]).await;

        assert_eq!(repo.error_executions().unwrap().len(), 0);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_executions_not_empty() {
        let log = Log::default();
        let mut repo = Repository::new();
        repo.add(failing_scenario("first"), "ggggroup", 0, ["x"]);
        repo.add(recording_scenario(&log, "ok"), "ggggroup", 1, ["x"]);
        repo.add(failing_scenario("second"), "ggggroup", 2, ["x"]);
        repo.run_scenarios("ggggroup", "", &[]).await;

        let errors = repo.error_executions().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].description(), "first");
        assert_eq!(errors[1].description(), "second");
        assert!(errors[0]
            .error()
            .unwrap()
            .to_string()
            .contains("Wanted error on \"first\""));

        let reports = repo.reports();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].failed, 1);
        assert!(reports[1].is_all_passed());
    }

    #[tokio::test]
    async fn test_results_replaced_per_run() {
        let mut repo = Repository::new();
        repo.add(failing_scenario("broken"), "bad", 1, ["x"]);
        let log = Log::default();
        repo.add(recording_scenario(&log, "fine"), "good", 1, ["x"]);

        repo.run_scenarios("bad", "", &[]).await;
        assert_eq!(repo.error_executions().unwrap().len(), 1);

        repo.run_scenarios("good", "", &[]).await;
        assert!(repo.error_executions().unwrap().is_empty());
        assert_eq!(repo.run_results().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_matching_does_not_run() {
        let log = Log::default();
        let repo = repository(&log);

        let names: Vec<&str> = repo
            .matching("", "spec1", &["foo"])
            .map(|e| e.scenario.name.as_str())
            .collect();
        assert_eq!(names, ["spec11", "spec12"]);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_with_populated_contexts() {
        let mut repo = Repository::new();
        repo.add(
            Scenario::new("populated", func("n={{.Test.n}}", || Ok(())), || {
                ExecutionContext::new().populate(5, |i| {
                    [("n".to_string(), i.to_string())].into_iter().collect()
                })
            }),
            "load",
            3,
            ["perf"],
        );

        repo.run_scenarios("", "", &["perf"]).await;
        let results = repo.run_results().unwrap();
        assert_eq!(results[0].executions.len(), 5);
        assert_eq!(repo.reports()[0].passed, 5);
    }
}
