//! Suite files
//!
//! A suite file declares HTTP scenarios in YAML or JSON. Loading one yields
//! a [`Repository`] whose scenarios are built from [`HttpStep`]s.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::AppConfig;
use crate::context::{Data, ExecutionContext};
use crate::http::HttpClient;
use crate::models::Scenario;
use crate::repository::Repository;
use crate::step::{seq, HttpStep, Retry, Step};

/// Placeholder in scenario data replaced by the iteration number
pub const TEST_NUMBER_PLACEHOLDER: &str = "{{testNumber}}";

/// Test data key always holding the iteration number
pub const TEST_NUMBER_KEY: &str = "testNumber";

/// Root of a suite file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteFile {
    /// Data available to every scenario as `.Env`
    #[serde(default)]
    pub env: HashMap<String, String>,

    pub scenarios: Vec<ScenarioDef>,
}

/// One declared scenario
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub name: String,

    #[serde(default)]
    pub group: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Workers, defaults to the configured concurrency
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Number of contexts to run the steps against
    #[serde(default = "default_iterations")]
    pub iterations: u64,

    /// Retries per run, defaults to the configured retries
    #[serde(default)]
    pub retries: Option<u32>,

    /// Delay between attempts, defaults to the configured backoff
    #[serde(default)]
    pub backoff_ms: Option<u64>,

    /// Per-iteration test data available as `.Test`
    #[serde(default)]
    pub data: BTreeMap<String, String>,

    pub steps: Vec<StepDef>,
}

fn default_iterations() -> u64 {
    1
}

/// One declared HTTP request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    #[serde(default = "default_method")]
    pub method: String,

    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub basic_auth: Option<BasicAuthDef>,

    #[serde(default)]
    pub expect: ExpectDef,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicAuthDef {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Response checks of a step; without `status` or `status_range` the
/// response must be `200`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectDef {
    #[serde(default)]
    pub status: Option<u16>,

    /// Inclusive `[min, max]`
    #[serde(default)]
    pub status_range: Option<(u16, u16)>,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub contains: Vec<String>,
}

impl SuiteFile {
    /// Load a suite from file (YAML or JSON by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        let suite: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML suite: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON suite: {}", path.display()))?
        };

        suite
            .validate()
            .with_context(|| format!("Invalid suite: {}", path.display()))?;
        debug!(
            "Loaded {} scenarios from {}",
            suite.scenarios.len(),
            path.display()
        );
        Ok(suite)
    }

    /// Validate the suite
    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            anyhow::bail!("Suite declares no scenarios");
        }
        for scenario in &self.scenarios {
            scenario.validate()?;
        }
        Ok(())
    }

    /// Build a repository holding every declared scenario.
    ///
    /// Env data is merged from `config`, the suite and `extra_env`, later
    /// sources winning. All HTTP steps share one client.
    pub fn into_repository(self, config: &AppConfig, extra_env: Data) -> Result<Repository> {
        let mut env = config.env.clone();
        env.extend(self.env);
        env.extend(extra_env);
        let env = Arc::new(env);

        let client = HttpClient::with_timeout(config.timeout_secs)?;
        let mut repository = Repository::new();

        for def in self.scenarios {
            let concurrency = def.concurrency.unwrap_or(config.concurrency);
            let group = def.group.clone();
            let tags = def.tags.clone();
            let scenario = def.into_scenario(config, &client, Arc::clone(&env));
            repository.add(scenario, group, concurrency, tags);
        }

        Ok(repository)
    }
}

impl ScenarioDef {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Scenario without a name");
        }
        if self.steps.is_empty() {
            anyhow::bail!("Scenario '{}' has no steps", self.name);
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.validate()
                .with_context(|| format!("Scenario '{}', step {}", self.name, index + 1))?;
        }
        Ok(())
    }

    fn into_scenario(self, config: &AppConfig, client: &HttpClient, env: Arc<Data>) -> Scenario {
        let mut steps: Vec<Arc<dyn Step>> = self
            .steps
            .into_iter()
            .map(|def| Arc::new(def.into_step(client.clone())) as Arc<dyn Step>)
            .collect();

        let mut step: Arc<dyn Step> = if steps.len() == 1 {
            steps.remove(0)
        } else {
            Arc::new(seq(self.name.clone(), steps))
        };

        let retries = self.retries.unwrap_or(config.max_retries);
        if retries > 0 {
            let backoff = self
                .backoff_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or_else(|| config.retry_backoff());
            step = Arc::new(Retry::new(step, retries).with_backoff(backoff));
        }

        let iterations = self.iterations;
        let data = self.data;
        Scenario {
            name: self.name,
            step,
            context_factory: Arc::new(move || {
                let data = data.clone();
                ExecutionContext::with_env((*env).clone())
                    .populate(iterations, move |number| iteration_data(&data, number))
            }),
        }
    }
}

impl StepDef {
    fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            anyhow::bail!("Step without a url");
        }
        if self.method.is_empty() || !self.method.chars().all(|c| c.is_ascii_alphabetic()) {
            anyhow::bail!("Invalid HTTP method: {:?}", self.method);
        }
        if self.expect.status.is_some() && self.expect.status_range.is_some() {
            anyhow::bail!("Only one of status and status_range may be set");
        }
        if let Some((min, max)) = self.expect.status_range {
            if min > max {
                anyhow::bail!("Invalid status range [{}, {}]", min, max);
            }
        }
        Ok(())
    }

    fn into_step(self, client: HttpClient) -> HttpStep {
        let mut step = HttpStep::new(self.method, self.url).with_client(client);

        for (name, value) in self.headers {
            step = step.with_header(name, value);
        }
        if let Some(body) = self.body {
            step = step.with_body(body);
        }
        if let Some(auth) = self.basic_auth {
            step = step.with_basic_auth(auth.username, auth.password);
        }

        if let Some(code) = self.expect.status {
            step = step.has_code(code);
        }
        if let Some((min, max)) = self.expect.status_range {
            step = step.has_code_range(min, max);
        }
        if let Some(content_type) = self.expect.content_type {
            step = step.has_content_type(content_type);
        }
        for text in self.expect.contains {
            step = step.contains(text);
        }
        step
    }
}

/// Test data of iteration `number`
fn iteration_data(data: &BTreeMap<String, String>, number: u64) -> Data {
    let number = number.to_string();
    let mut test: Data = data
        .iter()
        .map(|(key, value)| (key.clone(), value.replace(TEST_NUMBER_PLACEHOLDER, &number)))
        .collect();
    test.insert(TEST_NUMBER_KEY.to_string(), number);
    test
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_server::{Reply, TestServer};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SUITE: &str = r#"
env:
  host: example.com
scenarios:
  - name: homepage
    group: smoke
    tags: [web, fast]
    concurrency: 2
    iterations: 3
    steps:
      - url: "http://{{.Env.host}}/"
  - name: checkout
    group: shop
    retries: 2
    backoff_ms: 0
    data:
      id: "item-{{testNumber}}"
    steps:
      - method: post
        url: "http://{{.Env.host}}/cart"
        headers: { Content-Type: application/json }
        body: '{"id": "{{.Test.id}}"}'
        expect:
          status_range: [200, 299]
      - url: "http://{{.Env.host}}/cart/{{.Test.id}}"
        basic_auth: { username: user, password: secret }
        expect:
          content_type: application/json
          contains: ["item-"]
"#;

    fn write_suite(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config() -> AppConfig {
        AppConfig {
            concurrency: 5,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_load_yaml_suite() {
        let dir = TempDir::new().unwrap();
        let suite = SuiteFile::load(write_suite(&dir, "suite.yaml", SUITE)).unwrap();

        assert_eq!(suite.env["host"], "example.com");
        assert_eq!(suite.scenarios.len(), 2);

        let homepage = &suite.scenarios[0];
        assert_eq!(homepage.iterations, 3);
        assert_eq!(homepage.steps[0].method, "GET");
        assert_eq!(homepage.steps[0].expect, ExpectDef::default());

        let checkout = &suite.scenarios[1];
        assert_eq!(checkout.iterations, 1);
        assert_eq!(checkout.steps[0].expect.status_range, Some((200, 299)));
        assert_eq!(
            checkout.steps[1].basic_auth.as_ref().map(|a| a.username.as_str()),
            Some("user")
        );
    }

    #[test]
    fn test_load_json_suite() {
        let dir = TempDir::new().unwrap();
        let path = write_suite(
            &dir,
            "suite.json",
            r#"{"scenarios": [{"name": "ping", "steps": [{"url": "http://localhost/ping", "expect": {"status": 204}}]}]}"#,
        );
        let suite = SuiteFile::load(path).unwrap();
        assert_eq!(suite.scenarios[0].steps[0].expect.status, Some(204));
        assert!(suite.scenarios[0].group.is_empty());
    }

    #[test]
    fn test_invalid_suites_rejected() {
        let dir = TempDir::new().unwrap();
        let cases = [
            ("scenarios: []\n", "no scenarios"),
            ("scenarios:\n  - name: a\n    steps: []\n", "has no steps"),
            (
                "scenarios:\n  - name: a\n    steps:\n      - url: http://x/\n        method: \"G T\"\n",
                "Invalid HTTP method",
            ),
            (
                "scenarios:\n  - name: a\n    steps:\n      - url: http://x/\n        expect: { status: 200, status_range: [200, 299] }\n",
                "Only one of status",
            ),
            (
                "scenarios:\n  - name: a\n    steps:\n      - url: http://x/\n        expect: { status_range: [400, 200] }\n",
                "Invalid status range",
            ),
        ];

        for (content, expected) in cases {
            let path = write_suite(&dir, "bad.yaml", content);
            let err = SuiteFile::load(path).unwrap_err();
            assert!(
                format!("{err:#}").contains(expected),
                "expected {expected:?}, got {err:#}"
            );
        }
    }

    #[test]
    fn test_iteration_data() {
        let data: BTreeMap<String, String> =
            [("id".to_string(), "item-{{testNumber}}".to_string())].into();
        let test = iteration_data(&data, 7);
        assert_eq!(test["id"], "item-7");
        assert_eq!(test[TEST_NUMBER_KEY], "7");
    }

    #[tokio::test]
    async fn test_into_repository_entries() {
        let suite: SuiteFile = serde_yaml::from_str(SUITE).unwrap();
        let repo = suite.into_repository(&config(), Data::new()).unwrap();

        let entries = repo.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].group, "smoke");
        assert_eq!(entries[0].tags, ["web", "fast"]);
        assert_eq!(entries[0].concurrency, 2);
        assert_eq!(entries[1].concurrency, 5);

        let ctx = ExecutionContext::with_env(Data::new()).derive(Data::new());
        assert_eq!(entries[1].scenario.step.describe(&ctx), "checkout");
    }

    #[tokio::test]
    async fn test_suite_runs_against_server() {
        let paths = Arc::new(Mutex::new(Vec::new()));
        let recorded = paths.clone();
        let server = TestServer::spawn(move |req| {
            recorded.lock().unwrap().push(req.path.clone());
            Reply::new(200, "application/json", format!("{{\"path\": \"{}\"}}", req.path))
        })
        .await;

        let suite: SuiteFile = serde_yaml::from_str(
            r#"
scenarios:
  - name: items
    group: api
    concurrency: 2
    iterations: 4
    data: { id: "item-{{testNumber}}" }
    steps:
      - url: "{{.Env.base}}/items/{{.Test.id}}"
        expect:
          content_type: application/json
          contains: ["/items/item-"]
"#,
        )
        .unwrap();

        let extra: Data = [("base".to_string(), server.url().to_string())].into();
        let mut repo = suite.into_repository(&config(), extra).unwrap();
        repo.run_scenarios("api", "", &[]).await;

        let reports = repo.reports();
        assert_eq!(reports[0].total, 4);
        assert!(reports[0].is_all_passed(), "{:?}", reports[0].failures);

        let mut paths = paths.lock().unwrap().clone();
        paths.sort();
        assert_eq!(
            paths,
            ["/items/item-1", "/items/item-2", "/items/item-3", "/items/item-4"]
        );
    }

    #[tokio::test]
    async fn test_suite_retries_failing_step() {
        let server = TestServer::spawn(|_| Reply::new(503, "text/plain", "busy")).await;

        let suite: SuiteFile = serde_yaml::from_str(
            r#"
env:
  base: unset
scenarios:
  - name: flaky
    retries: 2
    backoff_ms: 0
    steps:
      - url: "{{.Env.base}}/"
"#,
        )
        .unwrap();

        let extra: Data = [("base".to_string(), server.url().to_string())].into();
        let mut repo = suite.into_repository(&config(), extra).unwrap();
        repo.run_scenarios("", "flaky", &[]).await;

        let errors = repo.error_executions().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].retries(), 2);
        assert!(errors[0]
            .error()
            .unwrap()
            .to_string()
            .contains("response code was 503"));
    }
}
