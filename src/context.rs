//! Execution context
//!
//! The data carrier handed to every step run. A context is never changed
//! once it has been given to a step; new iterations and retries get a
//! derived copy instead.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use handlebars::Handlebars;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::TemplateError;

/// Alphabet used for correlation ids
const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of the correlation id assigned on every derivation
pub const CORRELATION_ID_LEN: i32 = 10;

/// Stream of contexts consumed by the executor
pub type ContextStream = mpsc::Receiver<ExecutionContext>;

/// Test data mapping (both `Env` and `Test`)
pub type Data = HashMap<String, String>;

static TEMPLATES: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
});

// `{{.Env.host}}` and `{{ .Test.id }}` become plain handlebars paths.
static LEADING_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(~?\s*)\.").expect("valid leading dot pattern"));

// `{{- x -}}` trim markers become handlebars `{{~ x ~}}`.
static TRIM_LEFT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{-(\s)").expect("valid left trim pattern"));
static TRIM_RIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\s)-\}\}").expect("valid right trim pattern"));

/// Rewrite dotted field references and trim markers into handlebars syntax
fn to_handlebars(template: &str) -> String {
    let template = TRIM_LEFT.replace_all(template, "{{~${1}");
    let template = TRIM_RIGHT.replace_all(&template, "${1}~}}");
    LEADING_DOT.replace_all(&template, "{{${1}").into_owned()
}

/// Random alphanumeric string of length `n`; empty when `n < 1`
pub fn random_string<R: Rng>(rng: &mut R, n: i32) -> String {
    if n < 1 {
        return String::new();
    }
    (0..n)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Source of correlation ids
///
/// Shared by a root context and everything derived from it. Tests can use
/// [`IdGenerator::seeded`] to get a reproducible id sequence.
#[derive(Clone)]
pub struct IdGenerator {
    rng: Arc<Mutex<StdRng>>,
}

impl IdGenerator {
    /// Generator seeded from the operating system
    pub fn from_entropy() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    /// Generate the next id of length `len`
    pub fn next_id(&self, len: i32) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        random_string(&mut *rng, len)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdGenerator")
    }
}

#[derive(Serialize)]
struct TemplateData<'a> {
    #[serde(rename = "Env")]
    env: &'a Data,
    #[serde(rename = "Test")]
    test: &'a Data,
}

/// Immutable per-step data carrier
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    test: Data,
    env: Arc<Data>,
    test_number: u64,
    correlation_id: String,
    retries: u32,
    ids: IdGenerator,
}

impl ExecutionContext {
    /// Create a root context without data
    pub fn new() -> Self {
        Self::with_env(Data::new())
    }

    /// Create a root context with environment data
    pub fn with_env(env: Data) -> Self {
        Self {
            test: Data::new(),
            env: Arc::new(env),
            test_number: 0,
            correlation_id: String::new(),
            retries: 0,
            ids: IdGenerator::default(),
        }
    }

    /// Replace the correlation id source
    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Seed the test data of a root context
    pub fn with_test(mut self, test: Data) -> Self {
        self.test = test;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn set_retries(&mut self, retries: u32) {
        self.retries = retries;
    }

    /// Number of the current test iteration
    pub fn test_number(&self) -> u64 {
        self.test_number
    }

    /// Data for a single test iteration
    pub fn test(&self) -> &Data {
        &self.test
    }

    /// Environment data common to all iterations
    pub fn env(&self) -> &Data {
        &self.env
    }

    /// Id to be passed along the service chain
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Copy of this context with `overrides` applied to the test data,
    /// the test number incremented and a fresh correlation id
    pub fn derive(&self, overrides: Data) -> ExecutionContext {
        let mut test = self.test.clone();
        test.extend(overrides);

        ExecutionContext {
            test,
            env: Arc::clone(&self.env),
            test_number: self.test_number + 1,
            correlation_id: self.ids.next_id(CORRELATION_ID_LEN),
            retries: self.retries,
            ids: self.ids.clone(),
        }
    }

    /// Render `template` with `Env` and `Test` as data
    pub fn expand_vars(&self, template: &str) -> Result<String, TemplateError> {
        let template = to_handlebars(template);

        handlebars::Template::compile(&template)
            .map_err(|e| TemplateError::Parse(e.to_string()))?;

        let data = TemplateData {
            env: &self.env,
            test: &self.test,
        };
        TEMPLATES
            .render_template(&template, &data)
            .map_err(|e| TemplateError::Render(e.to_string()))
    }

    /// Same as [`expand_vars`](Self::expand_vars), but falls back to the
    /// template text itself on any error
    pub fn expand_vars_no_error(&self, template: &str) -> String {
        self.expand_vars(template)
            .unwrap_or_else(|_| template.to_string())
    }

    /// Produce contexts for the test numbers `test_number() + 1 ..= count`
    ///
    /// Each context is derived from the previous one with the data returned
    /// by `data_fn`. Production runs in a spawned task; the stream is closed
    /// after the last context. Must be called within a tokio runtime.
    pub fn populate<F>(&self, count: u64, mut data_fn: F) -> ContextStream
    where
        F: FnMut(u64) -> Data + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        let first = self.test_number + 1;
        let mut current = self.clone();

        tokio::spawn(async move {
            for number in first..=count {
                current = current.derive(data_fn(number));
                if tx.send(current.clone()).await.is_err() {
                    debug!("Context consumer dropped at test {}", number);
                    break;
                }
            }
        });

        rx
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}
