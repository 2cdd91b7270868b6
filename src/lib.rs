//! Scenario Engine - concurrent integration test execution
//!
//! Test authors compose executable steps (functions, sequences, HTTP
//! requests) into named scenarios, register them in a [`Repository`] under
//! a group with tags and run the selected scenarios concurrently. Every run
//! of a step is recorded as an [`Execution`] with its timing, error, retry
//! count and correlation id.
//!
//! ## Example
//!
//! ```no_run
//! use scenario_engine::context::ExecutionContext;
//! use scenario_engine::models::Scenario;
//! use scenario_engine::repository::Repository;
//! use scenario_engine::step::{retry, HttpStep};
//!
//! # async fn example() {
//! let step = retry(HttpStep::get("http://{{.Env.host}}/items/{{.Test.id}}"), 2);
//! let scenario = Scenario::new("items", step, || {
//!     let env = [("host".to_string(), "localhost:8080".to_string())].into();
//!     ExecutionContext::with_env(env).populate(10, |n| {
//!         [("id".to_string(), n.to_string())].into()
//!     })
//! });
//!
//! let mut repository = Repository::new();
//! repository.add(scenario, "api", 4, ["smoke"]);
//! repository.run_scenarios("api", "", &[]).await;
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod models;
pub mod output;
pub mod repository;
pub mod step;
pub mod suite;
pub mod utils;

pub use context::{Data, ExecutionContext};
pub use models::{Execution, Scenario, ScenarioReport};
pub use repository::Repository;
pub use step::Step;
