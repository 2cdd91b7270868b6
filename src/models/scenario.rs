//! Scenario definitions

use std::fmt;
use std::sync::Arc;

use crate::context::ContextStream;
use crate::step::Step;

/// Factory producing a fresh context stream for one scenario run
pub type ContextFactory = Arc<dyn Fn() -> ContextStream + Send + Sync>;

/// A named step paired with the contexts it runs against
#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub step: Arc<dyn Step>,
    pub context_factory: ContextFactory,
}

impl Scenario {
    pub fn new<S, F>(name: impl Into<String>, step: S, context_factory: F) -> Self
    where
        S: Step + 'static,
        F: Fn() -> ContextStream + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            step: Arc::new(step),
            context_factory: Arc::new(context_factory),
        }
    }

    /// Produce the contexts for one run
    pub fn contexts(&self) -> ContextStream {
        (self.context_factory)()
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
