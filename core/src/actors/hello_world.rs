//! `HelloWorld`: greets once per iteration

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::actor::{Actor, Work};
use crate::error::{BenchResult, OperationError};
use crate::orchestrator::PhaseNumber;
use crate::phase::PhaseDescriptor;
use crate::workload::ActorContext;

/// Type name used in workload files
pub const HELLO_WORLD: &str = "HelloWorld";

const DEFAULT_MESSAGE: &str = "Hello, World!";

/// Logs the phase's `Message` every iteration and bumps a greeting counter
/// shared by every `HelloWorld` instance built from the same producer
#[derive(Debug)]
pub struct HelloWorld {
    message: String,
    greetings: Arc<AtomicU64>,
}

impl HelloWorld {
    /// Operation name timed by the metrics sink
    pub const OPERATION: &'static str = "Greet";

    /// Create a greeter counting into `greetings`
    pub fn new(greetings: Arc<AtomicU64>) -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            greetings,
        }
    }

    /// Producer whose instances all share `greetings`
    pub fn producer(
        greetings: Arc<AtomicU64>,
    ) -> impl Fn(&ActorContext) -> BenchResult<Box<dyn Actor>> + Send + Sync + 'static {
        move |context: &ActorContext| context.actor(HelloWorld::new(Arc::clone(&greetings)), Self::OPERATION)
    }

    /// Message for the current phase
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Work for HelloWorld {
    fn on_phase_start(&mut self, _phase: PhaseNumber, descriptor: &PhaseDescriptor) -> Result<(), OperationError> {
        self.message = descriptor
            .param_str("Message")
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string();
        Ok(())
    }

    fn execute(&mut self, phase: PhaseNumber, iteration: u64) -> Result<(), OperationError> {
        let count = self.greetings.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(phase, iteration, count, message = %self.message, "Greeting");
        Ok(())
    }
}
