//! Built-in actor types
//!
//! Registered by [`Cast::with_builtin_actors`](crate::Cast::with_builtin_actors).

mod hello_world;
mod nop_metrics;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::cast::ActorProducer;

pub use hello_world::{HelloWorld, HELLO_WORLD};
pub use nop_metrics::{NopMetrics, NOP_METRICS};

/// Every built-in type with its producer
pub(crate) fn builtin() -> Vec<(&'static str, ActorProducer)> {
    let greetings = Arc::new(AtomicU64::new(0));
    vec![
        (HELLO_WORLD, Arc::new(HelloWorld::producer(greetings)) as ActorProducer),
        (NOP_METRICS, Arc::new(NopMetrics::produce) as ActorProducer),
    ]
}
