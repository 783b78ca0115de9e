//! Phases as seen by one actor
//!
//! Each actor thread owns a [`PhaseLoop`]. `next_phase()` waits at the start
//! barrier and hands out an [`ActivePhase`], an iterator whose length is
//! governed by the actor's [`PhaseDescriptor`] for that phase. Dropping the
//! active phase crosses the end barrier.

mod descriptor;
mod phase_loop;

pub use descriptor::PhaseDescriptor;
pub use phase_loop::{ActivePhase, PhaseLoop};
