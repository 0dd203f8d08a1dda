//! Progress events of the iteration loop

use crate::domain::models::ValidationOutcome;

/// Progress of a run, in the order it happens.
///
/// Coverage values are fractions in `[0, 1]`; iterations count from 1.
#[derive(Debug)]
pub enum RunEvent<'a> {
    /// The unmodified suite was measured.
    BaselineMeasured {
        /// Baseline coverage.
        coverage: f64,
    },
    /// A generate/validate round begins.
    IterationStarted {
        /// Current round.
        iteration: u32,
        /// Configured limit.
        max_iterations: u32,
    },
    /// The model answered with a batch of candidates.
    CandidatesGenerated {
        /// Current round.
        iteration: u32,
        /// Candidates in the batch, possibly zero.
        count: usize,
    },
    /// One candidate of the current batch was kept or rolled back.
    CandidateValidated {
        /// Position in the batch, from 0.
        index: usize,
        /// Verdict with command output.
        outcome: &'a ValidationOutcome,
    },
    /// The suite was re-measured at the end of a round.
    CoverageMeasured {
        /// Current round.
        iteration: u32,
        /// Coverage after the round.
        coverage: f64,
    },
}

/// Receives [`RunEvent`]s synchronously from the loop.
pub trait RunObserver: Send + Sync {
    /// Called once per event; must not block for long.
    fn on_event(&self, event: &RunEvent<'_>);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {
    fn on_event(&self, _event: &RunEvent<'_>) {}
}
