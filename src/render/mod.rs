//! Progressive render driving.
//!
//! Redraws run at one of three resolution tiers. Interactive changes
//! request a low tier pass immediately and queue the finer tiers; a new
//! request while finer passes are still pending supersedes them, so at
//! most one full-resolution pass runs per quiet period.

pub mod offscreen;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ViewResult;

/// Target dimension (vertices per axis) of the low resolution tier.
pub const LOW_REZ_DIMENSION: usize = 100;
/// Target dimension of the high resolution tier.
pub const HIGH_REZ_DIMENSION: usize = 500;

/// Columns processed between cancellation/progress checks in long passes.
pub const EVENT_CHECK_COARSENESS: usize = 5;

/// Resolution tier for rendering, contouring, and picking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rez {
    Low,
    High,
    Full,
}

impl Rez {
    /// Sampling stride over the grid at this tier: full resolution walks
    /// every vertex, the coarser tiers step so that roughly the target
    /// dimension of vertices remains per axis.
    pub fn stride(self, nx: usize, ny: usize) -> usize {
        let for_dim = |dim: usize| -> usize {
            let sx = nx.div_ceil(dim);
            let sy = ny.div_ceil(dim);
            sx.max(sy).max(1)
        };
        match self {
            Rez::Full => 1,
            Rez::High => for_dim(HIGH_REZ_DIMENSION),
            Rez::Low => for_dim(LOW_REZ_DIMENSION),
        }
    }

    pub fn finer(self) -> Option<Rez> {
        match self {
            Rez::Low => Some(Rez::High),
            Rez::High => Some(Rez::Full),
            Rez::Full => None,
        }
    }
}

/// Shared cancellation flag checked by long-running passes. Cloning gives
/// another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Progress report passed to the caller's callback at event-check points.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub rez: Rez,
    pub done: usize,
    pub total: usize,
}

/// Callback invoked from inside long passes; the caller may pump its own
/// event loop here and cancel through the token.
pub type ProgressFn<'a> = dyn FnMut(Progress) + 'a;

/// How much of the tier ladder a redraw request climbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawPlan {
    /// Low tier only (camera drag in progress).
    LowOnly,
    /// Low now, then high and full when idle.
    LowThenFull,
    /// High now, then full when idle.
    HighThenFull,
}

impl RedrawPlan {
    fn first(self) -> Rez {
        match self {
            RedrawPlan::LowOnly | RedrawPlan::LowThenFull => Rez::Low,
            RedrawPlan::HighThenFull => Rez::High,
        }
    }

    fn last(self) -> Rez {
        match self {
            RedrawPlan::LowOnly => Rez::Low,
            RedrawPlan::LowThenFull | RedrawPlan::HighThenFull => Rez::Full,
        }
    }
}

/// Outcome of one driven pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Pass completed and its frame was presented.
    Presented(Rez),
    /// Pass was cancelled or superseded by a newer request; no present.
    Discarded(Rez),
}

/// Drives render passes through the tier ladder.
///
/// Every request takes a new generation number. A pass presents its frame
/// only if no newer request arrived while it ran, so overlapping requests
/// collapse to a single presented frame for the newest generation.
pub struct RenderDriver {
    generation: u64,
    presented: Option<(u64, Rez)>,
    pending: Option<(u64, Rez, Rez)>,
}

impl Default for RenderDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderDriver {
    pub fn new() -> Self {
        Self {
            generation: 0,
            presented: None,
            pending: None,
        }
    }

    /// Register a redraw request and run its first pass. `pass` renders
    /// one tier and returns false if it was cancelled midway.
    pub fn request<F>(&mut self, plan: RedrawPlan, mut pass: F) -> ViewResult<PassOutcome>
    where
        F: FnMut(&mut RenderDriver, Rez) -> ViewResult<bool>,
    {
        self.generation += 1;
        let generation = self.generation;
        let first = plan.first();
        let last = plan.last();
        self.pending = first.finer().filter(|_| first < last).map(|next| (generation, next, last));
        self.run_pass(generation, first, &mut pass)
    }

    /// Run the next queued finer pass, if any. Call when idle; returns
    /// None once the ladder is exhausted or superseded.
    pub fn continue_pending<F>(&mut self, mut pass: F) -> ViewResult<Option<PassOutcome>>
    where
        F: FnMut(&mut RenderDriver, Rez) -> ViewResult<bool>,
    {
        let Some((generation, rez, last)) = self.pending.take() else {
            return Ok(None);
        };
        if generation != self.generation {
            return Ok(None);
        }
        self.pending = rez.finer().filter(|_| rez < last).map(|next| (generation, next, last));
        self.run_pass(generation, rez, &mut pass).map(Some)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some_and(|(generation, _, _)| generation == self.generation)
    }

    /// A newer request supersedes whatever pass is currently running.
    pub fn supersede(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    /// Tier of the most recently presented frame.
    pub fn presented_rez(&self) -> Option<Rez> {
        self.presented.map(|(_, rez)| rez)
    }

    fn run_pass<F>(&mut self, generation: u64, rez: Rez, pass: &mut F) -> ViewResult<PassOutcome>
    where
        F: FnMut(&mut RenderDriver, Rez) -> ViewResult<bool>,
    {
        let completed = pass(self, rez)?;
        // a nested request bumps the generation; the stale frame is dropped
        if completed && generation == self.generation {
            self.presented = Some((generation, rez));
            Ok(PassOutcome::Presented(rez))
        } else {
            if generation != self.generation {
                self.pending = None;
            }
            Ok(PassOutcome::Discarded(rez))
        }
    }
}
