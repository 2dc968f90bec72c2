//! Wave scheduling of sources.
//!
//! Sources are evaluated in waves of equal factor count. A wave only reads
//! effects memoized by earlier waves, so its members can run concurrently;
//! the memo is written between waves by a single owner. With the `parallel`
//! feature each wave runs on the rayon pool.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::context::AnovaContext;
use crate::effects::SourceOutcome;
use crate::source::Source;

/// Evaluate every source of one wave against the current memo.
///
/// Outcomes come back in the order of `wave`.
#[must_use]
pub fn evaluate_wave(ctx: &AnovaContext, wave: &[Source]) -> Vec<SourceOutcome> {
    debug!(
        factors = wave.first().map_or(0, |s| s.factor_count()),
        sources = wave.len(),
        "evaluating wave"
    );

    #[cfg(feature = "parallel")]
    {
        if ctx.config().parallel && wave.len() > 1 {
            return wave.par_iter().map(|&source| ctx.evaluate(source)).collect();
        }
    }

    wave.iter().map(|&source| ctx.evaluate(source)).collect()
}
