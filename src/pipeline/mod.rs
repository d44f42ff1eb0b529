//! Command lifecycle pipeline.
//!
//! One pipeline execution per submitted (or rerun) command, spawned as a
//! detached tokio task. The execution drives the command through
//! `QUEUED → ACKED → CAPTURING → DOWNLINK_READY | FAILED` with simulated
//! stage latencies and probability-gated failures, then invokes image and
//! metadata synthesis on success.
//!
//! Stage sleeps happen outside the store lock; the lock is taken only for
//! the instant of each transition, so concurrent commands never block each
//! other on a sleeping stage.

pub mod metadata;

use std::time::Duration;

use rand::Rng;

use crate::imaging;
use crate::models::CommandState;
use crate::store::Store;

/// Weight applied to `fail_probability` for the uplink transmission check.
const TRANSMISSION_WEIGHT: f64 = 0.6;
/// Weight applied to `fail_probability` for the capture abort check.
const CAPTURE_WEIGHT: f64 = 0.4;

/// Simulated stage durations, uniform over each `(min, max)` range in
/// seconds. Injectable so tests can run the state machine instantly.
#[derive(Debug, Clone, Copy)]
pub struct StageTiming {
    pub contact_wait: (f64, f64),
    pub command_prep: (f64, f64),
    pub capture: (f64, f64),
}

impl Default for StageTiming {
    fn default() -> Self {
        Self {
            contact_wait: (0.7, 1.8),
            command_prep: (0.6, 1.6),
            capture: (1.5, 3.8),
        }
    }
}

impl StageTiming {
    /// Zero-length stages, for tests.
    pub fn instant() -> Self {
        Self {
            contact_wait: (0.0, 0.0),
            command_prep: (0.0, 0.0),
            capture: (0.0, 0.0),
        }
    }

    async fn hold(&self, (min, max): (f64, f64)) {
        if max <= 0.0 {
            return;
        }
        let secs = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }
}

/// Probability-gated stage failure.
///
/// For `fail_probability < 1` this is the strict comparison
/// `draw < fail_probability * weight` with `draw` uniform over `[0, 1)`,
/// so a probability of exactly `0.0` can never trip. A probability of
/// `1.0` trips unconditionally: callers are guaranteed to fail at the
/// first weighted check.
pub fn stage_failure<R: Rng>(rng: &mut R, fail_probability: f64, weight: f64) -> bool {
    fail_probability >= 1.0 || rng.gen::<f64>() < fail_probability * weight
}

/// Spawn one detached pipeline execution for a command. Returns
/// immediately; completion is observable only through the store.
pub fn spawn(store: Store, command_id: String) {
    tokio::spawn(run(store, command_id));
}

/// Run the full lifecycle for one command to a terminal state.
pub async fn run(store: Store, command_id: String) {
    let Some((command, satellite_type)) = store.begin_pipeline(&command_id) else {
        // Precondition fault (missing or unavailable satellite), already
        // recorded as FAILED with zero stage delay.
        return;
    };
    let timing = store.timing();

    // Wait for a contact window before the uplink ACK.
    timing.hold(timing.contact_wait).await;
    store.transition(
        &command_id,
        CommandState::Acked,
        "Uplink ACK received from satellite",
    );

    // Command validation/prep on the satellite side.
    timing.hold(timing.command_prep).await;
    if stage_failure(
        &mut rand::thread_rng(),
        command.fail_probability,
        TRANSMISSION_WEIGHT,
    ) {
        store.transition(&command_id, CommandState::Failed, "Uplink transmission failed");
        return;
    }

    store.transition(
        &command_id,
        CommandState::Capturing,
        "Satellite is capturing image",
    );
    timing.hold(timing.capture).await;
    if stage_failure(
        &mut rand::thread_rng(),
        command.fail_probability,
        CAPTURE_WEIGHT,
    ) {
        store.transition(
            &command_id,
            CommandState::Failed,
            "Capture aborted due to onboard condition",
        );
        return;
    }

    // Post-capture: synthesize the raster and metadata. Every failure in
    // here becomes a FAILED transition, never a crash.
    let output = store.image_dir().join(format!("{command_id}.png"));
    match imaging::render(&command, satellite_type, store.tiles(), &output).await {
        Ok(()) => {
            let (acquisition, product) = metadata::build(satellite_type, &command);
            store.complete(&command_id, output, acquisition, product);
        }
        Err(err) => {
            tracing::warn!(command_id, error = %err, "post-capture synthesis failed");
            store.transition(
                &command_id,
                CommandState::Failed,
                &format!("Post-capture pipeline failed: {err}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    // StepRng yielding a constant draw lets the boundary semantics be
    // pinned exactly.
    fn rng_drawing_zero() -> StepRng {
        StepRng::new(0, 0)
    }

    fn rng_drawing_high() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn zero_probability_never_trips_even_on_smallest_draw() {
        assert!(!stage_failure(&mut rng_drawing_zero(), 0.0, TRANSMISSION_WEIGHT));
        assert!(!stage_failure(&mut rng_drawing_zero(), 0.0, CAPTURE_WEIGHT));
    }

    #[test]
    fn certain_probability_trips_regardless_of_draw() {
        assert!(stage_failure(&mut rng_drawing_high(), 1.0, TRANSMISSION_WEIGHT));
        assert!(stage_failure(&mut rng_drawing_high(), 1.0, CAPTURE_WEIGHT));
    }

    #[test]
    fn comparison_is_strict_less_than_on_the_weighted_threshold() {
        // A zero draw trips any positive threshold but not a zero one.
        assert!(stage_failure(&mut rng_drawing_zero(), 0.5, TRANSMISSION_WEIGHT));
        assert!(!stage_failure(&mut rng_drawing_zero(), 0.0, TRANSMISSION_WEIGHT));
    }

    #[test]
    fn weights_scale_the_threshold() {
        // Draw near 0.5: trips at p=1-eps only through the 0.6 weight,
        // never through the 0.4 weight.
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        assert!(stage_failure(&mut rng, 0.9999, TRANSMISSION_WEIGHT));
        let mut rng = StepRng::new(u64::MAX / 2, 0);
        assert!(!stage_failure(&mut rng, 0.9999, CAPTURE_WEIGHT));
    }
}
