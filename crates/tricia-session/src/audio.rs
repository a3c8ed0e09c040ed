//! Microphone level sampling.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::state::SessionStateStore;
use crate::transport::{MicrophoneLevel, RoomTransport};

/// Upper bound of the synthetic level used when the track exposes none.
const SIMULATED_LEVEL_MAX: f32 = 0.5;

/// Clamp a raw level into `[0, 1]`; non-finite readings become 0.
pub fn normalize_level(raw: f32) -> f32 {
    if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 }
}

/// Background task polling the local microphone level.
///
/// Dropping the sampler stops it.
pub struct AudioLevelSampler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AudioLevelSampler {
    /// Start polling every `interval`. With `simulate`, a track without a
    /// level reports a random value in `[0, 0.5)` instead of 0.
    pub fn spawn(
        transport: Arc<dyn RoomTransport>,
        state: SessionStateStore,
        interval: Duration,
        simulate: bool,
    ) -> Self {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = guard.cancelled() => break,
                    _ = ticker.tick() => {
                        let level = sample(transport.microphone_level(), simulate);
                        trace!(level, "audio level");
                        state.publish_audio_level(level, &guard);
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    /// Stop polling. No level is published after this returns.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for AudioLevelSampler {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

fn sample(reading: MicrophoneLevel, simulate: bool) -> f32 {
    match reading {
        MicrophoneLevel::Level(raw) => normalize_level(raw),
        MicrophoneLevel::Unavailable if simulate => rand::random::<f32>() * SIMULATED_LEVEL_MAX,
        MicrophoneLevel::Unavailable | MicrophoneLevel::NoTrack => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ConnectOptions, LoopbackTransport};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalized_level_is_in_unit_range(raw in proptest::num::f32::ANY) {
            let level = normalize_level(raw);
            prop_assert!((0.0..=1.0).contains(&level));
        }
    }

    #[test]
    fn sample_readings() {
        assert_eq!(sample(MicrophoneLevel::Level(1.7), false), 1.0);
        assert_eq!(sample(MicrophoneLevel::Level(-0.2), false), 0.0);
        assert_eq!(sample(MicrophoneLevel::NoTrack, true), 0.0);
        assert_eq!(sample(MicrophoneLevel::Unavailable, false), 0.0);
        for _ in 0..50 {
            let v = sample(MicrophoneLevel::Unavailable, true);
            assert!((0.0..SIMULATED_LEVEL_MAX).contains(&v));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sampler_publishes_until_stopped() {
        let transport = LoopbackTransport::shared();
        transport
            .connect("wss://x", "t", ConnectOptions::default())
            .await
            .unwrap();
        transport.set_microphone_enabled(true).await.unwrap();
        transport.set_microphone_level(Some(0.3));

        let state = SessionStateStore::new();
        state.update(|s| s.microphone_enabled = true);
        let sampler = AudioLevelSampler::spawn(
            transport.clone(),
            state.clone(),
            Duration::from_millis(100),
            false,
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(state.snapshot().audio_level, 0.3);

        sampler.stop();
        transport.set_microphone_level(Some(0.8));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(state.snapshot().audio_level, 0.3);
    }
}
