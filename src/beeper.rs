//! Audible feedback for finished timers.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use rodio::{source::SineWave, OutputStream, Sink, Source};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::utils::clock::Clock;

const PULSE_INTERVAL: Duration = Duration::from_millis(500);
const PULSE_LENGTH: Duration = Duration::from_millis(250);
const PULSE_FREQUENCY: f32 = 880.;
const VOLUME: f32 = 0.25;

/// Contract for anything able to make noise for a while.
#[cfg_attr(test, mockall::automock)]
pub trait Beeper {
    /// Starts an episode which stops by itself after `duration`. A running episode is replaced.
    fn on(&mut self, duration: Duration);

    fn off(&mut self);

    fn is_beeping(&self) -> bool;
}

/// Sink of a playing episode. Filled by the audio thread once the output device is open.
type SinkSlot = Arc<Mutex<Option<Arc<Sink>>>>;

struct Episode {
    token: CancellationToken,
    sink: SinkSlot,
}

/// Plays sine pulses on the default audio output.
///
/// `rodio` output streams can't leave the thread that opened them, so every episode plays on its
/// own thread. The episode itself is timed by a tokio task over the [Clock], which clears the
/// shared flag when it runs out. A machine without an audio device still gets correct
/// [Beeper::is_beeping] answers, only without sound.
pub struct SpeakerBeeper {
    beeping: Arc<AtomicBool>,
    episode: Option<Episode>,
    clock: Arc<dyn Clock>,
}

impl SpeakerBeeper {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            beeping: Arc::new(AtomicBool::new(false)),
            episode: None,
            clock,
        }
    }
}

impl Beeper for SpeakerBeeper {
    fn on(&mut self, duration: Duration) {
        self.off();
        info!("Beeping for {duration:?}");

        let episode = Episode {
            token: CancellationToken::new(),
            sink: SinkSlot::default(),
        };
        self.beeping.store(true, Ordering::SeqCst);
        play_pulses(duration, episode.token.clone(), episode.sink.clone());

        let beeping = self.beeping.clone();
        let clock = self.clock.clone();
        let token = episode.token.clone();
        let sink = episode.sink.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = clock.sleep(duration) => (),
            }
            // A cancelled episode was turned off by its owner, who might have started a new one
            if !token.is_cancelled() {
                beeping.store(false, Ordering::SeqCst);
                stop_sink(&sink);
                debug!("Beeping episode ran out");
            }
        });

        self.episode = Some(episode);
    }

    fn off(&mut self) {
        if let Some(episode) = self.episode.take() {
            episode.token.cancel();
            stop_sink(&episode.sink);
        }
        self.beeping.store(false, Ordering::SeqCst);
    }

    fn is_beeping(&self) -> bool {
        self.beeping.load(Ordering::SeqCst)
    }
}

fn stop_sink(slot: &SinkSlot) {
    if let Some(sink) = slot.lock().ok().and_then(|mut v| v.take()) {
        sink.stop();
    }
}

/// Number of pulses started within `duration`, at least one.
fn pulse_count(duration: Duration) -> u128 {
    duration
        .as_millis()
        .div_ceil(PULSE_INTERVAL.as_millis())
        .max(1)
}

fn play_pulses(duration: Duration, token: CancellationToken, slot: SinkSlot) {
    let spawned = thread::Builder::new()
        .name("beeper".into())
        .spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(v) => v,
                Err(e) => {
                    warn!("No audio output available {e}");
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to create an audio sink {e}");
                    return;
                }
            };

            sink.set_volume(VOLUME);
            for i in 0..pulse_count(duration) {
                let gap = if i == 0 {
                    Duration::ZERO
                } else {
                    PULSE_INTERVAL - PULSE_LENGTH
                };
                sink.append(
                    SineWave::new(PULSE_FREQUENCY)
                        .take_duration(PULSE_LENGTH)
                        .delay(gap),
                );
            }

            let sink = Arc::new(sink);
            {
                let Ok(mut slot) = slot.lock() else {
                    return;
                };
                // Turned off while the device was opening, dropping the sink silences it
                if token.is_cancelled() {
                    return;
                }
                *slot = Some(sink.clone());
            }
            sink.sleep_until_end();
        });

    if let Err(e) = spawned {
        warn!("Failed to start the audio thread {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::time::advance;

    use crate::utils::clock::DefaultClock;

    use super::{pulse_count, stop_sink, Beeper, SinkSlot, SpeakerBeeper};

    #[tokio::test(start_paused = true)]
    async fn episode_runs_out() {
        let mut beeper = SpeakerBeeper::new(Arc::new(DefaultClock));
        beeper.on(Duration::from_millis(1200));
        assert!(beeper.is_beeping());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!beeper.is_beeping());
    }

    #[tokio::test(start_paused = true)]
    async fn off_stops_immediately_and_survives_restart() {
        let mut beeper = SpeakerBeeper::new(Arc::new(DefaultClock));
        beeper.on(Duration::from_secs(5));
        beeper.off();
        assert!(!beeper.is_beeping());

        beeper.on(Duration::from_secs(5));
        beeper.on(Duration::from_secs(5));
        advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(beeper.is_beeping());
        beeper.off();
    }

    #[test]
    fn pulses_cover_the_whole_duration() {
        assert_eq!(pulse_count(Duration::from_millis(3000)), 6);
        assert_eq!(pulse_count(Duration::from_millis(1200)), 3);
        assert_eq!(pulse_count(Duration::ZERO), 1);
    }

    #[test]
    fn stopping_an_empty_slot_is_harmless() {
        let slot = SinkSlot::default();
        stop_sink(&slot);
        stop_sink(&slot);
        assert!(slot.lock().unwrap().is_none());
    }
}
