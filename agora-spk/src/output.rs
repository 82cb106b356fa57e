//! Audio output devices for decoded clips

use crate::decoder::DecodedClip;
use crate::error::SpeechError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Where decoded clips are played
pub trait AudioOutput: Send + Sync {
    /// Start playing `clip` and return a handle to the running playback
    fn start(&self, clip: Arc<DecodedClip>) -> Result<Box<dyn ActivePlayback>, SpeechError>;

    fn name(&self) -> &str;
}

/// A clip currently being played by an [`AudioOutput`]
pub trait ActivePlayback: Send + Sync {
    fn stop(&self);

    fn is_finished(&self) -> bool;
}

/// Headless output: playback is a timer running for the clip's duration.
/// Used on hosts without an audio device and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn start(&self, clip: Arc<DecodedClip>) -> Result<Box<dyn ActivePlayback>, SpeechError> {
        Ok(Box::new(TimedPlayback::new(clip.duration)))
    }

    fn name(&self) -> &str {
        "silent"
    }
}

/// Playback that finishes after a fixed duration on the tokio clock
#[derive(Debug)]
pub struct TimedPlayback {
    ends_at: Instant,
    stopped: AtomicBool,
}

impl TimedPlayback {
    pub fn new(duration: Duration) -> Self {
        Self {
            ends_at: Instant::now() + duration,
            stopped: AtomicBool::new(false),
        }
    }
}

impl ActivePlayback for TimedPlayback {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || Instant::now() >= self.ends_at
    }
}

#[cfg(feature = "rodio-output")]
pub use device::RodioOutput;

#[cfg(feature = "rodio-output")]
mod device {
    use super::*;
    use tracing::{debug, warn};

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Plays clips on the default output device.
    ///
    /// The device stream is not `Send`, so every playback owns a thread that
    /// opens the stream, feeds the sink and polls for stop requests.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RodioOutput;

    struct RodioPlayback {
        stop: Arc<AtomicBool>,
        finished: Arc<AtomicBool>,
    }

    impl ActivePlayback for RodioPlayback {
        fn stop(&self) {
            self.stop.store(true, Ordering::SeqCst);
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }
    }

    impl AudioOutput for RodioOutput {
        fn start(&self, clip: Arc<DecodedClip>) -> Result<Box<dyn ActivePlayback>, SpeechError> {
            let stop = Arc::new(AtomicBool::new(false));
            let finished = Arc::new(AtomicBool::new(false));
            let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

            let thread_stop = stop.clone();
            let thread_finished = finished.clone();
            std::thread::Builder::new()
                .name("agora-playback".to_string())
                .spawn(move || {
                    let stream = match rodio::OutputStreamBuilder::open_default_stream() {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.to_string()));
                            thread_finished.store(true, Ordering::SeqCst);
                            return;
                        }
                    };
                    let sink = rodio::Sink::connect_new(stream.mixer());
                    sink.append(rodio::buffer::SamplesBuffer::new(
                        clip.channels,
                        clip.sample_rate,
                        clip.samples.clone(),
                    ));
                    let _ = ready_tx.send(Ok(()));

                    while !sink.empty() {
                        if thread_stop.load(Ordering::SeqCst) {
                            sink.stop();
                            break;
                        }
                        std::thread::sleep(POLL_INTERVAL);
                    }
                    debug!("device playback ended");
                    thread_finished.store(true, Ordering::SeqCst);
                })?;

            match ready_rx.recv() {
                Ok(Ok(())) => Ok(Box::new(RodioPlayback { stop, finished })),
                Ok(Err(e)) => {
                    warn!(error = %e, "failed to open audio device");
                    Err(SpeechError::Playback(format!("failed to open audio device: {}", e)))
                }
                Err(_) => Err(SpeechError::Playback("playback thread exited".to_string())),
            }
        }

        fn name(&self) -> &str {
            "rodio"
        }
    }
}
