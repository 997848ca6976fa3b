use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::bands::BandEnergyExtractor;
use crate::config::EngineConfig;
use crate::smoother::BandSmoother;
use crate::source::SignalSource;
use crate::spectral::SpectralAnalyzer;
use crate::store::FeatureStore;

/// Live analysis pipeline: source -> FFT -> band reduction -> smoothing ->
/// store publish. One tick runs the whole chain once.
pub struct LiveFeatureStream<S: SignalSource> {
    source: S,
    analyzer: SpectralAnalyzer,
    extractor: BandEnergyExtractor,
    smoother: BandSmoother,
    store: Arc<FeatureStore>,
    config: EngineConfig,
    sample_rate: u32,
}

impl<S: SignalSource> LiveFeatureStream<S> {
    pub fn new(config: &EngineConfig, source: S, store: Arc<FeatureStore>) -> Self {
        let sample_rate = source.sample_rate();
        Self {
            analyzer: SpectralAnalyzer::new(
                config.fft_size,
                config.window_function,
                config.db_floor,
            ),
            extractor: BandEnergyExtractor::new(
                &config.bands,
                sample_rate,
                config.fft_size,
                config.db_floor,
            ),
            smoother: BandSmoother::new(config.db_floor),
            source,
            store,
            config: config.clone(),
            sample_rate,
        }
    }

    /// Run one analysis tick. `dt` is seconds since the previous tick and
    /// drives the smoother. Returns whether a snapshot was published; a
    /// tick with no new window, a failed analysis, or a disposed store
    /// publishes nothing and leaves the previous snapshot in place.
    pub fn tick(&mut self, dt: f32) -> bool {
        let Some(window) = self.source.current_window() else {
            return false;
        };

        if window.sample_rate != self.sample_rate {
            log::info!(
                "Source sample rate changed {} -> {} Hz, remapping bands",
                self.sample_rate,
                window.sample_rate
            );
            self.sample_rate = window.sample_rate;
            self.extractor = BandEnergyExtractor::new(
                &self.config.bands,
                self.sample_rate,
                self.config.fft_size,
                self.config.db_floor,
            );
        }

        let spectrum = match self.analyzer.analyze(&window) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                log::warn!("Live tick skipped: {e}");
                return false;
            }
        };

        let raw = self.extractor.extract(&spectrum);
        let smoothed = self.smoother.smooth(&raw, dt);
        let published = self.config.publish_spectrum.then_some(spectrum);
        self.store.update_live(smoothed, published)
    }

    /// Move the stream onto a named thread ticking at the configured rate.
    pub fn spawn(self) -> StreamHandle
    where
        S: 'static,
    {
        let interval = Duration::from_secs_f32(1.0 / self.config.tick_hz.max(0.001));
        let live = Arc::new(AtomicBool::new(true));
        let flag = live.clone();
        let mut stream = self;

        let handle = thread::Builder::new()
            .name("verve-live".into())
            .spawn(move || {
                let mut last = Instant::now();
                while flag.load(Ordering::Relaxed) {
                    sleep_responsive(interval, &flag);
                    // Re-check after waking: stop() may have flipped the
                    // flag mid-sleep, and a tick after that must not run.
                    if !flag.load(Ordering::Relaxed) {
                        break;
                    }
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f32();
                    last = now;
                    stream.tick(dt);
                }
                log::info!("Live stream thread shutting down");
            })
            .expect("Failed to spawn live stream thread");

        StreamHandle {
            live,
            handle: Some(handle),
        }
    }
}

/// Sleep in short slices so stop() never waits out a slow tick interval.
fn sleep_responsive(interval: Duration, live: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = interval;
    while live.load(Ordering::Relaxed) && remaining > Duration::ZERO {
        let nap = remaining.min(SLICE);
        thread::sleep(nap);
        remaining = remaining.saturating_sub(nap);
    }
}

/// Liveness flag plus join handle for a spawned stream thread.
pub struct StreamHandle {
    live: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Signal the thread to stop and wait for it to finish. Idempotent.
    pub fn stop(&mut self) {
        self.live.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some() && self.live.load(Ordering::Relaxed)
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
