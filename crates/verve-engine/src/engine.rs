use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::chorus::detect_chorus_sections;
use crate::config::EngineConfig;
use crate::energy::detect_high_energy_frames;
use crate::error::EngineError;
use crate::features::EnergySample;
use crate::source::SignalSource;
use crate::store::FeatureStore;
use crate::stream::{LiveFeatureStream, StreamHandle};

struct WorkerHandle {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Top-level engine instance: owns the live stream thread, the offline
/// analysis worker and the shared store. Hosts hold one of these per
/// signal source and read results through `store()`.
pub struct AudioEngine {
    store: Arc<FeatureStore>,
    config: EngineConfig,
    stream: Option<StreamHandle>,
    worker: Option<WorkerHandle>,
    disposed: bool,
}

impl AudioEngine {
    /// Validate the config, create the store and spawn the live thread.
    pub fn start<S>(config: EngineConfig, source: S) -> Result<Self, EngineError>
    where
        S: SignalSource + 'static,
    {
        config.validate()?;
        let store = Arc::new(FeatureStore::new(config.db_floor));
        let stream = LiveFeatureStream::new(&config, source, store.clone()).spawn();
        log::info!(
            "Engine started: {}-point FFT, {:.0} Hz tick",
            config.fft_size,
            config.tick_hz
        );
        Ok(Self {
            store,
            config,
            stream: Some(stream),
            worker: None,
            disposed: false,
        })
    }

    /// Shared handle to the store; subscribe or snapshot through this.
    pub fn store(&self) -> Arc<FeatureStore> {
        self.store.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run both offline detectors over a precomputed energy series on a
    /// worker thread and publish frames + sections together. A new call
    /// supersedes the previous worker: its pending result is discarded
    /// wholesale, never mixed with the new one. No-op once disposed.
    pub fn analyze_track(&mut self, series: Vec<EnergySample>) {
        if self.disposed {
            return;
        }
        self.cancel_worker();

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let store = self.store.clone();
        let energy_config = self.config.energy;
        let chorus_config = self.config.chorus;

        let handle = thread::Builder::new()
            .name("verve-offline".into())
            .spawn(move || {
                log::debug!("Offline analysis over {} samples", series.len());
                let frames = detect_high_energy_frames(&series, &energy_config);
                if flag.load(Ordering::Relaxed) {
                    log::debug!("Offline analysis superseded, discarding");
                    return;
                }
                let sections = detect_chorus_sections(&series, &chorus_config);
                if flag.load(Ordering::Relaxed) {
                    log::debug!("Offline analysis superseded, discarding");
                    return;
                }
                if !store.set_offline_results(frames, sections) {
                    log::debug!("Offline analysis finished after disposal, discarding");
                }
            })
            .expect("Failed to spawn offline analysis thread");

        self.worker = Some(WorkerHandle { cancel, handle });
    }

    /// Stop the live thread, join any worker and dispose the store. After
    /// this returns no subscriber sees another notification. Idempotent;
    /// also runs on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.cancel_worker();
        self.store.dispose();
        log::info!("Engine disposed");
    }

    fn cancel_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::Relaxed);
            let _ = worker.handle.join();
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
