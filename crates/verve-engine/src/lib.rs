//! Audio feature extraction and section detection for music-reactive
//! visuals.
//!
//! The live half polls a [`SignalSource`] at a fixed tick rate and turns
//! each window into smoothed per-band dB volumes; the offline half walks a
//! whole decoded track and finds transient high-energy frames and sustained
//! chorus sections. Both publish into a shared [`FeatureStore`] that hosts
//! read by snapshot or subscription.
//!
//! ```no_run
//! use verve_engine::{AudioEngine, EngineConfig, RingSource, build_energy_series};
//!
//! # fn main() -> Result<(), verve_engine::EngineError> {
//! let config = EngineConfig::load();
//! let (source, producer) = RingSource::new(48000, config.fft_size);
//! let mut engine = AudioEngine::start(config.clone(), source)?;
//!
//! // The host's capture callback keeps pushing mono samples.
//! producer.push(&[0.0; 512]);
//!
//! // Offline: analyze a decoded track and publish its sections.
//! let track: Vec<f32> = Vec::new();
//! let series = build_energy_series(&track, 48000, &config)?;
//! engine.analyze_track(series);
//!
//! let snapshot = engine.store().snapshot();
//! println!("low band: {:.1} dB", snapshot.bands.low);
//! # Ok(())
//! # }
//! ```

pub mod bands;
pub mod chorus;
pub mod config;
pub mod energy;
pub mod engine;
pub mod error;
pub mod features;
pub mod series;
pub mod smoother;
pub mod source;
pub mod spectral;
pub mod store;
pub mod stream;

pub use chorus::detect_chorus_sections;
pub use config::{
    BandConfig, BandRange, ChorusConfig, EnergyFrameConfig, EngineConfig, WindowFunction,
};
pub use energy::detect_high_energy_frames;
pub use engine::AudioEngine;
pub use error::EngineError;
pub use features::{
    BandVolumes, ChorusSection, EnergySample, FeatureSnapshot, SampleWindow, Spectrum,
};
pub use series::build_energy_series;
pub use source::{RingProducer, RingSource, SignalSource};
pub use store::{FeatureStore, StoreEvent, SubscriptionId};
pub use stream::{LiveFeatureStream, StreamHandle};
