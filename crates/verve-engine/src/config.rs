use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Window applied before the FFT. Hann is the default; Rectangular exists
/// for tests and callers that pre-window their samples. The choice changes
/// absolute dB readings, so it is part of the persisted config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFunction {
    Hann,
    Rectangular,
}

/// Half-open frequency range in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandRange {
    pub fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }
}

/// Cutoffs for the three analysis bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    pub low: BandRange,
    pub mid: BandRange,
    pub high: BandRange,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            low: BandRange::new(20.0, 250.0),
            mid: BandRange::new(250.0, 4000.0),
            high: BandRange::new(4000.0, 20000.0),
        }
    }
}

/// Tuning for the transient high-energy frame detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyFrameConfig {
    /// Trailing window for the rolling mean/stddev, seconds.
    pub window_secs: f64,
    /// `k` in the `mean + k * stddev` threshold.
    pub sensitivity: f64,
    /// Absolute dB gate; quieter samples are never flagged.
    pub noise_floor_db: f64,
    /// Minimum spacing between flagged frames, seconds. Of flags closer
    /// than this, only the earliest survives.
    pub min_gap_secs: f64,
}

impl Default for EnergyFrameConfig {
    fn default() -> Self {
        Self {
            window_secs: 1.5,
            sensitivity: 1.5,
            noise_floor_db: -60.0,
            min_gap_secs: 0.15,
        }
    }
}

/// Tuning for the sustained-section detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusConfig {
    /// Trailing moving average over the composite intensity, seconds.
    pub smoothing_secs: f64,
    /// Threshold percentile of the smoothed intensity distribution, 0..1.
    pub percentile: f64,
    /// Candidate intervals closer than this fuse into one, seconds.
    pub merge_gap_secs: f64,
    /// Intervals shorter than this are discarded, seconds.
    pub min_duration_secs: f64,
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            smoothing_secs: 0.5,
            percentile: 0.7,
            merge_gap_secs: 2.0,
            min_duration_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub version: u32,
    /// FFT length in samples; must be a power of two.
    pub fft_size: usize,
    /// Silence floor in dB; spectra and band values clamp here.
    pub db_floor: f32,
    pub window_function: WindowFunction,
    /// Live analysis rate, ticks per second.
    pub tick_hz: f32,
    /// Publish the raw spectrum alongside band volumes on every live tick.
    #[serde(default)]
    pub publish_spectrum: bool,
    pub bands: BandConfig,
    pub energy: EnergyFrameConfig,
    pub chorus: ChorusConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: 1,
            fft_size: 2048,
            db_floor: -100.0,
            window_function: WindowFunction::Hann,
            tick_hz: 60.0,
            publish_spectrum: false,
            bands: BandConfig::default(),
            energy: EnergyFrameConfig::default(),
            chorus: ChorusConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load from the platform config dir; missing, corrupt or invalid files
    /// fall back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Best-effort save to the platform config dir.
    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            return;
        };
        self.save_to(&path);
    }

    pub(crate) fn load_from(path: &Path) -> Self {
        let config: Self = match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Self::default(),
        };
        if let Err(e) = config.validate() {
            log::warn!("Ignoring invalid config at {}: {e}", path.display());
            return Self::default();
        }
        config
    }

    pub(crate) fn save_to(&self, path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }

    fn default_path() -> Option<PathBuf> {
        let config_dir = dirs::config_dir()?;
        Some(config_dir.join("verve").join("engine.json"))
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.fft_size.is_power_of_two() || self.fft_size < 32 {
            return Err(EngineError::InvalidConfig(format!(
                "fft_size must be a power of two >= 32, got {}",
                self.fft_size
            )));
        }
        if !self.db_floor.is_finite() || self.db_floor >= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "db_floor must be finite and negative, got {}",
                self.db_floor
            )));
        }
        if !self.tick_hz.is_finite() || self.tick_hz <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "tick_hz must be positive, got {}",
                self.tick_hz
            )));
        }
        validate_band("low", self.bands.low)?;
        validate_band("mid", self.bands.mid)?;
        validate_band("high", self.bands.high)?;

        let e = &self.energy;
        if !e.window_secs.is_finite() || e.window_secs <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "energy window_secs must be positive".into(),
            ));
        }
        if !e.sensitivity.is_finite() || e.sensitivity < 0.0 {
            return Err(EngineError::InvalidConfig(
                "energy sensitivity must be non-negative".into(),
            ));
        }
        if !e.noise_floor_db.is_finite() {
            return Err(EngineError::InvalidConfig(
                "energy noise_floor_db must be finite".into(),
            ));
        }
        if !e.min_gap_secs.is_finite() || e.min_gap_secs < 0.0 {
            return Err(EngineError::InvalidConfig(
                "energy min_gap_secs must be non-negative".into(),
            ));
        }

        let c = &self.chorus;
        if !c.smoothing_secs.is_finite() || c.smoothing_secs < 0.0 {
            return Err(EngineError::InvalidConfig(
                "chorus smoothing_secs must be non-negative".into(),
            ));
        }
        if !c.percentile.is_finite() || c.percentile <= 0.0 || c.percentile >= 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "chorus percentile must be in (0, 1), got {}",
                c.percentile
            )));
        }
        if !c.merge_gap_secs.is_finite() || c.merge_gap_secs < 0.0 {
            return Err(EngineError::InvalidConfig(
                "chorus merge_gap_secs must be non-negative".into(),
            ));
        }
        if !c.min_duration_secs.is_finite() || c.min_duration_secs < 0.0 {
            return Err(EngineError::InvalidConfig(
                "chorus min_duration_secs must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

fn validate_band(name: &'static str, range: BandRange) -> Result<(), EngineError> {
    let ok = range.low_hz.is_finite()
        && range.high_hz.is_finite()
        && range.low_hz > 0.0
        && range.high_hz > range.low_hz;
    if ok {
        Ok(())
    } else {
        Err(EngineError::EmptyBandRange { band: name })
    }
}
