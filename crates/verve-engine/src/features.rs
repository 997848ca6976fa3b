use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// One fixed-size block of mono samples ready for analysis.
///
/// Length must equal the configured FFT size; the analyzer rejects anything
/// else. Treated as immutable once captured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleWindow {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Magnitude spectrum in dB, one value per bin from DC through Nyquist
/// (`fft_size / 2 + 1` bins). Values are clamped at the analyzer's floor,
/// never `-inf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    bins: Vec<f32>,
    bin_hz: f32,
}

impl Spectrum {
    pub(crate) fn new(bins: Vec<f32>, bin_hz: f32) -> Self {
        Self { bins, bin_hz }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Width of one bin in Hz.
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Per-band loudness in dB, clamped at the configured floor.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct BandVolumes {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandVolumes {
    pub const CHANNELS: usize = 3;

    /// All three bands at the same level (e.g. the silence floor).
    pub fn splat(db: f32) -> Self {
        Self {
            low: db,
            mid: db,
            high: db,
        }
    }

    pub fn as_slice(&self) -> &[f32; 3] {
        bytemuck::cast_ref(self)
    }

    pub fn as_slice_mut(&mut self) -> &mut [f32; 3] {
        bytemuck::cast_mut(self)
    }

    /// Map each band onto a 0..1 presentation scale, linear in dB over
    /// `[floor_db, 0]` (logarithmic in amplitude). Intended for downstream
    /// visual mapping; the dB values themselves stay authoritative.
    pub fn scaled(&self, floor_db: f32) -> [f32; 3] {
        let span = -floor_db;
        let map = |db: f32| {
            if span <= 0.0 {
                return 0.0;
            }
            ((db - floor_db) / span).clamp(0.0, 1.0)
        };
        [map(self.low), map(self.mid), map(self.high)]
    }
}

/// One point of the offline energy time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergySample {
    /// Seconds from track start. Series are ordered ascending with no
    /// duplicate timestamps.
    pub time: f64,
    pub bands: BandVolumes,
}

/// A sustained high-intensity interval, in seconds from track start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusSection {
    pub start: f64,
    pub end: f64,
}

impl ChorusSection {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// The store's full state: latest live features plus the last offline
/// analysis results. `snapshot()` hands out owned copies of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub bands: BandVolumes,
    pub spectrum: Option<Spectrum>,
    pub high_energy_frames: Vec<f64>,
    pub chorus_sections: Vec<ChorusSection>,
}

impl FeatureSnapshot {
    pub(crate) fn empty(floor_db: f32) -> Self {
        Self {
            bands: BandVolumes::splat(floor_db),
            spectrum: None,
            high_energy_frames: Vec::new(),
            chorus_sections: Vec::new(),
        }
    }
}
