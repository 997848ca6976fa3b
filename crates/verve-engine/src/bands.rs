use crate::config::{BandConfig, BandRange};
use crate::features::{BandVolumes, Spectrum};

/// Maps a dB spectrum onto the three configured frequency bands.
///
/// Bin ranges are precomputed from (cutoffs, sample rate, FFT size); the
/// stream rebuilds the extractor if the source sample rate changes.
///
/// Reduction is the arithmetic mean of the bins' dB values. The detector
/// defaults downstream are tuned against dB-domain averaging, so averaging
/// linear power instead would shift every threshold.
pub struct BandEnergyExtractor {
    ranges: [(usize, usize); BandVolumes::CHANNELS],
    db_floor: f32,
}

impl BandEnergyExtractor {
    pub fn new(bands: &BandConfig, sample_rate: u32, fft_size: usize, db_floor: f32) -> Self {
        let bin_hz = sample_rate as f32 / fft_size as f32;
        let num_bins = fft_size / 2 + 1;
        let ranges = [
            bin_span("low", bands.low, bin_hz, num_bins),
            bin_span("mid", bands.mid, bin_hz, num_bins),
            bin_span("high", bands.high, bin_hz, num_bins),
        ];
        Self { ranges, db_floor }
    }

    /// Half-open bin ranges for (low, mid, high).
    pub fn bin_ranges(&self) -> &[(usize, usize); 3] {
        &self.ranges
    }

    /// Reduce a spectrum to per-band dB. Never fails; bins beyond the
    /// spectrum's length are ignored and an unreadable band sits at the
    /// floor.
    pub fn extract(&self, spectrum: &Spectrum) -> BandVolumes {
        let mut out = BandVolumes::splat(self.db_floor);
        let values = out.as_slice_mut();
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            values[i] = self.mean_db(spectrum.bins(), lo, hi);
        }
        out
    }

    fn mean_db(&self, bins: &[f32], lo: usize, hi: usize) -> f32 {
        let hi = hi.min(bins.len());
        if lo >= hi {
            return self.db_floor;
        }
        let sum: f64 = bins[lo..hi].iter().map(|&db| db as f64).sum();
        let mean = (sum / (hi - lo) as f64) as f32;
        mean.max(self.db_floor)
    }
}

/// Map a Hz range onto FFT bins. A range that collapses to zero bins is
/// clamped to a single bin so extraction keeps producing values.
fn bin_span(name: &'static str, range: BandRange, bin_hz: f32, num_bins: usize) -> (usize, usize) {
    let lo = (range.low_hz / bin_hz).round() as usize;
    let hi = ((range.high_hz / bin_hz).round() as usize).min(num_bins);
    if hi <= lo {
        log::warn!(
            "{name} band {:.0}-{:.0} Hz maps to no bins at {bin_hz:.1} Hz/bin, clamping to one",
            range.low_hz,
            range.high_hz
        );
        let lo = lo.min(num_bins - 1);
        return (lo, lo + 1);
    }
    (lo, hi)
}
