use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use crate::config::WindowFunction;
use crate::error::EngineError;
use crate::features::{SampleWindow, Spectrum};

/// FFT-based spectral analyzer: one sample window in, one dB spectrum out.
///
/// Deterministic per window; the scratch buffers are reused but carry no
/// state across calls.
pub struct SpectralAnalyzer {
    fft: std::sync::Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    fft_size: usize,
    num_bins: usize,
    db_floor: f32,
}

impl SpectralAnalyzer {
    pub fn new(fft_size: usize, window_function: WindowFunction, db_floor: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let num_bins = fft_size / 2 + 1;
        let window = match window_function {
            WindowFunction::Hann => hann_window(fft_size),
            WindowFunction::Rectangular => vec![1.0; fft_size],
        };

        log::debug!("Spectral analyzer: {fft_size}-point {window_function:?}, {num_bins} bins");

        Self {
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            fft_size,
            num_bins,
            db_floor,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Transform one window into a dB magnitude spectrum.
    pub fn analyze(&mut self, window: &SampleWindow) -> Result<Spectrum, EngineError> {
        if window.samples.len() != self.fft_size {
            return Err(EngineError::InvalidWindowSize {
                expected: self.fft_size,
                actual: window.samples.len(),
            });
        }

        // Apply window and prepare complex buffer
        for i in 0..self.fft_size {
            self.fft_buffer[i] = Complex::new(window.samples[i] * self.window[i], 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        // Magnitude scale such that a full-scale bin-centered sine reads
        // 0 dB under the rectangular window.
        let scale = 2.0 / self.fft_size as f32;
        let bins: Vec<f32> = self.fft_buffer[..self.num_bins]
            .iter()
            .map(|c| magnitude_db(c.norm() * scale, self.db_floor))
            .collect();

        let bin_hz = window.sample_rate as f32 / self.fft_size as f32;
        Ok(Spectrum::new(bins, bin_hz))
    }
}

pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

fn magnitude_db(magnitude: f32, floor: f32) -> f32 {
    if magnitude <= 0.0 {
        return floor;
    }
    (20.0 * magnitude.log10()).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FFT_SIZE: usize = 2048;
    const SAMPLE_RATE: u32 = 48000;
    const FLOOR: f32 = -100.0;

    fn sine_window(bin: usize, amplitude: f32) -> SampleWindow {
        // Frequency centered exactly on `bin` so the tone is periodic in
        // the window and leakage stays minimal.
        let freq = bin as f32 * SAMPLE_RATE as f32 / FFT_SIZE as f32;
        let samples: Vec<f32> = (0..FFT_SIZE)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect();
        SampleWindow {
            samples,
            sample_rate: SAMPLE_RATE,
        }
    }

    fn silence_window() -> SampleWindow {
        SampleWindow {
            samples: vec![0.0; FFT_SIZE],
            sample_rate: SAMPLE_RATE,
        }
    }

    #[test]
    fn spectrum_has_dc_through_nyquist_bins() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let spectrum = analyzer.analyze(&silence_window()).unwrap();
        assert_eq!(spectrum.len(), FFT_SIZE / 2 + 1);
        assert!((spectrum.bin_hz() - SAMPLE_RATE as f32 / FFT_SIZE as f32).abs() < 1e-3);
    }

    #[test]
    fn silence_maps_to_floor_not_neg_infinity() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let spectrum = analyzer.analyze(&silence_window()).unwrap();
        for &db in spectrum.bins() {
            assert_eq!(db, FLOOR);
        }
    }

    #[test]
    fn all_bins_finite_and_bounded_for_normal_input() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let spectrum = analyzer.analyze(&sine_window(37, 0.8)).unwrap();
        for &db in spectrum.bins() {
            assert!(db.is_finite());
            assert!(db >= FLOOR);
            // 0 dB is full scale under the 2/N normalization
            assert!(db < 0.0);
        }
    }

    #[test]
    fn sine_peaks_at_expected_bin() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let spectrum = analyzer.analyze(&sine_window(128, 1.0)).unwrap();
        let peak_bin = spectrum
            .bins()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 128);
    }

    #[test]
    fn rectangular_full_scale_sine_reads_zero_db() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Rectangular, FLOOR);
        let spectrum = analyzer.analyze(&sine_window(128, 1.0)).unwrap();
        assert!((spectrum.bins()[128]).abs() < 0.1);
    }

    #[test]
    fn hann_window_loses_expected_coherent_gain() {
        // Hann coherent gain is 0.5, i.e. about -6 dB at the peak bin.
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let spectrum = analyzer.analyze(&sine_window(128, 1.0)).unwrap();
        assert!((spectrum.bins()[128] + 6.02).abs() < 0.2);
    }

    #[test]
    fn analysis_is_deterministic_across_calls() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let window = sine_window(64, 0.5);
        let a = analyzer.analyze(&window).unwrap();
        let b = analyzer.analyze(&window).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_window_length_is_rejected() {
        let mut analyzer = SpectralAnalyzer::new(FFT_SIZE, WindowFunction::Hann, FLOOR);
        let window = SampleWindow {
            samples: vec![0.0; 1000],
            sample_rate: SAMPLE_RATE,
        };
        assert_eq!(
            analyzer.analyze(&window),
            Err(EngineError::InvalidWindowSize {
                expected: FFT_SIZE,
                actual: 1000
            })
        );
    }
}
