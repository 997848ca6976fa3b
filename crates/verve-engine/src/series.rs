use rayon::prelude::*;

use crate::bands::BandEnergyExtractor;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::features::{EnergySample, SampleWindow};
use crate::spectral::SpectralAnalyzer;

/// Run the live analysis chain over a whole decoded mono buffer, producing
/// one `EnergySample` per tick interval. Windows are centered on each tick
/// and zero-padded at the edges, so the series is deterministic for a given
/// buffer and config.
pub fn build_energy_series(
    samples: &[f32],
    sample_rate: u32,
    config: &EngineConfig,
) -> Result<Vec<EnergySample>, EngineError> {
    config.validate()?;
    if sample_rate == 0 {
        return Err(EngineError::InvalidConfig(
            "sample rate must be positive".into(),
        ));
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let fft_size = config.fft_size;
    let tick_interval = 1.0 / f64::from(config.tick_hz);
    let samples_per_tick = f64::from(sample_rate) / f64::from(config.tick_hz);
    let duration = samples.len() as f64 / f64::from(sample_rate);
    let total = (duration * f64::from(config.tick_hz)).ceil() as usize;

    let extractor = BandEnergyExtractor::new(&config.bands, sample_rate, fft_size, config.db_floor);

    log::debug!(
        "Energy series: {total} ticks over {duration:.1} s at {:.0} Hz",
        config.tick_hz
    );

    let series = (0..total)
        .into_par_iter()
        .map_init(
            // Per-worker FFT state (rayon-safe)
            || SpectralAnalyzer::new(fft_size, config.window_function, config.db_floor),
            |analyzer, idx| {
                let center = (idx as f64 * samples_per_tick) as usize;
                let start = center.saturating_sub(fft_size / 2);
                let end = (start + fft_size).min(samples.len());

                let mut window = vec![0.0f32; fft_size];
                window[..end - start].copy_from_slice(&samples[start..end]);

                let spectrum = analyzer.analyze(&SampleWindow {
                    samples: window,
                    sample_rate,
                })?;

                Ok(EnergySample {
                    time: idx as f64 * tick_interval,
                    bands: extractor.extract(&spectrum),
                })
            },
        )
        .collect::<Result<Vec<_>, EngineError>>()?;

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 48000;

    fn sine(freq: f32, amplitude: f32, secs: f32) -> Vec<f32> {
        let n = (secs * SAMPLE_RATE as f32) as usize;
        (0..n)
            .map(|i| {
                amplitude
                    * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn empty_buffer_yields_empty_series() {
        let series = build_energy_series(&[], SAMPLE_RATE, &EngineConfig::default()).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn zero_sample_rate_is_rejected() {
        let result = build_energy_series(&[0.0; 4800], 0, &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EngineConfig {
            fft_size: 1000,
            ..EngineConfig::default()
        };
        assert!(build_energy_series(&[0.0; 4800], SAMPLE_RATE, &config).is_err());
    }

    #[test]
    fn ticks_are_evenly_spaced_from_zero() {
        let config = EngineConfig::default();
        let series = build_energy_series(&sine(440.0, 0.5, 2.0), SAMPLE_RATE, &config).unwrap();
        assert_eq!(series.len(), 120);
        let dt = 1.0 / f64::from(config.tick_hz);
        for (i, sample) in series.iter().enumerate() {
            assert!((sample.time - i as f64 * dt).abs() < 1e-9);
        }
    }

    #[test]
    fn bass_sine_lands_in_the_low_band() {
        let series =
            build_energy_series(&sine(100.0, 0.8, 1.0), SAMPLE_RATE, &EngineConfig::default())
                .unwrap();
        // Skip the zero-padded edges
        let mid_sample = &series[series.len() / 2];
        assert!(mid_sample.bands.low > mid_sample.bands.mid);
        assert!(mid_sample.bands.low > mid_sample.bands.high);
        assert!(mid_sample.bands.low > -45.0);
    }

    #[test]
    fn series_is_deterministic() {
        let samples = sine(1000.0, 0.4, 1.5);
        let config = EngineConfig::default();
        let a = build_energy_series(&samples, SAMPLE_RATE, &config).unwrap();
        let b = build_energy_series(&samples, SAMPLE_RATE, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let series =
            build_energy_series(&sine(440.0, 0.5, 1.0), SAMPLE_RATE, &EngineConfig::default())
                .unwrap();
        for pair in series.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
    }
}
