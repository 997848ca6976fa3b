use crate::config::EnergyFrameConfig;
use crate::features::EnergySample;

/// Flag transient low-band spikes: a sample is a hit when its low-band dB
/// exceeds both the rolling `mean + k * stddev` over the trailing window
/// and the absolute noise floor. Of hits closer together than the
/// refractory gap, only the earliest survives.
///
/// Pure function of the series; the same input always yields the same
/// frames. Series shorter than the window use whatever prefix is
/// available; an empty series yields an empty result.
pub fn detect_high_energy_frames(series: &[EnergySample], config: &EnergyFrameConfig) -> Vec<f64> {
    let mut frames: Vec<f64> = Vec::new();
    let mut start = 0usize;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;

    for i in 0..series.len() {
        let t = series[i].time;
        let value = f64::from(series[i].bands.low);
        sum += value;
        sum_sq += value * value;

        // Trailing window advance (timestamp-based, so unevenly spaced
        // series still work)
        while series[start].time < t - config.window_secs {
            let old = f64::from(series[start].bands.low);
            sum -= old;
            sum_sq -= old * old;
            start += 1;
        }

        let count = (i - start + 1) as f64;
        let mean = sum / count;
        let variance = (sum_sq / count - mean * mean).max(0.0);
        let threshold = mean + config.sensitivity * variance.sqrt();

        if value > threshold && value > config.noise_floor_db {
            let far_enough = frames
                .last()
                .map_or(true, |&last| t - last >= config.min_gap_secs);
            if far_enough {
                frames.push(t);
            }
        }
    }

    log::debug!(
        "High-energy pass: {} frames from {} samples",
        frames.len(),
        series.len()
    );
    frames
}
