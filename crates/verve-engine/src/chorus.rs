use crate::config::ChorusConfig;
use crate::features::{ChorusSection, EnergySample};

/// Find sustained high-intensity intervals. The composite intensity (mean
/// of the three band dB values) is smoothed with a trailing moving average,
/// thresholded at a percentile of its own distribution, and the
/// above-threshold runs are merged across short gaps and filtered by
/// minimum duration.
///
/// Pure function of the series. The threshold is self-relative, so a track
/// that is loud throughout yields sections only where it is loud *relative
/// to itself*; a numerically constant intensity yields no sections at all.
pub fn detect_chorus_sections(
    series: &[EnergySample],
    config: &ChorusConfig,
) -> Vec<ChorusSection> {
    if series.is_empty() {
        return Vec::new();
    }

    let smoothed = smoothed_intensity(series, config.smoothing_secs);

    let min = smoothed.iter().copied().fold(f64::INFINITY, f64::min);
    let max = smoothed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(max - min).is_finite() || max - min < 1e-9 {
        return Vec::new();
    }

    let threshold = percentile(&smoothed, config.percentile);

    // Values at the threshold count as elevated unless the threshold sits
    // on the global minimum (floor-clamped tracks would otherwise flag
    // everything).
    let above = |value: f64| {
        if threshold > min {
            value >= threshold
        } else {
            value > threshold
        }
    };

    // Above-threshold runs become candidate intervals
    let mut candidates: Vec<(f64, f64)> = Vec::new();
    let mut run_start: Option<f64> = None;
    for (i, sample) in series.iter().enumerate() {
        if above(smoothed[i]) {
            if run_start.is_none() {
                run_start = Some(sample.time);
            }
        } else if let Some(start) = run_start.take() {
            candidates.push((start, series[i - 1].time));
        }
    }
    if let Some(start) = run_start {
        candidates.push((start, series[series.len() - 1].time));
    }

    // Fuse candidates separated by less than the merge gap
    let mut merged: Vec<(f64, f64)> = Vec::new();
    for (start, end) in candidates {
        match merged.last_mut() {
            Some(prev) if start - prev.1 < config.merge_gap_secs => prev.1 = end,
            _ => merged.push((start, end)),
        }
    }

    let sections: Vec<ChorusSection> = merged
        .into_iter()
        .filter(|&(start, end)| end > start && end - start >= config.min_duration_secs)
        .map(|(start, end)| ChorusSection { start, end })
        .collect();

    log::debug!(
        "Chorus pass: {} sections from {} samples (threshold {threshold:.1} dB)",
        sections.len(),
        series.len()
    );
    sections
}

/// Composite intensity per sample with a trailing moving average.
fn smoothed_intensity(series: &[EnergySample], smoothing_secs: f64) -> Vec<f64> {
    let intensity = |sample: &EnergySample| {
        let bands = sample.bands;
        (f64::from(bands.low) + f64::from(bands.mid) + f64::from(bands.high)) / 3.0
    };

    let mut smoothed = Vec::with_capacity(series.len());
    let mut start = 0usize;
    let mut sum = 0.0f64;
    for i in 0..series.len() {
        sum += intensity(&series[i]);
        while series[start].time < series[i].time - smoothing_secs {
            sum -= intensity(&series[start]);
            start += 1;
        }
        smoothed.push(sum / (i - start + 1) as f64);
    }
    smoothed
}

/// Nearest-rank percentile over a sorted copy; `p` in (0, 1).
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = ((p * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
    sorted[rank - 1]
}
