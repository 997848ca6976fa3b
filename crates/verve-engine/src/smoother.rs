use crate::features::BandVolumes;

/// Per-band attack/release time constants (seconds).
struct SmoothParams {
    attack: f32,
    release: f32,
}

/// Asymmetric attack/release EMA over the three band channels. Rising
/// levels track quickly, falling levels bleed off slower; lower bands get
/// slower constants than the highs.
pub struct BandSmoother {
    state: [f32; BandVolumes::CHANNELS],
    params: [SmoothParams; BandVolumes::CHANNELS],
}

impl BandSmoother {
    /// `floor_db` seeds the state so the first ticks rise out of silence
    /// instead of falling from 0 dB.
    pub fn new(floor_db: f32) -> Self {
        let params = [
            SmoothParams { attack: 0.02, release: 0.15 },  // low
            SmoothParams { attack: 0.01, release: 0.10 },  // mid
            SmoothParams { attack: 0.005, release: 0.08 }, // high
        ];

        Self {
            state: [floor_db; BandVolumes::CHANNELS],
            params,
        }
    }

    /// Smooth raw band values with asymmetric EMA.
    /// dt is time since last call in seconds.
    pub fn smooth(&mut self, raw: &BandVolumes, dt: f32) -> BandVolumes {
        let raw_values = raw.as_slice();
        let mut out = BandVolumes::splat(0.0);
        let out_values = out.as_slice_mut();

        for i in 0..BandVolumes::CHANNELS {
            let target = raw_values[i];
            let rising = target > self.state[i];
            let tau = if rising {
                self.params[i].attack
            } else {
                self.params[i].release
            };
            // EMA coefficient: alpha = 1 - exp(-dt/tau)
            let alpha = 1.0 - (-dt / tau.max(0.001)).exp();
            self.state[i] += alpha * (target - self.state[i]);
            out_values[i] = self.state[i];
        }

        out
    }
}
