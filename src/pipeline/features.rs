//! Fixed-length feature extraction from raw audio.
//!
//! The wake-word and classification stages consume a [`FeatureVector`] of
//! exactly [`FEATURE_LEN`] values, all in [0, 1]: eight energy-band RMS
//! values, the zero-crossing rate, and a simplified spectral centroid.
//! Extraction runs in constant scratch memory regardless of buffer length.

/// Number of values in a feature vector: 8 band energies + ZCR + centroid.
pub const FEATURE_LEN: usize = 10;

const ENERGY_BANDS: usize = 8;

pub type FeatureVector = [f32; FEATURE_LEN];

/// Turns a raw audio buffer into a fixed-length feature vector.
///
/// Implementations must be deterministic and must keep every output value in
/// [0, 1]; scorers rely on bounded inputs.
pub trait FeatureExtractor {
    fn extract(&self, samples: &[i16]) -> FeatureVector;
}

/// Default DSP extractor: banded RMS energy, zero-crossing rate, and a
/// magnitude-weighted positional centroid.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFeatures;

impl SpectralFeatures {
    fn band_rms(samples: &[i16], band: usize) -> f32 {
        let chunk = samples.len() / ENERGY_BANDS;
        if chunk == 0 {
            return 0.0;
        }
        let start = band * chunk;
        let end = if band == ENERGY_BANDS - 1 { samples.len() } else { start + chunk };
        let slice = &samples[start..end];
        let sum_sq: f64 = slice.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_sq / slice.len() as f64).sqrt();
        (rms / i16::MAX as f64) as f32
    }

    fn zero_crossing_rate(samples: &[i16]) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }
        let crossings = samples
            .windows(2)
            .filter(|w| (w[0] >= 0) != (w[1] >= 0))
            .count();
        crossings as f32 / (samples.len() - 1) as f32
    }

    fn spectral_centroid(samples: &[i16]) -> f32 {
        let mut weighted = 0.0f64;
        let mut magnitude = 0.0f64;
        for (i, &s) in samples.iter().enumerate() {
            let m = (s as f64).abs();
            weighted += i as f64 * m;
            magnitude += m;
        }
        if magnitude == 0.0 {
            return 0.0;
        }
        (weighted / magnitude / samples.len() as f64) as f32
    }
}

impl FeatureExtractor for SpectralFeatures {
    fn extract(&self, samples: &[i16]) -> FeatureVector {
        let mut features = [0.0f32; FEATURE_LEN];
        if samples.is_empty() {
            return features;
        }
        for (band, slot) in features.iter_mut().take(ENERGY_BANDS).enumerate() {
            *slot = Self::band_rms(samples, band);
        }
        features[ENERGY_BANDS] = Self::zero_crossing_rate(samples);
        features[ENERGY_BANDS + 1] = Self::spectral_centroid(samples);
        for f in &mut features {
            *f = f.clamp(0.0, 1.0);
        }
        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize, period: usize, amplitude: i16) -> Vec<i16> {
        (0..len)
            .map(|i| if (i / period) % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn silence_extracts_to_zero() {
        let features = SpectralFeatures.extract(&vec![0i16; 512]);
        assert_eq!(features, [0.0; FEATURE_LEN]);
    }

    #[test]
    fn empty_buffer_extracts_to_zero() {
        let features = SpectralFeatures.extract(&[]);
        assert_eq!(features, [0.0; FEATURE_LEN]);
    }

    #[test]
    fn all_values_bounded() {
        let features = SpectralFeatures.extract(&tone(1024, 3, i16::MAX));
        for f in features {
            assert!((0.0..=1.0).contains(&f), "feature {f} out of range");
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let buf = tone(800, 5, 12_000);
        assert_eq!(SpectralFeatures.extract(&buf), SpectralFeatures.extract(&buf));
    }

    #[test]
    fn louder_signal_raises_band_energy() {
        let quiet = SpectralFeatures.extract(&tone(512, 4, 1_000));
        let loud = SpectralFeatures.extract(&tone(512, 4, 20_000));
        assert!(loud[0] > quiet[0]);
    }

    #[test]
    fn zcr_tracks_oscillation_speed() {
        let slow = SpectralFeatures.extract(&tone(512, 16, 8_000));
        let fast = SpectralFeatures.extract(&tone(512, 2, 8_000));
        assert!(fast[8] > slow[8]);
    }
}
