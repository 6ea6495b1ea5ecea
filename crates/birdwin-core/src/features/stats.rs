use crate::config::NormalizationConfig;

/// Streaming mean and variance over feature values (Welford)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl FeatureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, values: &[f32]) {
        for &v in values {
            let v = v as f64;
            self.count += 1;
            let delta = v - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (v - self.mean);
        }
    }

    /// Combine statistics gathered on disjoint data
    pub fn merge(&self, other: &FeatureStats) -> FeatureStats {
        if self.count == 0 {
            return *other;
        }
        if other.count == 0 {
            return *self;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let mean = self.mean + delta * other.count as f64 / count as f64;
        let m2 = self.m2
            + other.m2
            + delta * delta * self.count as f64 * other.count as f64 / count as f64;
        FeatureStats { count, mean, m2 }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation
    pub fn std(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    /// None until at least one value with non-zero spread was seen
    pub fn to_normalization(&self) -> Option<NormalizationConfig> {
        let std = self.std();
        if self.count == 0 || std <= f64::EPSILON {
            return None;
        }
        Some(NormalizationConfig {
            mel_mean: self.mean as f32,
            mel_std: std as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_std() {
        let mut stats = FeatureStats::new();
        stats.update(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count(), 8);
        assert_relative_eq!(stats.mean(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let values: Vec<f32> = (0..100).map(|i| (i as f32 * 0.37).sin() * 10.0).collect();

        let mut whole = FeatureStats::new();
        whole.update(&values);

        let mut left = FeatureStats::new();
        let mut right = FeatureStats::new();
        left.update(&values[..37]);
        right.update(&values[37..]);
        let merged = left.merge(&right);

        assert_eq!(merged.count(), whole.count());
        assert_relative_eq!(merged.mean(), whole.mean(), epsilon = 1e-9);
        assert_relative_eq!(merged.std(), whole.std(), epsilon = 1e-9);
        assert_eq!(FeatureStats::new().merge(&whole), whole);
    }

    #[test]
    fn test_degenerate_stats_give_no_normalization() {
        assert!(FeatureStats::new().to_normalization().is_none());

        let mut constant = FeatureStats::new();
        constant.update(&[3.0; 10]);
        assert!(constant.to_normalization().is_none());

        let mut stats = FeatureStats::new();
        stats.update(&[-1.0, 1.0]);
        let norm = stats.to_normalization().unwrap();
        assert_eq!(norm.mel_mean, 0.0);
        assert_eq!(norm.mel_std, 1.0);
    }
}
