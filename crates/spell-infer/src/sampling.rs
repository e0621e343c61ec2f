use crate::{InferError, Result};
use candle_transformers::generation::Sampling;
use std::ops::RangeInclusive;

/// Caller-facing ranges for the UI sliders. The core does not enforce them.
pub const MAX_LENGTH_RANGE: RangeInclusive<usize> = 50..=800;
pub const MAX_LENGTH_STEP: usize = 50;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 0.1..=1.9;
pub const TEMPERATURE_STEP: f64 = 0.1;
pub const TOP_K_RANGE: RangeInclusive<i64> = 0..=1000;
pub const TOP_K_STEP: i64 = 10;
pub const TOP_P_RANGE: RangeInclusive<f64> = 0.0..=1.0;
pub const TOP_P_STEP: f64 = 0.1;

/// Decoding knobs for one generation call.
///
/// A fresh value is passed into every call; nothing here is stored on the
/// model. `max_length` counts the prompt tokens plus the generated tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f64,
    /// 0 disables top-k filtering.
    pub top_k: i64,
    /// 1.0 disables nucleus filtering.
    pub top_p: f64,
    pub max_length: usize,
    /// Fixed RNG seed, or `None` for a fresh one per call.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 50,
            top_p: 1.0,
            max_length: 400,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn new(temperature: f64, top_k: i64, top_p: f64, max_length: usize) -> Self {
        Self {
            temperature,
            top_k,
            top_p,
            max_length,
            seed: None,
        }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..self
        }
    }

    /// Same knobs with `max_length` capped to `cap`.
    pub fn capped(self, cap: usize) -> Self {
        Self {
            max_length: self.max_length.min(cap),
            ..self
        }
    }

    /// Reject values the decoder cannot honor.
    ///
    /// `context` is the model's maximum sequence length.
    pub fn validate(&self, context: usize) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            return Err(InferError::Generation(format!(
                "temperature must be a strictly positive float, got {}",
                self.temperature
            )));
        }
        if self.top_k < 0 {
            return Err(InferError::Generation(format!(
                "top_k must be a non-negative integer, got {}",
                self.top_k
            )));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(InferError::Generation(format!(
                "top_p must be a float between 0 and 1, got {}",
                self.top_p
            )));
        }
        if self.max_length == 0 {
            return Err(InferError::Generation(
                "max_length must be a positive integer".to_string(),
            ));
        }
        if self.max_length > context {
            return Err(InferError::Generation(format!(
                "max_length {} exceeds the model context of {} tokens",
                self.max_length, context
            )));
        }
        Ok(())
    }

    /// Map onto candle's sampling strategies.
    ///
    /// Nucleus filtering always keeps the most likely token, so `top_p`
    /// of 0 is greedy decoding.
    pub fn sampling(&self) -> Sampling {
        let temperature = self.temperature;
        let k = usize::try_from(self.top_k).unwrap_or(0);
        let p = self.top_p;
        if p <= 0.0 {
            return Sampling::ArgMax;
        }
        match (k > 0, p < 1.0) {
            (false, false) => Sampling::All { temperature },
            (true, false) => Sampling::TopK { k, temperature },
            (false, true) => Sampling::TopP { p, temperature },
            (true, true) => Sampling::TopKThenTopP { k, p, temperature },
        }
    }

    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_slider_defaults() {
        let config = SamplingConfig::default();
        assert_eq!(config.max_length, 400);
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.top_k, 50);
        assert_eq!(config.top_p, 1.0);
        assert!(MAX_LENGTH_RANGE.contains(&config.max_length));
        assert!(TOP_K_RANGE.contains(&config.top_k));
    }

    #[test]
    fn test_capped_only_touches_max_length() {
        let config = SamplingConfig::new(0.7, 40, 0.9, 400).with_seed(3);
        let capped = config.capped(50);
        assert_eq!(capped.max_length, 50);
        assert_eq!(capped.temperature, 0.7);
        assert_eq!(capped.top_k, 40);
        assert_eq!(capped.top_p, 0.9);
        assert_eq!(capped.seed, Some(3));
        assert_eq!(SamplingConfig::new(1.0, 0, 1.0, 30).capped(50).max_length, 30);
    }

    #[test]
    fn test_validate_accepts_slider_extremes() {
        for (t, k, p, len) in [(0.1, 0, 0.0, 50), (1.9, 1000, 1.0, 800)] {
            assert!(SamplingConfig::new(t, k, p, len).validate(1024).is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_negative_top_k() {
        let err = SamplingConfig::new(1.0, -1, 1.0, 100).validate(1024).unwrap_err();
        assert!(matches!(err, InferError::Generation(_)));
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_validate_rejects_bad_floats() {
        assert!(SamplingConfig::new(0.0, 0, 1.0, 100).validate(1024).is_err());
        assert!(SamplingConfig::new(f64::NAN, 0, 1.0, 100).validate(1024).is_err());
        assert!(SamplingConfig::new(1.0, 0, 1.5, 100).validate(1024).is_err());
        assert!(SamplingConfig::new(1.0, 0, -0.1, 100).validate(1024).is_err());
    }

    #[test]
    fn test_validate_rejects_lengths() {
        assert!(SamplingConfig::new(1.0, 0, 1.0, 0).validate(1024).is_err());
        assert!(SamplingConfig::new(1.0, 0, 1.0, 2048).validate(1024).is_err());
    }

    #[test]
    fn test_sampling_strategy_selection() {
        let s = SamplingConfig::new(0.8, 0, 1.0, 100).sampling();
        assert!(matches!(s, Sampling::All { .. }));
        let s = SamplingConfig::new(0.8, 50, 1.0, 100).sampling();
        assert!(matches!(s, Sampling::TopK { k: 50, .. }));
        let s = SamplingConfig::new(0.8, 0, 0.9, 100).sampling();
        assert!(matches!(s, Sampling::TopP { .. }));
        let s = SamplingConfig::new(0.8, 10, 0.5, 100).sampling();
        assert!(matches!(s, Sampling::TopKThenTopP { k: 10, .. }));
    }

    #[test]
    fn test_zero_top_p_is_greedy() {
        let s = SamplingConfig::new(0.8, 0, 0.0, 100).sampling();
        assert!(matches!(s, Sampling::ArgMax));
        let s = SamplingConfig::new(1.5, 40, 0.0, 100).sampling();
        assert!(matches!(s, Sampling::ArgMax));
    }

    #[test]
    fn test_fixed_seed_is_kept() {
        assert_eq!(SamplingConfig::default().with_seed(42).resolve_seed(), 42);
    }
}
