//! Configuration for the graph activation engine and its background worker.

use serde::{Deserialize, Serialize};

/// Activation dynamics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationConfig {
    /// Activation given to a freshly created node. Default: 1.0
    pub initial_activation: f32,

    /// Floor that decay approaches. Default: 0.1
    pub base_activation: f32,

    /// Fraction of the distance to `base_activation` lost per hour.
    /// Range: (0.0, 1.0]. Default: 0.05
    pub decay_rate: f32,

    /// Maximum hops a spreading job travels. Default: 2
    pub propagation_depth: usize,

    /// Multiplier applied per hop; hop h receives `attenuation^h`.
    /// Range: 0.0-1.0. Default: 0.5
    pub attenuation: f32,

    /// Boost applied by `access` when the caller gives none. Default: 0.1
    pub access_boost: f32,

    /// Boost applied to returned nodes when boost-on-read is enabled.
    /// Default: 0.05
    pub read_boost: f32,

    /// Minimum similarity for auto-connected edges. Default: 0.8
    pub auto_connect_threshold: f32,

    /// Cap on edges created per auto-connect call. Default: 5
    pub max_auto_edges: usize,

    /// Weight of stored activation versus received spread when ranking the
    /// graph pass. Range: 0.0-1.0. Default: 0.5
    pub seed_blend: f32,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            initial_activation: 1.0,
            base_activation: 0.1,
            decay_rate: 0.05,
            propagation_depth: 2,
            attenuation: 0.5,
            access_boost: 0.1,
            read_boost: 0.05,
            auto_connect_threshold: 0.8,
            max_auto_edges: 5,
            seed_blend: 0.5,
        }
    }
}

impl ActivationConfig {
    /// Create config for a narrow, fast-fading graph.
    pub fn narrow() -> Self {
        Self {
            decay_rate: 0.2,
            propagation_depth: 1,
            attenuation: 0.4,
            max_auto_edges: 3,
            ..Default::default()
        }
    }

    /// Create config for a wide, slow-fading graph.
    pub fn wide() -> Self {
        Self {
            decay_rate: 0.01,
            propagation_depth: 4,
            attenuation: 0.7,
            max_auto_edges: 10,
            ..Default::default()
        }
    }

    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        for v in [
            self.initial_activation,
            self.base_activation,
            self.attenuation,
            self.access_boost,
            self.read_boost,
            self.auto_connect_threshold,
            self.seed_blend,
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err("activation parameters must be between 0.0 and 1.0");
            }
        }
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err("decay_rate must be in (0.0, 1.0]");
        }
        if self.propagation_depth == 0 {
            return Err("propagation_depth must be at least 1");
        }
        Ok(())
    }
}

/// Background spreading worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Tick interval in milliseconds. Default: 1000
    pub tick_interval_ms: u64,
    /// Jobs drained per tick. Default: 5
    pub batch_size: usize,
    /// Bounded queue capacity. Default: 1024
    pub queue_capacity: usize,
    /// Apply continuous decay on every tick. Default: true
    pub decay_on_tick: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            batch_size: 5,
            queue_capacity: 1024,
            decay_on_tick: true,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be at least 1");
        }
        if self.batch_size == 0 {
            return Err("batch_size must be at least 1");
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ActivationConfig::default();
        assert!((config.attenuation - 0.5).abs() < 0.01);
        assert!((config.read_boost - 0.05).abs() < 0.001);
        assert_eq!(config.propagation_depth, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ActivationConfig::narrow().validate().is_ok());
        assert!(ActivationConfig::wide().validate().is_ok());
        assert_eq!(ActivationConfig::narrow().propagation_depth, 1);
    }

    #[test]
    fn test_validation_errors() {
        let zero_decay = ActivationConfig {
            decay_rate: 0.0,
            ..Default::default()
        };
        assert!(zero_decay.validate().is_err());

        let bad_attenuation = ActivationConfig {
            attenuation: 1.5,
            ..Default::default()
        };
        assert!(bad_attenuation.validate().is_err());

        let no_depth = ActivationConfig {
            propagation_depth: 0,
            ..Default::default()
        };
        assert!(no_depth.validate().is_err());

        let no_batch = WorkerConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(no_batch.validate().is_err());
    }

    #[test]
    fn test_worker_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.batch_size, 5);
        assert!(config.validate().is_ok());
    }
}
