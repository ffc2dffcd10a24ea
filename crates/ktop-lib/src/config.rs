//! Session configuration

use crate::error::ConfigError;
use crate::models::{DisplayMode, MetricKey};
use std::time::Duration;

/// Widest bar a frame will draw, in glyphs
pub const MAX_BAR_WIDTH: usize = 200;

/// Configuration for a display session
#[derive(Debug, Clone, PartialEq)]
pub struct TopConfig {
    /// Ranking key (default: memory)
    pub metric_key: MetricKey,
    /// Maximum number of rows shown (default: 10)
    pub top_k: usize,
    /// Re-rank and redraw period (default: 2 seconds)
    pub refresh_period: Duration,
    /// Nodes or pods (default: nodes)
    pub display_mode: DisplayMode,
    /// Period between poll cycles (default: 10 seconds)
    pub poll_period: Duration,
    /// Upper bound of the per-fetch start delay (default: 1 second)
    pub jitter_max: Duration,
    /// Bar width in glyphs (default: 20)
    pub bar_width: usize,
    /// Reference CPU ceiling for pods, in cores (default: 100)
    pub pod_cpu_ceiling_cores: f64,
    /// Reference memory ceiling for pods, in MiB (default: 1000)
    pub pod_memory_ceiling_mib: f64,
}

impl Default for TopConfig {
    fn default() -> Self {
        Self {
            metric_key: MetricKey::Memory,
            top_k: 10,
            refresh_period: Duration::from_secs(2),
            display_mode: DisplayMode::Nodes,
            poll_period: Duration::from_secs(10),
            jitter_max: Duration::from_secs(1),
            bar_width: 20,
            pod_cpu_ceiling_cores: 100.0,
            pod_memory_ceiling_mib: 1000.0,
        }
    }
}

impl TopConfig {
    /// Check the configuration before a session starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::NonPositiveTopK);
        }
        if self.refresh_period.is_zero() {
            return Err(ConfigError::ZeroPeriod {
                field: "refresh_period",
            });
        }
        if self.poll_period.is_zero() {
            return Err(ConfigError::ZeroPeriod {
                field: "poll_period",
            });
        }
        if self.bar_width == 0 {
            return Err(ConfigError::ZeroBarWidth);
        }
        if self.bar_width > MAX_BAR_WIDTH {
            return Err(ConfigError::BarWidthTooLarge {
                width: self.bar_width,
                max: MAX_BAR_WIDTH,
            });
        }
        if !valid_ceiling(self.pod_cpu_ceiling_cores) {
            return Err(ConfigError::InvalidCeiling {
                field: "pod_cpu_ceiling_cores",
            });
        }
        if !valid_ceiling(self.pod_memory_ceiling_mib) {
            return Err(ConfigError::InvalidCeiling {
                field: "pod_memory_ceiling_mib",
            });
        }
        Ok(())
    }
}

fn valid_ceiling(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = TopConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.top_k, 10);
        assert_eq!(config.refresh_period, Duration::from_secs(2));
        assert_eq!(config.jitter_max, Duration::from_millis(1000));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let config = TopConfig {
            top_k: 0,
            ..TopConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveTopK));
    }

    #[test]
    fn test_rejects_zero_periods() {
        let config = TopConfig {
            refresh_period: Duration::ZERO,
            ..TopConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod {
                field: "refresh_period"
            })
        );

        let config = TopConfig {
            poll_period: Duration::ZERO,
            ..TopConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_jitter_is_allowed() {
        let config = TopConfig {
            jitter_max: Duration::ZERO,
            ..TopConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bar_width_bounds() {
        let widest = TopConfig {
            bar_width: MAX_BAR_WIDTH,
            ..TopConfig::default()
        };
        assert!(widest.validate().is_ok());

        let config = TopConfig {
            bar_width: 4_000_000_000,
            ..TopConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BarWidthTooLarge {
                width: 4_000_000_000,
                max: MAX_BAR_WIDTH,
            })
        );
    }

    #[test]
    fn test_rejects_bad_ceilings() {
        let config = TopConfig {
            pod_memory_ceiling_mib: f64::NAN,
            ..TopConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCeiling {
                field: "pod_memory_ceiling_mib"
            })
        );

        let config = TopConfig {
            pod_cpu_ceiling_cores: -1.0,
            ..TopConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
