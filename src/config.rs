//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the viewport engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Quiescence window for coalescing bursts of range changes into a
    /// single backing-store query.
    pub debounce: Duration,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

impl ViewportConfig {
    /// Override the debounce window.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_debounce_is_half_a_second() {
        assert_eq!(ViewportConfig::default().debounce, Duration::from_millis(500));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ViewportConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(config, ViewportConfig::default());
    }
}
