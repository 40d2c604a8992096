//! Engine configuration

use serde::{Deserialize, Serialize};

/// Timing and behavior knobs for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Settle delay around dispatched clicks (milliseconds)
    pub settle_delay_ms: u64,

    /// Slice size for pause-aware sleeps; a pause lands within one slice
    pub wait_slice_ms: u64,

    /// Route post-step trailing delays through the pause-aware sleep.
    /// Off by default: trailing delays historically run as a plain sleep,
    /// unlike wait steps and loop delays which always observe pause.
    pub pause_aware_post_delay: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 300,
            wait_slice_ms: 100,
            pause_aware_post_delay: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.settle_delay_ms, 300);
        assert_eq!(config.wait_slice_ms, 100);
        assert!(!config.pause_aware_post_delay);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"settleDelayMs":0}"#).unwrap();
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.wait_slice_ms, 100);
    }
}
