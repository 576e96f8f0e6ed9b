//! Layered configuration (spec §6.5): defaults → config file → environment
//! → CLI flags. Shaped after the teacher's nested `MCPConfig`/`ServerConfig`
//! structs, loaded with the `config` crate rather than hand-rolled parsing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enable: Vec::new(),
            disable: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub global_s: u64,
    pub per_tool_s: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            global_s: 1800,
            per_tool_s: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum CrossLayerModeConfig {
    #[serde(rename = "sequential")]
    Sequential,
    #[serde(rename = "pipelined")]
    Pipelined,
}

impl Default for CrossLayerModeConfig {
    fn default() -> Self {
        CrossLayerModeConfig::Sequential
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub max_parallel_per_layer: u32,
    pub cross_layer_mode: CrossLayerModeConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel_per_layer: 4,
            cross_layer_mode: CrossLayerModeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub fp_priors_path: Option<String>,
    pub taxonomy_map_path: Option<String>,
    pub compliance_map_path: Option<String>,
    pub cross_validation_required: Vec<String>,
    pub single_tool_max_confidence: f64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            fp_priors_path: None,
            taxonomy_map_path: None,
            compliance_map_path: None,
            cross_validation_required: vec![
                "reentrancy-eth".to_string(),
                "arbitrary-send".to_string(),
                "controlled-delegatecall".to_string(),
                "self-destruct".to_string(),
                "unprotected-upgrade".to_string(),
            ],
            single_tool_max_confidence: 0.60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub subscriber_buffer: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerNetConfig {
    pub host: String,
    pub port: u16,
    /// Largest inline/uploaded contract source the RPC/REST boundary will
    /// accept before rejecting `run_audit` with `INPUT_INVALID` (spec §4.8
    /// "per-request resource caps").
    pub max_contract_bytes: usize,
    /// Upper bound on audits the coordinator will run concurrently; beyond
    /// this, `run_audit` is rejected rather than queued (spec §4.8).
    pub max_concurrent_audits: usize,
}

impl Default for ServerNetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8731,
            max_contract_bytes: 2 * 1024 * 1024,
            max_concurrent_audits: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AocConfig {
    pub profile: Option<String>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub server: ServerNetConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AocConfig {
    /// Builds the layered configuration: compiled-in defaults, then an
    /// optional config file, then `AOC_`-prefixed environment variables.
    /// CLI flags are layered on top by the caller (aoc-cli) after this
    /// returns, matching spec §6.5's precedence order.
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AocConfig::default())?);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AOC")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_profile_resolution_table() {
        let cfg = AocConfig::default();
        assert_eq!(cfg.correlation.single_tool_max_confidence, 0.60);
        assert_eq!(cfg.bus.subscriber_buffer, 1024);
        assert_eq!(cfg.server.port, 8731);
    }
}
