use itinera_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};

/// Main Itinera configuration
///
/// Configuration is loaded from (in priority order):
/// 1. `itinera.jsonc` - JSON with comments
/// 2. `itinera.json` - Standard JSON
/// 3. `itinera.yml` / `itinera.yaml` - YAML format
///
/// Also checks hidden variants (`.itinera.*`) and `~/.config/itinera/` for global config.
/// Every section is optional; a missing file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItineraConfig {
    /// WebSocket gateway settings
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Workflow tuning
    #[serde(default)]
    pub planner: PlannerSettings,

    /// External model and search providers
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl ItineraConfig {
    /// Copy of the configuration with every credential replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.providers.gemini.api_key.is_some() {
            config.providers.gemini.api_key = Some(REDACTED.to_string());
        }
        if config.providers.serpapi.api_key.is_some() {
            config.providers.serpapi.api_key = Some(REDACTED.to_string());
        }
        config
    }
}

const REDACTED: &str = "<redacted>";

// ============================================================================
// Gateway Configuration
// ============================================================================

/// WebSocket gateway settings
///
/// # Example
///
/// ```yaml
/// gateway:
///   host: 0.0.0.0
///   port: 8766
///   heartbeat_interval_secs: 5
///   session_idle_timeout_secs: 3600
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Seconds between PING frames on every open connection
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Drop sessions that have not run a turn for this long. Unset keeps
    /// sessions for the lifetime of the process.
    #[serde(default)]
    pub session_idle_timeout_secs: Option<u64>,

    /// How often the idle sweeper runs when a timeout is configured
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            session_idle_timeout_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8766
}

fn default_heartbeat_interval_secs() -> u64 {
    5
}

fn default_sweep_interval_secs() -> u64 {
    60
}

// ============================================================================
// Planner Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerSettings {
    /// Number of most recent history records handed to the extractor
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: GeminiSettings,

    #[serde(default)]
    pub serpapi: SerpApiSettings,
}

/// Google Gemini settings
///
/// `model` serves slot extraction and airport resolution; `synthesis_model`
/// writes the final itinerary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiSettings {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_gemini_synthesis_model")]
    pub synthesis_model: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            synthesis_model: default_gemini_synthesis_model(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_synthesis_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// SerpApi settings (Google Flights and Tripadvisor engines)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerpApiSettings {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_serpapi_base_url")]
    pub base_url: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    /// Results kept per category
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SerpApiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_serpapi_base_url(),
            currency: default_currency(),
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_serpapi_base_url() -> String {
    "https://serpapi.com".to_string()
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_max_results() -> usize {
    5
}
