use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model_name: String,
    pub max_input_tokens: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LLMConfig {
    pub default_provider: String,
    pub openrouter: Option<ProviderConfig>,
    pub openai: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    pub ollama: Option<ProviderConfig>,
}

/// Redis cache configuration, used for the profile-pack cache's distributed
/// overlay when enabled.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
    pub ttl_seconds: u64,
    #[serde(default)]
    pub connection_timeout_ms: Option<u64>,
}

/// The numeric knobs the source specification enumerates as environment
/// configuration (§6).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CoreLimitsConfig {
    pub profile_pack_cache_minutes: u64,
    pub max_sql_revisions: u8,
    pub max_model_revisions: u8,
    pub max_sql_rows: u32,
    pub default_merchant_window_days: u32,
    pub num_simulations: u32,
    pub memory_enabled: bool,
    pub llm_timeout_seconds: u64,
}

impl Default for CoreLimitsConfig {
    fn default() -> Self {
        CoreLimitsConfig {
            profile_pack_cache_minutes: 60,
            max_sql_revisions: 1,
            max_model_revisions: 1,
            max_sql_rows: 1000,
            default_merchant_window_days: 90,
            num_simulations: 10_000,
            memory_enabled: false,
            llm_timeout_seconds: 280,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub llm: LLMConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub limits: CoreLimitsConfig,
}
