use regex::Regex;
use shared_types::AppConfig;
use std::env;
use std::fs;

/// Load a single TOML config file and perform simple environment interpolation
/// for occurrences of `{{VAR}}` or `${VAR}`.
pub fn load_single_config(path: &str) -> Result<AppConfig, String> {
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;

    // Regex to find {{VAR_NAME}} or ${VAR_NAME}
    let re = Regex::new(r"(\{\{|\$\{)([a-zA-Z0-9_]+)(\}\}|\})")
        .map_err(|e| format!("Failed to create regex: {}", e))?;

    let processed_content = re.replace_all(&content, |caps: &regex::Captures| {
        let var_name = &caps[2];
        env::var(var_name).unwrap_or_else(|_| format!("{{{{{{{}}}}}}}", var_name))
    });

    let config: AppConfig = toml::from_str(&processed_content)
        .map_err(|e| format!("Failed to parse config file: {}", e))?;
    Ok(config)
}

/// Backwards-compatible wrapper for older call sites. This now just delegates
/// to `load_single_config`.
pub fn load_config(path: &str) -> Result<AppConfig, String> {
    load_single_config(path)
}

/// Merge two AppConfig instances, treating `overlay` as an environment-specific
/// override on top of `base`.
///
/// Rules:
/// - `llm.default_provider` in overlay replaces base when non-empty.
/// - For each provider under `llm`, a present overlay entry replaces base.
/// - `redis`, when present in overlay, replaces base wholesale.
/// - `limits` is merged field-by-field, with zero/false overlay values
///   treated as "not set" and falling back to base.
pub fn merge_app_config(base: AppConfig, overlay: AppConfig) -> AppConfig {
    let mut merged_llm = base.llm;

    if !overlay.llm.default_provider.is_empty() {
        merged_llm.default_provider = overlay.llm.default_provider;
    }

    macro_rules! merge_provider {
        ($field:ident) => {
            if let Some(ov) = overlay.llm.$field {
                merged_llm.$field = Some(ov);
            }
        };
    }

    merge_provider!(openrouter);
    merge_provider!(openai);
    merge_provider!(anthropic);
    merge_provider!(ollama);

    let merged_redis = overlay.redis.or(base.redis);
    let merged_limits = merge_limits(base.limits, overlay.limits);

    AppConfig {
        llm: merged_llm,
        redis: merged_redis,
        limits: merged_limits,
    }
}

fn merge_limits(
    base: shared_types::CoreLimitsConfig,
    overlay: shared_types::CoreLimitsConfig,
) -> shared_types::CoreLimitsConfig {
    let defaults = shared_types::CoreLimitsConfig::default();

    macro_rules! pick {
        ($field:ident) => {
            if overlay.$field != defaults.$field {
                overlay.$field
            } else {
                base.$field
            }
        };
    }

    shared_types::CoreLimitsConfig {
        profile_pack_cache_minutes: pick!(profile_pack_cache_minutes),
        max_sql_revisions: pick!(max_sql_revisions),
        max_model_revisions: pick!(max_model_revisions),
        max_sql_rows: pick!(max_sql_rows),
        default_merchant_window_days: pick!(default_merchant_window_days),
        num_simulations: pick!(num_simulations),
        memory_enabled: overlay.memory_enabled || base.memory_enabled,
        llm_timeout_seconds: pick!(llm_timeout_seconds),
    }
}

/// Load configuration using an environment profile, overlaying
/// `data/config.<env>.toml` on top of the base `data/config.toml`.
///
/// Example:
/// - base_path: "data/config.toml"
/// - env: "dev" | "staging" | "prod"
pub fn load_app_config_with_env(base_path: &str, env_name: &str) -> Result<AppConfig, String> {
    let base = load_single_config(base_path)?;

    let env = env_name.to_lowercase();
    let overlay_path = format!("data/config.{}.toml", env);

    // Try to load the overlay; if it does not exist, just return base.
    let overlay = match load_single_config(&overlay_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            if e.contains("Failed to read config file") {
                return Ok(base);
            }
            return Err(e);
        }
    };

    Ok(merge_app_config(base, overlay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{CoreLimitsConfig, LLMConfig};
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_minimal_app_config(default_provider: &str, max_sql_rows: u32) -> AppConfig {
        AppConfig {
            llm: LLMConfig {
                default_provider: default_provider.to_string(),
                openrouter: None,
                openai: None,
                anthropic: None,
                ollama: None,
            },
            redis: None,
            limits: CoreLimitsConfig {
                max_sql_rows,
                ..CoreLimitsConfig::default()
            },
        }
    }

    #[test]
    fn load_single_config_substitutes_env_vars_brace_syntax() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "{}",
            r#"[llm]
default_provider = "openrouter"

[llm.openrouter]
api_key = "{{OPENROUTER_API_KEY}}"
model_name = "test-model"
"#
        )
        .expect("write config");

        env::set_var("OPENROUTER_API_KEY", "test-key-123");

        let path_str = file.path().to_str().unwrap().to_string();
        let cfg = load_single_config(&path_str).expect("config should load");

        assert_eq!(cfg.llm.default_provider, "openrouter");
        let openrouter = cfg.llm.openrouter.expect("openrouter config present");
        assert_eq!(openrouter.api_key.as_deref(), Some("test-key-123"));
        assert_eq!(openrouter.model_name, "test-model");
    }

    #[test]
    fn load_single_config_substitutes_env_vars_dollar_syntax() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "{}",
            r#"[llm]
default_provider = "anthropic"

[llm.anthropic]
api_key = "${ANTHROPIC_API_KEY}"
model_name = "claude-test"
"#
        )
        .expect("write config");

        env::set_var("ANTHROPIC_API_KEY", "anthropic-key-xyz");

        let path_str = file.path().to_str().unwrap().to_string();
        let cfg = load_single_config(&path_str).expect("config should load");

        assert_eq!(cfg.llm.default_provider, "anthropic");
        let anthropic = cfg.llm.anthropic.expect("anthropic config present");
        assert_eq!(anthropic.api_key.as_deref(), Some("anthropic-key-xyz"));
        assert_eq!(anthropic.model_name, "claude-test");
    }

    #[test]
    fn merge_app_config_overlay_wins_for_llm_and_limits() {
        let base = make_minimal_app_config("openrouter", 1000);
        let overlay = make_minimal_app_config("openai", 500);

        let merged = merge_app_config(base, overlay);

        assert_eq!(merged.llm.default_provider, "openai");
        assert_eq!(merged.limits.max_sql_rows, 500);
    }

    #[test]
    fn merge_app_config_keeps_base_limit_when_overlay_is_default() {
        let base = make_minimal_app_config("openrouter", 2000);
        let overlay_config = AppConfig {
            llm: LLMConfig {
                default_provider: "".to_string(),
                openrouter: None,
                openai: None,
                anthropic: None,
                ollama: None,
            },
            redis: None,
            limits: CoreLimitsConfig::default(),
        };

        let merged = merge_app_config(base, overlay_config);
        assert_eq!(merged.limits.max_sql_rows, 2000);
        assert_eq!(merged.llm.default_provider, "openrouter");
    }
}
