use anyhow::Context;
use axum::http::HeaderValue;
use std::env;
use std::path::PathBuf;

/// Returns the directory containing the running executable.
/// Falls back to CWD if the exe path cannot be determined.
#[must_use]
pub fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    pub cors_origins: Vec<HeaderValue>,
    /// Path to the service registry source file (TOML).
    pub services_config: String,
    pub probe_timeout_ms: u64,
    pub proxy_timeout_secs: u64,
    pub step_timeout_secs: u64,
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_timeout_secs: u64,
    pub llm_max_tokens: u32,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "4000".to_string());
        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid PORT value '{}': must be an integer between 1 and 65535",
                port_str
            )
        })?;
        if port == 0 {
            anyhow::bail!("Invalid PORT value '0': must be between 1 and 65535");
        }

        // BIND_ADDRESS: defaults to 127.0.0.1 (loopback only).
        // Set to 0.0.0.0 explicitly if network access from other hosts is required.
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(addr) => {
                addr.parse::<std::net::IpAddr>().with_context(|| {
                    format!(
                        "Invalid BIND_ADDRESS '{}': must be a valid IP address (e.g., '127.0.0.1' or '::1')",
                        addr
                    )
                })?;
                addr
            }
            Err(_) => "127.0.0.1".to_string(),
        };

        let cors_origins_str = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

        // Skip invalid CORS origins with a warning instead of failing entirely
        let cors_origins: Vec<HeaderValue> = cors_origins_str
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                    tracing::warn!(
                        "Skipping CORS origin with invalid scheme '{}': must be http:// or https://",
                        trimmed
                    );
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Skipping invalid CORS origin '{}': {}", trimmed, e);
                        None
                    }
                }
            })
            .collect();

        let services_config =
            env::var("FLEET_SERVICES_CONFIG").unwrap_or_else(|_| "services.toml".to_string());

        let probe_timeout_ms = env::var("PROBE_TIMEOUT_MS")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u64>()
            .context("Failed to parse PROBE_TIMEOUT_MS")?;
        if probe_timeout_ms == 0 || probe_timeout_ms > 60_000 {
            anyhow::bail!(
                "PROBE_TIMEOUT_MS must be between 1 and 60000 (got {})",
                probe_timeout_ms
            );
        }

        let proxy_timeout_secs = env::var("PROXY_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("Failed to parse PROXY_TIMEOUT_SECS")?;
        if proxy_timeout_secs == 0 || proxy_timeout_secs > 300 {
            anyhow::bail!(
                "PROXY_TIMEOUT_SECS must be between 1 and 300 (got {})",
                proxy_timeout_secs
            );
        }

        let step_timeout_secs = env::var("STEP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("Failed to parse STEP_TIMEOUT_SECS")?;
        if step_timeout_secs == 0 || step_timeout_secs > 300 {
            anyhow::bail!(
                "STEP_TIMEOUT_SECS must be between 1 and 300 (got {})",
                step_timeout_secs
            );
        }

        let llm_api_url = env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com/chat/completions".to_string());

        let llm_api_key = env::var("LLM_API_KEY").ok();
        if llm_api_key.is_none() {
            tracing::warn!(
                "LLM_API_KEY is not set. Command planning will fail unless the reasoning backend accepts unauthenticated requests."
            );
        }

        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string());

        let llm_timeout_secs = env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".to_string())
            .parse::<u64>()
            .context("Failed to parse LLM_TIMEOUT_SECS")?;
        if llm_timeout_secs == 0 || llm_timeout_secs > 600 {
            anyhow::bail!(
                "LLM_TIMEOUT_SECS must be between 1 and 600 (got {})",
                llm_timeout_secs
            );
        }

        let llm_max_tokens = env::var("LLM_MAX_TOKENS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u32>()
            .context("Failed to parse LLM_MAX_TOKENS")?;

        Ok(Self {
            port,
            bind_address,
            cors_origins,
            services_config,
            probe_timeout_ms,
            proxy_timeout_secs,
            step_timeout_secs,
            llm_api_url,
            llm_api_key,
            llm_model,
            llm_timeout_secs,
            llm_max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests run serially (prevents parallel test interference)
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // Guard to ensure env var cleanup even on panic
    struct EnvGuard(&'static str);

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            std::env::remove_var(self.0);
        }
    }

    #[test]
    fn test_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let config = AppConfig::load().unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.services_config, "services.toml");
        assert_eq!(config.probe_timeout_ms, 3000);
    }

    #[test]
    fn test_probe_timeout_range_validation() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("PROBE_TIMEOUT_MS", "0");
        let _guard = EnvGuard("PROBE_TIMEOUT_MS");

        assert!(AppConfig::load().is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("PORT", "not-a-port");
        let _guard = EnvGuard("PORT");

        assert!(AppConfig::load().is_err());
    }

    #[test]
    fn test_cors_origins_skip_invalid_scheme() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var("CORS_ORIGINS", "http://localhost:3000,file:///etc/passwd");
        let _guard = EnvGuard("CORS_ORIGINS");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.cors_origins.len(), 1);
    }
}
