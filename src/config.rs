use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub funnel: FunnelEnvConfig,
    pub generation: GenerationConfig,
}

/// Environment overrides for the scheduler knobs. Parsed leniently; the
/// combined result is validated by `FunnelConfig::from_env`.
#[derive(Debug, Clone)]
pub struct FunnelEnvConfig {
    pub focus_ratio: f64,
    pub batch_min: u32,
    pub batch_max: u32,
    pub generation_max_attempts: u32,
}

#[derive(Clone)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub mock: bool,
    pub api_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("cors_origin", &self.cors_origin)
            .field("funnel", &self.funnel)
            .field("generation", &self.generation)
            .finish()
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("enabled", &self.enabled)
            .field("mock", &self.mock)
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/practice.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            funnel: FunnelEnvConfig {
                focus_ratio: env_or_parse("FUNNEL_FOCUS_RATIO", 0.6_f64),
                batch_min: env_or_parse("FUNNEL_BATCH_MIN", 3_u32),
                batch_max: env_or_parse("FUNNEL_BATCH_MAX", 20_u32),
                generation_max_attempts: env_or_parse("FUNNEL_GENERATION_ATTEMPTS", 3_u32),
            },
            generation: GenerationConfig {
                enabled: env_or_bool("GENERATION_ENABLED", false),
                mock: env_or_bool("GENERATION_MOCK", true),
                api_url: env_or("GENERATION_API_URL", ""),
                api_key: env_or("GENERATION_API_KEY", ""),
                timeout_secs: env_or_parse("GENERATION_TIMEOUT_SECS", 30_u64),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "FUNNEL_BATCH_MAX",
            "FUNNEL_FOCUS_RATIO",
            "GENERATION_ENABLED",
            "GENERATION_MOCK",
            "GENERATION_TIMEOUT_SECS",
            "GENERATION_API_KEY",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.funnel.batch_max, 20);
        assert!(!cfg.generation.enabled);
        assert!(cfg.generation.mock);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("FUNNEL_BATCH_MAX", "12");
        env::set_var("GENERATION_TIMEOUT_SECS", "42");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.funnel.batch_max, 12);
        assert_eq!(cfg.generation.timeout_secs, 42);

        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("FUNNEL_FOCUS_RATIO", "lots");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.funnel.focus_ratio, 0.6);

        clear_keys(managed_keys());
    }

    #[test]
    fn generation_flags_parse() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("GENERATION_ENABLED", "true");
        env::set_var("GENERATION_MOCK", "false");

        let cfg = Config::from_env();
        assert!(cfg.generation.enabled);
        assert!(!cfg.generation.mock);

        clear_keys(managed_keys());
    }

    #[test]
    fn debug_redacts_api_key() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("GENERATION_API_KEY", "super-secret");
        let cfg = Config::from_env();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));

        clear_keys(managed_keys());
    }
}
