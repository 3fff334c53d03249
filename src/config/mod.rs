//! Configuration (layered: code > env).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<ParleyConfig> = OnceLock::new();

/// API keys and base URLs per backend family.
#[derive(Debug, Clone, Default)]
pub struct ParleyConfig {
    api_keys: Arc<RwLock<HashMap<String, String>>>,
    base_urls: Arc<RwLock<HashMap<String, String>>>,
}

impl ParleyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (OPENAI_API_KEY, ANTHROPIC_API_KEY, ...).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let config = Self::new();

        let key_mappings = [
            ("OPENAI_API_KEY", "openai"),
            ("ANTHROPIC_API_KEY", "anthropic"),
        ];
        for (env_var, backend) in &key_mappings {
            if let Ok(key) = std::env::var(env_var) {
                config.set_api_key(backend, key);
            }
        }

        let url_mappings = [
            ("OPENAI_BASE_URL", "openai"),
            ("ANTHROPIC_BASE_URL", "anthropic"),
        ];
        for (env_var, backend) in &url_mappings {
            if let Ok(url) = std::env::var(env_var) {
                config.set_base_url(backend, url);
            }
        }

        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static ParleyConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn set_api_key(&self, backend: &str, key: String) {
        self.api_keys
            .write()
            .unwrap()
            .insert(backend.to_string(), key);
    }

    pub fn get_api_key(&self, backend: &str) -> Option<String> {
        self.api_keys.read().unwrap().get(backend).cloned()
    }

    pub fn set_base_url(&self, backend: &str, url: String) {
        self.base_urls
            .write()
            .unwrap()
            .insert(backend.to_string(), url);
    }

    pub fn get_base_url(&self, backend: &str) -> Option<String> {
        self.base_urls.read().unwrap().get(backend).cloned()
    }

    pub fn has_credentials(&self, backend: &str) -> bool {
        self.get_api_key(backend).is_some()
    }
}
