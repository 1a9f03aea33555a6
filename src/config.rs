use serde::Deserialize;
use std::path::Path;

/// Environment variables whose presence means we are running on a hosted
/// platform, where the local forward proxy is never reachable.
const CLOUD_INDICATORS: &[&str] = &[
    "GITHUB_ACTIONS",
    "RENDER",
    "VERCEL",
    "HEROKU",
    "STREAMLIT_CLOUD",
    "STREAMLIT_APP",
    "CODESPACES",
    "CI",
    "DATABRICKS",
];

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum number of items shown per source
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_limit() -> usize {
    5
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_proxy_address")]
    pub address: String,
}

fn default_proxy_address() -> String {
    "http://127.0.0.1:7897".to_string()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_proxy_address(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,
    /// Number of translation calls allowed in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_target() -> String {
    "zh-CN".to_string()
}

fn default_translate_endpoint() -> String {
    "https://translate.googleapis.com/translate_a/single".to_string()
}

fn default_concurrency() -> usize {
    4
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target: default_target(),
            endpoint: default_translate_endpoint(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_reuters_domain")]
    pub reuters_domain: String,
    #[serde(default = "default_bloomberg_domain")]
    pub bloomberg_domain: String,
    /// Mirror feeds, tried in order
    #[serde(default = "default_musk_mirrors")]
    pub musk_mirrors: Vec<String>,
    #[serde(default = "default_musk_query")]
    pub musk_query: String,
}

fn default_search_url() -> String {
    "https://news.google.com/rss/search".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_reuters_domain() -> String {
    "reuters.com".to_string()
}

fn default_bloomberg_domain() -> String {
    "bloomberg.com".to_string()
}

fn default_musk_mirrors() -> Vec<String> {
    vec![
        "https://nitter.privacydev.net/elonmusk/rss".to_string(),
        "https://nitter.poast.org/elonmusk/rss".to_string(),
        "https://nitter.42l.fr/elonmusk/rss".to_string(),
    ]
}

fn default_musk_query() -> String {
    "Elon Musk".to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            language: default_language(),
            reuters_domain: default_reuters_domain(),
            bloomberg_domain: default_bloomberg_domain(),
            musk_mirrors: default_musk_mirrors(),
            musk_query: default_musk_query(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            limit: default_limit(),
            proxy: ProxyConfig::default(),
            translation: TranslationConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

/// Fully resolved per-pass settings handed to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub use_proxy: bool,
    pub proxy: String,
    pub limit: usize,
}

impl Settings {
    /// The proxy address to route through, if any.
    pub fn proxy(&self) -> Option<&str> {
        if self.use_proxy && !self.proxy.trim().is_empty() {
            Some(self.proxy.trim())
        } else {
            None
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Resolve settings against the current process environment.
    pub fn settings(&self) -> Settings {
        self.settings_with(|key| std::env::var(key).ok())
    }

    /// Resolve settings, looking environment variables up through `lookup`.
    ///
    /// In cloud mode the proxy is disabled and its address blanked.
    pub fn settings_with<F>(&self, lookup: F) -> Settings
    where
        F: Fn(&str) -> Option<String>,
    {
        let cloud = running_in_cloud(lookup);
        Settings {
            use_proxy: self.proxy.enabled && !cloud,
            proxy: if cloud {
                String::new()
            } else {
                self.proxy.address.clone()
            },
            limit: self.limit.clamp(MIN_LIMIT, MAX_LIMIT),
        }
    }
}

pub fn running_in_cloud<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    CLOUD_INDICATORS
        .iter()
        .any(|key| lookup(key).is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(default_limit(), 5);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
            limit = 3

            [proxy]
            enabled = false
            address = "http://10.0.0.1:8080"

            [translation]
            target = "ja"

            [sources]
            reuters_domain = "reuters.co.uk"
            musk_mirrors = ["https://mirror.example.com/rss"]
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.limit, 3);
        assert!(!config.proxy.enabled);
        assert_eq!(config.proxy.address, "http://10.0.0.1:8080");
        assert_eq!(config.translation.target, "ja");
        assert!(config.translation.enabled);
        assert_eq!(config.sources.reuters_domain, "reuters.co.uk");
        assert_eq!(config.sources.bloomberg_domain, "bloomberg.com");
        assert_eq!(config.sources.musk_mirrors.len(), 1);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();

        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.limit, 5);
        assert!(config.proxy.enabled);
        assert_eq!(config.proxy.address, "http://127.0.0.1:7897");
        assert_eq!(config.translation.target, "zh-CN");
        assert_eq!(config.sources.musk_mirrors.len(), 3);
        assert_eq!(config.sources.musk_query, "Elon Musk");
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let content = "this is not valid toml {{{";

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();

        let result = Config::load(temp_file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let result = Config::from_str("limit = \"five\"");
        assert!(result.is_err());
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn test_local_settings_keep_proxy() {
            let config = Config::default();
            let settings = config.settings_with(no_env);

            assert!(settings.use_proxy);
            assert_eq!(settings.proxy(), Some("http://127.0.0.1:7897"));
            assert_eq!(settings.limit, 5);
        }

        #[test]
        fn test_cloud_disables_proxy() {
            let env: HashMap<&str, &str> = HashMap::from([("RENDER", "true")]);
            let config = Config::default();
            let settings = config.settings_with(|k| env.get(k).map(|v| v.to_string()));

            assert!(!settings.use_proxy);
            assert_eq!(settings.proxy, "");
            assert_eq!(settings.proxy(), None);
        }

        #[test]
        fn test_empty_indicator_is_not_cloud() {
            assert!(!running_in_cloud(|k| (k == "CI").then(String::new)));
            assert!(running_in_cloud(|k| (k == "CI").then(|| "1".to_string())));
        }

        #[test]
        fn test_limit_is_clamped() {
            let mut config = Config::default();
            config.limit = 0;
            assert_eq!(config.settings_with(no_env).limit, 1);
            config.limit = 50;
            assert_eq!(config.settings_with(no_env).limit, 10);
        }

        #[test]
        fn test_blank_proxy_address_means_direct() {
            let settings = Settings {
                use_proxy: true,
                proxy: "  ".to_string(),
                limit: 5,
            };
            assert_eq!(settings.proxy(), None);
        }
    }
}
