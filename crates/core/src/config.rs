use serde::Deserialize;

/// Root application configuration. Loaded from environment variables with
/// the prefix `THEMA_REFRESH__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Theme driving generated copy and the themed label, e.g. `singles_day`.
    #[serde(default = "default_theme")]
    pub theme: String,
    /// Log intended mutations and return synthetic successes instead of
    /// calling the remote API.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bookkeeping label names attached during a refresh pass.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelConfig {
    /// Attached to every ad this engine creates.
    #[serde(default = "default_ad_label")]
    pub ad_label: String,
    /// Attached to the creative a new ad supersedes.
    #[serde(default = "default_original_label")]
    pub original_label: String,
    /// Attached to processed ad groups; its presence makes a later run skip
    /// the ad group entirely.
    #[serde(default = "default_done_label")]
    pub done_label: String,
}

impl LabelConfig {
    /// Label derived from the theme, e.g. `singles_day` → `SINGLES_DAY`.
    pub fn theme_label(&self, theme: &str) -> String {
        theme.to_uppercase()
    }

    /// Every label name one refresh pass needs to exist.
    pub fn required_names(&self, theme: &str) -> Vec<String> {
        vec![
            self.theme_label(theme),
            self.ad_label.clone(),
            self.original_label.clone(),
            self.done_label.clone(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of accounts processed simultaneously.
    #[serde(default = "default_max_concurrent_accounts")]
    pub max_concurrent_accounts: usize,
}

/// Exponential backoff settings for transient remote errors.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Total attempt budget, including the first call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

// Default functions
fn default_theme() -> String {
    "singles_day".to_string()
}
fn default_ad_label() -> String {
    "THEMA_AD".to_string()
}
fn default_original_label() -> String {
    "THEMA_ORIGINAL".to_string()
}
fn default_done_label() -> String {
    "THEMA_DONE".to_string()
}
fn default_max_concurrent_accounts() -> usize {
    8
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            ad_label: default_ad_label(),
            original_label: default_original_label(),
            done_label: default_done_label(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_accounts: default_max_concurrent_accounts(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            dry_run: false,
            labels: LabelConfig::default(),
            performance: PerformanceConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("THEMA_REFRESH")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
