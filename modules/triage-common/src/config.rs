/// Secrets and per-environment values, read from the process environment
/// (and `.env`). Everything else lives in the TOML `FileConfig`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    // FreshService
    pub freshservice_domain: Option<String>,
    pub freshservice_api_key: Option<String>,

    // Gemini
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            freshservice_domain: env_opt("FRESHSERVICE_DOMAIN"),
            freshservice_api_key: env_opt("FRESHSERVICE_API_KEY"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_model: env_opt("GEMINI_MODEL"),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  FRESHSERVICE_DOMAIN: {}", plain_opt(&self.freshservice_domain));
        tracing::info!("  FRESHSERVICE_API_KEY: {}", preview_opt(&self.freshservice_api_key));
        tracing::info!("  GEMINI_API_KEY: {}", preview_opt(&self.gemini_api_key));
        tracing::info!("  GEMINI_MODEL: {}", plain_opt(&self.gemini_model));
    }
}

/// Unset and blank are the same thing.
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First five characters and the length; never the whole secret.
pub fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) => preview(v),
        None => "<not set>".to_string(),
    }
}

fn plain_opt(val: &Option<String>) -> &str {
    val.as_deref().unwrap_or("<not set>")
}
