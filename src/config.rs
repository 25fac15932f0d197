use std::env;

/// Environment-supplied configuration. Every credential is optional: missing
/// content-API credentials switch fetching to the public endpoint, a missing
/// model key switches classification to the keyword fallback.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub openai_api_key: Option<String>,
    pub database_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            reddit_client_id: non_empty_var("REDDIT_CLIENT_ID"),
            reddit_client_secret: non_empty_var("REDDIT_CLIENT_SECRET"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:leads.db".to_string()),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
