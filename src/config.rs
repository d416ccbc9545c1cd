use std::env;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
}

impl Config {
    pub fn from_env() -> Self {
        let raw_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://egraph.db".into());
        let database_url = normalize_sqlite_url(&raw_url);
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);
        let openrouter_api_key = env::var("OPENROUTER_API_KEY").ok();
        let openrouter_model = env::var("OPENROUTER_MODEL")
            .unwrap_or_else(|_| "nvidia/nemotron-3-nano-30b-a3b:free".into());

        Config {
            database_url,
            port,
            openrouter_api_key,
            openrouter_model,
        }
    }
}

/// sqlx expects sqlite://path or sqlite::memory:; accept looser forms.
fn normalize_sqlite_url(input: &str) -> String {
    if input.starts_with("sqlite://") || input.starts_with("sqlite::memory:") {
        return input.to_string();
    }
    if input.starts_with("sqlite:") {
        let rest = input.trim_start_matches("sqlite:");
        return format!("sqlite://{}", rest.trim_start_matches('/'));
    }
    if input.starts_with("file:") {
        return format!("sqlite://{}", input.trim_start_matches("file:"));
    }
    format!("sqlite://{}", input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_sqlite_urls() {
        assert_eq!(normalize_sqlite_url("egraph.db"), "sqlite://egraph.db");
        assert_eq!(normalize_sqlite_url("sqlite:egraph.db"), "sqlite://egraph.db");
        assert_eq!(normalize_sqlite_url("sqlite://egraph.db"), "sqlite://egraph.db");
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("file:x.db"), "sqlite://x.db");
    }
}
