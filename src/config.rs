use std::env;

/// Runtime configuration, read once at startup. Unset or unparseable values
/// fall back to the development defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the API listens on (`PORT`).
    pub port: u16,
    /// SQLite database location (`DATABASE_URL`).
    pub database_url: String,
    /// Allowed CORS origin for the browser client (`FRONTEND_URL`).
    pub frontend_origin: String,
    /// Secret the access tokens are signed with (`JWT_SECRET`).
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(5001),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/events.db".to_string()),
            frontend_origin: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-key".to_string()),
        }
    }
}
