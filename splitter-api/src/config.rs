use std::path::PathBuf;

use crate::models::{AppError, DEFAULT_CURRENCY};

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    /// `None` runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    pub places_file: Option<PathBuf>,
    pub default_currency: String,
    pub max_page_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, AppError>
    where F: Fn(&str) -> Option<String> {
        let host = get("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get("PORT").and_then(|s| s.parse::<u16>().ok()).unwrap_or(5001);
        let cors_origins = get("CORS_ORIGINS")
            .map(|s| s.split(',').map(|o| o.trim().to_string()).filter(|o| !o.is_empty()).collect())
            .unwrap_or_else(|| vec!["http://localhost:3000".to_string(), "http://127.0.0.1:3000".to_string()]);
        let jwt_secret = get("JWT_SECRET").ok_or_else(|| AppError::Validation("JWT_SECRET is required".into()))?;
        if jwt_secret.len() < 32 { return Err(AppError::Validation("JWT_SECRET must be at least 32 characters".into())); }
        let database_url = get("DATABASE_URL").filter(|s| !s.is_empty());
        let db_max = get("DB_MAX_CONNECTIONS").and_then(|s| s.parse::<u32>().ok()).unwrap_or(20);
        let upload_dir = get("UPLOAD_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("./uploads"));
        let max_upload = get("MAX_UPLOAD_BYTES").and_then(|s| s.parse::<usize>().ok()).unwrap_or(5 * 1024 * 1024);
        let places_file = get("PLACES_FILE").filter(|s| !s.is_empty()).map(PathBuf::from);
        let default_currency = get("DEFAULT_CURRENCY").filter(|s| !s.is_empty()).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let max_page_size = get("MAX_PAGE_SIZE").and_then(|s| s.parse::<u32>().ok()).unwrap_or(100);
        Ok(Self {
            server: ServerConfig { host, port, cors_origins },
            jwt: JwtConfig { secret: jwt_secret },
            database: DatabaseConfig { url: database_url, max_connections: db_max },
            uploads: UploadConfig { dir: upload_dir, max_bytes: max_upload },
            places_file,
            default_currency,
            max_page_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("JWT_SECRET", SECRET)])).unwrap();
        assert_eq!(cfg.server.port, 5001);
        assert_eq!(cfg.server.cors_origins.len(), 2);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.uploads.dir, PathBuf::from("./uploads"));
        assert_eq!(cfg.default_currency, "INR");
        assert_eq!(cfg.max_page_size, 100);
    }

    #[test]
    fn secret_is_required_and_long() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("JWT_SECRET", "short")])).is_err());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/splitter"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("DEFAULT_CURRENCY", "USD"),
        ]))
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.database.url.as_deref(), Some("postgres://localhost/splitter"));
        assert_eq!(cfg.server.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.default_currency, "USD");
    }
}
