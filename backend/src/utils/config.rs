use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub allow_registration: bool,
    pub frontend_url: String,
    pub upload_dir: String,
    pub webhook_secret: String,
    pub auto_create_schema: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 8080)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_expiration_hours: parsed("JWT_EXPIRATION_HOURS", 24)?,
            allow_registration: parsed("ALLOW_REGISTRATION", true)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            webhook_secret: required("WEBHOOK_SECRET")?,
            auto_create_schema: parsed("AUTO_CREATE_SCHEMA", false)?,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{} must be set", key))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} has an invalid value: {}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_hours: 1,
            allow_registration: true,
            frontend_url: "http://localhost:3000".to_string(),
            upload_dir: "uploads".to_string(),
            webhook_secret: "hook-secret".to_string(),
            auto_create_schema: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default() {
        let value: u16 = parsed("STUDENT_HUB_TEST_UNSET_PORT", 9000).unwrap();
        assert_eq!(value, 9000);
    }

    #[test]
    fn test_parsed_rejects_garbage() {
        env::set_var("STUDENT_HUB_TEST_BAD_BOOL", "maybe");
        let result: Result<bool> = parsed("STUDENT_HUB_TEST_BAD_BOOL", false);
        assert!(result.is_err());
    }
}
