use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tracing::warn;

/// Process-wide configuration, read from the environment once at
/// startup and immutable thereafter.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub allowed_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = match std::env::var("BANTER_JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                warn!("BANTER_JWT_SECRET not set, using built-in development secret");
                "dev-secret-change-me".into()
            }
        };

        let host = std::env::var("BANTER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("BANTER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("invalid BANTER_PORT")?;
        let db_path = std::env::var("BANTER_DB_PATH")
            .unwrap_or_else(|_| "banter.db".into())
            .into();
        let allowed_origin = std::env::var("BANTER_ALLOWED_ORIGIN").ok();

        Ok(Self {
            host,
            port,
            db_path,
            jwt_secret,
            allowed_origin,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Exact-origin CORS when an allowed origin is configured,
    /// permissive otherwise (local development).
    pub fn cors_layer(&self) -> Result<CorsLayer> {
        match &self.allowed_origin {
            Some(origin) => {
                let origin: HeaderValue = origin
                    .parse()
                    .context("invalid BANTER_ALLOWED_ORIGIN")?;
                Ok(CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods([Method::GET, Method::POST])
                    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
            }
            None => Ok(CorsLayer::permissive()),
        }
    }
}
