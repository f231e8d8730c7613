// API server implementation using actix-web

use crate::api::routes;
use crate::database_ops::db::Db;
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::env;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
        })
    }

    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);
        let origins: Vec<String> = self
            .allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        tracing::info!(addr = %bind_addr, origins = ?origins, "starting API server");

        let db_data = web::Data::new(db);
        HttpServer::new(move || {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET"])
                .allow_any_header()
                .max_age(3600);
            for origin in &origins {
                cors = cors.allowed_origin(origin);
            }
            App::new()
                .app_data(db_data.clone())
                .wrap(cors)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("failed to bind {bind_addr}"))?
        .run()
        .await
        .context("api server terminated")
    }
}
