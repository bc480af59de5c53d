use std::sync::Arc;

use actix_web::middleware::DefaultHeaders;
use actix_web::{web, HttpResponse};
use anyhow::{Context, Result};
use log::*;
use r2d2::Pool;

use infra::persistence::{DocumentConnectionManager, Storage};

pub mod auth;
pub mod config;
pub mod error;
pub mod menu;
#[cfg(test)]
mod test;

use crate::auth::{SigningKeys, TokenValidator};
use crate::config::{Config, MenuConfig};

/// Everything a worker needs to serve requests: the menu over its
/// connection pool, and the token validator with its key cache.
pub struct RustBucks<M: r2d2::ManageConnection> {
    menu: menu::Menu<M>,
    validator: Arc<TokenValidator>,
}

impl RustBucks<DocumentConnectionManager> {
    pub fn new(config: &Config) -> Result<Self> {
        let db = config.postgres.build()?;

        debug!("Init schema");
        db.get()?.setup().context("Setup persistence")?;

        let keys = SigningKeys::remote(&config.auth)?;
        let validator = TokenValidator::new(keys, &config.auth);

        Ok(RustBucks::with_parts(db, validator, &config.menu))
    }
}

impl<M: r2d2::ManageConnection<Connection = D>, D: Storage + Send + 'static> RustBucks<M> {
    pub fn with_parts(db: Pool<M>, validator: TokenValidator, config: &MenuConfig) -> Self {
        let menu = menu::Menu::new(db, config);
        let validator = Arc::new(validator);
        RustBucks { menu, validator }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        info!("Booting rustbucks");
        cfg.app_data(web::Data::from(self.validator.clone()));
        self.menu.configure(cfg);
    }

    /// Loads the identity provider's signing keys before the first request
    /// needs them.
    pub async fn prefetch_keys(&self) -> Result<usize> {
        self.validator.keys().prefetch().await
    }
}

impl<M: r2d2::ManageConnection> Clone for RustBucks<M> {
    fn clone(&self) -> Self {
        RustBucks {
            menu: self.menu.clone(),
            validator: self.validator.clone(),
        }
    }
}

/// Allows the browser frontend to call us from any origin.
pub fn cors() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Headers", "Content-Type, Authorization"))
        .add((
            "Access-Control-Allow-Methods",
            "GET, POST, PATCH, DELETE, OPTIONS",
        ))
}

pub async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}
