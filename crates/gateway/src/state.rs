//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::GatewayConfig;
use crate::db::PgEntitlementStore;
use crate::paypal::{PayPalClient, PayPalError};
use crate::services::CheckoutService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to the database pool,
/// configuration, the processor client, and the capture coordinator.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GatewayConfig,
    pool: PgPool,
    paypal: PayPalClient,
    checkout: CheckoutService<PayPalClient, PgEntitlementStore>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor HTTP client fails to build.
    pub fn new(config: GatewayConfig, pool: PgPool) -> Result<Self, PayPalError> {
        let paypal = PayPalClient::new(&config.paypal)?;
        let checkout =
            CheckoutService::new(paypal.clone(), PgEntitlementStore::new(pool.clone()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                paypal,
                checkout,
            }),
        })
    }

    /// Get a reference to the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the PayPal API client.
    #[must_use]
    pub fn paypal(&self) -> &PayPalClient {
        &self.inner.paypal
    }

    /// Get a reference to the capture coordinator.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService<PayPalClient, PgEntitlementStore> {
        &self.inner.checkout
    }
}
