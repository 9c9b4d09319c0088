//! Application state

use std::path::PathBuf;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::BoxError;
use crate::config::{Config, IdentityBackend};
use crate::db::DbService;
use crate::integrations::{
    BlobStore, FirebaseIdentity, IdentityProvider, InMemoryIdentity, LocalBlobStore,
    PaymentProvider, StripeCheckout,
};
use crate::services::{AccountService, CheckoutSettings, IssueService, PaymentService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// Verifies caller tokens
    pub identity: Arc<dyn IdentityProvider>,
    pub issues: IssueService,
    pub accounts: AccountService,
    pub payments: PaymentService,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Directory served under `/uploads`
    pub upload_dir: PathBuf,
}

impl AppState {
    /// Open the database and build the configured collaborators
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let db = DbService::new(&config.database_url).await?;

        let identity: Arc<dyn IdentityProvider> = match config.identity_provider {
            IdentityBackend::Firebase => Arc::new(FirebaseIdentity::new(
                &config.firebase_project_id,
                &config.firebase_api_key,
                &config.firebase_access_token,
            )),
            IdentityBackend::Memory => {
                if !config.is_development() {
                    tracing::warn!(
                        environment = %config.environment,
                        "Using in-memory identity provider: tokens are not verified"
                    );
                }
                Arc::new(InMemoryIdentity::new())
            }
        };
        let payment_provider = Arc::new(StripeCheckout::new(&config.stripe_secret_key));
        let blobs = Arc::new(LocalBlobStore::new(&config.upload_dir, &config.public_base_url));

        Ok(Self::from_parts(config, db.pool, identity, payment_provider, blobs))
    }

    /// Wire services from already-built collaborators
    pub fn from_parts(
        config: &Config,
        pool: SqlitePool,
        identity: Arc<dyn IdentityProvider>,
        payment_provider: Arc<dyn PaymentProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let issues = IssueService::new(pool.clone(), config.free_issue_limit);
        let accounts = AccountService::new(pool.clone(), identity.clone(), blobs);
        let payments = PaymentService::new(
            pool.clone(),
            payment_provider,
            accounts.clone(),
            issues.clone(),
            CheckoutSettings::from(config),
        );

        Self {
            pool,
            identity,
            issues,
            accounts,
            payments,
            stripe_webhook_secret: config.stripe_webhook_secret.clone(),
            upload_dir: PathBuf::from(&config.upload_dir),
        }
    }
}
