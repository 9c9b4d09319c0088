//! Server configuration

use crate::BoxError;

/// Which identity provider backs authentication and staff accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityBackend {
    /// Firebase Identity Toolkit (REST)
    Firebase,
    /// Process-local accounts; tokens are `dev:<email>`
    Memory,
}

impl IdentityBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firebase => "firebase",
            Self::Memory => "memory",
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP port
    pub http_port: u16,
    /// SQLite connection URL
    pub database_url: String,
    /// Issues a non-premium user may report
    pub free_issue_limit: i64,
    /// Directory for uploaded photos
    pub upload_dir: String,
    /// Public URL prefix under which uploads are served
    pub public_base_url: String,
    pub identity_provider: IdentityBackend,
    pub firebase_project_id: String,
    /// Web API key (id token verification)
    pub firebase_api_key: String,
    /// OAuth access token of a service account (admin account operations)
    pub firebase_access_token: String,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Premium subscription price (minor units)
    pub premium_price_cents: i64,
    /// Issue boost price (minor units)
    pub boost_price_cents: i64,
    pub currency: String,
    /// URL to redirect after successful checkout
    pub checkout_success_url: String,
    /// URL to redirect after cancelled checkout
    pub checkout_cancel_url: String,
}

impl Default for Config {
    /// Development defaults (in-memory identity, local uploads)
    fn default() -> Self {
        Self {
            environment: "development".into(),
            http_port: 3000,
            database_url: "sqlite://urbanfix.db".into(),
            free_issue_limit: 3,
            upload_dir: "uploads".into(),
            public_base_url: "http://localhost:3000/uploads".into(),
            identity_provider: IdentityBackend::Memory,
            firebase_project_id: String::new(),
            firebase_api_key: String::new(),
            firebase_access_token: String::new(),
            stripe_secret_key: "dev-STRIPE_SECRET_KEY-not-for-production".into(),
            stripe_webhook_secret: "dev-STRIPE_WEBHOOK_SECRET-not-for-production".into(),
            premium_price_cents: 1000,
            boost_price_cents: 100,
            currency: "usd".into(),
            checkout_success_url: "http://localhost:5173/payment/success".into(),
            checkout_cancel_url: "http://localhost:5173/payment/cancel".into(),
        }
    }
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let defaults = Self::default();
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        // Development runs against the in-memory provider unless told otherwise
        let identity_provider = match std::env::var("IDENTITY_PROVIDER").ok().as_deref() {
            Some("firebase") => IdentityBackend::Firebase,
            Some("memory") => IdentityBackend::Memory,
            Some(other) => return Err(format!("Unknown IDENTITY_PROVIDER: {other}").into()),
            None if environment == "development" => IdentityBackend::Memory,
            None => IdentityBackend::Firebase,
        };
        if identity_provider == IdentityBackend::Memory && environment == "production" {
            return Err("IDENTITY_PROVIDER=memory is not allowed in production".into());
        }

        let (firebase_project_id, firebase_api_key, firebase_access_token) =
            if identity_provider == IdentityBackend::Firebase {
                (
                    std::env::var("FIREBASE_PROJECT_ID")
                        .map_err(|_| "FIREBASE_PROJECT_ID must be set")?,
                    Self::require_secret("FIREBASE_API_KEY", &environment)?,
                    Self::require_secret("FIREBASE_ACCESS_TOKEN", &environment)?,
                )
            } else {
                (String::new(), String::new(), String::new())
            };

        let http_port = Self::parse_or("HTTP_PORT", defaults.http_port);
        let free_issue_limit = Self::parse_or("FREE_ISSUE_LIMIT", defaults.free_issue_limit);
        if free_issue_limit < 0 {
            return Err("FREE_ISSUE_LIMIT must not be negative".into());
        }

        Ok(Self {
            http_port,
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            free_issue_limit,
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{http_port}/uploads")),
            identity_provider,
            firebase_project_id,
            firebase_api_key,
            firebase_access_token,
            stripe_secret_key: Self::require_secret("STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: Self::require_secret("STRIPE_WEBHOOK_SECRET", &environment)?,
            premium_price_cents: Self::parse_or("PREMIUM_PRICE_CENTS", defaults.premium_price_cents),
            boost_price_cents: Self::parse_or("BOOST_PRICE_CENTS", defaults.boost_price_cents),
            currency: std::env::var("CURRENCY").unwrap_or(defaults.currency),
            checkout_success_url: std::env::var("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: std::env::var("CHECKOUT_CANCEL_URL")
                .unwrap_or(defaults.checkout_cancel_url),
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
