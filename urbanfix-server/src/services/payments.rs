//! Payment log, checkout and checkout completion

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{CheckoutRequest, CheckoutSession, PaymentCreate, PaymentPurpose, PaymentRecord};
use shared::util::{normalize_email, now_millis};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::payments::{self as store, NewPayment};
use crate::error::ServiceResult;
use crate::integrations::{CheckoutItem, PaymentProvider};
use crate::services::{AccountService, IssueService};

/// Prices and redirect targets for hosted checkout
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub premium_price_cents: i64,
    pub boost_price_cents: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl From<&Config> for CheckoutSettings {
    fn from(config: &Config) -> Self {
        Self {
            premium_price_cents: config.premium_price_cents,
            boost_price_cents: config.boost_price_cents,
            currency: config.currency.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
        }
    }
}

/// Paid checkout session as reported by the payment provider
#[derive(Debug, Clone)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub email: String,
    pub amount: i64,
    pub currency: String,
    pub purpose: PaymentPurpose,
    pub issue_id: Option<String>,
}

#[derive(Clone)]
pub struct PaymentService {
    pool: SqlitePool,
    provider: Arc<dyn PaymentProvider>,
    accounts: AccountService,
    issues: IssueService,
    settings: CheckoutSettings,
}

impl PaymentService {
    pub fn new(
        pool: SqlitePool,
        provider: Arc<dyn PaymentProvider>,
        accounts: AccountService,
        issues: IssueService,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            pool,
            provider,
            accounts,
            issues,
            settings,
        }
    }

    /// Append a payment to the log. Does not touch the payer's flags.
    ///
    /// A repeated `transaction_id` returns the record already stored.
    pub async fn record(&self, input: PaymentCreate) -> ServiceResult<PaymentRecord> {
        let email = normalize_email(&input.email);
        if email.is_empty() {
            return Err(AppError::new(ErrorCode::InvalidEmail)
                .with_detail("field", "email")
                .into());
        }
        if input.amount < 0 {
            return Err(AppError::validation("amount must not be negative")
                .with_detail("field", "amount")
                .into());
        }
        let currency = input
            .currency
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| self.settings.currency.clone());

        let payment = NewPayment {
            email: &email,
            amount: input.amount,
            currency: &currency,
            purpose: input.purpose,
            issue_id: input.issue_id.as_deref(),
            transaction_id: input.transaction_id.as_deref(),
            now: now_millis(),
        };

        match store::insert(&self.pool, &payment).await? {
            Some(record) => {
                tracing::info!(
                    payment_id = record.id,
                    email = %record.email,
                    amount = record.amount,
                    purpose = record.purpose.as_str(),
                    "Payment recorded"
                );
                Ok(record)
            }
            None => {
                let transaction_id = input.transaction_id.unwrap_or_default();
                tracing::info!(transaction_id = %transaction_id, "Payment already recorded");
                store::find_by_transaction(&self.pool, &transaction_id)
                    .await?
                    .ok_or_else(|| AppError::new(ErrorCode::PaymentFailed).into())
            }
        }
    }

    pub async fn list(&self, email: Option<&str>) -> ServiceResult<Vec<PaymentRecord>> {
        let email = email.map(normalize_email).filter(|e| !e.is_empty());
        Ok(store::list(&self.pool, email.as_deref()).await?)
    }

    /// Start a hosted checkout for a premium upgrade or an issue boost
    pub async fn start_checkout(&self, request: CheckoutRequest) -> ServiceResult<CheckoutSession> {
        let user = self.accounts.get(&request.email).await?;

        let (name, amount, issue_id) = match request.purpose {
            PaymentPurpose::Premium => ("UrbanFix Premium", self.settings.premium_price_cents, None),
            PaymentPurpose::Boost => {
                let issue_id = request.issue_id.as_deref().ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::InvalidCheckoutPurpose,
                        "issueId is required for a boost",
                    )
                })?;
                let issue = self.issues.get(issue_id).await?;
                ("UrbanFix Issue Boost", self.settings.boost_price_cents, Some(issue.id))
            }
        };

        let session = self
            .provider
            .create_checkout_session(&CheckoutItem {
                email: &user.email,
                name,
                amount,
                currency: &self.settings.currency,
                purpose: request.purpose,
                issue_id: issue_id.as_deref(),
                success_url: &self.settings.success_url,
                cancel_url: &self.settings.cancel_url,
            })
            .await?;

        tracing::info!(
            email = %user.email,
            purpose = request.purpose.as_str(),
            session_id = %session.id,
            "Checkout session created"
        );
        Ok(session)
    }

    /// Record a paid checkout and apply what it bought.
    ///
    /// A redelivered session finds its record already stored and applies the
    /// purchase again, so a failure after the insert is repaired by the retry.
    /// Both applications are idempotent.
    pub async fn complete_checkout(&self, checkout: CompletedCheckout) -> ServiceResult<PaymentRecord> {
        let email = normalize_email(&checkout.email);
        let payment = NewPayment {
            email: &email,
            amount: checkout.amount,
            currency: &checkout.currency,
            purpose: checkout.purpose,
            issue_id: checkout.issue_id.as_deref(),
            transaction_id: Some(&checkout.session_id),
            now: now_millis(),
        };

        let record = match store::insert(&self.pool, &payment).await? {
            Some(record) => {
                tracing::info!(
                    payment_id = record.id,
                    email = %record.email,
                    purpose = record.purpose.as_str(),
                    "Checkout payment recorded"
                );
                record
            }
            None => {
                tracing::info!(session_id = %checkout.session_id, "Checkout already recorded, re-applying");
                store::find_by_transaction(&self.pool, &checkout.session_id)
                    .await?
                    .ok_or_else(|| AppError::new(ErrorCode::PaymentFailed))?
            }
        };

        self.apply_purchase(&record).await?;
        Ok(record)
    }

    async fn apply_purchase(&self, record: &PaymentRecord) -> ServiceResult<()> {
        match record.purpose {
            PaymentPurpose::Premium => {
                self.accounts.set_premium(&record.email).await?;
            }
            PaymentPurpose::Boost => {
                let issue_id = record.issue_id.as_deref().ok_or_else(|| {
                    AppError::with_message(
                        ErrorCode::InvalidCheckoutPurpose,
                        "Boost payment without issue id",
                    )
                })?;
                if self.issues.get(issue_id).await?.boosted {
                    tracing::info!(issue_id = %issue_id, "Issue already boosted");
                } else {
                    self.issues.boost(issue_id, Some(&record.email)).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::error::ServiceError;
    use crate::integrations::{InMemoryIdentity, LocalBlobStore, PaymentError};
    use async_trait::async_trait;
    use shared::models::{IssueCreate, UserRegister};
    use tokio::sync::Mutex;

    /// Records every checkout request instead of calling Stripe
    #[derive(Default)]
    struct FakeProvider {
        calls: Mutex<Vec<(String, i64, Option<String>)>>,
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_checkout_session(&self, item: &CheckoutItem<'_>) -> Result<CheckoutSession, PaymentError> {
            let mut calls = self.calls.lock().await;
            calls.push((item.email.to_string(), item.amount, item.issue_id.map(String::from)));
            Ok(CheckoutSession {
                id: format!("cs_test_{}", calls.len()),
                url: "https://checkout.stripe.test/pay".into(),
            })
        }
    }

    struct Fixture {
        svc: PaymentService,
        pool: SqlitePool,
        accounts: AccountService,
        issues: IssueService,
        provider: Arc<FakeProvider>,
        _uploads: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let uploads = tempfile::tempdir().unwrap();
        let accounts = AccountService::new(
            pool.clone(),
            Arc::new(InMemoryIdentity::new()),
            Arc::new(LocalBlobStore::new(uploads.path(), "http://localhost/uploads")),
        );
        let issues = IssueService::new(pool.clone(), 3);
        let provider = Arc::new(FakeProvider::default());
        let svc = PaymentService::new(
            pool.clone(),
            provider.clone(),
            accounts.clone(),
            issues.clone(),
            CheckoutSettings::from(&Config::default()),
        );
        accounts
            .register_or_fetch(UserRegister {
                email: "ada@city.org".into(),
                name: "Ada".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        Fixture {
            svc,
            pool,
            accounts,
            issues,
            provider,
            _uploads: uploads,
        }
    }

    fn completed(session_id: &str, purpose: PaymentPurpose, issue_id: Option<String>) -> CompletedCheckout {
        CompletedCheckout {
            session_id: session_id.into(),
            email: "ada@city.org".into(),
            amount: 1000,
            currency: "usd".into(),
            purpose,
            issue_id,
        }
    }

    #[tokio::test]
    async fn test_record_does_not_flip_premium() {
        let f = fixture().await;
        let record = f
            .svc
            .record(PaymentCreate {
                email: "ada@city.org".into(),
                amount: 1000,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(record.currency, "usd");
        assert!(!f.accounts.get("ada@city.org").await.unwrap().is_premium);
        assert_eq!(f.svc.list(Some("ada@city.org")).await.unwrap().len(), 1);
        assert!(f.svc.list(Some("other@city.org")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_pricing_and_validation() {
        let f = fixture().await;
        let session = f
            .svc
            .start_checkout(CheckoutRequest {
                email: "ada@city.org".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(session.url, "https://checkout.stripe.test/pay");

        let boost_without_issue = f
            .svc
            .start_checkout(CheckoutRequest {
                email: "ada@city.org".into(),
                purpose: PaymentPurpose::Boost,
                issue_id: None,
            })
            .await;
        assert_eq!(
            boost_without_issue.unwrap_err().code(),
            Some(ErrorCode::InvalidCheckoutPurpose)
        );

        let unknown = f
            .svc
            .start_checkout(CheckoutRequest {
                email: "ghost@city.org".into(),
                ..Default::default()
            })
            .await;
        assert_eq!(unknown.unwrap_err().code(), Some(ErrorCode::UserNotFound));

        let calls = f.provider.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Config::default().premium_price_cents);
    }

    fn bench_report() -> IssueCreate {
        IssueCreate {
            title: "Broken bench".into(),
            description: String::new(),
            category: "Parks".into(),
            location: "Central Park".into(),
            photo: None,
            email: "ada@city.org".into(),
            priority: None,
        }
    }

    #[tokio::test]
    async fn test_complete_premium_checkout_once() {
        let f = fixture().await;
        let first = f
            .svc
            .complete_checkout(completed("cs_1", PaymentPurpose::Premium, None))
            .await
            .unwrap();
        assert!(f.accounts.get("ada@city.org").await.unwrap().is_premium);

        let again = f
            .svc
            .complete_checkout(completed("cs_1", PaymentPurpose::Premium, None))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(f.svc.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_redelivery_applies_purchase_after_failed_apply() {
        let f = fixture().await;

        // Recording works, the upgrade cannot reach the users table
        sqlx::query("ALTER TABLE users RENAME TO users_offline")
            .execute(&f.pool)
            .await
            .unwrap();
        let failed = f
            .svc
            .complete_checkout(completed("cs_1", PaymentPurpose::Premium, None))
            .await;
        assert!(matches!(failed, Err(ServiceError::Db(_))));
        sqlx::query("ALTER TABLE users_offline RENAME TO users")
            .execute(&f.pool)
            .await
            .unwrap();
        assert!(!f.accounts.get("ada@city.org").await.unwrap().is_premium);

        f.svc
            .complete_checkout(completed("cs_1", PaymentPurpose::Premium, None))
            .await
            .unwrap();
        assert!(f.accounts.get("ada@city.org").await.unwrap().is_premium);
        assert_eq!(f.svc.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_boost_checkout() {
        let f = fixture().await;
        let issue = f.issues.create(bench_report()).await.unwrap();

        let paid = completed("cs_2", PaymentPurpose::Boost, Some(issue.id.clone()));
        f.svc.complete_checkout(paid.clone()).await.unwrap();
        f.svc.complete_checkout(paid).await.unwrap();

        let boosted = f.issues.get(&issue.id).await.unwrap();
        assert!(boosted.boosted);
        assert_eq!(boosted.timeline.last().unwrap().action, "boosted");
        let boosts = boosted.timeline.iter().filter(|e| e.action == "boosted").count();
        assert_eq!(boosts, 1);
    }
}
