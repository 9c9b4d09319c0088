//! User and staff account management

use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::models::{Role, StaffCreate, User, UserRegister};
use shared::util::{normalize_email, now_millis};
use sqlx::SqlitePool;

use crate::db::users::{self, NewUser};
use crate::error::{ServiceError, ServiceResult};
use crate::integrations::{AccountUpdate, BlobStore, IdentityError, IdentityProvider, NewAccount};
use crate::security_log;

/// Minimum password length accepted by the identity provider
pub const MIN_PASSWORD_LEN: usize = 6;

/// Uploaded photo (multipart file part)
pub struct PhotoUpload {
    pub data: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Profile edit; None leaves the attribute unchanged
#[derive(Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
    pub photo: Option<PhotoUpload>,
}

#[derive(Clone)]
pub struct AccountService {
    pool: SqlitePool,
    identity: Arc<dyn IdentityProvider>,
    blobs: Arc<dyn BlobStore>,
}

fn user_not_found(email: &str) -> AppError {
    AppError::new(ErrorCode::UserNotFound).with_detail("email", email)
}

/// Normalized email, or InvalidEmail
fn valid_email(email: &str) -> Result<String, AppError> {
    let email = normalize_email(email);
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::new(ErrorCode::InvalidEmail).with_detail("field", "email")),
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::new(ErrorCode::PasswordRequired));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::new(ErrorCode::PasswordTooShort));
    }
    Ok(())
}

impl AccountService {
    pub fn new(
        pool: SqlitePool,
        identity: Arc<dyn IdentityProvider>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            pool,
            identity,
            blobs,
        }
    }

    /// Create a citizen record on first sight; an existing record is returned unchanged
    pub async fn register_or_fetch(&self, profile: UserRegister) -> ServiceResult<User> {
        let email = valid_email(&profile.email)?;
        if let Some(existing) = users::find_by_email(&self.pool, &email).await? {
            return Ok(existing);
        }

        let uid = self.lookup_uid(&email).await;
        let user = NewUser {
            email: &email,
            uid: uid.as_deref(),
            name: profile.name.trim(),
            phone: profile.phone.as_deref(),
            photo: profile.photo.as_deref(),
            role: Role::Citizen,
            now: now_millis(),
        };

        if users::insert_if_absent(&self.pool, &user).await? {
            tracing::info!(email = %email, linked = uid.is_some(), "User registered");
        }
        self.get(&email).await
    }

    /// Identity account id registered under `email`, if any.
    /// A failed lookup leaves the record unlinked.
    async fn lookup_uid(&self, email: &str) -> Option<String> {
        match self.identity.get_by_email(email).await {
            Ok(account) => account.map(|a| a.uid),
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "Identity lookup failed, registering unlinked");
                None
            }
        }
    }

    pub async fn get(&self, email: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        users::find_by_email(&self.pool, &email)
            .await?
            .ok_or_else(|| user_not_found(&email).into())
    }

    pub async fn list(&self, role: Option<Role>) -> ServiceResult<Vec<User>> {
        Ok(users::list(&self.pool, role).await?)
    }

    pub async fn list_staff(&self) -> ServiceResult<Vec<User>> {
        self.list(Some(Role::Staff)).await
    }

    pub async fn set_premium(&self, email: &str) -> ServiceResult<User> {
        let email = normalize_email(email);
        if !users::set_premium(&self.pool, &email, true).await? {
            return Err(user_not_found(&email).into());
        }
        tracing::info!(email = %email, "User upgraded to premium");
        self.get(&email).await
    }

    pub async fn block(&self, email: &str) -> ServiceResult<User> {
        self.set_blocked(email, true).await
    }

    pub async fn unblock(&self, email: &str) -> ServiceResult<User> {
        self.set_blocked(email, false).await
    }

    async fn set_blocked(&self, email: &str, blocked: bool) -> ServiceResult<User> {
        let email = normalize_email(email);
        if !users::set_blocked(&self.pool, &email, blocked).await? {
            return Err(user_not_found(&email).into());
        }
        tracing::info!(email = %email, blocked, "User block flag changed");
        self.get(&email).await
    }

    /// Create the identity account, then the local staff record.
    ///
    /// If the local write fails the identity account is deleted again; a
    /// failed compensation is logged and the original error returned.
    pub async fn provision_staff(&self, input: StaffCreate) -> ServiceResult<User> {
        check_password(&input.password)?;
        let email = valid_email(&input.email)?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(AppError::with_message(ErrorCode::RequiredField, "name is required")
                .with_detail("field", "name")
                .into());
        }

        let account = self
            .identity
            .create_account(&NewAccount {
                email: &email,
                password: &input.password,
                display_name: name,
                photo_url: input.photo.as_deref(),
            })
            .await?;

        let staff = NewUser {
            email: &email,
            uid: Some(&account.uid),
            name,
            phone: input.phone.as_deref(),
            photo: input.photo.as_deref(),
            role: Role::Staff,
            now: now_millis(),
        };
        if let Err(e) = users::upsert_staff(&self.pool, &staff).await {
            tracing::error!(email = %email, error = %e, "Staff record insert failed, removing identity account");
            if let Err(comp) = self.identity.delete_account(&account.uid).await {
                tracing::error!(
                    email = %email,
                    uid = %account.uid,
                    error = %comp,
                    "Compensation failed: identity account left without local record"
                );
            }
            return Err(e.into());
        }

        tracing::info!(email = %email, uid = %account.uid, "Staff provisioned");
        self.get(&email).await
    }

    /// Change name, photo and/or password of `email`
    ///
    /// The identity provider is updated first; the local record only changes
    /// once the provider accepted the new attributes.
    pub async fn update_profile(&self, email: &str, update: ProfileUpdate) -> ServiceResult<User> {
        let user = self.get(email).await?;
        let name = update
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(password) = &update.password {
            check_password(password)?;
        }

        let photo_url = match &update.photo {
            Some(photo) => Some(
                self.blobs
                    .save(&photo.data, &photo.file_name, photo.content_type.as_deref())
                    .await?,
            ),
            None => None,
        };

        let account_update = AccountUpdate {
            display_name: name.clone(),
            photo_url: photo_url.clone(),
            password: update.password,
        };
        if !account_update.is_empty() {
            self.sync_identity(&user, &account_update).await?;
        }

        if name.is_some() || photo_url.is_some() {
            users::update_profile(&self.pool, &user.email, name.as_deref(), photo_url.as_deref())
                .await?;
        }

        tracing::info!(email = %user.email, "Profile updated");
        self.get(&user.email).await
    }

    /// Push attribute changes to the identity account registered under the
    /// user's email. A password change without such an account is an error.
    async fn sync_identity(&self, user: &User, update: &AccountUpdate) -> ServiceResult<()> {
        match self.identity.get_by_email(&user.email).await? {
            Some(account) => {
                if user.uid.as_deref().is_some_and(|uid| uid != account.uid) {
                    security_log!(WARN, "identity_uid_mismatch", email = %user.email);
                }
                Ok(self.identity.update_account(&account.uid, update).await?)
            }
            None if update.password.is_some() => Err(ServiceError::from(IdentityError::NotFound)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::integrations::{InMemoryIdentity, LocalBlobStore};

    struct Fixture {
        svc: AccountService,
        identity: Arc<InMemoryIdentity>,
        pool: SqlitePool,
        _uploads: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let pool = test_pool().await;
        let identity = Arc::new(InMemoryIdentity::new());
        let uploads = tempfile::tempdir().unwrap();
        let blobs = Arc::new(LocalBlobStore::new(uploads.path(), "http://localhost/uploads"));
        let svc = AccountService::new(pool.clone(), identity.clone(), blobs);
        Fixture {
            svc,
            identity,
            pool,
            _uploads: uploads,
        }
    }

    fn profile(email: &str, name: &str) -> UserRegister {
        UserRegister {
            email: email.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn staff(email: &str, password: &str) -> StaffCreate {
        StaffCreate {
            name: "Sam Staff".into(),
            email: email.into(),
            phone: Some("555-0100".into()),
            photo: None,
            password: password.into(),
        }
    }

    fn code_of<T: std::fmt::Debug>(result: ServiceResult<T>) -> ErrorCode {
        result.unwrap_err().code().expect("business error")
    }

    fn tiny_png() -> Vec<u8> {
        let mut buf = std::io::Cursor::new(Vec::new());
        image::RgbImage::new(1, 1)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_register_or_fetch_is_idempotent() {
        let f = fixture().await;
        let first = f.svc.register_or_fetch(profile("ada@city.org", "Ada")).await.unwrap();
        let second = f.svc.register_or_fetch(profile("ADA@city.org", "Changed")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.name, "Ada");
        assert_eq!(second.role, Role::Citizen);
        assert_eq!(f.svc.list(None).await.unwrap().len(), 1);

        assert_eq!(
            code_of(f.svc.register_or_fetch(profile("not-an-email", "x")).await),
            ErrorCode::InvalidEmail
        );
    }

    #[tokio::test]
    async fn test_register_links_identity_account_by_email() {
        let f = fixture().await;
        let account = f
            .identity
            .create_account(&NewAccount {
                email: "ada@city.org",
                password: "secret1",
                display_name: "Ada",
                photo_url: None,
            })
            .await
            .unwrap();

        let user = f.svc.register_or_fetch(profile("Ada@City.org", "Ada")).await.unwrap();
        assert_eq!(user.uid.as_deref(), Some(account.uid.as_str()));

        let other = f.svc.register_or_fetch(profile("ben@city.org", "Ben")).await.unwrap();
        assert!(other.uid.is_none());
    }

    #[tokio::test]
    async fn test_password_change_ignores_foreign_stored_uid() {
        let f = fixture().await;
        let sam = f.svc.provision_staff(staff("sam@city.org", "secret1")).await.unwrap();

        // Citizen row carrying the staff member's account id
        let mallory = NewUser {
            email: "mallory@city.org",
            uid: sam.uid.as_deref(),
            name: "Mallory",
            phone: None,
            photo: None,
            role: Role::Citizen,
            now: 1,
        };
        users::insert_if_absent(&f.pool, &mallory).await.unwrap();

        let update = ProfileUpdate {
            password: Some("pwned123".into()),
            ..Default::default()
        };
        assert_eq!(
            code_of(f.svc.update_profile("mallory@city.org", update).await),
            ErrorCode::UserNotFound
        );
        assert_eq!(f.identity.password_of("sam@city.org").await.as_deref(), Some("secret1"));
    }

    #[tokio::test]
    async fn test_flag_toggles() {
        let f = fixture().await;
        f.svc.register_or_fetch(profile("ada@city.org", "Ada")).await.unwrap();

        assert!(f.svc.set_premium("ada@city.org").await.unwrap().is_premium);
        assert!(f.svc.block("ada@city.org").await.unwrap().is_blocked);
        assert!(!f.svc.unblock("ada@city.org").await.unwrap().is_blocked);

        assert_eq!(code_of(f.svc.block("ghost@city.org").await), ErrorCode::UserNotFound);
        assert_eq!(code_of(f.svc.set_premium("ghost@city.org").await), ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn test_provision_staff() {
        let f = fixture().await;
        assert_eq!(
            code_of(f.svc.provision_staff(staff("sam@city.org", "")).await),
            ErrorCode::PasswordRequired
        );
        assert_eq!(
            code_of(f.svc.provision_staff(staff("sam@city.org", "123")).await),
            ErrorCode::PasswordTooShort
        );

        let user = f.svc.provision_staff(staff("sam@city.org", "secret1")).await.unwrap();
        assert_eq!(user.role, Role::Staff);
        assert!(user.uid.is_some());
        assert_eq!(f.svc.list_staff().await.unwrap().len(), 1);
        assert!(f.identity.get_by_email("sam@city.org").await.unwrap().is_some());

        assert_eq!(
            code_of(f.svc.provision_staff(staff("sam@city.org", "secret1")).await),
            ErrorCode::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_provision_staff_compensates_on_local_failure() {
        let f = fixture().await;
        f.pool.close().await;

        let result = f.svc.provision_staff(staff("sam@city.org", "secret1")).await;
        assert!(matches!(result, Err(ServiceError::Db(_))));
        assert!(f.identity.get_by_email("sam@city.org").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = fixture().await;
        f.svc.provision_staff(staff("sam@city.org", "secret1")).await.unwrap();

        let update = ProfileUpdate {
            name: Some("Samantha".into()),
            password: Some("changed1".into()),
            photo: Some(PhotoUpload {
                data: tiny_png(),
                file_name: "me.png".into(),
                content_type: Some("image/png".into()),
            }),
        };
        let user = f.svc.update_profile("sam@city.org", update).await.unwrap();
        assert_eq!(user.name, "Samantha");
        assert!(user.photo.unwrap().starts_with("http://localhost/uploads/"));
        assert_eq!(user.phone.as_deref(), Some("555-0100"));
        assert_eq!(f.identity.password_of("sam@city.org").await.as_deref(), Some("changed1"));
    }

    #[tokio::test]
    async fn test_update_profile_password_needs_identity_account() {
        let f = fixture().await;
        f.svc.register_or_fetch(profile("ada@city.org", "Ada")).await.unwrap();

        let renamed = ProfileUpdate {
            name: Some("Ada L.".into()),
            ..Default::default()
        };
        assert_eq!(f.svc.update_profile("ada@city.org", renamed).await.unwrap().name, "Ada L.");

        let password = ProfileUpdate {
            password: Some("secret1".into()),
            ..Default::default()
        };
        assert_eq!(
            code_of(f.svc.update_profile("ada@city.org", password).await),
            ErrorCode::UserNotFound
        );
    }
}
