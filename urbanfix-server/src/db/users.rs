//! User Store

use shared::models::{Role, User};
use sqlx::SqlitePool;

const USER_SELECT: &str = "SELECT email, uid, name, phone, photo, role, is_premium, is_blocked, created_at FROM users";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub uid: Option<&'a str>,
    pub name: &'a str,
    pub phone: Option<&'a str>,
    pub photo: Option<&'a str>,
    pub role: Role,
    pub now: i64,
}

/// Insert unless the email is taken. Returns false when a record already existed.
pub async fn insert_if_absent(pool: &SqlitePool, user: &NewUser<'_>) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (email, uid, name, phone, photo, role, is_premium, is_blocked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, ?7)
         ON CONFLICT (email) DO NOTHING",
    )
    .bind(user.email)
    .bind(user.uid)
    .bind(user.name)
    .bind(user.phone)
    .bind(user.photo)
    .bind(user.role)
    .bind(user.now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Insert a staff record, promoting an existing account in place
pub async fn upsert_staff(pool: &SqlitePool, user: &NewUser<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (email, uid, name, phone, photo, role, is_premium, is_blocked, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'staff', 0, 0, ?6)
         ON CONFLICT (email) DO UPDATE SET
            role = 'staff', uid = excluded.uid, name = excluded.name,
            phone = COALESCE(excluded.phone, phone), photo = COALESCE(excluded.photo, photo)",
    )
    .bind(user.email)
    .bind(user.uid)
    .bind(user.name)
    .bind(user.phone)
    .bind(user.photo)
    .bind(user.now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    let sql = format!("{USER_SELECT} WHERE email = ?");
    sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &SqlitePool, role: Option<Role>) -> Result<Vec<User>, sqlx::Error> {
    let sql = format!("{USER_SELECT} WHERE (?1 IS NULL OR role = ?1) ORDER BY created_at DESC, email");
    sqlx::query_as::<_, User>(&sql)
        .bind(role)
        .fetch_all(pool)
        .await
}

/// Returns false when the email is unknown
pub async fn set_premium(pool: &SqlitePool, email: &str, premium: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_premium = ?1 WHERE email = ?2")
        .bind(premium)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns false when the email is unknown
pub async fn set_blocked(pool: &SqlitePool, email: &str, blocked: bool) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET is_blocked = ?1 WHERE email = ?2")
        .bind(blocked)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Partial profile update (None leaves the column untouched)
pub async fn update_profile(
    pool: &SqlitePool,
    email: &str,
    name: Option<&str>,
    photo: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET name = COALESCE(?1, name), photo = COALESCE(?2, photo) WHERE email = ?3",
    )
    .bind(name)
    .bind(photo)
    .bind(email)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
