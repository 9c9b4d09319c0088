//! Issue Store
//!
//! An issue document is spread over three tables: `issues` holds the scalar
//! fields and the denormalized `upvote_count`, `issue_upvotes` the voter set
//! and `issue_timeline` the append-only audit log (autoincrement id = order).
//! Every write that touches more than one table runs in a transaction.
//!
//! `issues.search_text` holds the Unicode-lowercased title, category and
//! location; SQLite's own `LIKE`/`lower()` only fold ASCII.

use std::collections::HashMap;

use shared::models::{Issue, IssueFilter, IssuePatch, IssuePriority, IssueStatus, TimelineEntry};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

const ISSUE_SELECT: &str = "SELECT id, title, description, category, location, photo, email, status, priority, assigned_staff, boosted, upvote_count, created_at FROM issues";

const FILTER_WHERE: &str = "WHERE (?1 IS NULL OR status = ?1)
    AND (?2 IS NULL OR priority = ?2)
    AND (?3 IS NULL OR category = ?3)
    AND (?4 IS NULL OR assigned_staff = ?4)
    AND (?5 IS NULL OR email = ?5)
    AND (?6 IS NULL OR search_text LIKE ?6 ESCAPE '\\')";

/// Field separator inside `search_text`, never part of a trimmed search term
const SEARCH_SEPARATOR: &str = "\u{1f}";

/// Boosted first, newest first
const LISTING_ORDER: &str = "ORDER BY boosted DESC, created_at DESC, rowid DESC";

#[derive(sqlx::FromRow)]
struct IssueRow {
    id: String,
    title: String,
    description: String,
    category: String,
    location: String,
    photo: Option<String>,
    email: String,
    status: IssueStatus,
    priority: IssuePriority,
    assigned_staff: Option<String>,
    boosted: bool,
    upvote_count: i64,
    created_at: i64,
}

impl IssueRow {
    fn into_issue(self, upvotes: Vec<String>, timeline: Vec<TimelineEntry>) -> Issue {
        Issue {
            id: self.id,
            title: self.title,
            description: self.description,
            category: self.category,
            location: self.location,
            photo: self.photo,
            email: self.email,
            status: self.status,
            priority: self.priority,
            assigned_staff: self.assigned_staff,
            boosted: self.boosted,
            upvotes,
            upvote_count: self.upvote_count,
            created_at: self.created_at,
            timeline,
        }
    }
}

pub struct NewIssue<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub category: &'a str,
    pub location: &'a str,
    pub photo: Option<&'a str>,
    /// Reporter email
    pub email: &'a str,
    pub priority: IssuePriority,
    pub now: i64,
}

/// One timeline entry to append alongside a write
pub struct NewEntry<'a> {
    pub action: &'a str,
    pub actor: Option<&'a str>,
    pub now: i64,
}

/// Outcome of [`add_upvote`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpvoteOutcome {
    Added,
    AlreadyVoted,
    IssueMissing,
}

fn search_text(title: &str, category: &str, location: &str) -> String {
    [title, category, location]
        .join(SEARCH_SEPARATOR)
        .to_lowercase()
}

/// Append an entry; its timestamp is clamped to the issue's latest one so
/// timeline order (by id) and time order agree.
async fn append_timeline<'e, E>(executor: E, issue_id: &str, entry: &NewEntry<'_>) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO issue_timeline (issue_id, action, actor, timestamp)
         SELECT ?1, ?2, ?3, MAX(?4, COALESCE((SELECT MAX(timestamp) FROM issue_timeline WHERE issue_id = ?1), ?4))",
    )
    .bind(issue_id)
    .bind(entry.action)
    .bind(entry.actor)
    .bind(entry.now)
    .execute(executor)
    .await?;
    Ok(())
}

/// Insert a pending issue seeded with a `created` timeline entry
///
/// The insert is guarded in the same statement: the reporter must exist, not
/// be blocked, and be premium or below `free_limit` issues. Returns false
/// when the guard rejected the row.
pub async fn insert_within_quota(
    pool: &SqlitePool,
    issue: &NewIssue<'_>,
    free_limit: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO issues (id, title, description, category, location, photo, email, status, priority, boosted, upvote_count, created_at, search_text)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, 0, 0, ?9, ?11
         WHERE EXISTS (
            SELECT 1 FROM users u
            WHERE u.email = ?7 AND u.is_blocked = 0
              AND (u.is_premium = 1 OR (SELECT COUNT(*) FROM issues i WHERE i.email = ?7) < ?10)
         )",
    )
    .bind(issue.id)
    .bind(issue.title)
    .bind(issue.description)
    .bind(issue.category)
    .bind(issue.location)
    .bind(issue.photo)
    .bind(issue.email)
    .bind(issue.priority)
    .bind(issue.now)
    .bind(free_limit)
    .bind(search_text(issue.title, issue.category, issue.location))
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    let created = NewEntry {
        action: "created",
        actor: Some(issue.email),
        now: issue.now,
    };
    append_timeline(&mut *tx, issue.id, &created).await?;
    tx.commit().await?;
    Ok(true)
}

/// Issues ever reported by `email`, regardless of status
pub async fn count_by_reporter(pool: &SqlitePool, email: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issues WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Issue>, sqlx::Error> {
    let sql = format!("{ISSUE_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, IssueRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(row) => Ok(attach_children(pool, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Apply the supplied fields and optionally append a timeline entry.
/// Returns false when no issue matches `id`.
pub async fn update_fields(
    pool: &SqlitePool,
    id: &str,
    patch: &IssuePatch,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE issues SET
            title = COALESCE(?1, title), description = COALESCE(?2, description),
            category = COALESCE(?3, category), location = COALESCE(?4, location),
            photo = COALESCE(?5, photo), status = COALESCE(?6, status),
            priority = COALESCE(?7, priority)
         WHERE id = ?8",
    )
    .bind(patch.title.as_deref())
    .bind(patch.description.as_deref())
    .bind(patch.category.as_deref())
    .bind(patch.location.as_deref())
    .bind(patch.photo.as_deref())
    .bind(patch.status)
    .bind(patch.priority)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    if patch.title.is_some() || patch.category.is_some() || patch.location.is_some() {
        refresh_search_text(&mut *tx, id).await?;
    }

    if let Some(input) = &patch.timeline_entry {
        let entry = NewEntry {
            action: &input.action,
            actor: input.actor.as_deref(),
            now,
        };
        append_timeline(&mut *tx, id, &entry).await?;
    }

    tx.commit().await?;
    Ok(true)
}

async fn refresh_search_text(tx: &mut sqlx::SqliteConnection, id: &str) -> Result<(), sqlx::Error> {
    let (title, category, location): (String, String, String) =
        sqlx::query_as("SELECT title, category, location FROM issues WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
    sqlx::query("UPDATE issues SET search_text = ?1 WHERE id = ?2")
        .bind(search_text(&title, &category, &location))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

/// Fill `search_text` for rows written before the column existed
pub async fn backfill_search_text(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let rows: Vec<(String, String, String, String)> =
        sqlx::query_as("SELECT id, title, category, location FROM issues WHERE search_text = ''")
            .fetch_all(pool)
            .await?;
    let mut filled = 0;
    for (id, title, category, location) in rows {
        filled += sqlx::query("UPDATE issues SET search_text = ?1 WHERE id = ?2")
            .bind(search_text(&title, &category, &location))
            .bind(&id)
            .execute(pool)
            .await?
            .rows_affected();
    }
    Ok(filled)
}

pub async fn assign(
    pool: &SqlitePool,
    id: &str,
    staff_email: &str,
    entry: &NewEntry<'_>,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE issues SET assigned_staff = ?1 WHERE id = ?2")
        .bind(staff_email)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    append_timeline(&mut *tx, id, entry).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn reject(pool: &SqlitePool, id: &str, entry: &NewEntry<'_>) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE issues SET status = 'rejected' WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    append_timeline(&mut *tx, id, entry).await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn boost(pool: &SqlitePool, id: &str, entry: &NewEntry<'_>) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE issues SET boosted = 1, priority = 'high' WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }
    append_timeline(&mut *tx, id, entry).await?;
    tx.commit().await?;
    Ok(true)
}

/// Add `email` to the upvote set and bump the counter in one transaction.
///
/// The counter is only touched when the set actually grew.
pub async fn add_upvote(pool: &SqlitePool, id: &str, email: &str, now: i64) -> Result<UpvoteOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO issue_upvotes (issue_id, email, created_at)
         SELECT ?1, ?2, ?3 WHERE EXISTS (SELECT 1 FROM issues WHERE id = ?1)",
    )
    .bind(id)
    .bind(email)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        let (found,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issues WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.rollback().await?;
        return Ok(if found > 0 {
            UpvoteOutcome::AlreadyVoted
        } else {
            UpvoteOutcome::IssueMissing
        });
    }

    sqlx::query("UPDATE issues SET upvote_count = upvote_count + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(UpvoteOutcome::Added)
}

/// Permanently remove an issue with its upvotes and timeline
pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM issue_upvotes WHERE issue_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM issue_timeline WHERE issue_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM issues WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(result.rows_affected() > 0)
}

/// Filtered listing in listing order
///
/// `page` is `(page, limit)` with a 1-based page; `None` returns every match.
/// The second tuple element is the total number of matches.
pub async fn list(
    pool: &SqlitePool,
    filter: &IssueFilter,
    page: Option<(u32, u32)>,
) -> Result<(Vec<Issue>, u64), sqlx::Error> {
    let search = filter
        .search
        .as_deref()
        .map(|term| crate::db::like_pattern(&term.to_lowercase()));

    let count_sql = format!("SELECT COUNT(*) FROM issues {FILTER_WHERE}");
    let (total,): (i64,) = sqlx::query_as(&count_sql)
        .bind(filter.status)
        .bind(filter.priority)
        .bind(filter.category.as_deref())
        .bind(filter.assigned_staff.as_deref())
        .bind(filter.email.as_deref())
        .bind(search.as_deref())
        .fetch_one(pool)
        .await?;

    // SQLite: negative LIMIT means no limit
    let (limit, offset) = match page {
        Some((page, limit)) => (
            i64::from(limit),
            i64::from(page.saturating_sub(1)) * i64::from(limit),
        ),
        None => (-1, 0),
    };

    let sql = format!("{ISSUE_SELECT} {FILTER_WHERE} {LISTING_ORDER} LIMIT ?7 OFFSET ?8");
    let rows = sqlx::query_as::<_, IssueRow>(&sql)
        .bind(filter.status)
        .bind(filter.priority)
        .bind(filter.category.as_deref())
        .bind(filter.assigned_staff.as_deref())
        .bind(filter.email.as_deref())
        .bind(search.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let issues = attach_children(pool, rows).await?;
    Ok((issues, total as u64))
}

/// Load upvote sets and timelines for a batch of rows (two queries total)
async fn attach_children(pool: &SqlitePool, rows: Vec<IssueRow>) -> Result<Vec<Issue>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut upvotes: HashMap<String, Vec<String>> = HashMap::new();
    let mut timelines: HashMap<String, Vec<TimelineEntry>> = HashMap::new();
    {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT issue_id, email FROM issue_upvotes WHERE issue_id IN (",
        );
        let mut ids = qb.separated(", ");
        for row in &rows {
            ids.push_bind(row.id.as_str());
        }
        ids.push_unseparated(") ORDER BY created_at, rowid");
        let votes: Vec<(String, String)> = qb.build_query_as().fetch_all(pool).await?;
        for (issue_id, email) in votes {
            upvotes.entry(issue_id).or_default().push(email);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT issue_id, action, actor, timestamp FROM issue_timeline WHERE issue_id IN (",
        );
        let mut ids = qb.separated(", ");
        for row in &rows {
            ids.push_bind(row.id.as_str());
        }
        ids.push_unseparated(") ORDER BY id");
        let entries: Vec<(String, String, Option<String>, i64)> =
            qb.build_query_as().fetch_all(pool).await?;
        for (issue_id, action, actor, timestamp) in entries {
            timelines.entry(issue_id).or_default().push(TimelineEntry {
                action,
                actor,
                timestamp,
            });
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let votes = upvotes.remove(&row.id).unwrap_or_default();
            let timeline = timelines.remove(&row.id).unwrap_or_default();
            row.into_issue(votes, timeline)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::users::{self, NewUser};
    use shared::models::{Role, TimelineEntryInput};

    async fn seed_user(pool: &SqlitePool, email: &str) {
        let user = NewUser {
            email,
            uid: None,
            name: "Reporter",
            phone: None,
            photo: None,
            role: Role::Citizen,
            now: 1,
        };
        users::insert_if_absent(pool, &user).await.unwrap();
    }

    async fn seed_issue(pool: &SqlitePool, id: &str, email: &str, now: i64) -> bool {
        let issue = NewIssue {
            id,
            title: "Pothole on Elm",
            description: "Deep one",
            category: "Road",
            location: "Elm St",
            photo: None,
            email,
            priority: IssuePriority::Normal,
            now,
        };
        insert_within_quota(pool, &issue, 3).await.unwrap()
    }

    #[tokio::test]
    async fn test_insert_seeds_created_entry() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        assert!(seed_issue(&pool, "i1", "r@city.org", 10).await);

        let issue = find_by_id(&pool, "i1").await.unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::Pending);
        assert_eq!(issue.upvote_count, 0);
        assert!(issue.upvotes.is_empty());
        assert_eq!(issue.timeline.len(), 1);
        assert_eq!(issue.timeline[0].action, "created");
        assert_eq!(issue.timeline[0].timestamp, 10);
    }

    #[tokio::test]
    async fn test_insert_guard_enforces_quota_and_block() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        for i in 0..3 {
            assert!(seed_issue(&pool, &format!("i{i}"), "r@city.org", i).await);
        }
        assert!(!seed_issue(&pool, "i3", "r@city.org", 3).await);
        assert_eq!(count_by_reporter(&pool, "r@city.org").await.unwrap(), 3);

        users::set_premium(&pool, "r@city.org", true).await.unwrap();
        assert!(seed_issue(&pool, "i3", "r@city.org", 3).await);

        users::set_blocked(&pool, "r@city.org", true).await.unwrap();
        assert!(!seed_issue(&pool, "i4", "r@city.org", 4).await);

        // Unknown reporter
        assert!(!seed_issue(&pool, "i5", "ghost@city.org", 5).await);
    }

    #[tokio::test]
    async fn test_upvote_set_and_counter_stay_in_step() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 1).await;

        assert_eq!(add_upvote(&pool, "i1", "v@city.org", 2).await.unwrap(), UpvoteOutcome::Added);
        assert_eq!(
            add_upvote(&pool, "i1", "v@city.org", 3).await.unwrap(),
            UpvoteOutcome::AlreadyVoted
        );
        assert_eq!(add_upvote(&pool, "i1", "w@city.org", 4).await.unwrap(), UpvoteOutcome::Added);
        assert_eq!(
            add_upvote(&pool, "missing", "v@city.org", 5).await.unwrap(),
            UpvoteOutcome::IssueMissing
        );

        let issue = find_by_id(&pool, "i1").await.unwrap().unwrap();
        assert_eq!(issue.upvotes, vec!["v@city.org", "w@city.org"]);
        assert_eq!(issue.upvote_count, issue.upvotes.len() as i64);
    }

    #[tokio::test]
    async fn test_update_fields_preserves_omitted_and_appends() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 1).await;

        let patch = IssuePatch {
            status: Some(IssueStatus::InProgress),
            timeline_entry: Some(TimelineEntryInput {
                action: "inspected".into(),
                actor: None,
            }),
            ..Default::default()
        };
        assert!(update_fields(&pool, "i1", &patch, 5).await.unwrap());
        assert!(!update_fields(&pool, "missing", &patch, 5).await.unwrap());

        let issue = find_by_id(&pool, "i1").await.unwrap().unwrap();
        assert_eq!(issue.status, IssueStatus::InProgress);
        assert_eq!(issue.title, "Pothole on Elm");
        assert_eq!(issue.description, "Deep one");
        let actions: Vec<_> = issue.timeline.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["created", "inspected"]);
    }

    #[tokio::test]
    async fn test_list_orders_boosted_first_and_pages() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        users::set_premium(&pool, "r@city.org", true).await.unwrap();
        for i in 0..5 {
            seed_issue(&pool, &format!("i{i}"), "r@city.org", i).await;
        }
        let entry = NewEntry {
            action: "boosted",
            actor: None,
            now: 10,
        };
        boost(&pool, "i1", &entry).await.unwrap();

        let (all, total) = list(&pool, &IssueFilter::default(), None).await.unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = all.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "i4", "i3", "i2", "i0"]);
        assert_eq!(all[0].priority, IssuePriority::High);

        let (page, total) = list(&pool, &IssueFilter::default(), Some((3, 2))).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "i0");
        assert_eq!(page[0].timeline.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_and_search() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 1).await;
        seed_issue(&pool, "i2", "r@city.org", 2).await;
        let entry = NewEntry {
            action: "rejected",
            actor: None,
            now: 3,
        };
        reject(&pool, "i2", &entry).await.unwrap();

        let filter = IssueFilter {
            status: Some(IssueStatus::Rejected),
            ..Default::default()
        };
        let (found, total) = list(&pool, &filter, None).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(found[0].id, "i2");

        let filter = IssueFilter {
            search: Some("ELM".into()),
            ..Default::default()
        };
        let (_, total) = list(&pool, &filter, None).await.unwrap();
        assert_eq!(total, 2);

        let filter = IssueFilter {
            search: Some("%".into()),
            ..Default::default()
        };
        let (_, total) = list(&pool, &filter, None).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        let issue = NewIssue {
            id: "i1",
            title: "École fermée",
            description: "",
            category: "Bâtiments",
            location: "Rue Ösel",
            photo: None,
            email: "r@city.org",
            priority: IssuePriority::Normal,
            now: 1,
        };
        assert!(insert_within_quota(&pool, &issue, 3).await.unwrap());

        for term in ["école", "ÉCOLE", "FERMÉE", "bâtiments", "ösel"] {
            let filter = IssueFilter {
                search: Some(term.into()),
                ..Default::default()
            };
            let (_, total) = list(&pool, &filter, None).await.unwrap();
            assert_eq!(total, 1, "search term {term}");
        }

        let patch = IssuePatch {
            title: Some("Église ouverte".into()),
            ..Default::default()
        };
        update_fields(&pool, "i1", &patch, 2).await.unwrap();
        let filter = IssueFilter {
            search: Some("ÉGLISE".into()),
            ..Default::default()
        };
        assert_eq!(list(&pool, &filter, None).await.unwrap().1, 1);
        let filter = IssueFilter {
            search: Some("école".into()),
            ..Default::default()
        };
        assert_eq!(list(&pool, &filter, None).await.unwrap().1, 0);
    }

    #[tokio::test]
    async fn test_backfill_search_text() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 1).await;
        sqlx::query("UPDATE issues SET search_text = ''")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(backfill_search_text(&pool).await.unwrap(), 1);
        assert_eq!(backfill_search_text(&pool).await.unwrap(), 0);
        let filter = IssueFilter {
            search: Some("elm st".into()),
            ..Default::default()
        };
        assert_eq!(list(&pool, &filter, None).await.unwrap().1, 1);
    }

    #[tokio::test]
    async fn test_timeline_timestamps_never_go_backwards() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 100).await;

        // Stamped before a concurrent writer committed a later entry
        let late = NewEntry {
            action: "rejected",
            actor: None,
            now: 40,
        };
        assert!(reject(&pool, "i1", &late).await.unwrap());
        let later = NewEntry {
            action: "boosted",
            actor: None,
            now: 150,
        };
        assert!(boost(&pool, "i1", &later).await.unwrap());

        let issue = find_by_id(&pool, "i1").await.unwrap().unwrap();
        let stamps: Vec<_> = issue.timeline.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![100, 100, 150]);
    }

    #[tokio::test]
    async fn test_delete_removes_children() {
        let pool = test_pool().await;
        seed_user(&pool, "r@city.org").await;
        seed_issue(&pool, "i1", "r@city.org", 1).await;
        add_upvote(&pool, "i1", "v@city.org", 2).await.unwrap();

        assert!(delete(&pool, "i1").await.unwrap());
        assert!(!delete(&pool, "i1").await.unwrap());
        assert!(find_by_id(&pool, "i1").await.unwrap().is_none());

        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issue_timeline")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
