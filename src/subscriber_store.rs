//! CRUD operations on the `subscribers` table.
//!
//! Every function is a single statement and accepts any MySQL executor:
//! a `&mut MySqlConnection`, a `&MySqlPool` or a transaction.
use crate::domain::{NewSubscriber, Subscriber, SubscriberName, SubscriberStatus};
use crate::utils::error_chain_fmt;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Executor, MySql, Row};

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("A subscriber with email {0} already exists.")]
    DuplicateEmail(String),
    #[error("No subscriber with email {0} was found.")]
    NotFound(String),
    #[error("The stored subscriber row is invalid: {0}")]
    InvalidRow(String),
    #[error("A database error was encountered.")]
    Database(#[from] sqlx::Error),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

fn parse_subscriber_row(row: &MySqlRow) -> Result<Subscriber, StoreError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<SubscriberStatus>().map_err(StoreError::InvalidRow)?;
    Ok(Subscriber {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        status,
        created_at: row.try_get("created_at")?,
    })
}

#[tracing::instrument(
    name = "Saving new subscriber details in the database",
    skip(executor, new_subscriber),
    fields(subscriber_email = %new_subscriber.email)
)]
pub async fn insert_subscriber<'e, E>(
    executor: E,
    new_subscriber: &NewSubscriber,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let query = sqlx::query(r#"INSERT INTO subscribers (email, name) VALUES (?, ?)"#)
        .bind(new_subscriber.email.as_ref())
        .bind(new_subscriber.name.as_ref().map(|name| name.as_ref()));

    match query.execute(executor).await {
        Ok(result) => Ok(result.last_insert_id()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            tracing::warn!("Rejected duplicate subscriber email");
            Err(StoreError::DuplicateEmail(
                new_subscriber.email.as_ref().to_owned(),
            ))
        }
        Err(e) => {
            tracing::error!("Failed to execute query: {:?}", e);
            Err(e.into())
        }
    }
}

#[tracing::instrument(name = "Fetching a subscriber by email", skip(executor))]
pub async fn find_subscriber_by_email<'e, E>(
    executor: E,
    email: &str,
) -> Result<Option<Subscriber>, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let row = sqlx::query(
        r#"
        SELECT id, email, name, status, created_at
        FROM subscribers
        WHERE email = ?
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(parse_subscriber_row).transpose()
}

#[tracing::instrument(name = "Updating subscriber status", skip(executor))]
pub async fn update_status<'e, E>(
    executor: E,
    email: &str,
    status: SubscriberStatus,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(r#"UPDATE subscribers SET status = ? WHERE email = ?"#)
        .bind(status.as_str())
        .bind(email)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(email.to_owned()));
    }
    Ok(())
}

#[tracing::instrument(name = "Updating subscriber name", skip(executor, name))]
pub async fn update_name<'e, E>(
    executor: E,
    email: &str,
    name: Option<&SubscriberName>,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(r#"UPDATE subscribers SET name = ? WHERE email = ?"#)
        .bind(name.map(|name| name.as_ref()))
        .bind(email)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(email.to_owned()));
    }
    Ok(())
}

#[tracing::instrument(name = "Deleting a subscriber", skip(executor))]
pub async fn delete_subscriber<'e, E>(executor: E, email: &str) -> Result<(), StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(r#"DELETE FROM subscribers WHERE email = ?"#)
        .bind(email)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(email.to_owned()));
    }
    Ok(())
}

/// Rows whose email matches the SQL `LIKE` pattern, ordered by email.
#[tracing::instrument(name = "Listing subscribers", skip(executor))]
pub async fn list_subscribers_matching<'e, E>(
    executor: E,
    email_pattern: &str,
) -> Result<Vec<Subscriber>, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, email, name, status, created_at
        FROM subscribers
        WHERE email LIKE ?
        ORDER BY email
        "#,
    )
    .bind(email_pattern)
    .fetch_all(executor)
    .await?;

    rows.iter().map(parse_subscriber_row).collect()
}

/// Returns the number of deleted rows.
#[tracing::instrument(name = "Deleting matching subscribers", skip(executor))]
pub async fn delete_subscribers_matching<'e, E>(
    executor: E,
    email_pattern: &str,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(r#"DELETE FROM subscribers WHERE email LIKE ?"#)
        .bind(email_pattern)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes rows matching the SQL `LIKE` pattern that were created before
/// `created_before`. Returns the number of deleted rows.
#[tracing::instrument(name = "Deleting stale matching subscribers", skip(executor))]
pub async fn delete_subscribers_matching_created_before<'e, E>(
    executor: E,
    email_pattern: &str,
    created_before: DateTime<Utc>,
) -> Result<u64, StoreError>
where
    E: Executor<'e, Database = MySql>,
{
    let result = sqlx::query(r#"DELETE FROM subscribers WHERE email LIKE ? AND created_at < ?"#)
        .bind(email_pattern)
        .bind(created_before)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
