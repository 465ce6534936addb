use crate::configuration::DatabaseSettings;
use crate::connection::{BackoffPolicy, connect_with_retry};
use anyhow::Context;
use sqlx::{Connection, MySqlConnection};

pub const SUBSCRIBERS_TABLE: &str = "subscribers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
}

#[derive(Debug)]
pub struct SmokeReport {
    pub table_exists: bool,
    /// Empty when the table does not exist.
    pub columns: Vec<ColumnInfo>,
}

/// Connects, runs a trivial query and inspects the `subscribers` table.
///
/// A missing table is reported through `SmokeReport::table_exists`,
/// only connection and query failures are errors.
#[tracing::instrument(name = "Running the database smoke check", skip(settings, policy))]
pub async fn run_smoke_check(
    settings: &DatabaseSettings,
    policy: &BackoffPolicy,
) -> Result<SmokeReport, anyhow::Error> {
    let mut connection = connect_with_retry(settings, policy).await?;

    let one = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&mut connection)
        .await
        .context("Failed to run `SELECT 1`.")?;
    anyhow::ensure!(one == 1, "`SELECT 1` returned {}", one);

    let exists = table_exists(&mut connection, SUBSCRIBERS_TABLE).await?;
    let columns = if exists {
        describe_table(&mut connection, SUBSCRIBERS_TABLE).await?
    } else {
        tracing::warn!("Table `{}` does not exist", SUBSCRIBERS_TABLE);
        Vec::new()
    };

    connection
        .close()
        .await
        .context("Failed to close the database connection.")?;

    Ok(SmokeReport {
        table_exists: exists,
        columns,
    })
}

#[tracing::instrument(name = "Checking table existence", skip(connection))]
pub async fn table_exists(
    connection: &mut MySqlConnection,
    table_name: &str,
) -> Result<bool, anyhow::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE table_schema = DATABASE() AND table_name = ?
        "#,
    )
    .bind(table_name)
    .fetch_one(connection)
    .await
    .context("Failed to look up the table in information_schema.")?;
    Ok(count > 0)
}

#[tracing::instrument(name = "Describing table", skip(connection))]
pub async fn describe_table(
    connection: &mut MySqlConnection,
    table_name: &str,
) -> Result<Vec<ColumnInfo>, anyhow::Error> {
    // information_schema columns may come back as binary strings on MySQL 8
    let rows = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT
            CAST(column_name AS CHAR) AS column_name,
            CAST(column_type AS CHAR) AS column_type
        FROM information_schema.columns
        WHERE table_schema = DATABASE() AND table_name = ?
        ORDER BY ordinal_position
        "#,
    )
    .bind(table_name)
    .fetch_all(connection)
    .await
    .context("Failed to list the table columns.")?;

    Ok(rows
        .into_iter()
        .map(|(name, column_type)| ColumnInfo { name, column_type })
        .collect())
}
