// Connectivity smoke test for the subscribers database.
// Exits with 0 when the database is reachable, 1 otherwise.

use std::process::ExitCode;
use subscriber_db::configuration::get_configuration;
use subscriber_db::smoke_check::{SUBSCRIBERS_TABLE, run_smoke_check};
use subscriber_db::telemetry::{get_subscriber, init_subscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let subscriber = get_subscriber("check_connection".into(), "warn".into(), std::io::stderr);
    init_subscriber(subscriber);

    match check_connection().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("❌ MySQL connection failed: {:#}", e);
            println!("\nTroubleshooting tips:");
            println!("1. Make sure Docker is running");
            println!("2. Check if the MySQL container is started");
            println!("3. Verify the DB_HOST, DB_USER, DB_PASSWORD and DB_NAME environment variables");
            ExitCode::FAILURE
        }
    }
}

async fn check_connection() -> Result<(), anyhow::Error> {
    let configuration = get_configuration()?;
    let database = &configuration.database;

    println!("Attempting to connect to MySQL at {}...", database.host);
    println!("User: {}", database.username);
    println!("Database: {}", database.database_name);

    let report = run_smoke_check(database, &configuration.connection_retry.policy()).await?;
    println!("✅ MySQL connection successful!");

    if report.table_exists {
        println!("✅ Table `{}` exists!", SUBSCRIBERS_TABLE);
        println!("📋 Table structure:");
        for column in &report.columns {
            println!("  - {}: {}", column.name, column.column_type);
        }
    } else {
        println!("❌ Table `{}` does not exist", SUBSCRIBERS_TABLE);
    }
    Ok(())
}
