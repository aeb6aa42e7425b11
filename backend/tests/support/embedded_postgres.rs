//! Database lifecycle helpers for the embedded cluster.
//!
//! Resets go through `postgres` because `DROP DATABASE` cannot run inside
//! the transaction Diesel opens. Schemas come from the crate's embedded
//! migrations so tests never drift from production.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;
use pg_embedded_setup_unpriv::TestCluster;
use postgres::{Client, NoTls};
use taskboard::outbound::persistence::MIGRATIONS;

use super::format_postgres_error;

/// Drop and recreate `name` on `cluster`, then apply all migrations.
///
/// Returns the database URL.
pub fn fresh_database(cluster: &TestCluster, name: &str) -> Result<String, String> {
    let admin_url = cluster.connection().database_url("postgres");
    let mut client =
        Client::connect(&admin_url, NoTls).map_err(|err| format_postgres_error(&err))?;
    for statement in [
        format!("DROP DATABASE IF EXISTS \"{name}\" WITH (FORCE)"),
        format!("CREATE DATABASE \"{name}\""),
    ] {
        client
            .batch_execute(&statement)
            .map_err(|err| format_postgres_error(&err))?;
    }

    let url = cluster.connection().database_url(name);
    migrate_schema(&url)?;
    Ok(url)
}

/// Apply pending migrations to `url`.
pub fn migrate_schema(url: &str) -> Result<(), String> {
    let mut conn = PgConnection::establish(url).map_err(|err| format!("connect: {err}"))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| format!("migration: {err}"))?;
    Ok(())
}

/// Drop the `tasks` table so later reads fail.
pub fn drop_tasks_table(url: &str) -> Result<(), String> {
    let mut client = Client::connect(url, NoTls).map_err(|err| format_postgres_error(&err))?;
    client
        .batch_execute("DROP TABLE IF EXISTS tasks;")
        .map_err(|err| format_postgres_error(&err))
}
