//! A helper program to create the catalog tables.

use catalog::config::{get_optional_variable, get_variable, StoreConfig};
use catalog::db::PgDb;

use log::{debug, initialize_logger};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();
    let connection_string = get_variable("CATALOG_DB_CONNECTION_STRING");

    debug!(logger, "Connecting to database...");

    let pool = sqlx::postgres::PgPool::connect(&connection_string)
        .await
        .expect("could not connect to database");

    let config = StoreConfig::new(get_optional_variable("CATALOG_MODE").unwrap_or_default());
    let db = PgDb::new(pool, config);

    debug!(logger, "Creating tables...");
    db.initialize().await.expect("failed to create tables");

    debug!(logger, "Completed initialization.");
}
