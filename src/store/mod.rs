// SPDX-License-Identifier: Apache-2.0

//! Record stores for parsed access log records.
//!
//! # Supported Backends
//!
//! - **PostgreSQL** (feature: `postgres`, default)
//! - **SQLite** (feature: `sqlite`, default)
//!
//! Both implement [`RecordStore`] with insert-if-absent semantics keyed by the
//! record id.

mod config;
mod error;
mod schema;
mod traits;

pub mod backends;

pub use config::{BackendType, StoreConfig};
pub use error::{BoxedError, StoreError};
pub use schema::{TABLE_NAME, schema_script, schema_statements};
pub use traits::RecordStore;

/// Open the store described by `config`.
///
/// The schema is not provisioned here; call [`RecordStore::initialize`].
///
/// # Errors
///
/// Returns `StoreError::InvalidConnectionString` if the backend is not
/// compiled in, or a connection error from the backend.
pub async fn create_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>, StoreError> {
    let store: Box<dyn RecordStore> = match config.backend {
        #[cfg(feature = "sqlite")]
        BackendType::Sqlite => {
            Box::new(backends::sqlite::SqliteStore::new(&config.connection_string).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        BackendType::Sqlite => {
            return Err(StoreError::InvalidConnectionString(
                "SQLite backend not compiled in (enable 'sqlite' feature)".into(),
            ));
        }
        #[cfg(feature = "postgres")]
        BackendType::Postgres => Box::new(
            backends::postgres::PostgresStore::new(&config.connection_string, config.pool_size)
                .await?,
        ),
        #[cfg(not(feature = "postgres"))]
        BackendType::Postgres => {
            return Err(StoreError::InvalidConnectionString(
                "PostgreSQL backend not compiled in (enable 'postgres' feature)".into(),
            ));
        }
    };

    Ok(store)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_sqlite_memory_store() {
        let config = StoreConfig::from_url("sqlite::memory:").unwrap();
        let store = create_store(&config).await.unwrap();

        assert_eq!(store.backend_name(), "sqlite");
        store.initialize().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.close().await;
    }
}
