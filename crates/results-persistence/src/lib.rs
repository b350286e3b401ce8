//! Persistencia Diesel para el almacén de resultados.
//!
//! Expone `DieselResultsStore`, una implementación de `results::ResultsStore`
//! sobre SQLite (por defecto) o Postgres (feature `pg`), junto con la
//! configuración leída del entorno.

pub mod config;
mod document_store;
pub mod schema;

pub use config::StoreConfig;
#[cfg(not(feature = "pg"))]
pub use document_store::new_sqlite_for_test;
pub use document_store::{new_from_env, DieselResultsStore, MIGRATIONS};
