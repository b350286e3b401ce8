//! Crate `results`: persistencia de resultados de workflows científicos
//!
//! Este crate define el modelo validado de resultado (`ResultRecord`), el
//! motor de fingerprint que deriva su `unique_hash`, el registro estático de
//! tipos de documento, el contrato de almacén `ResultsStore` con una
//! implementación en memoria (`InMemoryResultsStore`) y el servicio
//! `ResultsService` que orquesta todo y exporta tablas aplanadas.
//!
//! Diseño resumido:
//! - Identidad por contenido: el `unique_hash` es SHA-256 sobre los campos de
//!   `unique_on` canonicalizados, en su orden declarado.
//! - Esquema estricto: campos desconocidos se rechazan al construir.
//! - Backend intercambiable: el servicio sólo conoce el trait `ResultsStore`.
//!
//! Ejemplo rápido:
//! ```rust
//! use results::{InMemoryResultsStore, Query, ResultsService};
//! use serde_json::json;
//! use std::sync::Arc;
//! let service = ResultsService::with_standard_registry(Arc::new(InMemoryResultsStore::new()));
//! let fields = json!({"flow_id": "f1", "inputs": {"a": 1}, "outputs": {"b": 2}});
//! assert!(service.store("generic", fields.as_object().cloned().unwrap()).unwrap());
//! let found = service.find("generic", &Query::new().where_eq("flow_id", "f1"), &[]).unwrap();
//! assert_eq!(found.len(), 1);
//! ```
pub mod document;
pub mod errors;
pub mod fingerprint;
pub mod record;
pub mod registry;
pub mod service;
pub mod store;
pub mod stubs;
pub mod table;

pub use document::{Document, Query};
pub use errors::*;
pub use fingerprint::{fingerprint, fingerprint_fields, fingerprint_value};
pub use record::{ImpactDetail, ResultDetail, ResultRecord};
pub use registry::{DocumentRegistry, DocumentSchema, ModelType};
pub use service::ResultsService;
pub use store::{InsertResult, ResultsStore};
pub use stubs::InMemoryResultsStore;
pub use table::{ResultTable, TableRow};
