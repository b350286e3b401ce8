// Archivo: store.rs
// Propósito: definir el trait `ResultsStore`, el contrato que deben
// implementar los backends de documentos (SQLite/Postgres vía Diesel,
// in-memory, etc.). La lógica del servicio nunca depende de un backend
// concreto.
use crate::document::{Document, Query};
use crate::errors::Result;
use crate::registry::DocumentSchema;

/// Resultado de una inserción.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertResult {
    /// Identidad asignada por el almacén, ya normalizada a string.
    pub inserted_id: Option<String>,
}

impl InsertResult {
    pub fn acknowledged(&self) -> bool {
        self.inserted_id.is_some()
    }
}

/// Contrato mínimo de un almacén de documentos de resultados.
///
/// Cada operación es autocontenida y atómica a nivel de documento. Un
/// resultado vacío es `Ok(vec![])`, nunca un error.
pub trait ResultsStore: Send + Sync {
    /// Persiste un documento en la colección del esquema. Fallos de
    /// conexión se reportan como `StoreUnavailable`; la unicidad sólo se
    /// garantiza si el backend tiene un índice propio.
    fn insert_one(&self, schema: &DocumentSchema, document: Document) -> Result<InsertResult>;

    /// Devuelve los documentos que coinciden con `query`, proyectados a
    /// `fields` (todos los campos si está vacío).
    fn find(&self, schema: &DocumentSchema, query: &Query, fields: &[&str]) -> Result<Vec<Document>>;

    /// Devuelve todos los documentos de la colección.
    fn find_all(&self, schema: &DocumentSchema) -> Result<Vec<Document>>;
}
