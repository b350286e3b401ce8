// Archivo: stubs.rs
// Propósito: almacén de documentos en memoria para pruebas y wiring rápido.
//
// No es durable y no tiene índice de unicidad: dos inserciones con el mismo
// `unique_hash` se aceptan ambas. Útil para demos o pruebas locales.
use crate::document::{project, Document, Query, ID_FIELD};
use crate::errors::Result;
use crate::registry::DocumentSchema;
use crate::store::{InsertResult, ResultsStore};
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

/// Almacén en memoria indexado por nombre de colección.
///
/// Las colecciones viven en un `DashMap`, por lo que varios hilos pueden
/// insertar y leer a la vez; cada inserción es atómica por documento.
#[derive(Debug, Default)]
pub struct InMemoryResultsStore {
    collections: DashMap<String, Vec<Document>>,
}

impl InMemoryResultsStore {
    /// Crea un almacén vacío.
    pub fn new() -> Self {
        Self::default()
    }

    /// Número de documentos en una colección.
    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map(|docs| docs.len()).unwrap_or(0)
    }
}

impl ResultsStore for InMemoryResultsStore {
    /// Inserta el documento asignando un `_id` UUID v4.
    fn insert_one(&self, schema: &DocumentSchema, mut document: Document) -> Result<InsertResult> {
        let id = Uuid::new_v4().to_string();
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        self.collections.entry(schema.collection().to_string()).or_default().push(document);
        Ok(InsertResult { inserted_id: Some(id) })
    }

    fn find(&self, schema: &DocumentSchema, query: &Query, fields: &[&str]) -> Result<Vec<Document>> {
        Ok(self.collections
               .get(schema.collection())
               .map(|docs| docs.iter().filter(|d| query.matches(d)).map(|d| project(d, fields)).collect())
               .unwrap_or_default())
    }

    fn find_all(&self, schema: &DocumentSchema) -> Result<Vec<Document>> {
        Ok(self.collections.get(schema.collection()).map(|docs| docs.clone()).unwrap_or_default())
    }
}
