// Archivo: service.rs
// Propósito: implementar `ResultsService`, la fachada que une validación,
// registro de tipos y almacén, y añade lo que el almacén no ofrece de forma
// nativa (chequeo de duplicados, resultado único, exportación tabular).
use crate::document::{flatten_document, normalize_id, Document, Query, ID_FIELD};
use crate::errors::{Result, ResultsError};
use crate::record::{parse_timestamp, ResultRecord};
use crate::registry::{DocumentRegistry, DocumentSchema};
use crate::store::ResultsStore;
use crate::table::{ResultTable, TableRow};
use rayon::prelude::*;
use serde_json::Value;
use std::sync::Arc;

/// Separador usado al aplanar claves anidadas.
pub const FLATTEN_SEPARATOR: &str = ".";

/// Servicio de alto nivel sobre resultados.
///
/// Recibe el almacén y el registro por constructor; no hay singletons ni
/// descubrimiento de servicios. Cada llamada es síncrona y autocontenida.
pub struct ResultsService<S>
    where S: ResultsStore + ?Sized
{
    store: Arc<S>,
    registry: Arc<DocumentRegistry>,
}

impl<S> ResultsService<S> where S: ResultsStore + ?Sized
{
    /// Crea el servicio inyectando el almacén y el registro de tipos.
    pub fn new(store: Arc<S>, registry: Arc<DocumentRegistry>) -> Self {
        Self { store, registry }
    }

    /// Atajo con el registro estándar del proceso.
    pub fn with_standard_registry(store: Arc<S>) -> Self {
        Self::new(store, DocumentRegistry::standard())
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    fn schema(&self, model_type: &str) -> Result<&'static DocumentSchema> {
        self.registry.resolve(model_type)
    }

    /// Valida los campos, construye el resultado y lo inserta.
    ///
    /// Devuelve `true` si el almacén asignó identidad y `false` si aceptó la
    /// escritura sin devolverla. El `false` es intencional: es la única
    /// señal de fallo no excepcional; los errores reales se propagan.
    pub fn store(&self, model_type: &str, fields: Document) -> Result<bool> {
        let schema = self.schema(model_type)?;
        let record = ResultRecord::construct(schema, fields)?;
        self.insert_record(&record)
    }

    /// Inserta un resultado ya construido.
    ///
    /// Si la colección ya contiene el mismo `unique_hash` se rechaza con
    /// `DuplicateResult`. El chequeo y la inserción no son atómicos: dos
    /// escritores concurrentes pueden insertar ambos salvo que el backend
    /// tenga índice de unicidad.
    pub fn insert_record(&self, record: &ResultRecord) -> Result<bool> {
        let schema = record.schema();
        if self.exists_in(schema, record.unique_hash())? {
            log::warn!("resultado duplicado en '{}': {}", schema.collection(), record.unique_hash());
            return Err(ResultsError::DuplicateResult(record.unique_hash().to_string()));
        }
        let res = self.store.insert_one(schema, record.to_document())?;
        match res.inserted_id {
            Some(id) => {
                log::debug!("resultado insertado en '{}' con id {}", schema.collection(), id);
                Ok(true)
            }
            None => {
                log::warn!("inserción aceptada sin identidad en '{}' (hash {})",
                           schema.collection(),
                           record.unique_hash());
                Ok(false)
            }
        }
    }

    /// Indica si existe un resultado con ese `unique_hash`.
    pub fn exists(&self, model_type: &str, unique_hash: &str) -> Result<bool> {
        self.exists_in(self.schema(model_type)?, unique_hash)
    }

    fn exists_in(&self, schema: &DocumentSchema, unique_hash: &str) -> Result<bool> {
        let query = Query::new().where_eq("unique_hash", unique_hash);
        Ok(!self.store.find(schema, &query, &["unique_hash"])?.is_empty())
    }

    /// Documentos que coinciden con la consulta, proyectados a `fields`.
    /// La identidad se devuelve siempre como string.
    pub fn find(&self, model_type: &str, query: &Query, fields: &[&str]) -> Result<Vec<Document>> {
        let schema = self.schema(model_type)?;
        log::debug!("find en '{}' con {}", schema.collection(), query);
        let docs = self.store.find(schema, query, fields)?;
        Ok(docs.into_iter().map(normalize_doc_id).collect())
    }

    /// Todos los documentos de la colección del tipo de modelo.
    pub fn find_all(&self, model_type: &str) -> Result<Vec<Document>> {
        let schema = self.schema(model_type)?;
        let docs = self.store.find_all(schema)?;
        Ok(docs.into_iter().map(normalize_doc_id).collect())
    }

    /// Como `find`, pero decodificando cada documento a `ResultRecord`.
    pub fn find_records(&self, model_type: &str, query: &Query) -> Result<Vec<ResultRecord>> {
        let schema = self.schema(model_type)?;
        self.store
            .find(schema, query, &[])?
            .into_iter()
            .map(|doc| ResultRecord::from_document(schema, doc))
            .collect()
    }

    /// Carga exactamente un resultado. Cero coincidencias es `NotFound` y
    /// más de una es `AmbiguousResult`; nunca se devuelve "el primero".
    pub fn load_result(&self, model_type: &str, query: &Query) -> Result<ResultRecord> {
        let mut records = self.find_records(model_type, query)?;
        match records.len() {
            0 => Err(ResultsError::NotFound(format!("la consulta no devolvió resultados: {}", query))),
            1 => Ok(records.remove(0)),
            count => Err(ResultsError::AmbiguousResult { count, query: query.to_string() }),
        }
    }

    /// Exporta los documentos encontrados como tabla aplanada.
    ///
    /// La columna `date` se parsea desde el campo de timestamp del esquema,
    /// que se añade a la proyección si `fields` no está vacío. Sin filas se
    /// devuelve `EmptyResult`.
    pub fn load_dataframe(&self, model_type: &str, query: &Query, fields: &[&str]) -> Result<ResultTable> {
        let schema = self.schema(model_type)?;
        let ts_field = schema.timestamp_field();
        let mut projection: Vec<&str> = fields.to_vec();
        if !projection.is_empty() && !projection.contains(&ts_field) {
            projection.push(ts_field);
        }
        let docs = self.find(model_type, query, &projection)?;
        if docs.is_empty() {
            return Err(ResultsError::EmptyResult(format!("'{}' sin documentos para {}", schema.collection(), query)));
        }
        let rows = docs.par_iter().map(|doc| to_row(doc, ts_field)).collect::<Result<Vec<_>>>()?;
        Ok(ResultTable::from_rows(rows))
    }
}

fn normalize_doc_id(mut doc: Document) -> Document {
    if let Some(id) = doc.get(ID_FIELD).and_then(normalize_id) {
        doc.insert(ID_FIELD.to_string(), Value::String(id));
    }
    doc
}

fn to_row(doc: &Document, ts_field: &str) -> Result<TableRow> {
    let id = doc.get(ID_FIELD)
                .and_then(normalize_id)
                .ok_or_else(|| ResultsError::MalformedTable("documento sin _id".into()))?;
    let date = doc.get(ts_field)
                  .and_then(Value::as_str)
                  .and_then(parse_timestamp)
                  .ok_or_else(|| ResultsError::MalformedTable(format!("documento {} sin '{}' válido", id, ts_field)))?;
    let values = flatten_document(doc, FLATTEN_SEPARATOR).into_iter().filter(|(k, _)| k != ID_FIELD).collect();
    Ok(TableRow { id, date, values })
}
