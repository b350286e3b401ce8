// Archivo: registry.rs
// Propósito: registro estático de tipos de documento. Mapea el nombre
// lógico de un tipo de modelo ("generic", "impact") al esquema concreto y a
// su colección. Se inicializa una vez al arrancar el proceso y es de sólo
// lectura a partir de entonces.
use crate::errors::{Result, ResultsError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Tipos de resultado soportados. Conjunto cerrado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Generic,
    Impact,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Generic => "generic",
            ModelType::Impact => "impact",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ResultsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "generic" => Ok(ModelType::Generic),
            "impact" | "impact-simulation" => Ok(ModelType::Impact),
            _ => Err(ResultsError::UnknownModelType(s.to_string())),
        }
    }
}

/// Descriptor de un tipo de documento: colección, tag de tipo, campos
/// propios de la variante y campos de unicidad por defecto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSchema {
    model_type: ModelType,
    collection: &'static str,
    result_type: &'static str,
    unique_on: &'static [&'static str],
    variant_fields: &'static [&'static str],
    timestamp_field: &'static str,
}

/// Campos comunes a todas las variantes (sin contar `_id`).
pub const COMMON_FIELDS: &[&str] =
    &["model_type", "flow_id", "inputs", "outputs", "date_modified", "unique_hash", "result_type_string"];

pub static GENERIC_SCHEMA: DocumentSchema = DocumentSchema { model_type: ModelType::Generic,
                                                             collection: "generic",
                                                             result_type: "results::record::GenericResult",
                                                             unique_on: &["inputs", "outputs", "flow_id"],
                                                             variant_fields: &[],
                                                             timestamp_field: "date_modified" };

pub static IMPACT_SCHEMA: DocumentSchema =
    DocumentSchema { model_type: ModelType::Impact,
                     collection: "impact",
                     result_type: "results::record::ImpactResult",
                     unique_on: &["inputs", "outputs", "flow_id", "archive", "pv_collection_isotime"],
                     variant_fields: &["plot_file", "archive", "pv_collection_isotime", "config"],
                     timestamp_field: "pv_collection_isotime" };

impl DocumentSchema {
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Identificador calificado de la variante, usado para elegir el
    /// decodificador al leer.
    pub fn result_type(&self) -> &'static str {
        self.result_type
    }

    pub fn default_unique_on(&self) -> &'static [&'static str] {
        self.unique_on
    }

    pub fn variant_fields(&self) -> &'static [&'static str] {
        self.variant_fields
    }

    /// Campo de timestamp del que se deriva la columna `date` al tabular.
    pub fn timestamp_field(&self) -> &'static str {
        self.timestamp_field
    }

    /// Indica si `name` es un campo declarado del esquema.
    pub fn has_field(&self, name: &str) -> bool {
        COMMON_FIELDS.contains(&name) || self.variant_fields.contains(&name)
    }
}

/// Registro inmutable de esquemas indexado por nombre de tipo de modelo.
#[derive(Debug, Clone)]
pub struct DocumentRegistry {
    schemas: IndexMap<&'static str, &'static DocumentSchema>,
}

static STANDARD: Lazy<Arc<DocumentRegistry>> =
    Lazy::new(|| Arc::new(DocumentRegistry::with_schemas([&GENERIC_SCHEMA, &IMPACT_SCHEMA])));

impl DocumentRegistry {
    /// Registro estándar del proceso con todas las variantes conocidas.
    pub fn standard() -> Arc<DocumentRegistry> {
        STANDARD.clone()
    }

    /// Construye un registro restringido a los esquemas dados.
    pub fn with_schemas<I>(schemas: I) -> Self
        where I: IntoIterator<Item = &'static DocumentSchema>
    {
        let schemas = schemas.into_iter().map(|s| (s.model_type.as_str(), s)).collect();
        Self { schemas }
    }

    /// Resuelve un nombre de tipo de modelo a su esquema.
    pub fn resolve(&self, model_type: &str) -> Result<&'static DocumentSchema> {
        let mt: ModelType = model_type.parse()?;
        self.schemas
            .get(mt.as_str())
            .copied()
            .ok_or_else(|| ResultsError::UnknownModelType(model_type.to_string()))
    }

    /// Nombres registrados, en orden de registro.
    pub fn model_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.schemas.keys().copied()
    }
}
