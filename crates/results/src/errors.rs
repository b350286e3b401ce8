// Archivo: errors.rs
// Propósito: definir los errores de la capa de resultados y el alias
// Result<T> usado por las APIs del crate.
use thiserror::Error;

/// Errores de la capa de persistencia de resultados.
///
/// La familia de validación (`MissingUniqueField`, `MissingField`,
/// `InvalidField`, `UnknownField`, `Encoding`) es siempre local y nunca se
/// reintenta. `NotFound`, `AmbiguousResult` y `EmptyResult` son resultados
/// esperados sobre los que el caller debe ramificar.
#[derive(Error, Debug)]
pub enum ResultsError {
    /// Un campo listado en `unique_on` falta o está vacío.
    #[error("Campo de unicidad no proporcionado: {0}")]
    MissingUniqueField(String),
    /// Falta un campo requerido por el esquema.
    #[error("Campo requerido no proporcionado: {0}")]
    MissingField(String),
    /// Un campo existe pero su valor no tiene la forma esperada.
    #[error("Campo inválido '{field}': {reason}")]
    InvalidField { field: String, reason: String },
    /// Esquema estricto: el campo no pertenece al tipo de documento.
    #[error("Campo desconocido '{field}' para el tipo de modelo '{model_type}'")]
    UnknownField { model_type: String, field: String },
    /// El codificador canónico no pudo serializar un valor.
    #[error("Error de codificación: {0}")]
    Encoding(String),
    /// El nombre de tipo de modelo no está registrado.
    #[error("Tipo de modelo desconocido: {0}")]
    UnknownModelType(String),
    /// Error de conexión o del backend de almacenamiento.
    #[error("Almacenamiento no disponible: {0}")]
    StoreUnavailable(String),
    /// Ya existe un resultado con el mismo `unique_hash` en la colección.
    #[error("Resultado duplicado: {0}")]
    DuplicateResult(String),
    /// La consulta de resultado único no devolvió documentos.
    #[error("No encontrado: {0}")]
    NotFound(String),
    /// La consulta de resultado único devolvió más de un documento.
    #[error("La consulta devolvió {count} resultados: {query}")]
    AmbiguousResult { count: usize, query: String },
    /// No hay filas que tabular.
    #[error("Sin resultados para tabular: {0}")]
    EmptyResult(String),
    /// Una fila no permite construir la tabla (p.ej. sin timestamp).
    #[error("Tabla mal formada: {0}")]
    MalformedTable(String),
    /// Error de serialización/deserialización JSON.
    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResultsError {
    /// Indica si el error pertenece a la familia de validación local.
    pub fn is_validation(&self) -> bool {
        matches!(self,
                 ResultsError::MissingUniqueField(_)
                 | ResultsError::MissingField(_)
                 | ResultsError::InvalidField { .. }
                 | ResultsError::UnknownField { .. }
                 | ResultsError::Encoding(_))
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ResultsError::InvalidField { field: field.to_string(), reason: reason.into() }
    }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, ResultsError>;
