// Archivo: table.rs
// Propósito: tabla orientada a filas producida por la exportación tabular
// (`load_dataframe`). Cada fila lleva la identidad como string, la fecha
// parseada y los valores aplanados.
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

/// Nombre de la columna de identidad.
pub const ID_COLUMN: &str = "_id";
/// Nombre de la columna de fecha derivada.
pub const DATE_COLUMN: &str = "date";

/// Fila de la tabla.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: String,
    pub date: DateTime<Utc>,
    /// Columnas aplanadas (`inputs.a`, `outputs.b`, ...), en orden de
    /// aparición.
    pub values: IndexMap<String, Value>,
}

/// Tabla de resultados aplanados.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<TableRow>,
}

impl ResultTable {
    /// Construye la tabla; las columnas son `_id`, `date` y la unión de
    /// claves de las filas en orden de primera aparición.
    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        let mut columns: IndexSet<String> = IndexSet::new();
        columns.insert(ID_COLUMN.to_string());
        columns.insert(DATE_COLUMN.to_string());
        for row in &rows {
            for key in row.values.keys() {
                columns.insert(key.clone());
            }
        }
        Self { columns: columns.into_iter().collect(), rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Valores de una columna, uno por fila (`None` si la fila no la tiene).
    /// `_id` y `date` se devuelven como strings.
    pub fn column(&self, name: &str) -> Vec<Option<Value>> {
        self.rows
            .iter()
            .map(|row| match name {
                ID_COLUMN => Some(Value::String(row.id.clone())),
                DATE_COLUMN => Some(Value::String(row.date.to_rfc3339())),
                _ => row.values.get(name).cloned(),
            })
            .collect()
    }
}
