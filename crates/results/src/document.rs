// Archivo: document.rs
// Propósito: utilidades sobre documentos JSON compartidas por todos los
// backends: normalización de identidad, consultas por igualdad,
// proyección de campos y aplanado para exportación tabular.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Documento tal como lo maneja el almacén.
pub type Document = Map<String, Value>;

/// Clave reservada para la identidad asignada por el almacén.
pub const ID_FIELD: &str = "_id";

/// Normaliza una identidad nativa del almacén a string plano.
///
/// Acepta strings, números y el formato extendido `{"$oid": "..."}`.
pub fn normalize_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(normalize_id),
        _ => None,
    }
}

/// Devuelve el valor en una ruta con puntos (`inputs.a`).
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Consulta por igualdad sobre rutas de campos. Un documento coincide si
/// todos los pares ruta/valor coinciden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    filters: Map<String, Value>,
}

impl Query {
    /// Consulta vacía: coincide con todo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Añade una condición de igualdad.
    pub fn where_eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(path.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filters(&self) -> &Map<String, Value> {
        &self.filters
    }

    /// Valor esperado para una ruta exacta, si la consulta la restringe.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.filters.get(path)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|(path, expected)| {
                               if path == ID_FIELD {
                                   let actual = doc.get(ID_FIELD).and_then(normalize_id);
                                   return actual.is_some() && actual == normalize_id(expected);
                               }
                               lookup(doc, path).map(|actual| values_equal(actual, expected)).unwrap_or(false)
                           })
    }
}

impl From<Map<String, Value>> for Query {
    fn from(filters: Map<String, Value>) -> Self {
        Self { filters }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.filters.clone()))
    }
}

/// Igualdad JSON donde `1` y `1.0` se consideran iguales.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len() && xm.iter().all(|(k, x)| ym.get(k).map(|y| values_equal(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}

/// Proyecta un documento a los campos dados. `_id` se conserva siempre.
/// Con `fields` vacío devuelve el documento completo.
pub fn project(doc: &Document, fields: &[&str]) -> Document {
    if fields.is_empty() {
        return doc.clone();
    }
    let mut out = Document::new();
    if let Some(id) = doc.get(ID_FIELD) {
        out.insert(ID_FIELD.to_string(), id.clone());
    }
    for path in fields {
        if let Some(v) = lookup(doc, path) {
            insert_path(&mut out, path, v.clone());
        }
    }
    out
}

fn insert_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = doc.entry(head.to_string()).or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Aplana un documento anidado a un único nivel uniendo las claves con
/// `sep`. Arrays y objetos vacíos se conservan como hojas.
pub fn flatten_document(doc: &Document, sep: &str) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(None, doc, sep, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, map: &Document, sep: &str, out: &mut Vec<(String, Value)>) {
    for (k, v) in map {
        let key = match prefix {
            Some(p) => format!("{}{}{}", p, sep, k),
            None => k.clone(),
        };
        match v {
            Value::Object(inner) if !inner.is_empty() => flatten_into(Some(&key), inner, sep, out),
            _ => out.push((key, v.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn normalizes_native_ids() {
        assert_eq!(normalize_id(&json!("abc")), Some("abc".into()));
        assert_eq!(normalize_id(&json!(42)), Some("42".into()));
        assert_eq!(normalize_id(&json!({"$oid": "5f1d"})), Some("5f1d".into()));
        assert_eq!(normalize_id(&json!(null)), None);
        assert_eq!(normalize_id(&json!("")), None);
    }

    #[test]
    fn query_matches_dotted_paths_and_numbers() {
        let d = doc(json!({"_id": {"$oid": "x1"}, "flow_id": "f1", "inputs": {"a": 1.0}}));
        assert!(Query::new().matches(&d));
        assert!(Query::new().where_eq("flow_id", "f1").where_eq("inputs.a", 1).matches(&d));
        assert!(Query::new().where_eq("_id", "x1").matches(&d));
        assert!(!Query::new().where_eq("flow_id", "f2").matches(&d));
        assert!(!Query::new().where_eq("inputs.b", 1).matches(&d));
    }

    #[test]
    fn projection_keeps_id_and_nested_paths() {
        let d = doc(json!({"_id": "1", "flow_id": "f", "inputs": {"a": 1, "b": 2}, "outputs": {}}));
        let p = project(&d, &["inputs.a", "missing"]);
        assert_eq!(Value::Object(p), json!({"_id": "1", "inputs": {"a": 1}}));
        assert_eq!(project(&d, &[]), d);
    }

    #[test]
    fn flatten_joins_key_paths() {
        let d = doc(json!({"a": {"b": {"c": 1}, "d": [1, 2]}, "e": {}, "f": "x"}));
        let flat = flatten_document(&d, ".");
        let keys: Vec<&str> = flat.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a.b.c", "a.d", "e", "f"]);
        assert_eq!(flat[1].1, json!([1, 2]));
    }
}
