// Archivo: fingerprint.rs
// Propósito: calcular fingerprints deterministas (SHA-256 hex) sobre JSON
// canonicalizado. Es la base del `unique_hash` de los resultados.
//
// Forma canónica:
// - objetos con claves ordenadas lexicográficamente (recursivo);
// - arrays en su orden original (el orden de secuencia es semántico);
// - strings con el escape JSON de serde_json;
// - números con la representación fija de serde_json (enteros en decimal,
//   flotantes con el formato ryu más corto, p.ej. `2.0`).
use crate::errors::{Result, ResultsError};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Fingerprint de un mapping arbitrario. Independiente del orden de
/// inserción de las claves.
pub fn fingerprint(mapping: &Map<String, Value>) -> Result<String> {
    let mut out = Vec::new();
    write_object(mapping.iter(), &mut out, true)?;
    Ok(digest_hex(&out))
}

/// Fingerprint de cualquier valor serializable.
pub fn fingerprint_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value).map_err(|e| ResultsError::Encoding(e.to_string()))?;
    Ok(digest_hex(&canonical_bytes(&v)?))
}

/// Fingerprint de una lista ordenada de campos. El nivel superior se emite
/// en el orden dado; los valores anidados se canonicalizan.
pub fn fingerprint_fields(fields: &[(&str, &Value)]) -> Result<String> {
    let mut out = Vec::new();
    write_object(fields.iter().map(|(k, v)| (*k, *v)), &mut out, false)?;
    Ok(digest_hex(&out))
}

/// Bytes canónicos de un valor JSON.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_value(value, &mut out)?;
    Ok(out)
}

fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(ResultsError::Encoding(format!("número no finito: {}", n)));
                }
            }
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => write_string(s, out)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map.iter(), out, true)?,
    }
    Ok(())
}

fn write_object<'a, K, I>(entries: I, out: &mut Vec<u8>, sort: bool) -> Result<()>
    where K: AsRef<str> + 'a,
          I: Iterator<Item = (K, &'a Value)>
{
    let mut entries: Vec<(K, &Value)> = entries.collect();
    if sort {
        entries.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
    }
    out.push(b'{');
    for (i, (k, v)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        write_string(k.as_ref(), out)?;
        out.push(b':');
        write_value(v, out)?;
    }
    out.push(b'}');
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
    let escaped = serde_json::to_string(s).map_err(|e| ResultsError::Encoding(e.to_string()))?;
    out.extend_from_slice(escaped.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn as_map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn key_order_does_not_change_fingerprint() {
        let mut a = Map::new();
        a.insert("x".into(), json!(1));
        a.insert("y".into(), json!({"b": [1, 2], "a": "s"}));
        let mut b = Map::new();
        b.insert("y".into(), json!({"a": "s", "b": [1, 2]}));
        b.insert("x".into(), json!(1));
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn leaf_change_changes_fingerprint() {
        let a = as_map(json!({"inputs": {"a": 1}, "outputs": {"b": 2}}));
        let b = as_map(json!({"inputs": {"a": 1}, "outputs": {"b": 3}}));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn sequence_order_is_significant() {
        let a = as_map(json!({"v": [1, 2, 3]}));
        let b = as_map(json!({"v": [3, 2, 1]}));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn integer_and_float_are_distinct() {
        let a = as_map(json!({"v": 2}));
        let b = as_map(json!({"v": 2.0}));
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn canonical_form_is_stable() {
        let v = json!({"b": [true, null, 1.5], "a": "é\"q"});
        let bytes = canonical_bytes(&v).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":"é\"q","b":[true,null,1.5]}"#);
    }

    #[test]
    fn digest_is_sha256_hex() {
        let fp = fingerprint(&Map::new()).unwrap();
        assert_eq!(fp.len(), 64);
        // sha256("{}")
        assert_eq!(fp, "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a");
    }

    #[test]
    fn declared_field_order_is_kept_at_top_level() {
        let i = json!({"a": 1});
        let f = json!("f1");
        let first = fingerprint_fields(&[("inputs", &i), ("flow_id", &f)]).unwrap();
        let second = fingerprint_fields(&[("flow_id", &f), ("inputs", &i)]).unwrap();
        assert_ne!(first, second);
        let again = fingerprint_fields(&[("inputs", &json!({"a": 1})), ("flow_id", &f)]).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn non_string_keys_fail_with_encoding_error() {
        let mut m: HashMap<(i32, i32), i32> = HashMap::new();
        m.insert((1, 2), 3);
        match fingerprint_value(&m) {
            Err(ResultsError::Encoding(_)) => {}
            other => panic!("se esperaba Encoding, got {:?}", other),
        }
    }
}
