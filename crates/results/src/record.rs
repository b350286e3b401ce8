// Archivo: record.rs
// Propósito: modelo validado de un resultado almacenado. La construcción
// valida los campos de unicidad, deriva el `unique_hash`, normaliza la
// identidad del almacén y rechaza campos fuera del esquema.
use crate::document::{normalize_id, Document, ID_FIELD};
use crate::errors::{Result, ResultsError};
use crate::fingerprint::fingerprint_fields;
use crate::registry::{DocumentSchema, ModelType};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// Campos propios de cada variante de resultado.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultDetail {
    Generic,
    Impact(ImpactDetail),
}

/// Campos de un resultado de simulación de impacto. Las referencias a
/// archivos son opacas: nunca se resuelven aquí.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactDetail {
    pub plot_file: Option<String>,
    pub archive: String,
    pub pv_collection_isotime: DateTime<Utc>,
    pub config: Map<String, Value>,
}

/// Resultado validado e inmutable.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    id: Option<String>,
    schema: &'static DocumentSchema,
    flow_id: String,
    inputs: Map<String, Value>,
    outputs: Map<String, Value>,
    date_modified: DateTime<Utc>,
    unique_on: Vec<String>,
    unique_hash: String,
    detail: ResultDetail,
}

impl ResultRecord {
    /// Construye y valida un resultado a partir de un conjunto de campos.
    ///
    /// Si `unique_hash` viene informado se respeta tal cual (carga de un
    /// registro existente); si no, se calcula sobre los campos de
    /// `unique_on` en su orden declarado.
    pub fn construct(schema: &'static DocumentSchema, mut fields: Document) -> Result<Self> {
        let unique_on = take_unique_on(schema, &mut fields)?;
        for name in &unique_on {
            if fields.get(name).map(is_empty_value).unwrap_or(true) {
                return Err(ResultsError::MissingUniqueField(name.clone()));
            }
        }

        let id = match fields.remove(ID_FIELD).or_else(|| fields.remove("id")) {
            None | Some(Value::Null) => None,
            Some(v) => Some(normalize_id(&v).ok_or_else(|| ResultsError::invalid(ID_FIELD, "identidad no normalizable"))?),
        };

        for key in ["model_type", "collection"] {
            if let Some(v) = fields.remove(key) {
                let named = v.as_str().ok_or_else(|| ResultsError::invalid(key, "se esperaba string"))?;
                let mt: ModelType = named.parse()?;
                if mt != schema.model_type() {
                    return Err(ResultsError::invalid(key,
                                                     format!("'{}' no corresponde al esquema '{}'",
                                                             named,
                                                             schema.model_type())));
                }
            }
        }
        // Siempre se deriva del esquema.
        fields.remove("result_type_string");

        let flow_id = take_string(&mut fields, "flow_id")?.ok_or_else(|| ResultsError::MissingField("flow_id".into()))?;
        if flow_id.trim().is_empty() {
            return Err(ResultsError::invalid("flow_id", "no puede estar vacío"));
        }
        let inputs = take_object(&mut fields, "inputs")?.ok_or_else(|| ResultsError::MissingField("inputs".into()))?;
        let outputs = take_object(&mut fields, "outputs")?.ok_or_else(|| ResultsError::MissingField("outputs".into()))?;
        let date_modified = take_timestamp(&mut fields, "date_modified")?.unwrap_or_else(Utc::now);
        let supplied_hash = take_string(&mut fields, "unique_hash")?.filter(|h| !h.is_empty());

        let detail = match schema.model_type() {
            ModelType::Generic => ResultDetail::Generic,
            ModelType::Impact => {
                let archive =
                    take_string(&mut fields, "archive")?.ok_or_else(|| ResultsError::MissingField("archive".into()))?;
                let pv_collection_isotime = take_timestamp(&mut fields, "pv_collection_isotime")?
                    .ok_or_else(|| ResultsError::MissingField("pv_collection_isotime".into()))?;
                ResultDetail::Impact(ImpactDetail { plot_file: take_string(&mut fields, "plot_file")?,
                                                    archive,
                                                    pv_collection_isotime,
                                                    config: take_object(&mut fields, "config")?.unwrap_or_default() })
            }
        };

        // Esquema estricto: cualquier clave restante es desconocida.
        if let Some(field) = fields.keys().next() {
            return Err(ResultsError::UnknownField { model_type: schema.model_type().to_string(),
                                                    field: field.clone() });
        }

        let mut record = Self { id,
                                schema,
                                flow_id,
                                inputs,
                                outputs,
                                date_modified,
                                unique_on,
                                unique_hash: String::new(),
                                detail };
        record.unique_hash = match supplied_hash {
            Some(h) => h,
            None => record.compute_unique_hash()?,
        };
        Ok(record)
    }

    /// Decodifica un documento leído del almacén. El `unique_hash`
    /// almacenado se conserva.
    pub fn from_document(schema: &'static DocumentSchema, doc: Document) -> Result<Self> {
        Self::construct(schema, doc)
    }

    /// Representación persistible, sin `_id`. `unique_on` sólo se incluye
    /// cuando difiere del valor por defecto del esquema, para que el hash se
    /// pueda recalcular al leer.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("model_type".into(), Value::String(self.schema.model_type().to_string()));
        doc.insert("flow_id".into(), Value::String(self.flow_id.clone()));
        doc.insert("inputs".into(), Value::Object(self.inputs.clone()));
        doc.insert("outputs".into(), Value::Object(self.outputs.clone()));
        doc.insert("date_modified".into(), timestamp_value(&self.date_modified));
        doc.insert("unique_hash".into(), Value::String(self.unique_hash.clone()));
        doc.insert("result_type_string".into(), Value::String(self.result_type_string().to_string()));
        if let ResultDetail::Impact(impact) = &self.detail {
            if let Some(plot) = &impact.plot_file {
                doc.insert("plot_file".into(), Value::String(plot.clone()));
            }
            doc.insert("archive".into(), Value::String(impact.archive.clone()));
            doc.insert("pv_collection_isotime".into(), timestamp_value(&impact.pv_collection_isotime));
            doc.insert("config".into(), Value::Object(impact.config.clone()));
        }
        if !self.has_default_unique_on() {
            doc.insert("unique_on".into(),
                       Value::Array(self.unique_on.iter().cloned().map(Value::String).collect()));
        }
        doc
    }

    fn has_default_unique_on(&self) -> bool {
        self.unique_on.iter().map(String::as_str).eq(self.schema.default_unique_on().iter().copied())
    }

    /// Valor documental de un campo del esquema.
    pub fn field_value(&self, name: &str) -> Option<Value> {
        let mut doc = self.to_document();
        if let Some(id) = &self.id {
            doc.insert(ID_FIELD.into(), Value::String(id.clone()));
        }
        doc.remove(name)
    }

    /// Sub-mapping restringido a los campos de unicidad.
    pub fn unique_index(&self) -> Map<String, Value> {
        self.unique_on
            .iter()
            .filter_map(|name| self.field_value(name).map(|v| (name.clone(), v)))
            .collect()
    }

    /// Recalcula el hash y lo compara con el almacenado.
    pub fn verify_integrity(&self) -> bool {
        self.compute_unique_hash().map(|h| h == self.unique_hash).unwrap_or(false)
    }

    fn compute_unique_hash(&self) -> Result<String> {
        let doc = self.to_document();
        let mut ordered: Vec<(&str, &Value)> = Vec::with_capacity(self.unique_on.len());
        for name in &self.unique_on {
            let v = doc.get(name).ok_or_else(|| ResultsError::MissingUniqueField(name.clone()))?;
            ordered.push((name.as_str(), v));
        }
        fingerprint_fields(&ordered)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn schema(&self) -> &'static DocumentSchema {
        self.schema
    }

    pub fn model_type(&self) -> ModelType {
        self.schema.model_type()
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn inputs(&self) -> &Map<String, Value> {
        &self.inputs
    }

    pub fn outputs(&self) -> &Map<String, Value> {
        &self.outputs
    }

    pub fn date_modified(&self) -> DateTime<Utc> {
        self.date_modified
    }

    pub fn unique_on(&self) -> &[String] {
        &self.unique_on
    }

    pub fn unique_hash(&self) -> &str {
        &self.unique_hash
    }

    pub fn result_type_string(&self) -> &'static str {
        self.schema.result_type()
    }

    pub fn detail(&self) -> &ResultDetail {
        &self.detail
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
               "ResultRecord(type: {}, flow_id: {}, id: {}, hash: {})",
               self.schema.model_type(),
               self.flow_id,
               self.id.as_deref().unwrap_or("-"),
               self.unique_hash)
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn take_unique_on(schema: &DocumentSchema, fields: &mut Document) -> Result<Vec<String>> {
    let names: Vec<String> = match fields.remove("unique_on").or_else(|| fields.remove("index")) {
        None | Some(Value::Null) => schema.default_unique_on().iter().map(|s| s.to_string()).collect(),
        Some(Value::Array(items)) => items.into_iter()
                                          .map(|v| match v {
                                              Value::String(s) => Ok(s),
                                              other => Err(ResultsError::invalid("unique_on",
                                                                                 format!("nombre no string: {}", other))),
                                          })
                                          .collect::<Result<_>>()?,
        Some(_) => return Err(ResultsError::invalid("unique_on", "se esperaba una lista de nombres")),
    };
    if names.is_empty() {
        return Err(ResultsError::invalid("unique_on", "no puede estar vacío"));
    }
    for name in &names {
        if name == "unique_hash" || name == "result_type_string" || !schema.has_field(name) {
            return Err(ResultsError::invalid("unique_on", format!("campo no válido para unicidad: {}", name)));
        }
    }
    Ok(names)
}

fn take_string(fields: &mut Document, key: &str) -> Result<Option<String>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ResultsError::invalid(key, format!("se esperaba string, se obtuvo {}", other))),
    }
}

fn take_object(fields: &mut Document, key: &str) -> Result<Option<Map<String, Value>>> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(other) => Err(ResultsError::invalid(key, format!("se esperaba un objeto, se obtuvo {}", other))),
    }
}

fn take_timestamp(fields: &mut Document, key: &str) -> Result<Option<DateTime<Utc>>> {
    match take_string(fields, key)? {
        None => Ok(None),
        Some(s) => parse_timestamp(&s).map(Some).ok_or_else(|| ResultsError::invalid(key, format!("timestamp inválido: {}", s))),
    }
}

/// Interpreta RFC 3339 o ISO-8601 sin zona (se asume UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|n| n.and_utc())
}

fn timestamp_value(dt: &DateTime<Utc>) -> Value {
    Value::String(dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{GENERIC_SCHEMA, IMPACT_SCHEMA};
    use serde_json::json;

    fn fields(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    fn generic_fields() -> Document {
        fields(json!({
            "flow_id": "test_flow_id",
            "inputs": {"input1": 2.0, "input2": [1, 2, 3, 4, 5], "input3": "my_file.txt"},
            "outputs": {"output1": 2.0, "output2": [1, 2, 3, 4, 5], "output3": "my_file.txt"},
        }))
    }

    #[test]
    fn identical_fields_yield_identical_hash() -> Result<()> {
        let a = ResultRecord::construct(&GENERIC_SCHEMA, generic_fields())?;
        let b = ResultRecord::construct(&GENERIC_SCHEMA, generic_fields())?;
        assert_eq!(a.unique_hash(), b.unique_hash());
        assert_eq!(a.unique_hash().len(), 64);
        assert_eq!(a.result_type_string(), "results::record::GenericResult");
        assert!(a.verify_integrity());
        Ok(())
    }

    #[test]
    fn date_modified_does_not_affect_hash() -> Result<()> {
        let mut f = generic_fields();
        f.insert("date_modified".into(), json!("2020-01-01T00:00:00Z"));
        let a = ResultRecord::construct(&GENERIC_SCHEMA, f)?;
        let b = ResultRecord::construct(&GENERIC_SCHEMA, generic_fields())?;
        assert_eq!(a.unique_hash(), b.unique_hash());
        Ok(())
    }

    #[test]
    fn missing_unique_field_is_named() {
        for name in ["inputs", "outputs", "flow_id"] {
            let mut f = generic_fields();
            f.remove(name);
            match ResultRecord::construct(&GENERIC_SCHEMA, f) {
                Err(ResultsError::MissingUniqueField(field)) => assert_eq!(field, name),
                other => panic!("se esperaba MissingUniqueField({}), got {:?}", name, other),
            }
        }
    }

    #[test]
    fn empty_unique_field_is_rejected() {
        let mut f = generic_fields();
        f.insert("outputs".into(), json!({}));
        assert!(matches!(ResultRecord::construct(&GENERIC_SCHEMA, f), Err(ResultsError::MissingUniqueField(ref n)) if n == "outputs"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut f = generic_fields();
        f.insert("plot_file".into(), json!("x.png"));
        match ResultRecord::construct(&GENERIC_SCHEMA, f) {
            Err(e @ ResultsError::UnknownField { .. }) => assert!(e.is_validation()),
            other => panic!("se esperaba UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn supplied_hash_bypasses_derivation() -> Result<()> {
        let mut f = generic_fields();
        f.insert("unique_hash".into(), json!("abc"));
        f.insert("_id".into(), json!({"$oid": "507f1f77bcf86cd799439011"}));
        let r = ResultRecord::construct(&GENERIC_SCHEMA, f)?;
        assert_eq!(r.unique_hash(), "abc");
        assert_eq!(r.id(), Some("507f1f77bcf86cd799439011"));
        assert!(!r.verify_integrity());
        Ok(())
    }

    #[test]
    fn declared_unique_order_is_part_of_the_hash() -> Result<()> {
        let mut f = generic_fields();
        f.insert("unique_on".into(), json!(["flow_id", "inputs", "outputs"]));
        let reordered = ResultRecord::construct(&GENERIC_SCHEMA, f)?;
        let default = ResultRecord::construct(&GENERIC_SCHEMA, generic_fields())?;
        assert_ne!(reordered.unique_hash(), default.unique_hash());
        assert_eq!(reordered.unique_on(), ["flow_id", "inputs", "outputs"]);
        Ok(())
    }

    #[test]
    fn document_round_trip_keeps_hash() -> Result<()> {
        let r = ResultRecord::construct(&GENERIC_SCHEMA, generic_fields())?;
        let doc = r.to_document();
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("unique_on"));
        let back = ResultRecord::from_document(&GENERIC_SCHEMA, doc)?;
        assert_eq!(back.unique_hash(), r.unique_hash());
        assert_eq!(back.date_modified(), r.date_modified());
        assert_eq!(back.unique_index().len(), 3);
        Ok(())
    }

    #[test]
    fn declared_unique_on_survives_the_document() -> Result<()> {
        let mut f = generic_fields();
        f.insert("unique_on".into(), json!(["flow_id", "inputs"]));
        let r = ResultRecord::construct(&GENERIC_SCHEMA, f)?;
        let doc = r.to_document();
        assert_eq!(doc["unique_on"], json!(["flow_id", "inputs"]));
        let back = ResultRecord::from_document(&GENERIC_SCHEMA, doc)?;
        assert_eq!(back.unique_on(), ["flow_id", "inputs"]);
        assert_eq!(back.unique_hash(), r.unique_hash());
        assert!(back.verify_integrity());
        Ok(())
    }

    #[test]
    fn mismatched_model_type_is_rejected() {
        let mut f = generic_fields();
        f.insert("collection".into(), json!("impact"));
        assert!(matches!(ResultRecord::construct(&GENERIC_SCHEMA, f), Err(ResultsError::InvalidField { .. })));
    }

    #[test]
    fn impact_result_requires_archive_and_isotime() -> Result<()> {
        let mut f = generic_fields();
        f.insert("plot_file".into(), json!("my_plot_file.txt"));
        f.insert("archive".into(), json!("archive_file.txt"));
        f.insert("pv_collection_isotime".into(), json!("2022-03-01T10:00:00.123456"));
        f.insert("config".into(), json!({"config1": 1, "config2": 2}));
        let r = ResultRecord::construct(&IMPACT_SCHEMA, f.clone())?;
        assert_eq!(r.result_type_string(), "results::record::ImpactResult");
        match r.detail() {
            ResultDetail::Impact(d) => {
                assert_eq!(d.archive, "archive_file.txt");
                assert_eq!(d.config["config2"], json!(2));
            }
            other => panic!("se esperaba Impact, got {:?}", other),
        }

        f.remove("archive");
        match ResultRecord::construct(&IMPACT_SCHEMA, f) {
            Err(ResultsError::MissingUniqueField(n)) => assert_eq!(n, "archive"),
            other => panic!("se esperaba MissingUniqueField(archive), got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn invalid_timestamp_is_reported() {
        let mut f = generic_fields();
        f.insert("date_modified".into(), json!("ayer"));
        assert!(matches!(ResultRecord::construct(&GENERIC_SCHEMA, f), Err(ResultsError::InvalidField { ref field, .. }) if field == "date_modified"));
    }
}
