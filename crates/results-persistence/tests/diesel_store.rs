#![cfg(not(feature = "pg"))]
use results::registry::DocumentRegistry;
use results::{Document, Query, ResultsError, ResultsService, ResultsStore};
use results_persistence::{new_sqlite_for_test, DieselResultsStore};
use serde_json::{json, Value};
use std::sync::Arc;

fn doc(v: Value) -> Document {
  v.as_object().cloned().unwrap()
}

// Base SQLite en un archivo temporal; el directorio vive lo que el test.
fn setup_store() -> (tempfile::TempDir, Arc<DieselResultsStore>) {
  let dir = tempfile::tempdir().expect("tempdir");
  let url = dir.path().join("results.db").to_str().unwrap().to_string();
  let store = new_sqlite_for_test(&url).expect("store");
  (dir, Arc::new(store))
}

fn impact_result(archive: &str, isotime: &str) -> Document {
  doc(json!({
    "flow_id": "impact_flow",
    "inputs": {"distgen:n_particle": 1000, "gun:voltage": 375.0},
    "outputs": {"end_norm_emit_x": 1.2e-7, "end_sigma_z": 0.0011},
    "plot_file": "plot.png",
    "archive": archive,
    "pv_collection_isotime": isotime,
    "config": {"workdir": "/tmp", "timeout": 600},
  }))
}

#[test]
fn store_and_find_through_the_service() {
  let (_dir, store) = setup_store();
  let svc = ResultsService::with_standard_registry(store.clone());
  assert!(svc.store("generic", doc(json!({"flow_id": "f1", "inputs": {"a": 1}, "outputs": {"b": [1, 2]}})))
             .expect("store"));
  let found = svc.find("generic", &Query::new().where_eq("inputs.a", 1), &["outputs"]).expect("find");
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["outputs"], json!({"b": [1, 2]}));
  assert!(found[0]["_id"].is_string());
  assert!(found[0].get("inputs").is_none());
  assert_eq!(store.count_documents("generic").unwrap(), 1);
  assert_eq!(store.count_documents("impact").unwrap(), 0);
}

#[test]
fn duplicates_are_rejected_by_service_and_index() {
  let (_dir, store) = setup_store();
  let svc = ResultsService::with_standard_registry(store.clone());
  let fields = doc(json!({"flow_id": "dup", "inputs": {"x": 1}, "outputs": {"y": 2}}));
  assert!(svc.store("generic", fields.clone()).unwrap());
  assert!(matches!(svc.store("generic", fields), Err(ResultsError::DuplicateResult(_))));

  // Saltándose el servicio, el índice único de la tabla también rechaza.
  let schema = DocumentRegistry::standard().resolve("generic").unwrap();
  let raw = svc.find_all("generic").unwrap().remove(0);
  let mut copy = raw.clone();
  copy.remove("_id");
  match store.insert_one(schema, copy) {
    Err(ResultsError::DuplicateResult(h)) => assert_eq!(Some(h.as_str()), raw["unique_hash"].as_str()),
    other => panic!("expected DuplicateResult from index, got {:?}", other),
  }
  assert_eq!(store.count_documents("generic").unwrap(), 1);
}

#[test]
fn impact_dataframe_from_sqlite() {
  let (_dir, store) = setup_store();
  let svc = ResultsService::with_standard_registry(store);
  svc.store("impact", impact_result("a1.h5", "2022-06-01T12:30:00+00:00")).unwrap();
  svc.store("impact", impact_result("a2.h5", "2022-06-02T08:00:00+00:00")).unwrap();

  let table = svc.load_dataframe("impact", &Query::new().where_eq("flow_id", "impact_flow"), &[])
                 .expect("dataframe");
  assert_eq!(table.len(), 2);
  assert_eq!(table.rows()[0].date.to_rfc3339(), "2022-06-01T12:30:00+00:00");
  assert_eq!(table.rows()[1].values["archive"], json!("a2.h5"));
  assert!(table.columns().contains(&"config.timeout".to_string()));

  match svc.load_result("impact", &Query::new().where_eq("flow_id", "impact_flow")) {
    Err(ResultsError::AmbiguousResult { count, .. }) => assert_eq!(count, 2),
    other => panic!("expected AmbiguousResult, got {:?}", other),
  }
  let rec = svc.load_result("impact", &Query::new().where_eq("archive", "a1.h5")).expect("load one");
  assert!(rec.verify_integrity());
}

#[test]
fn documents_survive_reopening_the_database() {
  let dir = tempfile::tempdir().expect("tempdir");
  let url = dir.path().join("results.db").to_str().unwrap().to_string();
  let hash = {
    let svc = ResultsService::with_standard_registry(Arc::new(new_sqlite_for_test(&url).unwrap()));
    svc.store("generic", doc(json!({"flow_id": "keep", "inputs": {"n": 1}, "outputs": {"ok": true}}))).unwrap();
    svc.find_all("generic").unwrap()[0]["unique_hash"].as_str().unwrap().to_string()
  };
  let svc = ResultsService::with_standard_registry(Arc::new(new_sqlite_for_test(&url).unwrap()));
  assert!(svc.exists("generic", &hash).unwrap());
  let rec = svc.load_result("generic", &Query::new().where_eq("flow_id", "keep")).unwrap();
  assert_eq!(rec.unique_hash(), hash);
}

#[test]
fn floats_read_back_bit_for_bit() {
  // Valor cuyo parseo rápido de serde_json pierde un ulp.
  let hard = 2.663987731472464e-34_f64;
  let (_dir, store) = setup_store();
  let svc = ResultsService::with_standard_registry(store);
  svc.store("generic", doc(json!({"flow_id": "f", "inputs": {"a": hard}, "outputs": {"b": 1}}))).unwrap();

  let rec = svc.load_result("generic", &Query::new().where_eq("flow_id", "f")).expect("load");
  assert_eq!(rec.inputs()["a"].as_f64(), Some(hard));
  assert!(rec.verify_integrity());
  assert_eq!(svc.find("generic", &Query::new().where_eq("inputs.a", hard), &[]).unwrap().len(), 1);
}

#[test]
fn declared_unique_on_round_trips_through_sqlite() {
  let (_dir, store) = setup_store();
  let svc = ResultsService::with_standard_registry(store);
  svc.store("generic",
            doc(json!({"flow_id": "u", "inputs": {"x": 1}, "outputs": {"y": 2}, "unique_on": ["flow_id", "inputs"]})))
     .unwrap();
  let rec = svc.load_result("generic", &Query::new().where_eq("flow_id", "u")).expect("load");
  assert_eq!(rec.unique_on(), ["flow_id", "inputs"]);
  assert!(rec.verify_integrity());
}
