use results::{Query, ResultsService};
use results_persistence::new_from_env;
use serde_json::json;
use std::sync::Arc;

fn main() {
  // Usa RESULTS_DB_URL (o DATABASE_URL). Para una demo local:
  //   export RESULTS_DB_URL="/tmp/results_demo.db"
  let store = new_from_env().expect("no se pudo inicializar el almacén");
  let service = ResultsService::with_standard_registry(Arc::new(store));

  let fields = json!({
    "flow_id": "persisted-flow",
    "inputs": {"gun:voltage": 375.0},
    "outputs": {"end_mean_kinetic_energy": 1.1e7},
    "archive": "run_0001.h5",
    "pv_collection_isotime": "2022-06-01T12:30:00+00:00",
    "config": {"timeout": 600},
  });
  match service.store("impact", fields.as_object().cloned().unwrap_or_default()) {
    Ok(stored) => println!("stored: {}", stored),
    Err(e) => println!("store failed: {}", e),
  }

  let records = service.find_records("impact", &Query::new().where_eq("flow_id", "persisted-flow"))
                       .expect("find_records");
  for rec in &records {
    println!("{}", rec);
  }
}
