use results::{InMemoryResultsStore, Query, ResultsService};
use serde_json::json;
use std::sync::Arc;

fn main() {
  // Servicio con el almacén en memoria y el registro estándar.
  let service = ResultsService::with_standard_registry(Arc::new(InMemoryResultsStore::new()));

  for (i, out) in [2.0, 2.5, 3.0].iter().enumerate() {
    let fields = json!({
      "flow_id": "example-flow",
      "inputs": {"distgen:n_particle": 10000, "run": i},
      "outputs": {"end_norm_emit_x": out, "plot": format!("plot_{}.png", i)},
    });
    let stored = service.store("generic", fields.as_object().cloned().unwrap_or_default()).expect("store");
    println!("stored run {}: {}", i, stored);
  }

  // Guardar el mismo resultado otra vez se rechaza por su unique_hash.
  let again = json!({
    "flow_id": "example-flow",
    "inputs": {"distgen:n_particle": 10000, "run": 0},
    "outputs": {"end_norm_emit_x": 2.0, "plot": "plot_0.png"},
  });
  match service.store("generic", again.as_object().cloned().unwrap_or_default()) {
    Ok(_) => println!("unexpected: duplicate accepted"),
    Err(e) => println!("duplicate rejected: {}", e),
  }

  let one = service.load_result("generic", &Query::new().where_eq("inputs.run", 1)).expect("load_result");
  println!("loaded {}", one);

  let table = service.load_dataframe("generic", &Query::new().where_eq("flow_id", "example-flow"), &[])
                     .expect("dataframe");
  println!("columns: {:?}", table.columns());
  for row in table.rows() {
    println!("{} | {} | {:?}", row.id, row.date, row.values.get("outputs.end_norm_emit_x"));
  }
}
