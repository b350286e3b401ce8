use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use results::{Document, Query, ResultsService};
use serde_json::{json, Value};

/// Pequeño menú interactivo para guardar y consultar resultados usando el
/// almacén proporcionado por `results-persistence`.
///
/// Opciones soportadas:
/// 1) Guardar resultado
/// 2) Listar resultados de un tipo
/// 3) Buscar por flow_id
/// 4) Cargar un resultado por unique_hash
/// 5) Tabular resultados
/// 6) Salir
fn main() -> Result<(), Box<dyn Error>> {
    // Inicializar almacén (aplica migraciones embebidas si procede)
    let store = results_persistence::new_from_env().map_err(|e| Box::new(e) as Box<dyn Error>)?;
    let service = ResultsService::with_standard_registry(Arc::new(store));

    loop {
        println!("\n== Results CLI menu ==");
        println!("1) Guardar resultado");
        println!("2) Listar resultados");
        println!("3) Buscar por flow_id");
        println!("4) Cargar resultado por unique_hash");
        println!("5) Tabular resultados");
        println!("6) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => {
                let model_type = prompt_model_type()?;
                let fields = match read_fields(&model_type)? {
                    Some(f) => f,
                    None => continue,
                };
                match service.store(&model_type, fields) {
                    Ok(true) => println!("Resultado guardado"),
                    Ok(false) => println!("El almacén aceptó el resultado sin asignar identidad"),
                    Err(e) => eprintln!("Error guardando resultado: {}", e),
                }
            }
            "2" => {
                let model_type = prompt_model_type()?;
                match service.find_all(&model_type) {
                    Ok(docs) => print_summary(&docs),
                    Err(e) => eprintln!("Error listando resultados: {}", e),
                }
            }
            "3" => {
                let model_type = prompt_model_type()?;
                let flow_id = prompt("flow_id: ")?;
                match service.find(&model_type, &Query::new().where_eq("flow_id", flow_id.trim()), &[]) {
                    Ok(docs) => print_summary(&docs),
                    Err(e) => eprintln!("Error buscando resultados: {}", e),
                }
            }
            "4" => {
                let model_type = prompt_model_type()?;
                let hash = prompt("unique_hash: ")?;
                match service.load_result(&model_type, &Query::new().where_eq("unique_hash", hash.trim())) {
                    Ok(rec) => {
                        println!("{}", rec);
                        println!("inputs:  {}", Value::Object(rec.inputs().clone()));
                        println!("outputs: {}", Value::Object(rec.outputs().clone()));
                        println!("integridad: {}", if rec.verify_integrity() { "ok" } else { "hash no coincide" });
                    }
                    Err(e) => eprintln!("Error cargando resultado: {}", e),
                }
            }
            "5" => {
                let model_type = prompt_model_type()?;
                let cols = prompt("Columnas (separadas por coma, enter para todas): ")?;
                let fields: Vec<&str> = cols.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
                match service.load_dataframe(&model_type, &Query::new(), &fields) {
                    Ok(table) => {
                        println!("\n{}", table.columns().join(" | "));
                        for row in table.rows() {
                            let cells: Vec<String> = table.columns()
                                                          .iter()
                                                          .skip(2)
                                                          .map(|c| row.values.get(c).map(|v| v.to_string()).unwrap_or_default())
                                                          .collect();
                            println!("{} | {} | {}", row.id, row.date.to_rfc3339(), cells.join(" | "));
                        }
                    }
                    Err(e) => eprintln!("Error tabulando resultados: {}", e),
                }
            }
            "6" => {
                println!("Saliendo...");
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}

fn prompt_model_type() -> io::Result<String> {
    let s = prompt("Tipo de resultado [generic/impact] (enter para generic): ")?;
    let s = s.trim();
    Ok(if s.is_empty() { "generic".to_string() } else { s.to_string() })
}

// Lee un objeto JSON; enter devuelve `{}`.
fn prompt_object(msg: &str) -> io::Result<Option<Document>> {
    let s = prompt(msg)?;
    if s.trim().is_empty() {
        return Ok(Some(Document::new()));
    }
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(Value::Object(m)) => Ok(Some(m)),
        _ => {
            eprintln!("Se esperaba un objeto JSON");
            Ok(None)
        }
    }
}

fn read_fields(model_type: &str) -> io::Result<Option<Document>> {
    let flow_id = prompt("flow_id: ")?;
    let inputs = match prompt_object("inputs (JSON): ")? {
        Some(m) => m,
        None => return Ok(None),
    };
    let outputs = match prompt_object("outputs (JSON): ")? {
        Some(m) => m,
        None => return Ok(None),
    };
    let mut fields = Document::new();
    fields.insert("flow_id".into(), json!(flow_id.trim()));
    fields.insert("inputs".into(), Value::Object(inputs));
    fields.insert("outputs".into(), Value::Object(outputs));
    if model_type.starts_with("impact") {
        let archive = prompt("archive: ")?;
        let isotime = prompt("pv_collection_isotime (RFC 3339): ")?;
        let plot = prompt("plot_file (enter para ninguno): ")?;
        let config = match prompt_object("config (JSON): ")? {
            Some(m) => m,
            None => return Ok(None),
        };
        fields.insert("archive".into(), json!(archive.trim()));
        fields.insert("pv_collection_isotime".into(), json!(isotime.trim()));
        if !plot.trim().is_empty() {
            fields.insert("plot_file".into(), json!(plot.trim()));
        }
        fields.insert("config".into(), Value::Object(config));
    }
    Ok(Some(fields))
}

fn print_summary(docs: &[Document]) {
    if docs.is_empty() {
        println!("(sin resultados)");
        return;
    }
    println!("\nID                                   | FLOW                 | UNIQUE_HASH");
    println!("------------------------------------------------------------------------------------------");
    for d in docs {
        let id = d.get("_id").and_then(Value::as_str).unwrap_or("-");
        let flow = d.get("flow_id").and_then(Value::as_str).unwrap_or("-");
        let hash = d.get("unique_hash").and_then(Value::as_str).unwrap_or("-");
        println!("{} | {:<20} | {}", id, flow, hash);
    }
}
