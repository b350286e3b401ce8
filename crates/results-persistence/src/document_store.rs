use crate::config::StoreConfig;
use crate::schema;
use crate::schema::result_documents::dsl as docs_dsl;
use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use results::document::{normalize_id, project, Document, Query, ID_FIELD};
use results::registry::DocumentSchema;
use results::{InsertResult, ResultsError, ResultsStore};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use uuid::Uuid;
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");
#[cfg(all(feature = "pg", not(test)))]
type DbConn = PgConnection;
#[cfg(any(test, not(feature = "pg")))]
type DbConn = SqliteConnection;
type DbPool = Pool<ConnectionManager<DbConn>>;
/// Almacén de documentos de resultados sobre Diesel.
///
/// Cada documento es una fila de `result_documents` con el cuerpo JSON en
/// `body`. La colección y el `unique_hash` se guardan en columnas propias;
/// el índice único `(collection, unique_hash)` rechaza duplicados.
pub struct DieselResultsStore {
  pool: Arc<DbPool>,
  /// Último timestamp de inserción (µs), estrictamente creciente para
  /// conservar el orden de inserción al leer.
  last_ts: AtomicI64,
}
/// Aplica pragmas de SQLite a cada conexión del pool.
#[cfg(any(test, not(feature = "pg")))]
#[derive(Debug)]
struct SqlitePragmas;
#[cfg(any(test, not(feature = "pg")))]
impl diesel::r2d2::CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
  fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
    diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(conn).map_err(diesel::r2d2::Error::QueryError)?;
    Ok(())
  }
}
impl DieselResultsStore {
  /// Crea el pool, aplica pragmas (SQLite) y ejecuta las migraciones
  /// embebidas.
  pub fn new(config: &StoreConfig) -> Result<Self, ResultsError> {
    let manager = ConnectionManager::<DbConn>::new(config.database_url.as_str());
    let builder = Pool::builder().max_size(config.pool_size);
    #[cfg(any(test, not(feature = "pg")))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    let pool = builder.build(manager).map_err(|e| ResultsError::StoreUnavailable(format!("pool: {}", e)))?;
    let store = DieselResultsStore { pool: Arc::new(pool), last_ts: AtomicI64::new(0) };
    {
      let mut c = store.conn()?;
      #[cfg(any(test, not(feature = "pg")))]
      {
        let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
      }
      c.run_pending_migrations(MIGRATIONS)
       .map_err(|e| ResultsError::StoreUnavailable(format!("migrations: {}", e)))?;
    }
    log::info!("almacén de resultados inicializado (pool={})", config.pool_size);
    Ok(store)
  }
  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, ResultsError> {
    self.pool.get().map_err(|e| ResultsError::StoreUnavailable(format!("pool: {}", e)))
  }
  fn next_ts(&self) -> i64 {
    let now = Utc::now().timestamp_micros();
    let mut prev = self.last_ts.load(Ordering::SeqCst);
    loop {
      let next = now.max(prev + 1);
      match self.last_ts.compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst) {
        Ok(_) => return next,
        Err(actual) => prev = actual,
      }
    }
  }
  /// Filas de una colección en orden de inserción. Si se da `unique_hash`
  /// el filtro se resuelve en SQL.
  fn load_rows(&self, collection: &str, unique_hash: Option<&str>) -> Result<Vec<DocumentRow>, ResultsError> {
    let mut conn = self.conn()?;
    let mut query = docs_dsl::result_documents.filter(docs_dsl::collection.eq(collection)).into_boxed();
    if let Some(h) = unique_hash {
      query = query.filter(docs_dsl::unique_hash.eq(h));
    }
    map_db_err(query.order((docs_dsl::inserted_at_ts.asc(), docs_dsl::id.asc())).load::<DocumentRow>(&mut conn))
  }
  /// Número de documentos en una colección.
  pub fn count_documents(&self, collection: &str) -> Result<i64, ResultsError> {
    let mut conn = self.conn()?;
    map_db_err(docs_dsl::result_documents.filter(docs_dsl::collection.eq(collection)).count().get_result(&mut conn))
  }
}
// Fila Diesel de la tabla de documentos
#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::result_documents)]
struct DocumentRow {
  pub id: String,
  pub collection: String,
  pub unique_hash: Option<String>,
  pub body: String,
  pub inserted_at_ts: i64,
}
impl DocumentRow {
  fn into_document(self) -> Result<Document, ResultsError> {
    let mut doc: Document = serde_json::from_str(&self.body)?;
    doc.insert(ID_FIELD.to_string(), Value::String(self.id));
    Ok(doc)
  }
}
fn map_db_err<T>(res: std::result::Result<T, DieselError>) -> Result<T, ResultsError> {
  res.map_err(|e| ResultsError::StoreUnavailable(format!("db: {}", e)))
}
impl ResultsStore for DieselResultsStore {
  fn insert_one(&self, schema: &DocumentSchema, mut document: Document) -> Result<InsertResult, ResultsError> {
    let id = document.remove(ID_FIELD)
                     .and_then(|v| normalize_id(&v))
                     .unwrap_or_else(|| Uuid::new_v4().to_string());
    let unique_hash = document.get("unique_hash").and_then(Value::as_str).map(str::to_string);
    let row = DocumentRow { id: id.clone(),
                            collection: schema.collection().to_string(),
                            unique_hash: unique_hash.clone(),
                            body: serde_json::to_string(&document)?,
                            inserted_at_ts: self.next_ts() };
    let mut conn = self.conn()?;
    match diesel::insert_into(docs_dsl::result_documents).values(&row).execute(&mut conn) {
      Ok(_) => {
        log::debug!("documento {} insertado en '{}'", id, schema.collection());
        Ok(InsertResult { inserted_id: Some(id) })
      }
      Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
        log::warn!("violación de unicidad en '{}': {}", schema.collection(), info.message());
        Err(ResultsError::DuplicateResult(unique_hash.unwrap_or(id)))
      }
      Err(e) => Err(ResultsError::StoreUnavailable(format!("db: {}", e))),
    }
  }
  fn find(&self, schema: &DocumentSchema, query: &Query, fields: &[&str]) -> Result<Vec<Document>, ResultsError> {
    let hash = query.get("unique_hash").and_then(Value::as_str);
    let mut out = Vec::new();
    for row in self.load_rows(schema.collection(), hash)? {
      let doc = row.into_document()?;
      if query.matches(&doc) {
        out.push(project(&doc, fields));
      }
    }
    Ok(out)
  }
  fn find_all(&self, schema: &DocumentSchema) -> Result<Vec<Document>, ResultsError> {
    self.load_rows(schema.collection(), None)?.into_iter().map(DocumentRow::into_document).collect()
  }
}
/// Crear el almacén desde las variables de entorno.
#[cfg(all(feature = "pg", not(test)))]
pub fn new_from_env() -> Result<DieselResultsStore, ResultsError> {
  let config = StoreConfig::from_env()?;
  if !config.is_postgres() {
    return Err(ResultsError::StoreUnavailable("RESULTS_DB_URL / DATABASE_URL does not look like Postgres URL".into()));
  }
  DieselResultsStore::new(&config)
}
#[cfg(test)]
pub fn new_from_env() -> Result<DieselResultsStore, ResultsError> {
  let config = StoreConfig::from_env().unwrap_or_else(|_| StoreConfig::new(crate::config::DEFAULT_TEST_URL));
  DieselResultsStore::new(&config)
}
#[cfg(all(not(feature = "pg"), not(test)))]
pub fn new_from_env() -> Result<DieselResultsStore, ResultsError> {
  let config = StoreConfig::from_env()?;
  if config.is_sqlite() {
    return DieselResultsStore::new(&config);
  }
  Err(ResultsError::StoreUnavailable("results-persistence was compiled without 'pg' feature; enable the 'pg' feature \
                                      to use Postgres in production"
                                                                    .into()))
}
// Helper de tests: construye el almacén sobre una URL SQLite explícita sin
// pasar por el entorno.
#[cfg(not(feature = "pg"))]
pub fn new_sqlite_for_test(database_url: &str) -> Result<DieselResultsStore, ResultsError> {
  DieselResultsStore::new(&StoreConfig::new(database_url))
}
