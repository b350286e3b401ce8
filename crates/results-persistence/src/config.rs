// config.rs
use results::ResultsError;

/// URL por defecto en tests: SQLite en memoria compartida.
pub const DEFAULT_TEST_URL: &str = "file:resultsdb?mode=memory&cache=shared";
/// Tamaño de pool por defecto.
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Configuración del almacén de documentos leída del entorno.
///
/// - `RESULTS_DB_URL` (o `DATABASE_URL` como fallback): URL de conexión.
/// - `RESULTS_DB_POOL_SIZE`: tamaño máximo del pool r2d2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
  pub database_url: String,
  pub pool_size: u32,
}

impl StoreConfig {
  pub fn new(database_url: impl Into<String>) -> Self {
    Self { database_url: database_url.into(), pool_size: DEFAULT_POOL_SIZE }
  }

  pub fn with_pool_size(mut self, pool_size: u32) -> Self {
    self.pool_size = pool_size.max(1);
    self
  }

  /// Lee la configuración del entorno (cargando `.env` si existe).
  pub fn from_env() -> Result<Self, ResultsError> {
    dotenvy::dotenv().ok();
    let url = std::env::var("RESULTS_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                             .map_err(|_| {
                                               ResultsError::StoreUnavailable("RESULTS_DB_URL / DATABASE_URL not set".into())
                                             })?;
    let pool_size = match std::env::var("RESULTS_DB_POOL_SIZE") {
      Ok(s) => s.trim()
                .parse::<u32>()
                .map_err(|e| ResultsError::StoreUnavailable(format!("RESULTS_DB_POOL_SIZE inválido: {}", e)))?,
      Err(_) => DEFAULT_POOL_SIZE,
    };
    Ok(Self::new(url).with_pool_size(pool_size))
  }

  /// Indica si la URL parece de Postgres.
  pub fn is_postgres(&self) -> bool {
    let l = self.database_url.to_lowercase();
    l.starts_with("postgres://") || l.starts_with("postgresql://")
  }

  /// Indica si la URL parece de SQLite (archivo o memoria).
  pub fn is_sqlite(&self) -> bool {
    let l = self.database_url.to_lowercase();
    l.starts_with("file:") || l.contains("mode=memory") || l.contains("sqlite") || l.ends_with(".db") || l == ":memory:"
  }
}
