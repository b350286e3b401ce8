// Esquema Diesel del almacén de documentos. Compatible con SQLite y Postgres.
// Tabla: result_documents (un documento JSON por fila, agrupado por colección)
diesel::table! {
    result_documents (id) {
        id -> Text,
        collection -> Text,
        unique_hash -> Nullable<Text>,
        body -> Text,
        inserted_at_ts -> BigInt,
    }
}
