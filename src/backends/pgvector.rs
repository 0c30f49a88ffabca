//! # pgvector Adapter
//!
//! Stores vectors in a PostgreSQL table with the `vector` extension:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "collection" (
//!     id text PRIMARY KEY,
//!     embedding vector,
//!     metadata text,
//!     created_at timestamptz DEFAULT now()
//! )
//! ```
//!
//! Unlike the HTTP backends, an update here is a real `UPDATE` and fails with
//! [`VectorStoreError::NotFound`] when the row does not exist. Inserts are
//! upserts on the primary key.
//!
//! Statements go through the [`SqlSession`] seam. [`PostgresSession`] is the
//! driver-backed implementation; embeddings cross it in pgvector's text form
//! (`[1,2,3]`) and are cast with `::vector` on the server.

use std::sync::{Mutex, MutexGuard};

use postgres::types::{ToSql, Type};
use postgres::NoTls;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{non_empty, require, require_port};
use crate::distance::{DistanceFunction, MetricTable};
use crate::errors::{BoxError, VectorStoreError, VectorStoreResult};
use crate::metadata;
use crate::store::{ensure_ids, last_writes, VectorStore};
use crate::vector::{Vector, VectorDistance};

const BACKEND: &str = "pgvector";
const INSERT_BATCH_SIZE: usize = 1000;

/// Distance operators from the `vector` extension. Hamming (`<~>`) and
/// Jaccard (`<%>`) only exist for `bit` columns and are left out.
pub const PGVECTOR_METRICS: MetricTable = MetricTable::new(
    BACKEND,
    &[
        (DistanceFunction::Euclidean, "<->"),
        (DistanceFunction::Dot, "<#>"),
        (DistanceFunction::Cosine, "<=>"),
        (DistanceFunction::Manhattan, "<+>"),
    ],
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PgvectorConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub db_name: String,
    /// Table name
    pub collection: String,
    pub distance_function: DistanceFunction,
}

impl Default for PgvectorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            db_name: "postgres".to_string(),
            collection: String::new(),
            distance_function: DistanceFunction::Euclidean,
        }
    }
}

/// Statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    NullableText(Option<String>),
    TextArray(Vec<String>),
    BigInt(i64),
}

/// Result cell. Float and integer columns keep their type, everything else
/// comes back as text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlCell {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow(pub Vec<SqlCell>);

impl SqlRow {
    pub fn text(&self, index: usize) -> Option<&str> {
        match self.0.get(index) {
            Some(SqlCell::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn float(&self, index: usize) -> Option<f64> {
        match self.0.get(index) {
            Some(SqlCell::Float(value)) => Some(*value),
            _ => None,
        }
    }
}

/// One database session. Needs `&mut` access, hence the store's mutex.
pub trait SqlSession: Send {
    /// Run a statement and return the affected row count.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError>;

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, BoxError>;
}

/// [`SqlSession`] over a synchronous `postgres::Client`.
pub struct PostgresSession {
    client: postgres::Client,
}

impl PostgresSession {
    pub fn connect(config: &PgvectorConfig) -> Result<Self, BoxError> {
        let mut pg = postgres::Config::new();
        pg.host(&config.host).port(config.port).user(&config.user).dbname(&config.db_name);
        if let Some(password) = non_empty(&config.password) {
            pg.password(password);
        }
        Ok(Self { client: pg.connect(NoTls)? })
    }

    pub fn from_client(client: postgres::Client) -> Self {
        Self { client }
    }
}

fn to_sql(value: &SqlValue) -> &(dyn ToSql + Sync) {
    match value {
        SqlValue::Text(text) => text,
        SqlValue::NullableText(text) => text,
        SqlValue::TextArray(values) => values,
        SqlValue::BigInt(n) => n,
    }
}

/// How a result column is read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Float8,
    Float4,
    Int8,
    Int4,
    Int2,
    Bool,
    Text,
}

fn cell_kind(ty: &Type) -> CellKind {
    if *ty == Type::FLOAT8 {
        CellKind::Float8
    } else if *ty == Type::FLOAT4 {
        CellKind::Float4
    } else if *ty == Type::INT8 {
        CellKind::Int8
    } else if *ty == Type::INT4 {
        CellKind::Int4
    } else if *ty == Type::INT2 {
        CellKind::Int2
    } else if *ty == Type::BOOL {
        CellKind::Bool
    } else {
        CellKind::Text
    }
}

fn from_row(row: &postgres::Row) -> Result<SqlRow, BoxError> {
    let mut cells = Vec::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let cell = match cell_kind(column.type_()) {
            CellKind::Float8 => row.try_get::<_, Option<f64>>(i)?.map(SqlCell::Float),
            CellKind::Float4 => row.try_get::<_, Option<f32>>(i)?.map(|v| SqlCell::Float(v as f64)),
            CellKind::Int8 => row.try_get::<_, Option<i64>>(i)?.map(SqlCell::Int),
            CellKind::Int4 => row.try_get::<_, Option<i32>>(i)?.map(|v| SqlCell::Int(v.into())),
            CellKind::Int2 => row.try_get::<_, Option<i16>>(i)?.map(|v| SqlCell::Int(v.into())),
            CellKind::Bool => row.try_get::<_, Option<bool>>(i)?.map(SqlCell::Bool),
            CellKind::Text => row.try_get::<_, Option<String>>(i)?.map(SqlCell::Text),
        };
        cells.push(cell.unwrap_or(SqlCell::Null));
    }
    Ok(SqlRow(cells))
}

impl SqlSession for PostgresSession {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError> {
        let params: Vec<&(dyn ToSql + Sync)> = params.iter().map(to_sql).collect();
        Ok(self.client.execute(sql, &params)?)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, BoxError> {
        let params: Vec<&(dyn ToSql + Sync)> = params.iter().map(to_sql).collect();
        self.client.query(sql, &params)?.iter().map(from_row).collect()
    }
}

pub struct PgvectorStore {
    session: Mutex<Box<dyn SqlSession>>,
    table: String,
    distance_function: DistanceFunction,
    operator: &'static str,
}

/// Quote an identifier so any table name is taken literally.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// pgvector text literal, e.g. `[1,2.5,3]`.
fn embedding_literal(embedding: &[f32]) -> String {
    let values: Vec<String> = embedding.iter().map(|v| v.to_string()).collect();
    format!("[{}]", values.join(","))
}

fn parse_embedding_literal(text: &str) -> Option<Vec<f32>> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    inner.split(',').map(|v| v.trim().parse::<f32>().ok()).collect()
}

impl PgvectorStore {
    pub fn connect(config: PgvectorConfig) -> VectorStoreResult<Self> {
        require("host", &config.host)?;
        require_port(config.port)?;
        require("user", &config.user)?;
        require("db_name", &config.db_name)?;
        let (table, operator) = Self::validate(&config)?;

        let session = PostgresSession::connect(&config).map_err(|e| VectorStoreError::connection(BACKEND, e))?;
        Self::start(Box::new(session), table, operator, config.distance_function)
    }

    /// Use an already-established session.
    pub fn open(config: PgvectorConfig, session: Box<dyn SqlSession>) -> VectorStoreResult<Self> {
        let (table, operator) = Self::validate(&config)?;
        Self::start(session, table, operator, config.distance_function)
    }

    fn validate(config: &PgvectorConfig) -> VectorStoreResult<(String, &'static str)> {
        let table = require("collection", &config.collection)?.to_string();
        let operator = PGVECTOR_METRICS.resolve(config.distance_function)?;
        Ok((table, operator))
    }

    fn start(
        mut session: Box<dyn SqlSession>,
        table: String,
        operator: &'static str,
        distance_function: DistanceFunction,
    ) -> VectorStoreResult<Self> {
        session
            .query("SELECT 1", &[])
            .map_err(|e| VectorStoreError::connection(BACKEND, e))?;

        let quoted = quote_ident(&table);
        let provision = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (id text PRIMARY KEY, embedding vector, metadata text, created_at timestamptz DEFAULT now())",
                quoted
            ),
        ];
        for statement in &provision {
            session
                .execute(statement, &[])
                .map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        }
        info!(table = %table, operator, "pgvector table ready");

        Ok(Self { session: Mutex::new(session), table: quoted, distance_function, operator })
    }

    fn session(&self) -> VectorStoreResult<MutexGuard<'_, Box<dyn SqlSession>>> {
        self.session
            .lock()
            .map_err(|_| VectorStoreError::backend(BACKEND, "session lock poisoned"))
    }

    fn execute(session: &mut dyn SqlSession, sql: &str, params: &[SqlValue]) -> VectorStoreResult<u64> {
        debug!(backend = BACKEND, sql, "executing statement");
        session.execute(sql, params).map_err(|e| VectorStoreError::backend(BACKEND, e))
    }

    fn query(session: &mut dyn SqlSession, sql: &str, params: &[SqlValue]) -> VectorStoreResult<Vec<SqlRow>> {
        debug!(backend = BACKEND, sql, "running query");
        session.query(sql, params).map_err(|e| VectorStoreError::backend(BACKEND, e))
    }

    fn row_params(vector: &Vector) -> VectorStoreResult<[SqlValue; 3]> {
        let metadata = metadata::encode(vector.metadata()).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        Ok([
            SqlValue::Text(vector.assigned_id().to_string()),
            SqlValue::Text(embedding_literal(vector.embedding())),
            SqlValue::NullableText(metadata),
        ])
    }

    fn upsert(&self, vectors: &[Vector]) -> VectorStoreResult<()> {
        let mut session = self.session()?;
        for chunk in vectors.chunks(INSERT_BATCH_SIZE) {
            let mut rows = Vec::with_capacity(chunk.len());
            let mut params = Vec::with_capacity(chunk.len() * 3);
            for (i, vector) in chunk.iter().enumerate() {
                let base = i * 3;
                rows.push(format!("(${}, ${}::text::vector, ${})", base + 1, base + 2, base + 3));
                params.extend(Self::row_params(vector)?);
            }
            let sql = format!(
                "INSERT INTO {} (id, embedding, metadata) VALUES {} \
                 ON CONFLICT (id) DO UPDATE SET embedding = EXCLUDED.embedding, metadata = EXCLUDED.metadata",
                self.table,
                rows.join(", ")
            );
            Self::execute(session.as_mut(), &sql, &params)?;
        }
        Ok(())
    }

    fn update_row(&self, session: &mut dyn SqlSession, vector: &Vector) -> VectorStoreResult<()> {
        let sql = format!("UPDATE {} SET embedding = $2::text::vector, metadata = $3 WHERE id = $1", self.table);
        let updated = Self::execute(session, &sql, &Self::row_params(vector)?)?;
        if updated == 0 {
            return Err(VectorStoreError::NotFound { id: vector.assigned_id().to_string() });
        }
        Ok(())
    }

    fn decode_row(row: &SqlRow) -> VectorStoreResult<Vector> {
        let malformed = |what: &str| VectorStoreError::backend(BACKEND, format!("malformed row: {}", what));
        let id = row.text(0).ok_or_else(|| malformed("id"))?;
        let embedding = row
            .text(1)
            .and_then(parse_embedding_literal)
            .ok_or_else(|| malformed("embedding"))?;
        let metadata = metadata::decode(row.text(2)).map_err(|e| VectorStoreError::backend(BACKEND, e))?;
        Vector::from_parts(Some(id.to_string()), embedding, metadata)
    }

    /// Nearest neighbours under a metric other than the one the store was
    /// opened with. The operator is applied per query; no index is involved.
    pub fn get_neighbor_vectors_by(
        &self,
        query: &Vector,
        n: usize,
        metric: DistanceFunction,
    ) -> VectorStoreResult<Vec<VectorDistance>> {
        let operator = PGVECTOR_METRICS.resolve(metric)?;
        self.search(query, n, operator)
    }

    fn search(&self, query: &Vector, n: usize, operator: &str) -> VectorStoreResult<Vec<VectorDistance>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT id, embedding::text, metadata, (embedding {} $1::text::vector)::float8 AS distance \
             FROM {} ORDER BY distance LIMIT $2",
            operator, self.table
        );
        let params = [SqlValue::Text(embedding_literal(query.embedding())), SqlValue::BigInt(limit)];
        let rows = Self::query(self.session()?.as_mut(), &sql, &params)?;

        rows.iter()
            .map(|row| {
                let distance = row
                    .float(3)
                    .ok_or_else(|| VectorStoreError::backend(BACKEND, "malformed row: distance"))?;
                Ok(VectorDistance::new(Self::decode_row(row)?, distance))
            })
            .collect()
    }
}

impl VectorStore for PgvectorStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn distance_function(&self) -> DistanceFunction {
        self.distance_function
    }

    fn insert_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        let vector = vector.ensure_id();
        self.upsert(std::slice::from_ref(&vector))?;
        Ok(vector)
    }

    fn insert_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        if vectors.is_empty() {
            return Ok(vectors);
        }
        let vectors = ensure_ids(vectors);
        self.upsert(&last_writes(&vectors))?;
        Ok(vectors)
    }

    fn read_vector(&self, id: &str) -> VectorStoreResult<Option<Vector>> {
        let sql = format!("SELECT id, embedding::text, metadata FROM {} WHERE id = $1", self.table);
        let rows = Self::query(self.session()?.as_mut(), &sql, &[SqlValue::Text(id.to_string())])?;
        rows.first().map(Self::decode_row).transpose()
    }

    fn update_vector(&self, vector: Vector) -> VectorStoreResult<Vector> {
        if vector.id().is_none() {
            return Err(VectorStoreError::Validation("id is required for update".to_string()));
        }
        self.update_row(self.session()?.as_mut(), &vector)?;
        Ok(vector)
    }

    fn update_vectors(&self, vectors: Vec<Vector>) -> VectorStoreResult<Vec<Vector>> {
        if vectors.is_empty() {
            return Ok(vectors);
        }
        let ids = vectors
            .iter()
            .map(|v| v.id().map(str::to_string))
            .collect::<Option<Vec<String>>>()
            .ok_or_else(|| VectorStoreError::Validation("id is required for update".to_string()))?;

        let mut session = self.session()?;
        let sql = format!("SELECT id FROM {} WHERE id = ANY($1)", self.table);
        let rows = Self::query(session.as_mut(), &sql, &[SqlValue::TextArray(ids.clone())])?;
        let existing: Vec<&str> = rows.iter().filter_map(|row| row.text(0)).collect();
        if let Some(missing) = ids.iter().find(|id| !existing.contains(&id.as_str())) {
            return Err(VectorStoreError::NotFound { id: missing.clone() });
        }

        for vector in &vectors {
            self.update_row(session.as_mut(), vector)?;
        }
        Ok(vectors)
    }

    fn delete_vector(&self, id: &str) -> VectorStoreResult<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table);
        Self::execute(self.session()?.as_mut(), &sql, &[SqlValue::Text(id.to_string())])?;
        Ok(())
    }

    fn delete_vectors(&self, ids: &[String]) -> VectorStoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", self.table);
        Self::execute(self.session()?.as_mut(), &sql, &[SqlValue::TextArray(ids.to_vec())])?;
        Ok(())
    }

    fn get_neighbor_vectors(&self, query: &Vector, n: usize) -> VectorStoreResult<Vec<VectorDistance>> {
        self.search(query, n, self.operator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;

    enum Reply {
        Rows(Vec<SqlRow>),
        Count(u64),
        Fail(&'static str),
    }

    #[derive(Default)]
    struct Script {
        replies: VecDeque<Reply>,
        statements: Vec<(String, Vec<SqlValue>)>,
    }

    // Answers statements from a queue; unscripted statements succeed empty.
    #[derive(Clone, Default)]
    struct ScriptedSession {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedSession {
        fn reply(&self, reply: Reply) -> &Self {
            self.script.lock().unwrap().replies.push_back(reply);
            self
        }

        fn statements(&self) -> Vec<(String, Vec<SqlValue>)> {
            self.script.lock().unwrap().statements.clone()
        }

        fn last(&self) -> (String, Vec<SqlValue>) {
            self.statements().pop().unwrap()
        }

        fn clear(&self) {
            self.script.lock().unwrap().statements.clear();
        }

        fn next(&self, sql: &str, params: &[SqlValue]) -> Option<Reply> {
            let mut script = self.script.lock().unwrap();
            script.statements.push((sql.to_string(), params.to_vec()));
            script.replies.pop_front()
        }
    }

    impl SqlSession for ScriptedSession {
        fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, BoxError> {
            match self.next(sql, params) {
                Some(Reply::Count(n)) => Ok(n),
                Some(Reply::Fail(message)) => Err(message.into()),
                _ => Ok(0),
            }
        }

        fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, BoxError> {
            match self.next(sql, params) {
                Some(Reply::Rows(rows)) => Ok(rows),
                Some(Reply::Fail(message)) => Err(message.into()),
                _ => Ok(Vec::new()),
            }
        }
    }

    fn config() -> PgvectorConfig {
        PgvectorConfig { collection: "documents".to_string(), ..PgvectorConfig::default() }
    }

    fn opened(session: &ScriptedSession) -> PgvectorStore {
        let store = PgvectorStore::open(config(), Box::new(session.clone())).unwrap();
        session.clear();
        store
    }

    fn row(id: &str, embedding: &str, metadata: Option<&str>, distance: Option<f64>) -> SqlRow {
        let mut cells = vec![
            SqlCell::Text(id.to_string()),
            SqlCell::Text(embedding.to_string()),
            metadata.map_or(SqlCell::Null, |m| SqlCell::Text(m.to_string())),
        ];
        if let Some(distance) = distance {
            cells.push(SqlCell::Float(distance));
        }
        SqlRow(cells)
    }

    #[test]
    fn test_embedding_literal() {
        assert_eq!(embedding_literal(&[2.0, 2.5, -1.0]), "[2,2.5,-1]");
        assert_eq!(parse_embedding_literal("[2,2.5,-1]"), Some(vec![2.0, 2.5, -1.0]));
        assert_eq!(parse_embedding_literal("2,2"), None);
        assert_eq!(quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_open_provisions_table() {
        let session = ScriptedSession::default();
        let store = PgvectorStore::open(config(), Box::new(session.clone())).unwrap();
        assert_eq!(store.distance_function(), DistanceFunction::Euclidean);

        let statements: Vec<String> = session.statements().into_iter().map(|(sql, _)| sql).collect();
        assert_eq!(statements[0], "SELECT 1");
        assert_eq!(statements[1], "CREATE EXTENSION IF NOT EXISTS vector");
        assert!(statements[2].starts_with("CREATE TABLE IF NOT EXISTS \"documents\" (id text PRIMARY KEY"));
    }

    #[test]
    fn test_probe_failure_is_connection_error() {
        let session = ScriptedSession::default();
        session.reply(Reply::Fail("connection reset"));
        let err = PgvectorStore::open(config(), Box::new(session)).err().unwrap();
        assert!(matches!(err, VectorStoreError::Connection { backend: "pgvector", .. }));
    }

    #[test]
    fn test_empty_collection_is_configuration_error() {
        let session = ScriptedSession::default();
        let err = PgvectorStore::open(PgvectorConfig::default(), Box::new(session.clone())).err().unwrap();
        assert!(err.to_string().contains("collection"));
        assert!(session.statements().is_empty());
    }

    #[test]
    fn test_insert_upserts_with_text_embedding() {
        let session = ScriptedSession::default();
        let store = opened(&session);

        let vector = Vector::new(vec![2.0, 2.0, 1.0])
            .unwrap()
            .with_metadata(json!({"text": "hello"}).as_object().cloned().unwrap());
        let stored = store.insert_vector(vector).unwrap();

        let (sql, params) = session.last();
        assert!(sql.contains("VALUES ($1, $2::text::vector, $3) ON CONFLICT (id) DO UPDATE"));
        assert_eq!(params[0], SqlValue::Text(stored.id().unwrap().to_string()));
        assert_eq!(params[1], SqlValue::Text("[2,2,1]".to_string()));
        assert_eq!(params[2], SqlValue::NullableText(Some(r#"{"text":"hello"}"#.to_string())));
    }

    #[test]
    fn test_batch_insert_is_one_statement() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        let vectors = vec![
            Vector::new(vec![1.0]).unwrap().with_id("a"),
            Vector::new(vec![2.0]).unwrap().with_id("b"),
        ];
        store.insert_vectors(vectors).unwrap();

        let statements = session.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].0.contains("($1, $2::text::vector, $3), ($4, $5::text::vector, $6)"));
        assert_eq!(statements[0].1.len(), 6);
    }

    #[test]
    fn test_read_vector() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session.reply(Reply::Rows(vec![row("v1", "[2,2,1]", Some(r#"{"text":"hello"}"#), None)]));

        let vector = store.read_vector("v1").unwrap().unwrap();
        assert_eq!(vector.embedding(), &[2.0, 2.0, 1.0]);
        assert_eq!(vector.metadata().unwrap()["text"], "hello");

        assert_eq!(store.read_vector("nonexistent-id").unwrap(), None);
    }

    #[test]
    fn test_update_missing_row_is_not_found() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session.reply(Reply::Count(0));

        let vector = Vector::new(vec![1.0, 2.0]).unwrap().with_id("never-inserted");
        let err = store.update_vector(vector).unwrap_err();
        assert!(matches!(err, VectorStoreError::NotFound { ref id } if id == "never-inserted"));
        assert!(session.last().0.starts_with("UPDATE \"documents\" SET"));
    }

    #[test]
    fn test_update_requires_id() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        let err = store.update_vector(Vector::new(vec![1.0]).unwrap()).unwrap_err();
        assert!(matches!(err, VectorStoreError::Validation(_)));
        assert!(session.statements().is_empty());
    }

    #[test]
    fn test_update_vectors_checks_all_ids_first() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session.reply(Reply::Rows(vec![SqlRow(vec![SqlCell::Text("a".to_string())])]));

        let vectors = vec![
            Vector::new(vec![1.0]).unwrap().with_id("a"),
            Vector::new(vec![2.0]).unwrap().with_id("b"),
        ];
        let err = store.update_vectors(vectors).unwrap_err();
        assert!(matches!(err, VectorStoreError::NotFound { ref id } if id == "b"));
        // Only the existence check ran.
        assert_eq!(session.statements().len(), 1);
    }

    #[test]
    fn test_update_vectors_last_write_wins() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session
            .reply(Reply::Rows(vec![SqlRow(vec![SqlCell::Text("a".to_string())])]))
            .reply(Reply::Count(1));

        let updated = store.update_vectors(vec![Vector::new(vec![9.0]).unwrap().with_id("a")]).unwrap();
        assert_eq!(updated[0].embedding(), &[9.0]);
        assert_eq!(session.last().1[1], SqlValue::Text("[9]".to_string()));
    }

    #[test]
    fn test_delete_vectors() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        store.delete_vector("never-inserted").unwrap();
        store.delete_vectors(&["a".to_string(), "b".to_string()]).unwrap();
        store.delete_vectors(&[]).unwrap();

        let statements = session.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1].0, "DELETE FROM \"documents\" WHERE id = ANY($1)");
        assert_eq!(statements[1].1, vec![SqlValue::TextArray(vec!["a".to_string(), "b".to_string()])]);
    }

    #[test]
    fn test_euclidean_neighbors() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session.reply(Reply::Rows(vec![
            row("v1", "[2,2,1]", Some(r#"{"text":"hello"}"#), Some(0.0)),
            row("v2", "[2,2,2]", Some(r#"{"text":"hi"}"#), Some(1.0)),
            row("v3", "[2,2,3]", Some(r#"{"text":"good morning!"}"#), Some(2.0)),
        ]));

        let query = Vector::new(vec![2.0, 2.0, 1.0]).unwrap().with_id("v1");
        let neighbors = store.get_neighbor_vectors(&query, 3).unwrap();
        let ids: Vec<_> = neighbors.iter().map(|n| n.vector.id().unwrap()).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);
        assert_eq!(neighbors[0].distance, 0.0);

        let (sql, params) = session.last();
        assert!(sql.contains("(embedding <-> $1::text::vector)::float8 AS distance"));
        assert!(sql.ends_with("ORDER BY distance LIMIT $2"));
        assert_eq!(params[1], SqlValue::BigInt(3));
    }

    #[test]
    fn test_neighbors_by_other_metric() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        store
            .get_neighbor_vectors_by(&Vector::new(vec![1.0]).unwrap(), 2, DistanceFunction::Cosine)
            .unwrap();
        assert!(session.last().0.contains("embedding <=> $1"));

        assert!(store.get_neighbor_vectors(&Vector::new(vec![1.0]).unwrap(), 0).unwrap().is_empty());
        assert_eq!(session.statements().len(), 1);
    }

    #[test]
    fn test_driver_errors_are_backend_errors() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        session.reply(Reply::Fail("relation does not exist"));
        let err = store.read_vector("v1").unwrap_err();
        assert!(matches!(err, VectorStoreError::Backend { backend: "pgvector", .. }));
    }

    #[test]
    fn test_column_types_map_to_cells() {
        assert_eq!(cell_kind(&Type::INT4), CellKind::Int4);
        assert_eq!(cell_kind(&Type::INT8), CellKind::Int8);
        assert_eq!(cell_kind(&Type::INT2), CellKind::Int2);
        assert_eq!(cell_kind(&Type::FLOAT8), CellKind::Float8);
        assert_eq!(cell_kind(&Type::FLOAT4), CellKind::Float4);
        assert_eq!(cell_kind(&Type::BOOL), CellKind::Bool);
        assert_eq!(cell_kind(&Type::TEXT), CellKind::Text);
        assert_eq!(cell_kind(&Type::VARCHAR), CellKind::Text);
    }

    #[test]
    fn test_batch_insert_repeated_id_keeps_last_write() {
        let session = ScriptedSession::default();
        let store = opened(&session);
        let vectors = vec![
            Vector::new(vec![1.0]).unwrap().with_id("a"),
            Vector::new(vec![2.0]).unwrap().with_id("b"),
            Vector::new(vec![3.0]).unwrap().with_id("a"),
        ];
        let stored = store.insert_vectors(vectors.clone()).unwrap();
        assert_eq!(stored, vectors);

        let (sql, params) = session.last();
        assert!(sql.contains("VALUES ($1, $2::text::vector, $3), ($4, $5::text::vector, $6) ON CONFLICT"));
        assert_eq!(params[0], SqlValue::Text("b".to_string()));
        assert_eq!(params[3], SqlValue::Text("a".to_string()));
        assert_eq!(params[4], SqlValue::Text("[3]".to_string()));
    }

    #[test]
    fn test_bit_only_metrics_are_unsupported() {
        for metric in [DistanceFunction::Hamming, DistanceFunction::Jaccard] {
            let session = ScriptedSession::default();
            let config = PgvectorConfig { distance_function: metric, ..config() };
            let err = PgvectorStore::open(config, Box::new(session.clone())).err().unwrap();
            assert!(matches!(err, VectorStoreError::UnsupportedMetric { backend: "pgvector", .. }));
            assert!(session.statements().is_empty());

            let store = opened(&session);
            let err = store.get_neighbor_vectors_by(&Vector::new(vec![1.0]).unwrap(), 1, metric).unwrap_err();
            assert!(matches!(err, VectorStoreError::UnsupportedMetric { .. }));
        }
    }

    // Needs a PostgreSQL with the vector extension:
    // PGVECTOR_TEST_HOST=localhost cargo test -- --ignored
    #[test]
    #[ignore]
    fn test_postgres_session_decodes_column_types() {
        let host = std::env::var("PGVECTOR_TEST_HOST").unwrap_or_else(|_| "localhost".to_string());
        let config = PgvectorConfig { host, collection: "vectorbridge_session_test".to_string(), ..config() };
        let mut session = PostgresSession::connect(&config).unwrap();

        let rows = session
            .query("SELECT 1, 2::int8, 1.5::float8, 'x'::text, NULL::text, true", &[])
            .unwrap();
        assert_eq!(
            rows[0],
            SqlRow(vec![
                SqlCell::Int(1),
                SqlCell::Int(2),
                SqlCell::Float(1.5),
                SqlCell::Text("x".to_string()),
                SqlCell::Null,
                SqlCell::Bool(true),
            ])
        );

        let store = PgvectorStore::open(config, Box::new(session)).unwrap();
        let stored = store
            .insert_vectors(vec![
                Vector::new(vec![1.0, 0.0]).unwrap().with_id("a"),
                Vector::new(vec![0.0, 1.0]).unwrap().with_id("a"),
            ])
            .unwrap();
        assert_eq!(store.read_vector("a").unwrap().unwrap().embedding(), stored[1].embedding());
        store.delete_vector("a").unwrap();
    }
}
