//! agent-persistence
//!
//! Implementaciones Postgres (Diesel) de los traits de almacenamiento de
//! `agent-core`: `EventLog`, `CheckpointStore` y `SignalStore`. El objetivo es
//! paridad 1:1 con los backends en memoria — el replay de eventos debe
//! reconstruir exactamente el mismo `WorkflowState` — más utilidades de
//! conexión (pool r2d2) y migraciones embebidas.
//!
//! Módulos:
//! - `pg`: implementaciones sobre Postgres (tablas append-only).
//! - `migrations`: runner embebido de migraciones Diesel.
//! - `config`: carga de configuración desde `.env`.
//! - `schema`: tablas Diesel declaradas para compilar queries.

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::init_dotenv;
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgCheckpointStore, PgEventLog,
             PgPool, PgSignalStore, PoolProvider};
