//! Implementaciones Postgres (Diesel) de los traits de almacenamiento del
//! core.
//!
//! Objetivo general del módulo:
//! - Proveer una capa de persistencia durable (Postgres) con paridad 1:1
//!   respecto a los backends en memoria de `agent-core`.
//! - Mantener determinismo del motor: el replay de eventos debe reconstruir
//!   el mismo `WorkflowState`.
//! - Aislar completamente el mapeo dominio ↔ filas de DB del `agent-core`.
//!
//! Decisiones clave:
//! - `workflow_events` es append-only con secuencia por workflow asignada
//!   dentro de una transacción (`MAX(seq) + 1`); la constraint UNIQUE
//!   `(workflow_id, seq)` es la exclusión real: un append perdedor aflora
//!   como unique violation y se traduce a `ConcurrencyConflict`.
//! - `workflow_checkpoints` sólo acepta secuencias estrictamente crecientes;
//!   la verificación corre en la misma transacción que el insert.
//! - `workflow_signals` marca `processed` con un UPDATE condicionado, lo que
//!   hace `mark_processed` idempotente sin lock adicional.
//! - Errores transitorios (deadlock, conexión caída): reintento con backoff
//!   en todas las operaciones.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use serde_json::Value;
use uuid::Uuid;

use agent_core::{CheckpointStore, EventLog, SignalStore, WorkflowCheckpoint, WorkflowError, WorkflowEvent,
                 WorkflowEventKind, WorkflowSignal};
use log::{debug, warn};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{workflow_checkpoints, workflow_events, workflow_signals};

/// Alias de tipo para el pool r2d2 de conexiones Postgres.
///
/// Notas operativas:
/// - El pool se construye con `min_idle` (mínimo de conexiones inactivas) y
///   `max_size` (límite superior total).
/// - Al construirlo, se corre automáticamente el set de migraciones
///   pendientes (una sola vez).
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Este trait permite:
/// - Inyectar un pool real (producción/tests de integración).
/// - Simular/factorear en tests unitarios sin acoplar a r2d2.
///
/// Contrato:
/// - Debe devolver una conexión válida o
///   `PersistenceError::TransientIo`/equivalente en caso de error.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Implementación concreta de `ConnectionProvider` respaldada por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}
impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// Estructura para inserción en `workflow_events`.
///
/// `ts` lo asigna la base (DEFAULT now()) y se recupera vía `RETURNING`; el
/// `seq` se calcula dentro de la misma transacción.
#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_events)]
pub struct NewEventRow<'a> {
    pub id: &'a Uuid,
    pub workflow_id: &'a Uuid,
    pub seq: i64,
    pub event_type: &'a str,
    pub payload: &'a Value,
}

/// Fila mapeada de la tabla `workflow_events` para lecturas.
///
/// Campos:
/// - `seq`: secuencia por workflow, estrictamente creciente desde 1.
/// - `event_type`: pista en minúsculas del tipo de evento (consultas/debug).
/// - `payload`: JSONB con la representación completa del enum
///   `WorkflowEventKind`.
#[derive(Queryable, Debug)]
pub struct EventRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub seq: i64,
    pub event_type: String,
    pub payload: Value,
    pub checkpoint_id: Option<Uuid>,
    pub ts: DateTime<Utc>,
}

/// Estructura para inserción en `workflow_checkpoints`.
#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_checkpoints)]
pub struct NewCheckpointRow<'a> {
    pub id: &'a Uuid,
    pub workflow_id: &'a Uuid,
    pub seq: i64,
    pub state: &'a Value,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Fila mapeada de la tabla `workflow_checkpoints`.
#[derive(Queryable, Debug)]
pub struct CheckpointRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub seq: i64,
    pub state: Value,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// Estructura para inserción en `workflow_signals`.
#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_signals)]
pub struct NewSignalRow<'a> {
    pub id: &'a Uuid,
    pub workflow_id: &'a Uuid,
    pub signal_name: &'a str,
    pub payload: &'a Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Fila mapeada de la tabla `workflow_signals`.
#[derive(Queryable, Debug)]
pub struct SignalRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub signal_name: String,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Determina si un error es transitorio (recomendado reintentar con backoff).
///
/// Cubre:
/// - Conflictos de serialización (deadlocks y nivel de aislamiento).
/// - Errores de IO transitorios de pool/conexión.
/// - Mensajes comunes de desconexión/timeout detectados por texto
///   (best-effort).
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        // Algunos mensajes de error (dependen de driver/pg) pueden llegar como Unknown
        // con texto. Hacemos best-effort string match sin acoplar a SQLSTATE.
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("terminating connection due to administrator command")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry simple con backoff exponencial muy pequeño (hasta 3 intentos).
///
/// Política:
/// - Intentos: 3.
/// - Backoff: 15ms, 30ms, 45ms.
/// - Logs: se emite `warn!` por intento.
///
/// Garantías:
/// - No altera semántica de negocio; sólo repite la unidad de trabajo
///   provista por `f`.
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

// SERIALIZACIÓN: guardamos el enum completo como JSON (payload), y además
// persistimos `event_type` (minúsculas) para facilitar ciertas consultas.
fn serialize_full_enum(kind: &WorkflowEventKind) -> Result<Value, WorkflowError> {
    Ok(serde_json::to_value(kind)?)
}

/// Mapea la variante del enum a un string en minúsculas, estable en el tiempo.
fn event_type_for(kind: &WorkflowEventKind) -> &'static str {
    match kind {
        WorkflowEventKind::WorkflowStarted { .. } => "workflowstarted",
        WorkflowEventKind::AgentStepRecorded { .. } => "agentsteprecorded",
        WorkflowEventKind::AgentEditRecorded { .. } => "agenteditrecorded",
        WorkflowEventKind::MessageAppended { .. } => "messageappended",
        WorkflowEventKind::IterationAdvanced { .. } => "iterationadvanced",
        WorkflowEventKind::CustomStateUpdated { .. } => "customstateupdated",
        WorkflowEventKind::WorkflowPaused { .. } => "workflowpaused",
        WorkflowEventKind::WorkflowResumed => "workflowresumed",
        WorkflowEventKind::WorkflowCompleted => "workflowcompleted",
        WorkflowEventKind::WorkflowFailed { .. } => "workflowfailed",
        WorkflowEventKind::WorkflowCancelled => "workflowcancelled",
    }
}

/// Deserializa una `EventRow` a `WorkflowEvent`, utilizando el JSON completo
/// del enum almacenado en `payload`.
fn deserialize_full_enum(row: EventRow) -> Result<WorkflowEvent, WorkflowError> {
    let kind: WorkflowEventKind = serde_json::from_value(row.payload)?;
    Ok(WorkflowEvent { id: row.id,
                       workflow_id: row.workflow_id,
                       seq: row.seq as u64,
                       kind,
                       ts: row.ts,
                       checkpoint_id: row.checkpoint_id })
}

fn row_to_checkpoint(row: CheckpointRow) -> WorkflowCheckpoint {
    WorkflowCheckpoint { id: row.id,
                         workflow_id: row.workflow_id,
                         seq: row.seq as u64,
                         state: row.state,
                         created_at: row.created_at,
                         size_bytes: row.size_bytes as u64 }
}

fn row_to_signal(row: SignalRow) -> WorkflowSignal {
    WorkflowSignal { id: row.id,
                     workflow_id: row.workflow_id,
                     signal_name: row.signal_name,
                     signal_data: row.payload,
                     received_at: row.received_at,
                     processed: row.processed,
                     processed_at: row.processed_at }
}

/// Nombre legible de la variante del evento para logging/diagnóstico.
fn kind_variant_name(kind: &WorkflowEventKind) -> &'static str {
    match kind {
        WorkflowEventKind::WorkflowStarted { .. } => "WorkflowStarted",
        WorkflowEventKind::AgentStepRecorded { .. } => "AgentStepRecorded",
        WorkflowEventKind::AgentEditRecorded { .. } => "AgentEditRecorded",
        WorkflowEventKind::MessageAppended { .. } => "MessageAppended",
        WorkflowEventKind::IterationAdvanced { .. } => "IterationAdvanced",
        WorkflowEventKind::CustomStateUpdated { .. } => "CustomStateUpdated",
        WorkflowEventKind::WorkflowPaused { .. } => "WorkflowPaused",
        WorkflowEventKind::WorkflowResumed => "WorkflowResumed",
        WorkflowEventKind::WorkflowCompleted => "WorkflowCompleted",
        WorkflowEventKind::WorkflowFailed { .. } => "WorkflowFailed",
        WorkflowEventKind::WorkflowCancelled => "WorkflowCancelled",
    }
}

/// Implementación Postgres de `EventLog` (append-only).
///
/// Responsabilidades:
/// - `append_kind`: asignar `seq = MAX(seq) + 1` e insertar el evento en una
///   sola transacción.
/// - `read_from`: devolver el sufijo `seq > after_seq` ordenado (replay
///   determinista, idéntico al backend in-memory).
pub struct PgEventLog<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgEventLog<P> {
    /// Crea un `PgEventLog` a partir de un `ConnectionProvider` (generalmente
    /// `PoolProvider`).
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> EventLog for PgEventLog<P> {
    fn append_kind(&self, workflow_id: Uuid, kind: WorkflowEventKind) -> Result<WorkflowEvent, WorkflowError> {
        debug!("append_kind:start workflow_id={workflow_id} kind={}",
               kind_variant_name(&kind));
        let event_type = event_type_for(&kind);
        let payload = serialize_full_enum(&kind)?;
        let id = Uuid::new_v4();

        // Transacción atómica: lectura de MAX(seq) + insert. Si otro proceso
        // gana la carrera por la misma secuencia, la UNIQUE (workflow_id, seq)
        // hace fallar el commit y el caller ve ConcurrencyConflict.
        let mut attempted_seq: i64 = 0;
        let inserted: Result<(i64, DateTime<Utc>), PersistenceError> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx_conn| {
                    let last: Option<i64> = workflow_events::table
                        .filter(workflow_events::workflow_id.eq(workflow_id))
                        .select(diesel::dsl::max(workflow_events::seq))
                        .first(tx_conn)?;
                    let seq = last.unwrap_or(0) + 1;
                    attempted_seq = seq;
                    let ts: DateTime<Utc> = diesel::insert_into(workflow_events::table)
                        .values(NewEventRow { id: &id,
                                              workflow_id: &workflow_id,
                                              seq,
                                              event_type,
                                              payload: &payload })
                        .returning(workflow_events::ts)
                        .get_result(tx_conn)?;
                    Ok::<(i64, DateTime<Utc>), diesel::result::Error>((seq, ts))
                })
                .map_err(PersistenceError::from)
        });

        let (seq, ts) = match inserted {
            Ok(pair) => pair,
            Err(PersistenceError::UniqueViolation(_)) => {
                return Err(WorkflowError::ConcurrencyConflict { workflow_id,
                                                                sequence: attempted_seq as u64 });
            }
            Err(e) => return Err(e.into()),
        };

        let ev = WorkflowEvent { id,
                                 workflow_id,
                                 seq: seq as u64,
                                 kind,
                                 ts,
                                 checkpoint_id: None };
        debug!("append_kind:done workflow_id={workflow_id} seq={} kind={}",
               ev.seq,
               kind_variant_name(&ev.kind));
        Ok(ev)
    }

    fn read_from(&self, workflow_id: Uuid, after_seq: u64) -> Result<Vec<WorkflowEvent>, WorkflowError> {
        debug!("read_from:start workflow_id={workflow_id} after_seq={after_seq}");
        let rows: Vec<EventRow> = with_retry(|| {
                                      let mut conn = self.provider.connection()?;
                                      workflow_events::table.filter(workflow_events::workflow_id.eq(workflow_id))
                                                            .filter(workflow_events::seq.gt(after_seq as i64))
                                                            .order(workflow_events::seq.asc())
                                                            .load(&mut conn)
                                                            .map_err(PersistenceError::from)
                                  }).map_err(WorkflowError::from)?;
        let events = rows.into_iter()
                         .map(deserialize_full_enum)
                         .collect::<Result<Vec<_>, _>>()?;
        debug!("read_from:done workflow_id={workflow_id} count={}", events.len());
        Ok(events)
    }
}

/// Implementación Postgres de `CheckpointStore`.
///
/// La monotonía por workflow se verifica dentro de la transacción del insert;
/// un `seq` que no supera al último almacenado devuelve `InvalidCheckpoint`
/// sin escribir nada.
pub struct PgCheckpointStore<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgCheckpointStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> CheckpointStore for PgCheckpointStore<P> {
    fn save(&self, checkpoint: WorkflowCheckpoint) -> Result<(), WorkflowError> {
        debug!("checkpoint:save workflow_id={} seq={}",
               checkpoint.workflow_id, checkpoint.seq);
        // Sentinela: Ok(Some(latest)) señala rechazo por monotonía sin
        // convertirlo en error retryable.
        let rejected: Option<i64> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction()
                .read_write()
                .run(|tx_conn| {
                    let latest: Option<i64> = workflow_checkpoints::table
                        .filter(workflow_checkpoints::workflow_id.eq(checkpoint.workflow_id))
                        .select(diesel::dsl::max(workflow_checkpoints::seq))
                        .first(tx_conn)?;
                    if let Some(latest) = latest {
                        if checkpoint.seq as i64 <= latest {
                            return Ok(Some(latest));
                        }
                    }
                    diesel::insert_into(workflow_checkpoints::table)
                        .values(NewCheckpointRow { id: &checkpoint.id,
                                                   workflow_id: &checkpoint.workflow_id,
                                                   seq: checkpoint.seq as i64,
                                                   state: &checkpoint.state,
                                                   size_bytes: checkpoint.size_bytes as i64,
                                                   created_at: checkpoint.created_at })
                        .execute(tx_conn)?;
                    Ok::<Option<i64>, diesel::result::Error>(None)
                })
                .map_err(PersistenceError::from)
        }).map_err(WorkflowError::from)?;

        match rejected {
            Some(latest) => Err(WorkflowError::InvalidCheckpoint { proposed: checkpoint.seq,
                                                                   latest: latest as u64 }),
            None => Ok(()),
        }
    }

    fn latest(&self, workflow_id: Uuid) -> Result<Option<WorkflowCheckpoint>, WorkflowError> {
        let row: Option<CheckpointRow> = with_retry(|| {
                                             let mut conn = self.provider.connection()?;
                                             workflow_checkpoints::table
                            .filter(workflow_checkpoints::workflow_id.eq(workflow_id))
                            .order(workflow_checkpoints::seq.desc())
                            .first(&mut conn)
                            .optional()
                            .map_err(PersistenceError::from)
                                         }).map_err(WorkflowError::from)?;
        Ok(row.map(row_to_checkpoint))
    }
}

/// Implementación Postgres de `SignalStore`.
///
/// `mark_processed` es idempotente: el UPDATE sólo toca filas con
/// `processed = FALSE`; si no afectó ninguna, un SELECT de fallback distingue
/// "ya procesada" de "inexistente".
pub struct PgSignalStore<P: ConnectionProvider> {
    pub provider: P,
}
impl<P: ConnectionProvider> PgSignalStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: ConnectionProvider> SignalStore for PgSignalStore<P> {
    fn enqueue(&self, signal: WorkflowSignal) -> Result<(), WorkflowError> {
        debug!("signal:enqueue workflow_id={} name={}",
               signal.workflow_id, signal.signal_name);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflow_signals::table)
                .values(NewSignalRow { id: &signal.id,
                                       workflow_id: &signal.workflow_id,
                                       signal_name: &signal.signal_name,
                                       payload: &signal.signal_data,
                                       received_at: signal.received_at,
                                       processed: signal.processed,
                                       processed_at: signal.processed_at })
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(WorkflowError::from)?;
        Ok(())
    }

    fn unprocessed(&self, workflow_id: Uuid) -> Result<Vec<WorkflowSignal>, WorkflowError> {
        let rows: Vec<SignalRow> = with_retry(|| {
                                       let mut conn = self.provider.connection()?;
                                       workflow_signals::table
                        .filter(workflow_signals::workflow_id.eq(workflow_id))
                        .filter(workflow_signals::processed.eq(false))
                        .order(workflow_signals::received_at.asc())
                        .load(&mut conn)
                        .map_err(PersistenceError::from)
                                   }).map_err(WorkflowError::from)?;
        Ok(rows.into_iter().map(row_to_signal).collect())
    }

    fn mark_processed(&self, signal_id: Uuid) -> Result<WorkflowSignal, WorkflowError> {
        let updated: Option<SignalRow> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(workflow_signals::table
                               .filter(workflow_signals::id.eq(signal_id))
                               .filter(workflow_signals::processed.eq(false)))
                .set((workflow_signals::processed.eq(true),
                      workflow_signals::processed_at.eq(Some(Utc::now()))))
                .get_result(&mut conn)
                .optional()
                .map_err(PersistenceError::from)
        }).map_err(WorkflowError::from)?;

        if let Some(row) = updated {
            return Ok(row_to_signal(row));
        }

        // Ya procesada (idempotencia) o inexistente.
        let existing: Option<SignalRow> = with_retry(|| {
                                              let mut conn = self.provider.connection()?;
                                              workflow_signals::table
                              .filter(workflow_signals::id.eq(signal_id))
                              .first(&mut conn)
                              .optional()
                              .map_err(PersistenceError::from)
                                          }).map_err(WorkflowError::from)?;
        existing.map(row_to_signal)
                .ok_or(WorkflowError::SignalNotFound(signal_id))
    }
}

/// Construye un pool Postgres r2d2 a partir de URL.
///
/// Comportamiento:
/// - Valida y ajusta tamaños (si `min_size > max_size`, usa `min_size =
///   max_size`).
/// - Ejecuta migraciones inmediatamente tras el primer `get()`.
/// - Devuelve `PersistenceError::TransientIo` ante errores del pool/manager.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        eprintln!("WARN: min_size > max_size ({} > {}), ajustando min=max",
                  validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    // Ejecutar migraciones una sola vez al construir (primer connection checkout).
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee configuración (DATABASE_URL,
/// tamaños) y construye un pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
