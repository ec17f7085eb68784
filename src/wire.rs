use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::BookdAuthSource;
use crate::engine::Engine;
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command};
use crate::tenant::TenantManager;

pub struct BookdHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<BookdQueryParser>,
}

impl BookdHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(BookdQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_timed(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = std::time::Instant::now();
        let result = self.execute_command(engine, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(&self, engine: &Engine, cmd: Command) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertStore { id } => {
                engine.create_store(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteStore { id } => {
                engine.delete_store(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::SetHours { store_id, weekday, open_close } => {
                engine
                    .set_hours(store_id, weekday, open_close)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::SetHoliday { store_id, date, open_close } => {
                engine
                    .set_holiday(store_id, date, open_close)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::ClearHoliday { store_id, date } => {
                engine
                    .clear_holiday(store_id, date)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::UpsertTechnician { id, store_id, active } => {
                engine
                    .upsert_technician(id, store_id, active)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteTechnician { id } => {
                engine.remove_technician(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertAppointment { request } => {
                let now = crate::engine::now_local();
                engine
                    .book_appointment(request, now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::RescheduleAppointment { id, date, start } => {
                let now = crate::engine::now_local();
                engine
                    .reschedule_appointment(id, date, start, now)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SetAppointmentStatus { id, status } => {
                engine.set_status(id, status).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectSlots {
                store_id,
                date,
                duration,
                technician_id,
                granularity,
                now,
            } => {
                let now = now.unwrap_or_else(crate::engine::now_local);
                let slots = engine
                    .available_slots(store_id, date, duration, technician_id, granularity, now)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(slots_schema());
                let sid = store_id.to_string();
                let date_str = date.to_string();
                let rows: Vec<PgWireResult<_>> = slots
                    .starts
                    .into_iter()
                    .map(|start| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&sid)?;
                        encoder.encode_field(&date_str)?;
                        encoder.encode_field(&start)?;
                        encoder.encode_field(&format_time(start))?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectHours { store_id, date } => {
                let resolved = engine.resolve_day(store_id, date).await.map_err(engine_err)?;

                let schema = Arc::new(hours_schema());
                let (open, close) = match resolved {
                    ResolvedDay::Open(w) => (Some(format_time(w.start)), Some(format_time(w.end))),
                    _ => (None, None),
                };
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&store_id.to_string())?;
                encoder.encode_field(&date.to_string())?;
                encoder.encode_field(&resolved.status_str())?;
                encoder.encode_field(&open)?;
                encoder.encode_field(&close)?;
                let rows = vec![Ok(encoder.take_row())];

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectAppointments { store_id, date, technician_id } => {
                let appointments = engine
                    .list_appointments(store_id, date, technician_id)
                    .await
                    .map_err(engine_err)?;

                let schema = Arc::new(appointments_schema());
                let rows: Vec<PgWireResult<_>> = appointments
                    .into_iter()
                    .map(|a| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&a.id.to_string())?;
                        encoder.encode_field(&a.store_id.to_string())?;
                        encoder.encode_field(&a.service_id.to_string())?;
                        encoder.encode_field(&a.technician_id.map(|t| t.to_string()))?;
                        encoder.encode_field(&a.date.to_string())?;
                        encoder.encode_field(&format_time(a.start))?;
                        encoder.encode_field(&format_time(a.end))?;
                        encoder.encode_field(&(a.end - a.start))?;
                        encoder.encode_field(&a.status.as_str())?;
                        encoder.encode_field(&a.notes)?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
            Command::SelectTechnicians { store_id } => {
                let technicians = engine.list_technicians(store_id).await.map_err(engine_err)?;

                let schema = Arc::new(technicians_schema());
                let rows: Vec<PgWireResult<_>> = technicians
                    .into_iter()
                    .map(|t| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&t.id.to_string())?;
                        encoder.encode_field(&t.store_id.to_string())?;
                        encoder.encode_field(&t.active)?;
                        Ok(encoder.take_row())
                    })
                    .collect();

                Ok(vec![Response::Query(QueryResponse::new(
                    schema,
                    stream::iter(rows),
                ))])
            }
        }
    }
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("store_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("date".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("start_minutes".into(), None, None, Type::INT4, FieldFormat::Text),
        FieldInfo::new("start_time".into(), None, None, Type::VARCHAR, FieldFormat::Text),
    ]
}

fn hours_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("store_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("date".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("status".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("open_time".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("close_time".into(), None, None, Type::VARCHAR, FieldFormat::Text),
    ]
}

fn appointments_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("store_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("service_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("technician_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("date".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("start_time".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("end_time".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("duration".into(), None, None, Type::INT4, FieldFormat::Text),
        FieldInfo::new("status".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("notes".into(), None, None, Type::VARCHAR, FieldFormat::Text),
    ]
}

fn technicians_schema() -> Vec<FieldInfo> {
    vec![
        FieldInfo::new("id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("store_id".into(), None, None, Type::VARCHAR, FieldFormat::Text),
        FieldInfo::new("active".into(), None, None, Type::BOOL, FieldFormat::Text),
    ]
}

/// Result schema for a SELECT, keyed on the virtual table it reads.
fn select_schema(sql_upper: &str) -> Vec<FieldInfo> {
    if !sql_upper.contains("SELECT") {
        return vec![];
    }
    if sql_upper.contains("SLOTS") {
        slots_schema()
    } else if sql_upper.contains("TECHNICIANS") {
        technicians_schema()
    } else if sql_upper.contains("APPOINTMENTS") {
        appointments_schema()
    } else if sql_upper.contains("HOURS") {
        hours_schema()
    } else {
        vec![]
    }
}

#[async_trait]
impl SimpleQueryHandler for BookdHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_timed(&engine, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct BookdQueryParser;

#[async_trait]
impl QueryParser for BookdQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(select_schema(&stmt.to_uppercase()))
    }
}

#[async_trait]
impl ExtendedQueryHandler for BookdHandler {
    type Statement = String;
    type QueryParser = BookdQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.execute_timed(&engine, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            select_schema(&target.statement.to_uppercase()),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(select_schema(
            &target.statement.statement.to_uppercase(),
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
                && n > max
            {
                max = n;
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct BookdFactory {
    handler: Arc<BookdHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<BookdAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl BookdFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = BookdAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(BookdHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for BookdFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection to completion.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = BookdFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    let code = if e.is_datetime() { "22007" } else { "42601" };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}
