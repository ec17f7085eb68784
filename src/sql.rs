use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use sqlparser::ast::{
    self, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertStore {
        id: Ulid,
    },
    DeleteStore {
        id: Ulid,
    },
    SetHours {
        store_id: Ulid,
        weekday: u8,
        open_close: Option<(Minutes, Minutes)>,
    },
    SetHoliday {
        store_id: Ulid,
        date: NaiveDate,
        open_close: Option<(Minutes, Minutes)>,
    },
    ClearHoliday {
        store_id: Ulid,
        date: NaiveDate,
    },
    UpsertTechnician {
        id: Ulid,
        store_id: Ulid,
        active: bool,
    },
    DeleteTechnician {
        id: Ulid,
    },
    InsertAppointment {
        request: BookingRequest,
    },
    RescheduleAppointment {
        id: Ulid,
        date: NaiveDate,
        start: Minutes,
    },
    SetAppointmentStatus {
        id: Ulid,
        status: AppointmentStatus,
    },
    SelectSlots {
        store_id: Ulid,
        date: NaiveDate,
        duration: Minutes,
        technician_id: Option<Ulid>,
        granularity: Option<Minutes>,
        now: Option<NaiveDateTime>,
    },
    SelectHours {
        store_id: Ulid,
        date: NaiveDate,
    },
    SelectAppointments {
        store_id: Ulid,
        date: NaiveDate,
        technician_id: Option<Ulid>,
    },
    SelectTechnicians {
        store_id: Ulid,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => parse_update(table, assignments, selection),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "stores" => {
            if values.is_empty() {
                return Err(SqlError::WrongArity("stores", 1, 0));
            }
            Ok(Command::InsertStore { id: parse_ulid(&values[0])? })
        }
        "hours" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("hours", 5, values.len()));
            }
            let weekday = parse_u8(&values[1])?;
            let open_close = parse_open_close(&values[2], &values[3], &values[4])?;
            Ok(Command::SetHours {
                store_id: parse_ulid(&values[0])?,
                weekday,
                open_close,
            })
        }
        "holidays" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("holidays", 5, values.len()));
            }
            let open_close = parse_open_close(&values[2], &values[3], &values[4])?;
            Ok(Command::SetHoliday {
                store_id: parse_ulid(&values[0])?,
                date: parse_date_expr(&values[1])?,
                open_close,
            })
        }
        "technicians" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("technicians", 3, values.len()));
            }
            let active = if values.len() >= 3 {
                parse_bool(&values[2])?
            } else {
                true
            };
            Ok(Command::UpsertTechnician {
                id: parse_ulid(&values[0])?,
                store_id: parse_ulid(&values[1])?,
                active,
            })
        }
        "appointments" => {
            if values.len() < 7 {
                return Err(SqlError::WrongArity("appointments", 7, values.len()));
            }
            let status = if values.len() >= 8 {
                parse_status(&values[7])?
            } else {
                AppointmentStatus::Confirmed
            };
            let notes = if values.len() >= 9 {
                parse_string_or_null(&values[8])?
            } else {
                None
            };
            Ok(Command::InsertAppointment {
                request: BookingRequest {
                    id: parse_ulid(&values[0])?,
                    store_id: parse_ulid(&values[1])?,
                    service_id: parse_ulid(&values[2])?,
                    technician_id: parse_ulid_or_null(&values[3])?,
                    date: parse_date_expr(&values[4])?,
                    start: parse_time_expr(&values[5])?,
                    duration: parse_i32(&values[6])?,
                    status,
                    notes,
                },
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = collect_eq_filters(&delete.selection)?;

    match table.as_str() {
        "stores" => Ok(Command::DeleteStore { id: required_ulid(&filters, "id")? }),
        "technicians" => Ok(Command::DeleteTechnician { id: required_ulid(&filters, "id")? }),
        "holidays" => Ok(Command::ClearHoliday {
            store_id: required_ulid(&filters, "store_id")?,
            date: required_date(&filters, "date")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;
    if table != "appointments" {
        return Err(SqlError::UnknownTable(table));
    }

    let filters = collect_eq_filters(selection)?;
    let id = required_ulid(&filters, "id")?;

    let mut date: Option<NaiveDate> = None;
    let mut start: Option<Minutes> = None;
    let mut status: Option<AppointmentStatus> = None;

    for assignment in assignments {
        let column = assignment_column(assignment)?;
        match column.as_str() {
            "date" => date = Some(parse_date_expr(&assignment.value)?),
            "start_time" => start = Some(parse_time_expr(&assignment.value)?),
            "status" => status = Some(parse_status(&assignment.value)?),
            other => {
                return Err(SqlError::Unsupported(format!(
                    "cannot update appointment column: {other}"
                )));
            }
        }
    }

    match (date, start, status) {
        (Some(date), Some(start), None) => Ok(Command::RescheduleAppointment { id, date, start }),
        (None, None, Some(status)) => Ok(Command::SetAppointmentStatus { id, status }),
        (None, None, None) => Err(SqlError::Parse("UPDATE with no assignments".into())),
        _ => Err(SqlError::Unsupported(
            "set either date + start_time, or status — not both".into(),
        )),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    let filters = collect_eq_filters(&select.selection)?;

    match table.as_str() {
        "slots" => Ok(Command::SelectSlots {
            store_id: required_ulid(&filters, "store_id")?,
            date: required_date(&filters, "date")?,
            duration: required_i32(&filters, "duration")?,
            technician_id: optional_ulid(&filters, "technician_id")?,
            granularity: optional_i32(&filters, "granularity")?,
            now: optional_datetime(&filters, "now")?,
        }),
        "hours" => Ok(Command::SelectHours {
            store_id: required_ulid(&filters, "store_id")?,
            date: required_date(&filters, "date")?,
        }),
        "appointments" => Ok(Command::SelectAppointments {
            store_id: required_ulid(&filters, "store_id")?,
            date: required_date(&filters, "date")?,
            technician_id: optional_ulid(&filters, "technician_id")?,
        }),
        "technicians" => Ok(Command::SelectTechnicians {
            store_id: required_ulid(&filters, "store_id")?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Collect `col = value` terms from an AND-chain WHERE clause.
fn collect_eq_filters(selection: &Option<Expr>) -> Result<HashMap<String, Expr>, SqlError> {
    let mut filters = HashMap::new();
    if let Some(expr) = selection {
        collect_eq_into(expr, &mut filters)?;
    }
    Ok(filters)
}

fn collect_eq_into(expr: &Expr, filters: &mut HashMap<String, Expr>) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                collect_eq_into(left, filters)?;
                collect_eq_into(right, filters)?;
                Ok(())
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
                filters.insert(col, (**right).clone());
                Ok(())
            }
            other => Err(SqlError::Unsupported(format!("operator {other} in WHERE"))),
        },
        Expr::Nested(inner) => collect_eq_into(inner, filters),
        other => Err(SqlError::Unsupported(format!("WHERE term {other}"))),
    }
}

fn required_ulid(filters: &HashMap<String, Expr>, col: &'static str) -> Result<Ulid, SqlError> {
    parse_ulid(filters.get(col).ok_or(SqlError::MissingFilter(col))?)
}

fn optional_ulid(filters: &HashMap<String, Expr>, col: &str) -> Result<Option<Ulid>, SqlError> {
    filters.get(col).map(parse_ulid).transpose()
}

fn required_date(filters: &HashMap<String, Expr>, col: &'static str) -> Result<NaiveDate, SqlError> {
    parse_date_expr(filters.get(col).ok_or(SqlError::MissingFilter(col))?)
}

fn required_i32(filters: &HashMap<String, Expr>, col: &'static str) -> Result<i32, SqlError> {
    parse_i32(filters.get(col).ok_or(SqlError::MissingFilter(col))?)
}

fn optional_i32(filters: &HashMap<String, Expr>, col: &str) -> Result<Option<i32>, SqlError> {
    filters.get(col).map(parse_i32).transpose()
}

fn optional_datetime(
    filters: &HashMap<String, Expr>,
    col: &str,
) -> Result<Option<NaiveDateTime>, SqlError> {
    filters.get(col).map(parse_datetime_expr).transpose()
}

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn assignment_column(assignment: &ast::Assignment) -> Result<String, SqlError> {
    match &assignment.target {
        ast::AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Unsupported("tuple assignment".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            if values.rows.len() > 1 {
                return Err(SqlError::Unsupported("multi-row INSERT".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn extract_string(expr: &Expr) -> Result<&str, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    parse_ulid(expr).map(Some)
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(None);
    }
    extract_string(expr).map(|s| Some(s.to_string()))
}

/// Malformed dates are rejected here, before any engine lookup.
fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = extract_string(expr)?;
    parse_date(s).ok_or_else(|| SqlError::BadDate(s.to_string()))
}

/// Malformed times are rejected here, before any engine lookup.
fn parse_time_expr(expr: &Expr) -> Result<Minutes, SqlError> {
    let s = extract_string(expr)?;
    parse_time(s).ok_or_else(|| SqlError::BadTime(s.to_string()))
}

fn parse_datetime_expr(expr: &Expr) -> Result<NaiveDateTime, SqlError> {
    let s = extract_string(expr)?;
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| SqlError::BadTime(s.to_string()))
}

fn parse_status(expr: &Expr) -> Result<AppointmentStatus, SqlError> {
    let s = extract_string(expr)?;
    AppointmentStatus::parse(s).ok_or_else(|| SqlError::Parse(format!("bad status: {s}")))
}

/// `(open_time, close_time, closed)` → `None` for a closed day,
/// `Some((open, close))` otherwise. A closed day ignores its times.
fn parse_open_close(
    open: &Expr,
    close: &Expr,
    closed: &Expr,
) -> Result<Option<(Minutes, Minutes)>, SqlError> {
    if parse_bool(closed)? {
        return Ok(None);
    }
    Ok(Some((parse_time_expr(open)?, parse_time_expr(close)?)))
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i32(expr: &Expr) -> Result<i32, SqlError> {
    let v = parse_i64_expr(expr)?;
    i32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of i32 range")))
}

fn parse_u8(expr: &Expr) -> Result<u8, SqlError> {
    let v = parse_i64_expr(expr)?;
    u8::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u8 range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    BadDate(String),
    BadTime(String),
}

impl SqlError {
    /// True for malformed date/time literals — mapped to SQLSTATE 22007.
    pub fn is_datetime(&self) -> bool {
        matches!(self, SqlError::BadDate(_) | SqlError::BadTime(_))
    }
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::BadDate(s) => write!(f, "invalid date (want YYYY-MM-DD): {s}"),
            SqlError::BadTime(s) => write!(f, "invalid time (want HH:MM or HH:MM:SS): {s}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const U: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    #[test]
    fn parse_insert_store() {
        let cmd = parse_sql(&format!("INSERT INTO stores (id) VALUES ('{U}')")).unwrap();
        match cmd {
            Command::InsertStore { id } => assert_eq!(id.to_string(), U),
            _ => panic!("expected InsertStore, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_store() {
        let cmd = parse_sql(&format!("DELETE FROM stores WHERE id = '{U}'")).unwrap();
        assert!(matches!(cmd, Command::DeleteStore { .. }));
    }

    #[test]
    fn parse_set_hours_open() {
        let sql = format!(
            "INSERT INTO hours (store_id, weekday, open_time, close_time, closed) \
             VALUES ('{U}', 0, '09:00', '18:00', false)"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SetHours { weekday, open_close, .. } => {
                assert_eq!(weekday, 0);
                assert_eq!(open_close, Some((540, 1080)));
            }
            _ => panic!("expected SetHours, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_set_hours_closed_ignores_null_times() {
        let sql = format!(
            "INSERT INTO hours (store_id, weekday, open_time, close_time, closed) \
             VALUES ('{U}', 6, NULL, NULL, true)"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SetHours { weekday, open_close, .. } => {
                assert_eq!(weekday, 6);
                assert_eq!(open_close, None);
            }
            _ => panic!("expected SetHours, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_set_holiday() {
        let sql = format!(
            "INSERT INTO holidays (store_id, date, open_time, close_time, closed) \
             VALUES ('{U}', '2026-12-25', NULL, NULL, true)"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SetHoliday { date, open_close, .. } => {
                assert_eq!(date, parse_date("2026-12-25").unwrap());
                assert_eq!(open_close, None);
            }
            _ => panic!("expected SetHoliday, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_clear_holiday() {
        let sql = format!("DELETE FROM holidays WHERE store_id = '{U}' AND date = '2026-12-25'");
        let cmd = parse_sql(&sql).unwrap();
        assert!(matches!(cmd, Command::ClearHoliday { .. }));
    }

    #[test]
    fn parse_upsert_technician_default_active() {
        let sql = format!("INSERT INTO technicians (id, store_id) VALUES ('{U}', '{U}')");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::UpsertTechnician { active, .. } => assert!(active),
            _ => panic!("expected UpsertTechnician, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment_minimal() {
        let sql = format!(
            "INSERT INTO appointments \
             (id, store_id, service_id, technician_id, date, start_time, duration) \
             VALUES ('{U}', '{U}', '{U}', NULL, '2026-08-06', '14:00', 30)"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertAppointment { request } => {
                assert_eq!(request.technician_id, None);
                assert_eq!(request.date, parse_date("2026-08-06").unwrap());
                assert_eq!(request.start, 840);
                assert_eq!(request.duration, 30);
                assert_eq!(request.status, AppointmentStatus::Confirmed);
                assert_eq!(request.notes, None);
            }
            _ => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment_full() {
        let sql = format!(
            "INSERT INTO appointments \
             (id, store_id, service_id, technician_id, date, start_time, duration, status, notes) \
             VALUES ('{U}', '{U}', '{U}', '{U}', '2026-08-06', '14:00:00', 60, 'pending', 'first visit')"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::InsertAppointment { request } => {
                assert!(request.technician_id.is_some());
                assert_eq!(request.start, 840);
                assert_eq!(request.status, AppointmentStatus::Pending);
                assert_eq!(request.notes.as_deref(), Some("first visit"));
            }
            _ => panic!("expected InsertAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_reschedule() {
        let sql = format!(
            "UPDATE appointments SET date = '2026-08-07', start_time = '15:30' WHERE id = '{U}'"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::RescheduleAppointment { date, start, .. } => {
                assert_eq!(date, parse_date("2026-08-07").unwrap());
                assert_eq!(start, 930);
            }
            _ => panic!("expected RescheduleAppointment, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_cancel() {
        let sql = format!("UPDATE appointments SET status = 'cancelled' WHERE id = '{U}'");
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SetAppointmentStatus { status, .. } => {
                assert_eq!(status, AppointmentStatus::Cancelled);
            }
            _ => panic!("expected SetAppointmentStatus, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_mixing_status_and_date_rejected() {
        let sql = format!(
            "UPDATE appointments SET date = '2026-08-07', status = 'cancelled' WHERE id = '{U}'"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_select_slots_minimal() {
        let sql = format!(
            "SELECT * FROM slots WHERE store_id = '{U}' AND date = '2026-08-06' AND duration = 60"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SelectSlots {
                duration,
                technician_id,
                granularity,
                now,
                ..
            } => {
                assert_eq!(duration, 60);
                assert_eq!(technician_id, None);
                assert_eq!(granularity, None);
                assert_eq!(now, None);
            }
            _ => panic!("expected SelectSlots, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_slots_full() {
        let sql = format!(
            "SELECT * FROM slots WHERE store_id = '{U}' AND date = '2026-08-06' \
             AND duration = 60 AND technician_id = '{U}' AND granularity = 15 \
             AND now = '2026-08-06 09:45'"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SelectSlots {
                technician_id,
                granularity,
                now,
                ..
            } => {
                assert!(technician_id.is_some());
                assert_eq!(granularity, Some(15));
                let now = now.unwrap();
                assert_eq!(now.date(), parse_date("2026-08-06").unwrap());
                assert_eq!(clock_minutes(&now), 585);
            }
            _ => panic!("expected SelectSlots, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_hours() {
        let sql = format!("SELECT * FROM hours WHERE store_id = '{U}' AND date = '2026-08-06'");
        let cmd = parse_sql(&sql).unwrap();
        assert!(matches!(cmd, Command::SelectHours { .. }));
    }

    #[test]
    fn parse_select_appointments_with_technician() {
        let sql = format!(
            "SELECT * FROM appointments WHERE store_id = '{U}' AND date = '2026-08-06' \
             AND technician_id = '{U}'"
        );
        let cmd = parse_sql(&sql).unwrap();
        match cmd {
            Command::SelectAppointments { technician_id, .. } => assert!(technician_id.is_some()),
            _ => panic!("expected SelectAppointments, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_technicians() {
        let sql = format!("SELECT * FROM technicians WHERE store_id = '{U}'");
        let cmd = parse_sql(&sql).unwrap();
        assert!(matches!(cmd, Command::SelectTechnicians { .. }));
    }

    #[test]
    fn malformed_date_rejected_before_lookup() {
        let sql = format!(
            "SELECT * FROM slots WHERE store_id = '{U}' AND date = '06/08/2026' AND duration = 60"
        );
        match parse_sql(&sql) {
            Err(SqlError::BadDate(s)) => assert_eq!(s, "06/08/2026"),
            other => panic!("expected BadDate, got {other:?}"),
        }
    }

    #[test]
    fn malformed_time_rejected_before_lookup() {
        let sql = format!(
            "INSERT INTO appointments \
             (id, store_id, service_id, technician_id, date, start_time, duration) \
             VALUES ('{U}', '{U}', '{U}', NULL, '2026-08-06', '2pm', 30)"
        );
        let err = parse_sql(&sql).unwrap_err();
        assert!(err.is_datetime());
    }

    #[test]
    fn missing_required_filter_errors() {
        let sql = format!("SELECT * FROM slots WHERE store_id = '{U}' AND duration = 60");
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("date"))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{U}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_bad_status_errors() {
        let sql = format!("UPDATE appointments SET status = 'accepted' WHERE id = '{U}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
