//! Dates and times.
//!
//! Dates are drawn from fixed year windows so equal seeds give equal
//! output regardless of the wall clock.

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use super::data::{MONTHS, WEEKDAYS};
use super::{integer_in, is_integer, is_string, is_string_or_integer, pick, string_or_number, text, wanted};
use crate::generator::schema::SchemaType;
use crate::generator::session::Session;
use crate::generator::tree::{FakeError, FakeRequest, Node, NodeRef};

const SECONDS_PER_DAY: i64 = 86_400;

const CREATED: &[&str] = &["createdat", "created", "createdon", "creationdate", "createddate", "datecreated"];
const MODIFIED: &[&str] = &["modifiedat", "modified", "updatedat", "updated", "lastmodified", "datemodified"];
const STARTED: &[&str] = &["startdate", "start", "startat", "startson", "starttime", "begin", "begindate", "validfrom"];

pub(super) fn nodes() -> Vec<NodeRef> {
    vec![
        Node::leaf("createdat", is_date, created).aliases(&CREATED[1..]).into_ref(),
        Node::leaf("modifiedat", is_date, modified)
            .aliases(&MODIFIED[1..])
            .aliases(&["updatedon", "lastupdated", "changedat", "changed"])
            .depends(&["createdat"])
            .into_ref(),
        Node::leaf("deletedat", is_date, deleted)
            .aliases(&["deleted", "deletedon", "removedat"])
            .depends(&["createdat", "modifiedat"])
            .into_ref(),
        Node::leaf("startdate", is_date, start).aliases(&STARTED[1..]).into_ref(),
        Node::leaf("enddate", is_date, end)
            .aliases(&["end", "endat", "endson", "endtime", "finish", "finishdate", "validuntil", "validto"])
            .depends(&["startdate"])
            .into_ref(),
        Node::leaf("expiresat", is_date, expires)
            .aliases(&["expires", "expiry", "expirydate", "expirationdate", "expiration"])
            .into_ref(),
        Node::leaf("timestamp", is_date, timestamp).aliases(&["ts"]).into_ref(),
        Node::leaf("date", is_date, date).aliases(&["datetime"]).into_ref(),
        Node::leaf("year", is_string_or_integer, year).into_ref(),
        Node::leaf("month", is_string_or_integer, month).into_ref(),
        Node::leaf("weekday", is_string, weekday).aliases(&["dayofweek"]).into_ref(),
    ]
}

pub(crate) fn is_date(request: &FakeRequest) -> bool {
    if is_integer(request) {
        return true;
    }
    is_string(request)
        && matches!(
            request.schema().format.as_deref(),
            None | Some("date") | Some("date-time")
        )
}

fn year_start(year: i32) -> i64 {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Instant between the start of `from_year` and the end of `to_year`.
pub fn random_datetime(session: &mut Session<'_>, from_year: i32, to_year: i32) -> DateTime<Utc> {
    let lo = year_start(from_year);
    let hi = year_start(to_year + 1) - 1;
    at(session.rng.int_range(lo, hi.max(lo)))
}

/// Instant 1 to `max_days` days after `base`.
pub fn after(session: &mut Session<'_>, base: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
    let offset = session.rng.int_range(SECONDS_PER_DAY, max_days.max(1) * SECONDS_PER_DAY);
    base + Duration::seconds(offset)
}

pub fn rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders `dt` the way the schema wants it: a unix timestamp for
/// numeric schemas, `YYYY-MM-DD` for `format: date`, RFC 3339 otherwise.
pub(crate) fn date_value(request: &FakeRequest, dt: DateTime<Utc>) -> Result<Value, FakeError> {
    match wanted(request) {
        Some(SchemaType::Integer) | Some(SchemaType::Number) => Ok(Value::from(dt.timestamp())),
        _ => match request.schema().format.as_deref() {
            Some("date") => text(dt.format("%Y-%m-%d").to_string()),
            Some("date-time") | None => text(rfc3339(&dt)),
            Some(_) => Err(FakeError::NotSupported),
        },
    }
}

/// Reads a previously generated date back.
pub(crate) fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|s| DateTime::from_timestamp(s, 0)),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|d| d.and_utc())
            }),
        _ => None,
    }
}

/// Latest of the dates already produced under any of `names`.
fn previous(session: &Session<'_>, names: &[&str]) -> Option<DateTime<Utc>> {
    names
        .iter()
        .filter_map(|n| session.context.get(n))
        .filter_map(parse_instant)
        .max()
}

fn created(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = random_datetime(session, 2015, 2024);
    date_value(request, dt)
}

fn modified(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = match previous(session, CREATED) {
        Some(base) => after(session, base, 365),
        None => random_datetime(session, 2020, 2025),
    };
    date_value(request, dt)
}

fn deleted(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let names: Vec<&str> = CREATED.iter().chain(MODIFIED.iter()).copied().collect();
    let dt = match previous(session, &names) {
        Some(base) => after(session, base, 90),
        None => random_datetime(session, 2020, 2025),
    };
    date_value(request, dt)
}

fn start(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = random_datetime(session, 2020, 2026);
    date_value(request, dt)
}

fn end(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = match previous(session, STARTED) {
        Some(base) => after(session, base, 365),
        None => random_datetime(session, 2026, 2030),
    };
    date_value(request, dt)
}

fn expires(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = random_datetime(session, 2026, 2035);
    date_value(request, dt)
}

fn timestamp(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = random_datetime(session, 2015, 2030);
    date_value(request, dt)
}

fn date(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    let dt = random_datetime(session, 1970, 2030);
    date_value(request, dt)
}

fn year(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 1970, 2030);
    }
    let y = random_datetime(session, 1970, 2030).year();
    string_or_number(request, y.to_string(), y as i64)
}

fn month(session: &mut Session<'_>, request: &FakeRequest) -> Result<Value, FakeError> {
    if is_integer(request) {
        return integer_in(session, request, 1, 12);
    }
    text(pick(session, MONTHS))
}

fn weekday(session: &mut Session<'_>, _: &FakeRequest) -> Result<Value, FakeError> {
    text(pick(session, WEEKDAYS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_date_shapes() {
        let a = parse_instant(&json!("2024-03-01T10:00:00Z")).unwrap();
        let b = parse_instant(&json!("2024-03-01")).unwrap();
        assert!(a > b);
        assert_eq!(parse_instant(&json!(0)).unwrap().year(), 1970);
        assert!(parse_instant(&json!("tomorrow")).is_none());
    }

    #[test]
    fn rfc3339_uses_z_suffix() {
        assert_eq!(rfc3339(&at(0)), "1970-01-01T00:00:00Z");
    }
}
