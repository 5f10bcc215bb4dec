//! Flux query generation, line-protocol encoding and CSV response parsing.

use std::collections::HashMap;

use vigil_core::liveness::parse_timestamp;
use vigil_core::types::Timestamp;

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escape a value for use inside a double-quoted Flux string literal.
pub fn escape_flux_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Escape a tag key or tag value for line protocol.
pub fn escape_tag(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a measurement name for line protocol.
pub fn escape_measurement(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ',' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ---------------------------------------------------------------------------
// Query / point builders
// ---------------------------------------------------------------------------

/// Flux returning the latest `_time` per `device_id` for the given set.
///
/// `lookback` is inserted verbatim and must already be validated.
pub fn last_seen_query(
    bucket: &str,
    measurement: &str,
    lookback: &str,
    device_ids: &[String],
) -> String {
    let set = device_ids
        .iter()
        .map(|id| format!("\"{}\"", escape_flux_string(id)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "from(bucket: \"{bucket}\")\n  \
         |> range(start: {lookback})\n  \
         |> filter(fn: (r) => r._measurement == \"{measurement}\")\n  \
         |> filter(fn: (r) => contains(value: r.device_id, set: [{set}]))\n  \
         |> group(columns: [\"device_id\"])\n  \
         |> sort(columns: [\"_time\"])\n  \
         |> last(column: \"_time\")\n  \
         |> keep(columns: [\"device_id\", \"_time\"])",
        bucket = escape_flux_string(bucket),
        measurement = escape_flux_string(measurement),
    )
}

/// One heartbeat point in line protocol, nanosecond precision.
pub fn heartbeat_point(measurement: &str, device_id: &str, timestamp_ns: i64) -> String {
    format!(
        "{},device_id={} alive=1i {}",
        escape_measurement(measurement),
        escape_tag(device_id),
        timestamp_ns
    )
}

// ---------------------------------------------------------------------------
// CSV response parsing
// ---------------------------------------------------------------------------

/// Parse a query response (header row, no annotations) into
/// `device_id -> _time`.
///
/// Flux emits one header per table schema, separated by blank lines; every
/// header is re-read. If a device appears in several tables the latest time
/// wins.
pub fn parse_last_seen_csv(body: &str) -> Result<HashMap<String, Timestamp>, String> {
    let mut latest: HashMap<String, Timestamp> = HashMap::new();
    let mut columns: Option<(usize, usize)> = None;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            columns = None;
            continue;
        }

        let fields = split_csv_line(line);

        let Some((id_idx, time_idx)) = columns else {
            let id_idx = fields.iter().position(|f| f == "device_id");
            let time_idx = fields.iter().position(|f| f == "_time");
            match (id_idx, time_idx) {
                (Some(i), Some(t)) => columns = Some((i, t)),
                _ => return Err(format!("unexpected CSV header: {line}")),
            }
            continue;
        };

        let (Some(device_id), Some(raw_time)) = (fields.get(id_idx), fields.get(time_idx)) else {
            return Err(format!("short CSV row: {line}"));
        };
        if device_id.is_empty() || raw_time.is_empty() {
            continue;
        }

        let seen = parse_timestamp(raw_time).map_err(|e| e.to_string())?;
        latest
            .entry(device_id.clone())
            .and_modify(|current| {
                if seen > *current {
                    *current = seen;
                }
            })
            .or_insert(seen);
    }

    Ok(latest)
}

/// Split one CSV record, honouring double-quoted fields with `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (other, _) => field.push(other),
        }
    }
    fields.push(field);
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
