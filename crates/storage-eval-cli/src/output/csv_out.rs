use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout. Row-shaped data (cash-flow records,
/// statements, sweep points) becomes one CSV row per entry; anything else a
/// two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => match rows_of(map) {
            Some(rows) => write_array_csv(&mut wtr, rows),
            None => {
                let fields = match map.get("result") {
                    Some(Value::Object(result)) => result,
                    _ => map,
                };
                write_fields_csv(&mut wtr, fields);
            }
        },
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

/// The row collection inside an output, if it has one.
fn rows_of(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    if let Some(Value::Array(results)) = map.get("results") {
        return Some(results);
    }
    match map.get("result") {
        Some(Value::Array(rows)) => Some(rows),
        Some(Value::Object(result)) => match result.get("table") {
            Some(Value::Object(table)) => match table.get("records") {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

fn write_fields_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, fields: &Map<String, Value>) {
    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in fields {
        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
