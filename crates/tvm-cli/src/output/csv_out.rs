use serde_json::{Map, Value};
use std::io;

/// Write output as CSV on stdout.
///
/// Record lists (an amortization schedule, a timeline) become one row per
/// record. Anything else becomes `field,value` pairs with nested objects
/// flattened into dotted field names.
pub fn print_csv(value: &Value) {
    if let Err(e) = write_csv(value) {
        eprintln!("CSV output error: {}", e);
    }
}

fn write_csv(value: &Value) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout().lock());
    let result = value.get("result").unwrap_or(value);

    let records = match result {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.get("schedule").and_then(Value::as_array),
        _ => None,
    };

    match (records, result) {
        (Some(records), _) => write_records(&mut wtr, records)?,
        (None, Value::Object(map)) => {
            wtr.write_record(["field", "value"])?;
            let mut pairs = Vec::new();
            flatten("", map, &mut pairs);
            for (field, val) in pairs {
                wtr.write_record([field, val])?;
            }
        }
        (None, other) => wtr.write_record([field_value(other)])?,
    }
    wtr.flush()?;
    Ok(())
}

fn write_records<W: io::Write>(wtr: &mut csv::Writer<W>, records: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = records.first() else {
        for record in records {
            wtr.write_record([field_value(record)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for record in records {
        wtr.write_record(
            headers
                .iter()
                .map(|h| record.get(*h).map(field_value).unwrap_or_default()),
        )?;
    }
    Ok(())
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, val) in map {
        let field = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match val {
            Value::Object(inner) => flatten(&field, inner, out),
            other => out.push((field, field_value(other))),
        }
    }
}

fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
