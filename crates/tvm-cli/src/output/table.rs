use serde_json::{Map, Value};
use tabled::{builder::Builder, settings::Style, Table};

/// Render a command's output as tables: scalars as a field/value table,
/// record lists (schedules, timelines) as one row per record.
pub fn print_table(value: &Value) {
    let Value::Object(envelope) = value else {
        print_records_or_scalar(value);
        return;
    };

    match envelope.get("result") {
        Some(result) => {
            print_records_or_scalar(result);
            print_footer(envelope);
        }
        None => println!("{}", field_table(envelope.iter())),
    }
}

fn print_records_or_scalar(value: &Value) {
    match value {
        Value::Array(records) => println!("{}", record_table(records)),
        Value::Object(map) => {
            let (scalars, nested): (Vec<_>, Vec<_>) =
                map.iter().partition(|(_, v)| !is_nested(v));
            println!("{}", field_table(scalars.into_iter()));
            for (key, val) in nested {
                println!("\n{}:", key);
                match val {
                    Value::Array(records) => println!("{}", record_table(records)),
                    Value::Object(inner) => println!("{}", field_table(inner.iter())),
                    _ => {}
                }
            }
        }
        other => println!("{}", cell(other)),
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

fn field_table<'a>(fields: impl Iterator<Item = (&'a String, &'a Value)>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in fields {
        builder.push_record([key.clone(), cell(val)]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table
}

/// Columns follow the first record's field order.
fn record_table(records: &[Value]) -> Table {
    let mut builder = Builder::default();
    let columns: Vec<&String> = records
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().collect())
        .unwrap_or_default();

    if columns.is_empty() {
        for record in records {
            builder.push_record([cell(record)]);
        }
    } else {
        builder.push_record(columns.iter().map(|c| c.to_string()));
        for record in records {
            builder.push_record(
                columns
                    .iter()
                    .map(|c| record.get(c.as_str()).map(cell).unwrap_or_default()),
            );
        }
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table
}

fn print_footer(envelope: &Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for warning in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", warning);
            }
        }
    }
    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
