use serde_json::Value;

/// Result fields that answer the question, most specific first.
const ANSWER_KEYS: [&str; 3] = ["value", "scheduled_payment", "future_value"];

/// Print only the headline number of a result.
///
/// Formula results print the solved value, amortizations the scheduled
/// payment, and timelines or comparisons the value of their last point.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let answer = match result {
        Value::Object(map) => ANSWER_KEYS
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null())),
        Value::Array(points) => points
            .last()
            .and_then(|p| ANSWER_KEYS.iter().find_map(|key| p.get(*key))),
        _ => None,
    };

    println!("{}", render(answer.unwrap_or(result)));
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
