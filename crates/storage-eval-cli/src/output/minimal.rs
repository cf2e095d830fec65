use serde_json::Value;

/// Headline fields, most important first.
const PRIORITY_KEYS: [&str; 5] = [
    "pre_tax_irr_pct",
    "post_tax_irr_pct",
    "payback_years",
    "total_investment",
    "roi_pct",
];

/// Print just the key answer: the pre-tax IRR when there is one, otherwise
/// the first field of the result.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    // Full evaluations nest the headline numbers under `metrics`
    let headline = result
        .as_object()
        .and_then(|m| m.get("metrics"))
        .unwrap_or(result);

    if let Value::Object(map) = headline {
        for key in &PRIORITY_KEYS {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(headline));
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
