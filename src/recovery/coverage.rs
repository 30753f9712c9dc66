/// Coverage summary sanitization
///
/// Output always has `total.{lines,functions,statements,branches}`, each a
/// `{total, covered, skipped, pct}` leaf. Per-file entries are kept and
/// normalized the same way.
use serde_json::{json, Map, Value};

pub const COVERAGE_METRICS: [&str; 4] = ["lines", "functions", "statements", "branches"];

const TOTAL_KEY: &str = "total";

pub fn sanitize_coverage(value: Value, warnings: &mut Vec<String>) -> Value {
    let root = match value {
        Value::Object(map) => map,
        _ => {
            warnings.push("Coverage data was not an object, using empty summary".to_string());
            Map::new()
        }
    };

    let mut files = Map::new();
    let mut total = None;
    for (key, entry) in root {
        if key == TOTAL_KEY {
            total = Some(entry);
            continue;
        }
        match entry {
            Value::Object(_) => {
                files.insert(key.clone(), sanitize_summary(&key, entry, warnings));
            }
            _ => warnings.push(format!("Dropped coverage entry {} (not an object)", key)),
        }
    }

    let total = match total {
        Some(entry) => sanitize_summary(TOTAL_KEY, entry, warnings),
        None if !files.is_empty() => {
            warnings.push("Missing coverage total, summed from file entries".to_string());
            sum_summaries(files.values())
        }
        None => {
            warnings.push("Missing coverage total, using empty summary".to_string());
            minimal_summary()
        }
    };

    let mut out = Map::new();
    out.insert(TOTAL_KEY.to_string(), total);
    out.extend(files);
    Value::Object(out)
}

/// Empty coverage summary used as a fallback
pub fn minimal_coverage() -> Value {
    json!({ "total": minimal_summary() })
}

fn minimal_summary() -> Value {
    let mut summary = Map::new();
    for metric in COVERAGE_METRICS {
        summary.insert(
            metric.to_string(),
            json!({ "total": 0, "covered": 0, "skipped": 0, "pct": 0.0 }),
        );
    }
    Value::Object(summary)
}

fn sanitize_summary(name: &str, entry: Value, warnings: &mut Vec<String>) -> Value {
    let mut summary = match entry {
        Value::Object(map) => map,
        _ => {
            warnings.push(format!("Coverage entry {} was not an object, reset", name));
            Map::new()
        }
    };

    for metric in COVERAGE_METRICS {
        let leaf = summary.remove(metric).unwrap_or(Value::Null);
        let leaf = sanitize_leaf(name, metric, leaf, warnings);
        summary.insert(metric.to_string(), leaf);
    }
    Value::Object(summary)
}

fn sanitize_leaf(name: &str, metric: &str, leaf: Value, warnings: &mut Vec<String>) -> Value {
    let Value::Object(leaf) = leaf else {
        warnings.push(format!("Coverage {}.{} missing, using zeros", name, metric));
        return json!({ "total": 0, "covered": 0, "skipped": 0, "pct": 0.0 });
    };

    let count = |field: &str| leaf.get(field).and_then(Value::as_u64);
    let total = count("total");
    let covered = count("covered");
    let skipped = count("skipped");
    if total.is_none() || covered.is_none() || skipped.is_none() {
        warnings.push(format!("Coverage {}.{} had invalid counters, defaulted", name, metric));
    }

    let total = total.unwrap_or(0);
    let mut covered = covered.unwrap_or(0);
    if covered > total {
        warnings.push(format!("Coverage {}.{} covered exceeds total, clamped", name, metric));
        covered = total;
    }
    let skipped = skipped.unwrap_or(0);

    let pct = match leaf.get("pct").and_then(Value::as_f64) {
        Some(pct) if (0.0..=100.0).contains(&pct) => pct,
        _ => {
            let pct = percentage(covered, total);
            warnings.push(format!("Coverage {}.{} pct recomputed as {}", name, metric, pct));
            pct
        }
    };

    json!({ "total": total, "covered": covered, "skipped": skipped, "pct": pct })
}

fn sum_summaries<'a>(summaries: impl Iterator<Item = &'a Value>) -> Value {
    let summaries: Vec<&Value> = summaries.collect();
    let mut out = Map::new();
    for metric in COVERAGE_METRICS {
        let field = |name: &str| -> u64 {
            summaries
                .iter()
                .filter_map(|s| s.get(metric).and_then(|m| m.get(name)).and_then(Value::as_u64))
                .fold(0u64, u64::saturating_add)
        };
        let (total, covered, skipped) = (field("total"), field("covered"), field("skipped"));
        out.insert(
            metric.to_string(),
            json!({
                "total": total,
                "covered": covered,
                "skipped": skipped,
                "pct": percentage(covered, total),
            }),
        );
    }
    Value::Object(out)
}

/// Percentage rounded to two decimals; an empty metric counts as fully covered
pub fn percentage(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let pct = covered as f64 / total as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}
