//! Deserializers for form fields that arrive either as JSON numbers or as the
//! raw text of an input box (`""`, `"20"`, `"12.5"`).

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

fn number_from(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

pub fn f64_or_zero<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(number_from).unwrap_or(0.0))
}

pub fn opt_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(number_from))
}

/// Truncates like an integer input box; negatives read as zero.
pub fn u32_or_zero<'de, D>(d: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    let n = raw.as_ref().and_then(number_from).unwrap_or(0.0);
    Ok(if n <= 0.0 { 0 } else { n.trunc().min(u32::MAX as f64) as u32 })
}

pub fn opt_u32<'de, D>(d: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw
        .as_ref()
        .and_then(number_from)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc() as u32))
}

/// Keeps numeric slots and drops blanks (an unset `<select>` posts `""`).
pub fn number_map<'de, D>(d: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(d)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|(k, v)| number_from(&v).map(|n| (k, n)))
        .collect())
}

/// Accepts `"id"`, `{ "id": .. }` or `{ "_id": .. }`; blank reads as none.
pub fn ref_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(d)?;
    let id = match raw {
        Some(Value::String(s)) => Some(s),
        Some(Value::Object(o)) => o
            .get("id")
            .or_else(|| o.get("_id"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    };
    Ok(id.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "f64_or_zero")]
        amount: f64,
        #[serde(default, deserialize_with = "u32_or_zero")]
        count: u32,
        #[serde(default, deserialize_with = "ref_id")]
        track: Option<String>,
        #[serde(default, deserialize_with = "number_map")]
        slots: BTreeMap<String, f64>,
    }

    #[test]
    fn text_inputs_parse_like_numbers() {
        let p: Probe = serde_json::from_value(json!({
            "amount": "12.5",
            "count": "4",
            "track": { "_id": "t1" },
            "slots": { "rate_0": "20", "inst_0": 3, "downPayment": "" }
        }))
        .expect("probe");
        assert_eq!(p.amount, 12.5);
        assert_eq!(p.count, 4);
        assert_eq!(p.track.as_deref(), Some("t1"));
        assert_eq!(p.slots.get("rate_0"), Some(&20.0));
        assert_eq!(p.slots.get("inst_0"), Some(&3.0));
        assert!(!p.slots.contains_key("downPayment"));
    }

    #[test]
    fn blanks_and_nulls_fall_back_to_defaults() {
        let p: Probe = serde_json::from_value(json!({
            "amount": "",
            "count": -3,
            "track": "",
            "slots": null
        }))
        .expect("probe");
        assert_eq!(p.amount, 0.0);
        assert_eq!(p.count, 0);
        assert_eq!(p.track, None);
        assert!(p.slots.is_empty());
    }
}
