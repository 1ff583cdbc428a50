use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Configuration, WeeklyRecord};
use crate::series::RecordSeries;

/// The inputs that identify a review: history plus configuration.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub series: &'a [WeeklyRecord],
    pub config: &'a Configuration,
}

impl<'a> Snapshot<'a> {
    pub fn new(series: &'a RecordSeries, config: &'a Configuration) -> Self {
        Self {
            series: series.records(),
            config,
        }
    }
}

/// Tagged value tree whose maps are always key-sorted.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<CanonicalValue>),
    Map(BTreeMap<String, CanonicalValue>),
}

impl CanonicalValue {
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::from(&serde_json::to_value(value)?))
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CanonicalValue)>,
        K: Into<String>,
    {
        CanonicalValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn to_canonical_string(&self) -> Result<String> {
        let mut out = String::new();
        self.write_canonical(&mut out)?;
        Ok(out)
    }

    fn write_canonical(&self, out: &mut String) -> Result<()> {
        match self {
            CanonicalValue::Null => out.push_str("null"),
            CanonicalValue::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
            CanonicalValue::Number(number) => out.push_str(&render_number(*number)),
            CanonicalValue::String(text) => out.push_str(&serde_json::to_string(text)?),
            CanonicalValue::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out)?;
                }
                out.push(']');
            }
            CanonicalValue::Map(entries) => {
                out.push('{');
                for (idx, (key, item)) in entries.iter().enumerate() {
                    if idx > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::to_string(key)?);
                    out.push(':');
                    item.write_canonical(out)?;
                }
                out.push('}');
            }
        }
        Ok(())
    }
}

impl From<&Value> for CanonicalValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => CanonicalValue::Null,
            Value::Bool(flag) => CanonicalValue::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .map(CanonicalValue::Number)
                .unwrap_or(CanonicalValue::Null),
            Value::String(text) => CanonicalValue::String(text.clone()),
            Value::Array(items) => CanonicalValue::List(items.iter().map(Self::from).collect()),
            Value::Object(map) => CanonicalValue::map(
                map.iter().map(|(key, item)| (key.clone(), Self::from(item))),
            ),
        }
    }
}

/// Whole numbers print without a fractional part; non-finite numbers print as `null`.
fn render_number(number: f64) -> String {
    if !number.is_finite() {
        return "null".to_string();
    }
    if number.fract() == 0.0 && number.abs() < 1e15 {
        return format!("{}", number as i64);
    }
    format!("{number}")
}

pub fn digest_hex(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn fingerprint_value(value: &CanonicalValue) -> Result<String> {
    Ok(digest_hex(&value.to_canonical_string()?))
}

pub fn fingerprint(snapshot: &Snapshot<'_>) -> Result<String> {
    fingerprint_value(&CanonicalValue::from_serialize(snapshot)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;

    #[test]
    fn maps_sort_keys_regardless_of_insertion_order() {
        let forward = CanonicalValue::map([
            ("revenue", CanonicalValue::Number(36250.0)),
            ("dealCount", CanonicalValue::Number(50.0)),
            ("label", CanonicalValue::String("orders".to_string())),
        ]);
        let reversed = CanonicalValue::map([
            ("label", CanonicalValue::String("orders".to_string())),
            ("dealCount", CanonicalValue::Number(50.0)),
            ("revenue", CanonicalValue::Number(36250.0)),
        ]);
        assert_eq!(forward.to_canonical_string().unwrap(), reversed.to_canonical_string().unwrap());
        assert_eq!(
            forward.to_canonical_string().unwrap(),
            r#"{"dealCount":50,"label":"orders","revenue":36250}"#
        );
        assert_eq!(fingerprint_value(&forward).unwrap(), fingerprint_value(&reversed).unwrap());
    }

    #[test]
    fn lists_keep_order() {
        let a = CanonicalValue::List(vec![CanonicalValue::Number(1.0), CanonicalValue::Number(2.0)]);
        let b = CanonicalValue::List(vec![CanonicalValue::Number(2.0), CanonicalValue::Number(1.0)]);
        assert_ne!(fingerprint_value(&a).unwrap(), fingerprint_value(&b).unwrap());
    }

    #[test]
    fn renders_scalars_naturally() {
        let value = CanonicalValue::List(vec![
            CanonicalValue::Null,
            CanonicalValue::Bool(true),
            CanonicalValue::Number(0.1),
            CanonicalValue::Number(f64::NAN),
            CanonicalValue::String("a\"b".to_string()),
        ]);
        assert_eq!(value.to_canonical_string().unwrap(), r#"[null,true,0.1,null,"a\"b"]"#);
    }

    #[test]
    fn strings_use_json_escaping() {
        let text = "tab\there \u{7f} \u{1} ünïcode \\ \"q\"";
        let value = CanonicalValue::map([(text, CanonicalValue::String(text.to_string()))]);
        let quoted = serde_json::to_string(text).unwrap();
        assert_eq!(value.to_canonical_string().unwrap(), format!("{{{quoted}:{quoted}}}"));
        let parsed: Value = serde_json::from_str(&value.to_canonical_string().unwrap()).unwrap();
        assert_eq!(parsed[text], text);
    }

    #[test]
    fn digest_is_lowercase_sha256_hex() {
        assert_eq!(
            digest_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn snapshot_fingerprint_is_deterministic_and_sensitive() {
        let series = RecordSeries::sample();
        let config = Configuration::default();
        let first = fingerprint(&Snapshot::new(&series, &config)).unwrap();
        let second = fingerprint(&Snapshot::new(&series.clone(), &config.clone())).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let mut edited = series.clone();
        edited.set_metric(4, Metric::DealCount, "45").unwrap();
        let changed = fingerprint(&Snapshot::new(&edited, &config)).unwrap();
        assert_ne!(first, changed);

        let retuned = config.clone().with_threshold(0.2);
        assert_ne!(first, fingerprint(&Snapshot::new(&series, &retuned)).unwrap());
    }

    #[test]
    fn json_objects_canonicalize_like_maps() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a":{"x":3,"y":2},"b":1}"#).unwrap();
        assert_eq!(
            CanonicalValue::from(&a).to_canonical_string().unwrap(),
            CanonicalValue::from(&b).to_canonical_string().unwrap()
        );
    }
}
