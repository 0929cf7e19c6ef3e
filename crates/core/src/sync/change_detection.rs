//! Structural comparison of partner payloads.

use std::collections::HashSet;

use serde_json::Value;

/// Compares JSON payloads while ignoring volatile keys.
///
/// Object key order never matters, numbers compare by value (`1` equals
/// `1.0`), and any key in the ignore set is skipped at every depth.
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    ignored: HashSet<String>,
}

impl ChangeDetector {
    pub fn new<I, S>(ignored_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { ignored: ignored_fields.into_iter().map(Into::into).collect() }
    }

    /// True when `candidate` carries a change relative to `previous`.
    pub fn differs(&self, previous: &Value, candidate: &Value) -> bool {
        !self.equivalent(previous, candidate)
    }

    /// JSON-pointer style paths whose values differ, for logging.
    pub fn diff_paths(&self, previous: &Value, candidate: &Value) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_diffs("", previous, candidate, &mut paths);
        paths
    }

    fn equivalent(&self, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Object(l), Value::Object(r)) => {
                let keys: HashSet<&String> = l
                    .keys()
                    .chain(r.keys())
                    .filter(|key| !self.ignored.contains(key.as_str()))
                    .collect();
                keys.into_iter().all(|key| match (l.get(key), r.get(key)) {
                    (Some(a), Some(b)) => self.equivalent(a, b),
                    (Some(Value::Null), None) | (None, Some(Value::Null)) => true,
                    _ => false,
                })
            }
            (Value::Array(l), Value::Array(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| self.equivalent(a, b))
            }
            (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => l == r,
            },
            _ => left == right,
        }
    }

    fn collect_diffs(&self, path: &str, left: &Value, right: &Value, out: &mut Vec<String>) {
        match (left, right) {
            (Value::Object(l), Value::Object(r)) => {
                let mut keys: Vec<&String> = l
                    .keys()
                    .chain(r.keys())
                    .filter(|key| !self.ignored.contains(key.as_str()))
                    .collect();
                keys.sort();
                keys.dedup();
                for key in keys {
                    let child = format!("{path}/{key}");
                    match (l.get(key), r.get(key)) {
                        (Some(a), Some(b)) => self.collect_diffs(&child, a, b, out),
                        (Some(Value::Null), None) | (None, Some(Value::Null)) => {}
                        _ => out.push(child),
                    }
                }
            }
            _ if self.equivalent(left, right) => {}
            _ => out.push(if path.is_empty() { "/".to_string() } else { path.to_string() }),
        }
    }
}
