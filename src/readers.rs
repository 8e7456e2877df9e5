//! The default file-format decoders. Each one turns raw bytes into a nested
//! `serde_json::Map`; no placeholder expansion happens at this layer.

use serde_json::{Map, Number, Value};

use crate::error::ConfError;

fn decode_error(format: &'static str, reason: impl ToString) -> ConfError {
    ConfError::Decode {
        format,
        reason: reason.to_string(),
    }
}

pub(crate) fn read_json(bytes: &[u8]) -> Result<Map<String, Value>, ConfError> {
    serde_json::from_slice(bytes).map_err(|e| decode_error("json", e))
}

pub(crate) fn read_toml(bytes: &[u8]) -> Result<Map<String, Value>, ConfError> {
    let text = std::str::from_utf8(bytes).map_err(|e| decode_error("toml", e))?;
    let table: toml::Table = toml::from_str(text).map_err(|e| decode_error("toml", e))?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_value(value)))
        .collect())
}

fn toml_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_value).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_value(value)))
                .collect(),
        ),
    }
}

pub(crate) fn read_yaml(bytes: &[u8]) -> Result<Map<String, Value>, ConfError> {
    let value: Value = serde_yaml::from_slice(bytes).map_err(|e| decode_error("yaml", e))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(decode_error("yaml", "root is not a mapping")),
    }
}

/// Java-style properties: `#`/`!` comment lines, the first `=` or `:`
/// separates key and value, both sides trimmed. No escape processing and no
/// expansion; later duplicates win.
pub(crate) fn read_properties(bytes: &[u8]) -> Result<Map<String, Value>, ConfError> {
    let text = std::str::from_utf8(bytes).map_err(|e| decode_error("properties", e))?;
    let mut map = Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = match line.find(['=', ':']) {
            Some(i) => (&line[..i], &line[i + 1..]),
            None => (line, ""),
        };
        map.insert(
            key.trim().to_string(),
            Value::String(value.trim().to_string()),
        );
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_nested() {
        let m = read_json(br#"{"int": 1, "map": {"a": "1"}, "arr": ["a", "b"]}"#).unwrap();
        assert_eq!(m["int"], Value::Number(1.into()));
        assert_eq!(m["map"]["a"], Value::String("1".into()));
        assert_eq!(m["arr"][1], Value::String("b".into()));
    }

    #[test]
    fn json_empty_containers() {
        let m = read_json(br#"{"empty_arr": [], "empty_map": {}}"#).unwrap();
        assert_eq!(m["empty_arr"], Value::Array(vec![]));
        assert_eq!(m["empty_map"], Value::Object(Map::new()));
    }

    #[test]
    fn json_root_must_be_object() {
        assert!(read_json(b"[1, 2]").is_err());
        assert!(read_json(b"this is not json").is_err());
    }

    #[test]
    fn toml_nested() {
        let m = read_toml(
            b"int = 1\nstr = \"abc\"\narr = [\"a\", \"b\"]\n\n[map]\na = \"1\"\n",
        )
        .unwrap();
        assert_eq!(m["int"], Value::Number(1.into()));
        assert_eq!(m["str"], Value::String("abc".into()));
        assert_eq!(m["arr"][0], Value::String("a".into()));
        assert_eq!(m["map"]["a"], Value::String("1".into()));
    }

    #[test]
    fn toml_invalid() {
        let err = read_toml(b"this is not toml").unwrap_err();
        assert!(err.to_string().starts_with("failed to decode toml"));
    }

    #[test]
    fn yaml_nested() {
        let m = read_yaml(b"int: 1\nmap:\n  a: \"1\"\narr:\n  - a\n  - b\n").unwrap();
        assert_eq!(m["int"], Value::Number(1.into()));
        assert_eq!(m["map"]["a"], Value::String("1".into()));
        assert_eq!(m["arr"][0], Value::String("a".into()));
    }

    #[test]
    fn yaml_scalar_root_rejected() {
        let err = read_yaml(b"this is not a mapping").unwrap_err();
        assert!(err.to_string().contains("root is not a mapping"));
    }

    #[test]
    fn yaml_empty_is_empty_map() {
        assert!(read_yaml(b"").unwrap().is_empty());
    }

    #[test]
    fn properties_basics() {
        let m = read_properties(
            b"# comment\n! also comment\nint = 1\nstr: abc\narr = a, b, c\nbare\n\nmap.a=1\n",
        )
        .unwrap();
        assert_eq!(m["int"], Value::String("1".into()));
        assert_eq!(m["str"], Value::String("abc".into()));
        assert_eq!(m["arr"], Value::String("a, b, c".into()));
        assert_eq!(m["bare"], Value::String("".into()));
        assert_eq!(m["map.a"], Value::String("1".into()));
    }

    #[test]
    fn properties_later_duplicate_wins() {
        let m = read_properties(b"k = 1\nk = 2\n").unwrap();
        assert_eq!(m["k"], Value::String("2".into()));
    }
}
