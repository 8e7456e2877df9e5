//! The property map: a shape-verified store plus the operations built on it.
//!
//! Configuration file formats disagree about almost everything, so the
//! engine treats them all the same way: decode to a nested map, flatten to
//! `key → string` pairs, and verify the implied tree shape on every write.
//! A flat map keeps lookups cheap; the shape tree keeps writes honest.
//! Reference expansion (`${key:=def}`) and typed binding happen on top of
//! the flat view, on read.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::bind::{self, FromProperties};
use crate::error::ConfError;
use crate::flatten;
use crate::registry;
use crate::resolve;
use crate::store::Store;
use crate::tag::BindParam;

/// A mutable property map. Cloning produces an independent deep copy.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    storage: Store,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single file, picking the reader by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfError> {
        let mut p = Self::new();
        p.load(path)?;
        Ok(p)
    }

    /// Load a file into this map on top of what is already here.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), ConfError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ConfError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!(".{ext}"),
            None => String::new(),
        };
        self.load_bytes(&bytes, &ext)
    }

    /// Decode raw bytes with the reader registered for `ext` (with the
    /// leading dot) and merge the result.
    pub fn load_bytes(&mut self, bytes: &[u8], ext: &str) -> Result<(), ConfError> {
        let Some(read) = registry::reader(ext) else {
            return Err(ConfError::UnsupportedFileType {
                ext: ext.to_string(),
            });
        };
        self.merge(read(bytes)?)
    }

    /// Flatten a decoded nested map and set every pair.
    pub fn merge(&mut self, map: serde_json::Map<String, serde_json::Value>) -> Result<(), ConfError> {
        for (key, value) in map {
            self.set(&key, value)?;
        }
        Ok(())
    }

    /// Set `key` to any `Serialize` value: primitives become leaves, maps
    /// and sequences flatten into their leaves (`key.sub`, `key[0]`, …).
    ///
    /// Setting overlays rather than replaces: an existing path survives when
    /// the new value does not mention it, but no write may change the shape
    /// a node already has.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ConfError> {
        if key.is_empty() {
            return Err(ConfError::KeyEmpty);
        }
        let pairs = flatten::flatten(key, &value)?;
        for (k, v) in pairs {
            self.storage.set(&k, &v)?;
        }
        Ok(())
    }

    /// Store one pre-flattened pair, bypassing serialization.
    pub(crate) fn set_raw(&mut self, key: &str, value: &str) -> Result<(), ConfError> {
        self.storage.set(key, value)
    }

    /// The value at `key`, when the node there is a plain value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.storage.get(key)
    }

    /// Like [`get`](Self::get), falling back to `def`.
    pub fn get_or<'a>(&'a self, key: &str, def: &'a str) -> &'a str {
        self.storage.get(key).unwrap_or(def)
    }

    /// Whether any node exists at `key`, whatever its shape.
    pub fn has(&self, key: &str) -> bool {
        self.storage.has(key)
    }

    /// All flat keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.storage.keys()
    }

    /// The flat key-value view, including empty-container sentinels.
    pub fn data(&self) -> BTreeMap<String, String> {
        self.storage.data()
    }

    /// Immediate child names under `key` (empty `key` is the root).
    pub fn sub_keys(&self, key: &str) -> Result<Vec<String>, ConfError> {
        self.storage.sub_keys(key)
    }

    /// Expand every `${key:=def}` reference in `s` against this map.
    pub fn resolve(&self, s: &str) -> Result<String, ConfError> {
        resolve::resolve_string(self, s)
    }

    /// Bind starting at the root key.
    pub fn bind<T: FromProperties>(&self) -> Result<T, ConfError> {
        self.bind_tag("${ROOT}")
    }

    /// Bind the value at `key`; shorthand for `bind_tag("${key}")`.
    pub fn bind_key<T: FromProperties>(&self, key: &str) -> Result<T, ConfError> {
        self.bind_tag(&format!("${{{key}}}"))
    }

    /// Bind with a full `${key:=default}>>splitter` tag.
    pub fn bind_tag<T: FromProperties>(&self, tag: &str) -> Result<T, ConfError> {
        let mut param = BindParam::default();
        param.bind_tag(tag, "")?;
        self.bind_param(param)
    }

    /// Bind with an explicit, pre-composed [`BindParam`].
    pub fn bind_param<T: FromProperties>(&self, mut param: BindParam) -> Result<T, ConfError> {
        param.path = bind::short_type_name::<T>();
        T::from_properties(self, param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_nil_then_value() {
        let mut p = Properties::new();
        p.set("key", Option::<String>::None).unwrap();
        p.set("key", "abc").unwrap();
        assert_eq!(p.get("key"), Some("abc"));
        let data = p.data();
        assert_eq!(data.len(), 1);
        assert_eq!(data["key"], "abc");
    }

    #[test]
    fn set_nil_then_container() {
        let mut p = Properties::new();
        p.set("key", Option::<String>::None).unwrap();
        p.set("key", vec!["abc"]).unwrap();
        assert_eq!(p.get("key[0]"), Some("abc"));
    }

    #[test]
    fn set_value_then_list_conflicts() {
        let mut p = Properties::new();
        p.set("key", "abc").unwrap();
        let err = p.set("key", vec!["abc"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "property 'key' is a value but 'key[0]' wants other type"
        );
    }

    #[test]
    fn set_value_then_map_conflicts() {
        let mut p = Properties::new();
        p.set("key", "abc").unwrap();
        let mut m = BTreeMap::new();
        m.insert("val".to_string(), "abc".to_string());
        let err = p.set("key", &m).unwrap_err();
        assert_eq!(
            err.to_string(),
            "property 'key' is a value but 'key.val' wants other type"
        );
    }

    #[test]
    fn empty_container_then_real_content() {
        let mut p = Properties::new();
        p.set("key", Vec::<String>::new()).unwrap();
        p.set("key", vec!["abc"]).unwrap();
        assert_eq!(p.get("key[0]"), Some("abc"));

        let mut p = Properties::new();
        p.set("key", BTreeMap::<String, String>::new()).unwrap();
        p.set("key.val", "abc").unwrap();
        assert_eq!(p.get("key.val"), Some("abc"));
    }

    #[test]
    fn set_list_then_indexed_overwrites() {
        let mut p = Properties::new();
        p.set("key", vec!["123"]).unwrap();
        p.set("key[0]", "abc").unwrap();
        p.set("key[1]", "xyz").unwrap();
        assert_eq!(p.get("key[0]"), Some("abc"));
        assert_eq!(p.get("key[1]"), Some("xyz"));
    }

    #[test]
    fn set_overlays_sibling_paths() {
        let mut p = Properties::new();
        p.set("a.b", "1").unwrap();
        p.set("a.c", "2").unwrap();
        assert_eq!(p.get("a.b"), Some("1"));
        assert_eq!(p.get("a.c"), Some("2"));
    }

    #[test]
    fn empty_key_rejected() {
        let mut p = Properties::new();
        assert_eq!(p.set("", "x").unwrap_err().to_string(), "key is empty");
    }

    #[test]
    fn merge_nested_json_map() {
        let mut p = Properties::new();
        let serde_json::Value::Object(map) = json!({
            "json": {
                "int": 1,
                "str": "abc",
                "arr": ["a", "b", "c"],
                "map": {"a": "1", "b": "2"},
                "empty_arr": [],
                "empty_map": {},
            }
        }) else {
            unreachable!()
        };
        p.merge(map).unwrap();
        let data = p.data();
        assert_eq!(data["json.int"], "1");
        assert_eq!(data["json.str"], "abc");
        assert_eq!(data["json.arr[0]"], "a");
        assert_eq!(data["json.arr[2]"], "c");
        assert_eq!(data["json.map.a"], "1");
        assert_eq!(data["json.empty_arr"], "[]");
        assert_eq!(data["json.empty_map"], "{}");
        assert_eq!(p.sub_keys("json.map").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn flatten_then_load_round_trips() {
        let mut first = Properties::new();
        let serde_json::Value::Object(map) = json!({
            "a": {"b": 1, "c": [true, false]},
            "d": [],
        }) else {
            unreachable!()
        };
        first.merge(map).unwrap();

        // replaying the flat data into a fresh map reproduces it exactly
        let mut second = Properties::new();
        for (k, v) in first.data() {
            second.set(&k, v).unwrap();
        }
        assert_eq!(second.data(), first.data());
    }

    #[test]
    fn load_bytes_dispatches_by_extension() {
        let mut p = Properties::new();
        p.load_bytes(br#"{"json": {"int": 1}}"#, ".json").unwrap();
        p.load_bytes(b"[toml]\nint = 1\n", ".toml").unwrap();
        p.load_bytes(b"yaml:\n  int: 1\n", ".yaml").unwrap();
        p.load_bytes(b"prop.int = 1\n", ".properties").unwrap();
        let data = p.data();
        assert_eq!(data["json.int"], "1");
        assert_eq!(data["toml.int"], "1");
        assert_eq!(data["yaml.int"], "1");
        assert_eq!(data["prop.int"], "1");
    }

    #[test]
    fn load_bytes_unknown_extension() {
        let mut p = Properties::new();
        let err = p.load_bytes(b"", ".unknown_ext").unwrap_err();
        assert_eq!(err.to_string(), "unsupported file type \".unknown_ext\"");
    }

    #[test]
    fn get_or_falls_back() {
        let mut p = Properties::new();
        p.set("key", "abc").unwrap();
        assert_eq!(p.get_or("key", "def"), "abc");
        assert_eq!(p.get_or("key.undef", "def"), "def");
    }

    #[test]
    fn clone_is_independent() {
        let mut p = Properties::new();
        p.set("a", "1").unwrap();
        let copy = p.clone();
        p.set("b", "2").unwrap();
        assert!(copy.get("b").is_none());
        assert_eq!(copy.get("a"), Some("1"));
    }

    #[test]
    fn keys_are_sorted() {
        let mut p = Properties::new();
        p.set("b", "2").unwrap();
        p.set("a.y", "1").unwrap();
        p.set("a.x", "1").unwrap();
        assert_eq!(p.keys(), vec!["a.x", "a.y", "b"]);
    }
}
