//! The layered configuration manager.
//!
//! Five layers, merged in a fixed order on every [`refresh`]: programmatic
//! properties, then static files, then environment variables, then
//! command-line arguments, then dynamic locations. Later layers overwrite
//! earlier leaf values but can never change a shape that an earlier layer
//! established.
//!
//! [`refresh`]: Configuration::refresh

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::args::CommandArgs;
use crate::bind::FromProperties;
use crate::env::Environment;
use crate::error::ConfError;
use crate::file::PropertySources;
use crate::props::Properties;
use crate::tag::BindParam;

/// A layered configuration: one programmatic layer plus four ordered
/// sources. Mutable between refreshes; every [`refresh`](Self::refresh)
/// produces an independent read-only snapshot.
pub struct Configuration {
    prop: Properties,
    file: PropertySources,
    env: Environment,
    args: CommandArgs,
    dync: PropertySources,
}

impl Configuration {
    pub fn new() -> Self {
        Configuration {
            prop: Properties::new(),
            file: PropertySources::new(),
            env: Environment::new(),
            args: CommandArgs::new(),
            dync: PropertySources::new(),
        }
    }

    /// Set the working directory that relative file and dynamic locations
    /// are joined with.
    pub fn set_work_dir(&mut self, dir: impl AsRef<Path>) {
        self.file.set_work_dir(dir.as_ref());
        self.dync.set_work_dir(dir.as_ref());
    }

    /// Set a property in the programmatic layer.
    pub fn set_property<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ConfError> {
        self.prop.set(key, value)
    }

    /// The static file source.
    pub fn file(&mut self) -> &mut PropertySources {
        &mut self.file
    }

    /// The environment-variable source.
    pub fn env(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// The command-line source.
    pub fn args(&mut self) -> &mut CommandArgs {
        &mut self.args
    }

    /// The dynamic location source.
    pub fn dync(&mut self) -> &mut PropertySources {
        &mut self.dync
    }

    /// Merge every layer, in order, into a fresh read-only snapshot.
    pub fn refresh(&self) -> Result<ReadOnlyProperties, ConfError> {
        let mut out = self.prop.clone();
        self.file.copy_to(&mut out)?;
        self.env.copy_to(&mut out)?;
        self.args.copy_to(&mut out)?;
        self.dync.copy_to(&mut out)?;
        log::debug!("refreshed {} properties", out.keys().len());
        Ok(ReadOnlyProperties { inner: out })
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

/// An immutable snapshot produced by [`Configuration::refresh`]. Safe to
/// share once constructed; no operation mutates it.
#[derive(Debug)]
pub struct ReadOnlyProperties {
    inner: Properties,
}

impl ReadOnlyProperties {
    /// The flat key-value view, including empty-container sentinels.
    pub fn data(&self) -> BTreeMap<String, String> {
        self.inner.data()
    }

    /// All flat keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Whether any node exists at `key`.
    pub fn has(&self, key: &str) -> bool {
        self.inner.has(key)
    }

    /// The value at `key`, when the node there is a plain value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key)
    }

    /// Like [`get`](Self::get), falling back to `def`.
    pub fn get_or<'a>(&'a self, key: &str, def: &'a str) -> &'a str {
        self.inner.get_or(key, def)
    }

    /// Expand every `${key:=def}` reference in `s` against this snapshot.
    pub fn resolve(&self, s: &str) -> Result<String, ConfError> {
        self.inner.resolve(s)
    }

    /// Bind starting at the root key.
    pub fn bind<T: FromProperties>(&self) -> Result<T, ConfError> {
        self.inner.bind()
    }

    /// Bind the value at `key`.
    pub fn bind_key<T: FromProperties>(&self, key: &str) -> Result<T, ConfError> {
        self.inner.bind_key(key)
    }

    /// Bind with a full `${key:=default}>>splitter` tag.
    pub fn bind_tag<T: FromProperties>(&self, tag: &str) -> Result<T, ConfError> {
        self.inner.bind_tag(tag)
    }

    /// Bind with an explicit, pre-composed [`BindParam`].
    pub fn bind_param<T: FromProperties>(&self, param: BindParam) -> Result<T, ConfError> {
        self.inner.bind_param(param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// A configuration that sees neither the real environment nor real argv.
    fn quiet() -> Configuration {
        let mut c = Configuration::new();
        c.env().reset(Vec::new());
        c.args().reset(Vec::new());
        c
    }

    #[test]
    fn refresh_applies_layers_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("conf.json"),
            br#"{"from": "file", "file.only": 1}"#,
        )
        .unwrap();
        fs::write(dir.path().join("dync.json"), br#"{"from": "dync"}"#).unwrap();

        let mut c = quiet();
        c.set_work_dir(dir.path());
        c.set_property("from", "prop").unwrap();
        c.set_property("prop.only", "1").unwrap();
        c.file().add(["conf.json"]);
        c.env().reset(vec![("GS_FROM".into(), "env".into())]);
        c.args().reset(vec!["-D".into(), "from=args".into()]);
        c.dync().add(["dync.json"]);

        let p = c.refresh().unwrap();
        assert_eq!(p.get("from"), Some("dync"));
        assert_eq!(p.get("prop.only"), Some("1"));
        assert_eq!(p.get("file.only"), Some("1"));

        // without the dynamic layer, args win; without args, env wins
        let mut c2 = quiet();
        c2.set_work_dir(dir.path());
        c2.set_property("from", "prop").unwrap();
        c2.file().add(["conf.json"]);
        c2.env().reset(vec![("GS_FROM".into(), "env".into())]);
        c2.args().reset(vec!["-D".into(), "from=args".into()]);
        assert_eq!(c2.refresh().unwrap().get("from"), Some("args"));

        c2.args().reset(Vec::new());
        assert_eq!(c2.refresh().unwrap().get("from"), Some("env"));

        c2.env().reset(Vec::new());
        assert_eq!(c2.refresh().unwrap().get("from"), Some("file"));
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let mut c = quiet();
        c.set_property("key", "one").unwrap();
        let first = c.refresh().unwrap();
        c.set_property("other", "two").unwrap();
        let second = c.refresh().unwrap();

        assert_eq!(first.get("key"), Some("one"));
        assert!(!first.has("other"));
        assert_eq!(second.get("other"), Some("two"));
    }

    #[test]
    fn refresh_preserves_programmatic_layer() {
        let mut c = quiet();
        c.set_property("key", "abc").unwrap();
        let p = c.refresh().unwrap();
        assert_eq!(p.keys(), vec!["key"]);
        assert_eq!(p.get_or("key.undef", "abc"), "abc");
    }

    #[test]
    fn later_layer_cannot_change_shape() {
        let mut c = quiet();
        c.set_property("key", "abc").unwrap();
        c.args().reset(vec!["-D".into(), "key.sub=1".into()]);
        let err = c.refresh().unwrap_err();
        assert_eq!(
            err.to_string(),
            "property 'key' is a value but 'key.sub' wants other type"
        );
    }

    #[test]
    fn profile_location_resolved_from_earlier_layers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("conf-online.yaml"),
            b"yaml:\n  int: 1\n",
        )
        .unwrap();

        let mut c = quiet();
        c.set_work_dir(dir.path());
        c.set_property("spring.active.profile", "online").unwrap();
        c.file().add(["conf-${spring.active.profile}.yaml"]);
        let p = c.refresh().unwrap();
        assert_eq!(p.get("yaml.int"), Some("1"));
        assert_eq!(
            p.resolve("profile is ${spring.profiles.active:=${spring.active.profile}}")
                .unwrap(),
            "profile is online"
        );
    }

    #[test]
    fn missing_profile_file_skipped() {
        let dir = TempDir::new().unwrap();
        let mut c = quiet();
        c.set_work_dir(dir.path());
        c.set_property("profile", "dev").unwrap();
        c.file().add(["conf-${profile}.yaml"]);
        let p = c.refresh().unwrap();
        assert_eq!(p.keys(), vec!["profile"]);
    }

    #[test]
    fn mixed_sources_end_to_end() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("conf.toml"),
            b"[toml]\nint = 1\nstr = \"abc\"\narr = [\"a\", \"b\", \"c\"]\n\n[toml.map]\na = \"1\"\nb = \"2\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("dync.properties"),
            b"prop.int = 1\nprop.arr = a, b, c\n",
        )
        .unwrap();

        let mut c = quiet();
        c.set_work_dir(dir.path());
        c.file().add(["conf.toml"]);
        c.env().set_prefix("SK_");
        c.env().reset(vec![
            ("INCLUDE_ENV_PATTERNS".into(), "^ENVS_.*".into()),
            ("EXCLUDE_ENV_PATTERNS".into(), "^ENVS_INT_SUB.*".into()),
            ("SK_ENVS_INT".into(), "1".into()),
            ("ENVS_MAP_A".into(), "1".into()),
            ("ENVS_INT_SUB".into(), "1".into()),
        ]);
        c.args().reset(vec![
            "-D".into(),
            "args.int=1".into(),
            "-D".into(),
            "args.bool".into(),
        ]);
        c.dync().add(["dync.properties"]);

        let p = c.refresh().unwrap();
        let data = p.data();
        assert_eq!(data["toml.int"], "1");
        assert_eq!(data["toml.arr[2]"], "c");
        assert_eq!(data["toml.map.b"], "2");
        assert_eq!(data["envs.int"], "1");
        assert_eq!(data["envs.map.a"], "1");
        assert!(!data.contains_key("envs.int.sub"));
        assert_eq!(data["args.int"], "1");
        assert_eq!(data["args.bool"], "true");
        assert_eq!(data["prop.int"], "1");
        assert_eq!(data["prop.arr"], "a, b, c");

        let arr: Vec<String> = p.bind_key("toml.arr").unwrap();
        assert_eq!(arr, vec!["a", "b", "c"]);
        let arr: Vec<String> = p.bind_key("prop.arr").unwrap();
        assert_eq!(arr, vec!["a", "b", "c"]);
    }
}
