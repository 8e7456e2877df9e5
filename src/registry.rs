//! Process-wide registries: file readers by extension, splitters by name,
//! converters by target type, and the single validator.
//!
//! All four tables are populated with the default bundle on first touch and
//! may be extended afterwards. Registration is expected during program
//! initialisation, before properties are refreshed or bound from other
//! threads; the tables are lock-guarded but not designed for racy mutation.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, LazyLock, RwLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};

use crate::converter_target;
use crate::error::ConfError;
use crate::readers;
use crate::validate::{ExprValidator, Validator};

/// Parses raw file bytes into a nested map.
pub type Reader = Arc<dyn Fn(&[u8]) -> Result<Map<String, Value>, ConfError> + Send + Sync>;

/// Splits one string into several, for list binding.
pub type Splitter =
    Arc<dyn Fn(&str) -> Result<Vec<String>, Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

// --- readers ---

static READERS: LazyLock<RwLock<HashMap<String, Reader>>> = LazyLock::new(|| {
    let mut map: HashMap<String, Reader> = HashMap::new();
    let json: Reader = Arc::new(readers::read_json);
    map.insert(".json".into(), json);
    let toml: Reader = Arc::new(readers::read_toml);
    map.insert(".toml".into(), Arc::clone(&toml));
    map.insert(".tml".into(), toml);
    let yaml: Reader = Arc::new(readers::read_yaml);
    map.insert(".yaml".into(), Arc::clone(&yaml));
    map.insert(".yml".into(), yaml);
    map.insert(".properties".into(), Arc::new(readers::read_properties));
    RwLock::new(map)
});

/// Register a reader for one or more file extensions (with the leading dot,
/// e.g. `&[".json"]`). Replaces any reader already registered for them.
pub fn register_reader<F>(reader: F, exts: &[&str])
where
    F: Fn(&[u8]) -> Result<Map<String, Value>, ConfError> + Send + Sync + 'static,
{
    let reader: Reader = Arc::new(reader);
    let mut map = READERS.write().unwrap();
    for ext in exts {
        map.insert((*ext).to_string(), Arc::clone(&reader));
    }
}

pub(crate) fn reader(ext: &str) -> Option<Reader> {
    READERS.read().unwrap().get(ext).cloned()
}

// --- splitters ---

static SPLITTERS: LazyLock<RwLock<HashMap<String, Splitter>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register a named splitter for `>>name` tags.
pub fn register_splitter<F, E>(name: &str, split: F)
where
    F: Fn(&str) -> Result<Vec<String>, E> + Send + Sync + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let split: Splitter = Arc::new(move |s| split(s).map_err(Into::into));
    SPLITTERS.write().unwrap().insert(name.to_string(), split);
}

pub(crate) fn splitter(name: &str) -> Option<Splitter> {
    SPLITTERS.read().unwrap().get(name).cloned()
}

// --- converters ---

struct Converter<T>(Box<dyn Fn(&str) -> Result<T, String> + Send + Sync>);

type ConverterMap = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static CONVERTERS: LazyLock<RwLock<ConverterMap>> = LazyLock::new(|| {
    let mut map = ConverterMap::new();
    let (id, conv) = converter_entry(default_datetime);
    map.insert(id, conv);
    let (id, conv) = converter_entry(default_duration);
    map.insert(id, conv);
    RwLock::new(map)
});

fn converter_entry<T, E, F>(convert: F) -> (TypeId, Arc<dyn Any + Send + Sync>)
where
    T: 'static,
    E: Display,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    let boxed: Box<dyn Fn(&str) -> Result<T, String> + Send + Sync> =
        Box::new(move |s| convert(s).map_err(|e| e.to_string()));
    (TypeId::of::<T>(), Arc::new(Converter(boxed)))
}

/// Register a converter for a non-primitive target type. The signature
/// `Fn(&str) -> Result<T, E>` is the converter contract; anything else does
/// not compile.
pub fn register_converter<T, E, F>(convert: F)
where
    T: 'static,
    E: Display,
    F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
{
    let (id, conv) = converter_entry(convert);
    CONVERTERS.write().unwrap().insert(id, conv);
}

pub(crate) fn has_converter<T: 'static>() -> bool {
    CONVERTERS.read().unwrap().contains_key(&TypeId::of::<T>())
}

/// Apply the converter registered for `T`, if any.
pub(crate) fn convert<T: 'static>(s: &str) -> Option<Result<T, String>> {
    let entry = CONVERTERS.read().unwrap().get(&TypeId::of::<T>()).cloned()?;
    let converter = entry.downcast_ref::<Converter<T>>()?;
    Some((converter.0)(s))
}

// --- validator ---

static VALIDATOR: LazyLock<RwLock<Arc<dyn Validator>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ExprValidator)));

/// Replace the process-wide validator.
pub fn set_validator<V: Validator + 'static>(validator: V) {
    *VALIDATOR.write().unwrap() = Arc::new(validator);
}

pub(crate) fn validator() -> Arc<dyn Validator> {
    Arc::clone(&VALIDATOR.read().unwrap())
}

// --- default converters ---

fn default_datetime(s: &str) -> Result<DateTime<FixedOffset>, String> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S %z", "%Y-%m-%d %H:%M:%S%.f %z"] {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t);
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(t.and_utc().fixed_offset());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc().fixed_offset());
    }
    Err(format!("unable to parse date: {s}"))
}

fn default_duration(s: &str) -> Result<std::time::Duration, String> {
    humantime::parse_duration(s.trim()).map_err(|e| e.to_string())
}

converter_target!(DateTime<FixedOffset>, std::time::Duration);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn default_readers_present() {
        for ext in [".json", ".toml", ".tml", ".yaml", ".yml", ".properties"] {
            assert!(reader(ext).is_some(), "{ext}");
        }
        assert!(reader(".unknown_ext").is_none());
    }

    #[test]
    fn register_reader_overrides() {
        register_reader(
            |_: &[u8]| {
                let mut m = Map::new();
                m.insert("fixed".into(), Value::String("1".into()));
                Ok(m)
            },
            &[".fixture"],
        );
        let read = reader(".fixture").unwrap();
        let m = read(b"ignored").unwrap();
        assert_eq!(m["fixed"], Value::String("1".into()));
    }

    #[test]
    fn splitter_round_trip() {
        register_splitter("pipe", |s: &str| {
            Ok::<_, String>(s.split('|').map(str::to_string).collect())
        });
        let split = splitter("pipe").unwrap();
        assert_eq!(split("a|b").unwrap(), vec!["a", "b"]);
        assert!(splitter("missing").is_none());
    }

    #[test]
    fn converter_lookup_by_type() {
        struct Upper(String);
        register_converter(|s: &str| Ok::<_, String>(Upper(s.to_uppercase())));
        assert!(has_converter::<Upper>());
        let got = convert::<Upper>("abc").unwrap().unwrap();
        assert_eq!(got.0, "ABC");
        struct Never;
        assert!(!has_converter::<Never>());
        assert!(convert::<Never>("x").is_none());
    }

    #[test]
    fn datetime_with_offset() {
        let t = default_datetime("2024-10-01 00:00:00 +0800").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 8 * 60 * 60);
        assert_eq!(t.hour(), 0);
    }

    #[test]
    fn datetime_date_only_is_utc_midnight() {
        let t = default_datetime("2024-10-01").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 0);
        assert_eq!(t.hour(), 0);
    }

    #[test]
    fn datetime_garbage_fails() {
        let err = default_datetime("123456789").unwrap_err();
        assert_eq!(err, "unable to parse date: 123456789");
    }

    #[test]
    fn duration_spellings() {
        assert_eq!(
            default_duration("12h").unwrap(),
            std::time::Duration::from_secs(12 * 60 * 60)
        );
        assert_eq!(
            default_duration(" 250ms ").unwrap(),
            std::time::Duration::from_millis(250)
        );
        assert!(default_duration("abc").is_err());
    }
}
