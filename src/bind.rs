//! Typed binding from a [`Properties`] value.
//!
//! Every bindable type implements [`FromProperties`]; the impl receives the
//! current key, the human-readable path trail, and the parsed tag through a
//! [`BindParam`]. Scalars resolve a single string (store value with
//! references expanded, or the tag default) and convert it; `Vec<E>` walks
//! `key[0]`, `key[1]`, … or splits a single string; maps enumerate sub-keys;
//! structs derive their impl with `#[derive(FromProperties)]` from the
//! `derive` feature.
//!
//! Nested failures are re-raised with the raising site and the path trail,
//! so an error names exactly which target field and source key produced it.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use crate::error::ConfError;
use crate::props::Properties;
use crate::registry;
use crate::resolve;
use crate::tag::BindParam;
use crate::validate::{self, ScalarValue};

/// A type the binder can populate from properties.
///
/// Implemented for the primitive scalars, `String`, `Vec<E>`,
/// `HashMap<String, V>`, `BTreeMap<String, V>`, converter-backed types (see
/// [`converter_target!`](crate::converter_target)), and derived structs.
pub trait FromProperties: Sized + 'static {
    /// True for the primitive scalars; list defaults may only be split into
    /// primitives or converter-backed elements.
    #[doc(hidden)]
    const PRIMITIVE: bool = false;

    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError>;
}

/// A readable rendition of `std::any::type_name`: module paths stripped,
/// generics kept (`alloc::vec::Vec<u16>` → `Vec<u16>`).
pub(crate) fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::new();
    let mut ident = String::new();
    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            ident.push(ch);
        } else {
            flush_ident(&mut out, &mut ident);
            out.push(ch);
        }
    }
    flush_ident(&mut out, &mut ident);
    out
}

fn flush_ident(out: &mut String, ident: &mut String) {
    if !ident.is_empty() {
        out.push_str(ident.rsplit("::").next().unwrap_or(ident));
        ident.clear();
    }
}

/// Join a parent key and a sub-key with a dot, tolerating an empty parent.
#[doc(hidden)]
pub fn join_key(parent: &str, part: &str) -> String {
    if parent.is_empty() {
        part.to_string()
    } else {
        format!("{parent}.{part}")
    }
}

/// Structs cannot carry a non-empty default value.
#[doc(hidden)]
pub fn reject_struct_default(param: &BindParam) -> Result<(), ConfError> {
    if param.tag.has_def && !param.tag.def.is_empty() {
        return Err(ConfError::bind_context(
            &param.path,
            ConfError::DefaultNotAllowed { kind: "struct" },
        ));
    }
    Ok(())
}

/// Resolve, convert, and validate one scalar. A converter registered for the
/// target type takes precedence over the native parser.
fn bind_scalar<T: 'static>(
    p: &Properties,
    param: &BindParam,
    parse: impl FnOnce(&str) -> Result<T, ConfError>,
    scalar: impl FnOnce(&T) -> ScalarValue,
) -> Result<T, ConfError> {
    let val = resolve::resolve_property(p, param)
        .map_err(|e| ConfError::bind_context(&param.path, e))?;
    let out = match registry::convert::<T>(&val) {
        Some(Ok(v)) => v,
        Some(Err(reason)) => {
            return Err(ConfError::bind_context(
                &param.path,
                ConfError::ConvertFailed { reason },
            ));
        }
        None => parse(&val).map_err(|e| ConfError::bind_context(&param.path, e))?,
    };
    validate::run(&param.validate, &scalar(&out))?;
    Ok(out)
}

/// Bind a type that has no native parser and is reached purely through the
/// converter registry.
#[doc(hidden)]
pub fn bind_converted<T: 'static>(p: &Properties, param: &BindParam) -> Result<T, ConfError> {
    let val = resolve::resolve_property(p, param)
        .map_err(|e| ConfError::bind_context(&param.path, e))?;
    match registry::convert::<T>(&val) {
        Some(Ok(v)) => {
            validate::run(&param.validate, &ScalarValue::Str(val))?;
            Ok(v)
        }
        Some(Err(reason)) => Err(ConfError::bind_context(
            &param.path,
            ConfError::ConvertFailed { reason },
        )),
        None => Err(ConfError::bind_context(
            &param.path,
            ConfError::NoConverter {
                ty: short_type_name::<T>(),
            },
        )),
    }
}

/// Implement [`FromProperties`] for types bound through a registered
/// converter, e.g. `converter_target!(Point)` together with
/// `register_converter(|s: &str| -> Result<Point, _> { … })`.
#[macro_export]
macro_rules! converter_target {
    ($($ty:ty),* $(,)?) => {$(
        impl $crate::FromProperties for $ty {
            fn from_properties(
                p: &$crate::Properties,
                param: $crate::BindParam,
            ) -> ::core::result::Result<Self, $crate::ConfError> {
                $crate::bind::bind_converted::<$ty>(p, &param)
            }
        }
    )*};
}

// --- scalars ---

/// Split an integer literal into digits and radix, honoring the `0x`, `0o`
/// and `0b` prefixes with an optional leading sign.
fn int_radix(s: &str) -> (String, u32) {
    let (sign, body) = if let Some(rest) = s.strip_prefix('-') {
        ("-", rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        ("", rest)
    } else {
        ("", s)
    };
    let (digits, radix) = if let Some(d) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (d, 16)
    } else if let Some(d) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        (d, 8)
    } else if let Some(d) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (d, 2)
    } else {
        (body, 10)
    };
    (format!("{sign}{digits}"), radix)
}

fn int_error(value: &str, err: &std::num::ParseIntError) -> ConfError {
    use std::num::IntErrorKind;
    let reason = match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "value out of range",
        _ => "invalid syntax",
    };
    ConfError::Parse {
        value: value.to_string(),
        reason,
    }
}

macro_rules! impl_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl FromProperties for $ty {
            const PRIMITIVE: bool = true;

            fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
                bind_scalar(
                    p,
                    &param,
                    |s| {
                        let (digits, radix) = int_radix(s);
                        <$ty>::from_str_radix(&digits, radix).map_err(|e| int_error(s, &e))
                    },
                    |v| ScalarValue::$variant(*v as _),
                )
            }
        }
    )*};
}

impl_int! {
    i8 => Int, i16 => Int, i32 => Int, i64 => Int, isize => Int,
    u8 => Uint, u16 => Uint, u32 => Uint, u64 => Uint, usize => Uint,
}

macro_rules! impl_float {
    ($($ty:ty),* $(,)?) => {$(
        impl FromProperties for $ty {
            const PRIMITIVE: bool = true;

            fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
                bind_scalar(
                    p,
                    &param,
                    |s| {
                        s.parse::<$ty>().map_err(|_| ConfError::Parse {
                            value: s.to_string(),
                            reason: "invalid syntax",
                        })
                    },
                    |v| ScalarValue::Float(*v as f64),
                )
            }
        }
    )*};
}

impl_float!(f32, f64);

fn parse_bool(s: &str) -> Result<bool, ConfError> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfError::Parse {
            value: s.to_string(),
            reason: "invalid syntax",
        }),
    }
}

impl FromProperties for bool {
    const PRIMITIVE: bool = true;

    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
        bind_scalar(p, &param, parse_bool, |v| ScalarValue::Bool(*v))
    }
}

impl FromProperties for String {
    const PRIMITIVE: bool = true;

    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
        bind_scalar(p, &param, |s| Ok(s.to_string()), |v| ScalarValue::Str(v.clone()))
    }
}

// --- lists ---

impl<T: FromProperties> FromProperties for Vec<T> {
    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
        let props = slice_properties::<T>(p, &param)
            .map_err(|e| ConfError::bind_context(&param.path, e))?;
        let Some(props) = props else {
            return Ok(Vec::new());
        };
        let props = props.as_ref();
        let mut out = Vec::new();
        for i in 0.. {
            let sub = BindParam {
                key: format!("{}[{}]", param.key, i),
                path: format!("{}[{}]", param.path, i),
                ..BindParam::default()
            };
            match T::from_properties(props, sub) {
                Ok(item) => out.push(item),
                Err(e) if e.is_not_exist() => break,
                Err(e) => return Err(ConfError::bind_context(&param.path, e)),
            }
        }
        Ok(out)
    }
}

/// Decide where list elements come from: the store itself when `key[0]`
/// exists, a synthetic properties built from a split string otherwise, or
/// nothing at all (`None` means an empty list).
fn slice_properties<'a, T: FromProperties>(
    p: &'a Properties,
    param: &BindParam,
) -> Result<Option<Cow<'a, Properties>>, ConfError> {
    if p.has(&format!("{}[0]", param.key)) {
        return Ok(Some(Cow::Borrowed(p)));
    }

    let str_val = if p.has(&param.key) {
        p.get(&param.key).unwrap_or_default().to_string()
    } else {
        if !param.tag.has_def {
            return Err(ConfError::not_exist(&param.key));
        }
        if param.tag.def.is_empty() {
            return Ok(None);
        }
        if !T::PRIMITIVE && !registry::has_converter::<T>() {
            return Err(ConfError::NoConverter {
                ty: short_type_name::<T>(),
            });
        }
        param.tag.def.clone()
    };
    if str_val.is_empty() {
        return Ok(None);
    }

    let items: Vec<String> = if param.tag.splitter.is_empty() {
        str_val.split(',').map(|s| s.trim().to_string()).collect()
    } else if let Some(split) = registry::splitter(&param.tag.splitter) {
        split(&str_val).map_err(|e| ConfError::Split {
            reason: e.to_string(),
            value: str_val.clone(),
        })?
    } else {
        return Err(ConfError::UnknownSplitter {
            name: param.tag.splitter.clone(),
        });
    };

    let mut synth = Properties::new();
    for (i, item) in items.iter().enumerate() {
        let _ = synth.set_raw(&format!("{}[{}]", param.key, i), item);
    }
    Ok(Some(Cow::Owned(synth)))
}

// --- maps ---

fn bind_map_entries<T: FromProperties>(
    p: &Properties,
    param: &BindParam,
) -> Result<Vec<(String, T)>, ConfError> {
    if param.tag.has_def && !param.tag.def.is_empty() {
        return Err(ConfError::bind_context(
            &param.path,
            ConfError::DefaultNotAllowed { kind: "map" },
        ));
    }
    let keys = p
        .sub_keys(&param.key)
        .map_err(|e| ConfError::bind_context(&param.path, e))?;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let sub = BindParam {
            key: join_key(&param.key, &key),
            path: param.path.clone(),
            ..BindParam::default()
        };
        let item =
            T::from_properties(p, sub).map_err(|e| ConfError::bind_context(&param.path, e))?;
        out.push((key, item));
    }
    Ok(out)
}

impl<T: FromProperties> FromProperties for HashMap<String, T> {
    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
        Ok(bind_map_entries(p, &param)?.into_iter().collect())
    }
}

impl<T: FromProperties> FromProperties for BTreeMap<String, T> {
    fn from_properties(p: &Properties, param: BindParam) -> Result<Self, ConfError> {
        Ok(bind_map_entries(p, &param)?.into_iter().collect())
    }
}
