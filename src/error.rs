use std::path::PathBuf;

use thiserror::Error;

/// Every failure the engine can produce.
///
/// Two kinds act as sentinels: *not-exist* (a key lookup found nothing and no
/// default was given) and *invalid-syntax* (a malformed tag or reference
/// string). Binder and resolver errors are re-raised wrapped in
/// [`ConfError::Context`], which records the `file:line` of the raising site
/// and the operation trail; use [`is_not_exist`](Self::is_not_exist) and
/// [`is_invalid_syntax`](Self::is_invalid_syntax) to test the underlying kind
/// through any number of wrappers.
#[derive(Debug, Error)]
pub enum ConfError {
    #[error("key is empty")]
    KeyEmpty,

    #[error("invalid key '{key}'")]
    InvalidKey { key: String },

    #[error("property {key:?} not exist")]
    NotExist { key: String },

    #[error("parse tag '{tag}' error: invalid syntax")]
    InvalidTag { tag: String },

    /// A reference string with an unterminated `${…}` region. Raised inside
    /// a [`ConfError::Context`] naming the offending string.
    #[error("invalid syntax")]
    InvalidSyntax,

    /// A write would change the shape of an already-shaped node.
    #[error("property '{key}' is {kind} but '{want}' wants other type")]
    ShapeConflict {
        key: String,
        kind: &'static str,
        want: String,
    },

    #[error("property '{key}' index out of range")]
    IndexOutOfRange { key: String },

    /// Sub-key enumeration was asked of a plain value.
    #[error("property '{key}' is value")]
    NotContainer { key: String },

    /// A reference named a node that exists but is not a plain value.
    #[error("property {key:?} isn't simple value")]
    NotSimpleValue { key: String },

    #[error("flatten error: {reason}")]
    Flatten { reason: String },

    #[error("unsupported file type {ext:?}")]
    UnsupportedFileType { ext: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to decode {format}: {reason}")]
    Decode {
        format: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error("cmd option {option} needs arg")]
    OptionNeedsArg { option: String },

    /// Scalar parse failure; `reason` is `invalid syntax` or `value out of range`.
    #[error("parsing {value:?}: {reason}")]
    Parse {
        value: String,
        reason: &'static str,
    },

    /// A registered converter refused the input; the message is the converter's own.
    #[error("{reason}")]
    ConvertFailed { reason: String },

    #[error("can't find converter for {ty}")]
    NoConverter { ty: String },

    #[error("unknown splitter {name:?}")]
    UnknownSplitter { name: String },

    #[error("split error: {reason}, value: {value:?}")]
    Split { reason: String, value: String },

    /// `kind` is `map` or `struct`; neither accepts a non-empty default.
    #[error("{kind} can't have a non-empty default value")]
    DefaultNotAllowed { kind: &'static str },

    #[error("eval {tag:?} returns error, {reason}")]
    EvalError { tag: String, reason: String },

    #[error("eval {tag:?} doesn't return bool value")]
    EvalNotBool { tag: String },

    #[error("validate failed on {tag:?} for value {value}")]
    ValidateFailed { tag: String, value: String },

    /// A nested failure re-raised with the raising site and operation trail.
    #[error("{file}:{line}: {op} error, {source}")]
    Context {
        file: &'static str,
        line: u32,
        op: String,
        source: Box<ConfError>,
    },
}

impl ConfError {
    pub(crate) fn not_exist(key: &str) -> Self {
        ConfError::NotExist {
            key: key.to_string(),
        }
    }

    #[track_caller]
    fn context(op: String, source: ConfError) -> Self {
        let loc = std::panic::Location::caller();
        ConfError::Context {
            file: loc.file(),
            line: loc.line(),
            op,
            source: Box::new(source),
        }
    }

    /// Wrap a binder failure with the raising site and the target path trail.
    #[track_caller]
    pub fn bind_context(path: &str, source: ConfError) -> Self {
        Self::context(format!("bind {path}"), source)
    }

    #[track_caller]
    pub(crate) fn resolve_string_context(s: &str, source: ConfError) -> Self {
        Self::context(format!("resolve string {s:?}"), source)
    }

    #[track_caller]
    pub(crate) fn resolve_property_context(key: &str, source: ConfError) -> Self {
        Self::context(format!("resolve property {key:?}"), source)
    }

    /// True when the underlying failure is a missing key without a default.
    pub fn is_not_exist(&self) -> bool {
        match self {
            ConfError::NotExist { .. } => true,
            ConfError::Context { source, .. } => source.is_not_exist(),
            _ => false,
        }
    }

    /// True when the underlying failure is a malformed tag or reference string.
    pub fn is_invalid_syntax(&self) -> bool {
        match self {
            ConfError::InvalidTag { .. } | ConfError::InvalidSyntax => true,
            ConfError::Context { source, .. } => source.is_invalid_syntax(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_conflict_formats() {
        let err = ConfError::ShapeConflict {
            key: "key".into(),
            kind: "a value",
            want: "key[0]".into(),
        };
        assert_eq!(
            err.to_string(),
            "property 'key' is a value but 'key[0]' wants other type"
        );
    }

    #[test]
    fn not_exist_formats_and_tests() {
        let err = ConfError::not_exist("server.port");
        assert_eq!(err.to_string(), "property \"server.port\" not exist");
        assert!(err.is_not_exist());
    }

    #[test]
    fn context_preserves_sentinels() {
        let err = ConfError::bind_context(
            "Config.port",
            ConfError::resolve_property_context("port", ConfError::not_exist("port")),
        );
        assert!(err.is_not_exist());
        assert!(!err.is_invalid_syntax());
        let msg = err.to_string();
        assert!(msg.contains("bind Config.port error"));
        assert!(msg.contains("resolve property \"port\" error"));
        assert!(msg.contains("property \"port\" not exist"));
        assert!(msg.contains("error.rs"));
    }

    #[test]
    fn invalid_tag_is_invalid_syntax() {
        let err = ConfError::InvalidTag { tag: "$".into() };
        assert_eq!(err.to_string(), "parse tag '$' error: invalid syntax");
        assert!(err.is_invalid_syntax());
    }

    #[test]
    fn validate_failed_formats() {
        let err = ConfError::ValidateFailed {
            tag: "$>0&&$<10".into(),
            value: "11".into(),
        };
        assert_eq!(
            err.to_string(),
            "validate failed on \"$>0&&$<10\" for value 11"
        );
    }
}
