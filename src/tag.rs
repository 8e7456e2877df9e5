//! The `${key:=default}>>splitter` tag mini-language.

use std::fmt;

use crate::error::ConfError;

/// A parsed value tag: required key, optional default value, optional
/// splitter name. The syntax is `${key:=default}>>splitter`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedTag {
    /// Short property key.
    pub key: String,
    /// Default value.
    pub def: String,
    /// Whether a default value is present (`${k:=}` carries an empty one).
    pub has_def: bool,
    /// Splitter name, empty when absent.
    pub splitter: String,
}

impl fmt::Display for ParsedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}", self.key)?;
        if self.has_def {
            write!(f, ":={}", self.def)?;
        }
        write!(f, "}}")?;
        if !self.splitter.is_empty() {
            write!(f, ">>{}", self.splitter)?;
        }
        Ok(())
    }
}

/// Parse a value tag into its key, default value, and splitter.
///
/// The default is everything between `:=` and the last `}`, so defaults may
/// themselves contain `${…}` references; the resolver expands them later.
pub fn parse_tag(tag: &str) -> Result<ParsedTag, ConfError> {
    let invalid = || ConfError::InvalidTag {
        tag: tag.to_string(),
    };
    let split = tag.rfind(">>");
    if split == Some(0) {
        return Err(invalid());
    }
    let close = match tag.rfind('}') {
        Some(j) if j > 0 => j,
        _ => return Err(invalid()),
    };
    let open = tag.find("${").ok_or_else(invalid)?;
    if open + 2 > close {
        return Err(invalid());
    }
    let mut ret = ParsedTag::default();
    if let Some(i) = split {
        if i > close {
            ret.splitter = tag[i + 2..].trim().to_string();
        }
    }
    let body = &tag[open + 2..close];
    match body.split_once(":=") {
        Some((key, def)) => {
            ret.key = key.to_string();
            ret.has_def = true;
            ret.def = def.to_string();
        }
        None => ret.key = body.to_string(),
    }
    Ok(ret)
}

/// Everything the binder threads through one binding site: the full store
/// key, the human-readable path trail used in error messages, the parsed
/// tag, and the raw field annotation the validator consults.
#[derive(Clone, Debug, Default)]
pub struct BindParam {
    /// Full property key.
    pub key: String,
    /// Full path trail, `TypeName.field.sub`.
    pub path: String,
    /// Parsed tag.
    pub tag: ParsedTag,
    /// Whole field annotation, in `name:"value"` pairs.
    pub validate: String,
}

impl BindParam {
    /// Parse `tag`, apply the reserved-key renames (`ROOT` → current key,
    /// empty → `ANONYMOUS`), and compose the tag key onto the current key.
    pub fn bind_tag(&mut self, tag: &str, validate: &str) -> Result<(), ConfError> {
        let mut parsed = parse_tag(tag)?;
        if parsed.key == "ROOT" {
            parsed.key.clear();
        } else if parsed.key.is_empty() {
            parsed.key.push_str("ANONYMOUS");
        }
        if self.key.is_empty() {
            self.key = parsed.key.clone();
        } else if !parsed.key.is_empty() {
            self.key = format!("{}.{}", self.key, parsed.key);
        }
        self.tag = parsed;
        self.validate = validate.to_string();
        Ok(())
    }

    /// A fresh parameter for a member of the value at `parent`: same key,
    /// path extended with the field name, no tag.
    pub fn child(parent: &BindParam, field: &str) -> BindParam {
        BindParam {
            key: parent.key.clone(),
            path: format!("{}.{}", parent.path, field),
            tag: ParsedTag::default(),
            validate: String::new(),
        }
    }
}

/// Look up `name:"value"` in an annotation string, the way struct tags are
/// read: space-separated pairs, values enclosed in double quotes.
pub(crate) fn tag_lookup<'a>(annotation: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = annotation.trim_start();
    while !rest.is_empty() {
        let colon = rest.find(':')?;
        let key = &rest[..colon];
        let after = rest[colon + 1..].strip_prefix('"')?;
        let end = after.find('"')?;
        if key == name {
            return Some(&after[..end]);
        }
        rest = after[end + 1..].trim_start();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_tag() {
        let tag = parse_tag("${points:=(1,2)|(3,4)|(5,6)}>>point").unwrap();
        assert_eq!(
            tag,
            ParsedTag {
                key: "points".into(),
                def: "(1,2)|(3,4)|(5,6)".into(),
                has_def: true,
                splitter: "point".into(),
            }
        );
    }

    #[test]
    fn key_only() {
        let tag = parse_tag("${server.port}").unwrap();
        assert_eq!(tag.key, "server.port");
        assert!(!tag.has_def);
        assert!(tag.splitter.is_empty());
    }

    #[test]
    fn empty_default_is_present() {
        let tag = parse_tag("${k:=}").unwrap();
        assert!(tag.has_def);
        assert_eq!(tag.def, "");
    }

    #[test]
    fn nested_default_kept_verbatim() {
        let tag = parse_tag("${a:=${b}}").unwrap();
        assert_eq!(tag.key, "a");
        assert_eq!(tag.def, "${b}");
    }

    #[test]
    fn invalid_tags() {
        for tag in ["", "{}", ">>point", "$", "${x"] {
            let err = parse_tag(tag).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("parse tag '{tag}' error: invalid syntax"),
            );
            assert!(err.is_invalid_syntax());
        }
    }

    #[test]
    fn display_round_trip() {
        for raw in ["${k}", "${k:=v}", "${k:=}>>point", "${k}>>s"] {
            let tag = parse_tag(raw).unwrap();
            assert_eq!(tag.to_string(), raw);
        }
    }

    #[test]
    fn bind_tag_root_keeps_current_key() {
        let mut param = BindParam {
            key: "server".into(),
            ..BindParam::default()
        };
        param.bind_tag("${ROOT}", "").unwrap();
        assert_eq!(param.key, "server");
        assert_eq!(param.tag.key, "");
    }

    #[test]
    fn bind_tag_empty_key_becomes_anonymous() {
        let mut param = BindParam::default();
        param.bind_tag("${}", "").unwrap();
        assert_eq!(param.key, "ANONYMOUS");
    }

    #[test]
    fn bind_tag_composes_keys() {
        let mut param = BindParam {
            key: "server".into(),
            ..BindParam::default()
        };
        param.bind_tag("${port:=8080}", "").unwrap();
        assert_eq!(param.key, "server.port");
        assert_eq!(param.tag.def, "8080");
    }

    #[test]
    fn bind_tag_records_annotation() {
        let mut param = BindParam::default();
        param
            .bind_tag("${n}", "value:\"${n}\" expr:\"$>0\"")
            .unwrap();
        assert_eq!(tag_lookup(&param.validate, "expr"), Some("$>0"));
    }

    #[test]
    fn child_extends_path_only() {
        let parent = BindParam {
            key: "db".into(),
            path: "Config.db".into(),
            ..BindParam::default()
        };
        let sub = BindParam::child(&parent, "url");
        assert_eq!(sub.key, "db");
        assert_eq!(sub.path, "Config.db.url");
    }

    #[test]
    fn tag_lookup_finds_pairs() {
        let raw = "value:\"${n:=1}\" expr:\"$>0&&$<10\"";
        assert_eq!(tag_lookup(raw, "value"), Some("${n:=1}"));
        assert_eq!(tag_lookup(raw, "expr"), Some("$>0&&$<10"));
        assert_eq!(tag_lookup(raw, "json"), None);
        assert_eq!(tag_lookup("", "expr"), None);
    }
}
