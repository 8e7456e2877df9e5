//! Reference expansion for `${key:=default}` placeholders.
//!
//! A hand-written scanner counts `${` / `}` nesting so that a default may
//! itself contain placeholders: `${a:=${b}}` is one outer region whose
//! default is `${b}`. A regex cannot express this.

use crate::error::ConfError;
use crate::props::Properties;
use crate::tag::BindParam;

/// Expand every `${…}` region in `s` against `p`. Strings without
/// placeholders are returned verbatim; unterminated regions fail with the
/// invalid-syntax kind.
pub(crate) fn resolve_string(p: &Properties, s: &str) -> Result<String, ConfError> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut start = None;
    let mut end = None;
    for i in 0..bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if depth == 0 {
                start = Some(i);
            }
            depth += 1;
        } else if bytes[i] == b'}' && depth > 0 {
            depth -= 1;
            if depth == 0 {
                end = Some(i);
                break;
            }
        }
    }

    let Some(start) = start else {
        return Ok(s.to_string());
    };
    let Some(end) = end else {
        return Err(ConfError::resolve_string_context(s, ConfError::InvalidSyntax));
    };

    // the scanner guarantees the region is well-formed
    let mut param = BindParam::default();
    param.bind_tag(&s[start..=end], "")?;

    let head = resolve_property(p, &param).map_err(|e| ConfError::resolve_string_context(s, e))?;
    let tail =
        resolve_string(p, &s[end + 1..]).map_err(|e| ConfError::resolve_string_context(s, e))?;
    Ok(format!("{}{}{}", &s[..start], head, tail))
}

/// Produce the value a reference names: a plain value (recursively
/// expanded), or the expanded default, or an error.
pub(crate) fn resolve_property(p: &Properties, param: &BindParam) -> Result<String, ConfError> {
    if let Some(val) = p.get(&param.key) {
        return resolve_string(p, val);
    }
    if p.has(&param.key) {
        let err = ConfError::NotSimpleValue {
            key: param.key.clone(),
        };
        return Err(ConfError::resolve_property_context(&param.key, err));
    }
    if param.tag.has_def {
        return resolve_string(p, &param.tag.def);
    }
    Err(ConfError::resolve_property_context(
        &param.key,
        ConfError::not_exist(&param.key),
    ))
}
