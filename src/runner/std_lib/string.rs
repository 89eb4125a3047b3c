//! String built-in.
//!
//! Index based methods work on UTF-16 code units, as scripts expect.

use crate::runner::ds::error::JErrorType;
use crate::runner::ds::object::array_value;
use crate::runner::ds::operations::type_conversion::{to_integer_or_infinity, to_number, to_string};
use crate::runner::ds::value::JsValue;
use crate::runner::eval::function::call_value;
use crate::runner::plugin::registry::BuiltInRegistry;
use crate::runner::plugin::types::{BuiltInObject, EvalContext, NativeFn};

use super::arg;
use super::regexp::regexp_parts;

const METHODS: [(&str, NativeFn); 30] = [
    ("charAt", string_char_at),
    ("charCodeAt", string_char_code_at),
    ("codePointAt", string_char_code_at),
    ("at", string_at),
    ("indexOf", string_index_of),
    ("lastIndexOf", string_last_index_of),
    ("includes", string_includes),
    ("startsWith", string_starts_with),
    ("endsWith", string_ends_with),
    ("slice", string_slice),
    ("substring", string_substring),
    ("substr", string_substr),
    ("toUpperCase", string_to_upper_case),
    ("toLowerCase", string_to_lower_case),
    ("toLocaleUpperCase", string_to_upper_case),
    ("toLocaleLowerCase", string_to_lower_case),
    ("trim", string_trim),
    ("trimStart", string_trim_start),
    ("trimEnd", string_trim_end),
    ("padStart", string_pad_start),
    ("padEnd", string_pad_end),
    ("repeat", string_repeat),
    ("split", string_split),
    ("replace", string_replace),
    ("replaceAll", string_replace_all),
    ("match", string_match),
    ("search", string_search),
    ("concat", string_concat),
    ("localeCompare", string_locale_compare),
    ("toString", string_value_of),
];

/// Register the String built-in with the registry.
pub fn register(registry: &mut BuiltInRegistry) {
    let mut string = BuiltInObject::new("String")
        .with_constructor(string_constructor)
        .add_method("fromCharCode", string_from_char_code)
        .add_prototype_method("valueOf", string_value_of);
    for (name, f) in METHODS {
        string = string.add_prototype_method(name, f);
    }

    registry.register_object(string);
}

fn units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

fn this_string(this: &JsValue, method: &str) -> Result<String, JErrorType> {
    if this.is_nullish() {
        return Err(JErrorType::TypeError(format!(
            "String.prototype.{} called on null or undefined",
            method
        )));
    }
    Ok(to_string(this))
}

/// Relative index clamped into `0..=len`; negative values count from the end.
fn relative_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    let n = to_integer_or_infinity(value);
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// Absolute index clamped into `0..=len`.
fn clamped_index(value: &JsValue, len: usize, default: usize) -> usize {
    if matches!(value, JsValue::Undefined) {
        return default;
    }
    to_integer_or_infinity(value).clamp(0.0, len as f64) as usize
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| &haystack[i..i + needle.len()] == needle)
}

fn string_constructor(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(args.first().map(to_string).unwrap_or_default()))
}

fn string_from_char_code(
    _ctx: &mut EvalContext,
    _this: JsValue,
    args: Vec<JsValue>,
) -> Result<JsValue, JErrorType> {
    let codes: Vec<u16> = args.iter().map(|a| to_number(a) as i64 as u16).collect();
    Ok(JsValue::String(from_units(&codes)))
}

fn string_value_of(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, "valueOf")?))
}

fn string_char_at(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "charAt")?);
    let i = to_integer_or_infinity(&arg(&args, 0));
    if i < 0.0 || i >= u.len() as f64 {
        return Ok(JsValue::str(""));
    }
    Ok(JsValue::String(from_units(&u[i as usize..i as usize + 1])))
}

fn string_char_code_at(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "charCodeAt")?);
    let i = to_integer_or_infinity(&arg(&args, 0));
    if i < 0.0 || i >= u.len() as f64 {
        return Ok(JsValue::from_f64(f64::NAN));
    }
    Ok(JsValue::from_i64(u[i as usize] as i64))
}

fn string_at(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "at")?);
    let mut i = to_integer_or_infinity(&arg(&args, 0));
    if i < 0.0 {
        i += u.len() as f64;
    }
    if i < 0.0 || i >= u.len() as f64 {
        return Ok(JsValue::Undefined);
    }
    Ok(JsValue::String(from_units(&u[i as usize..i as usize + 1])))
}

fn string_index_of(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "indexOf")?);
    let needle = units(&to_string(&arg(&args, 0)));
    let from = clamped_index(&arg(&args, 1), u.len(), 0);
    Ok(JsValue::from_i64(
        find_units(&u, &needle, from).map(|i| i as i64).unwrap_or(-1),
    ))
}

fn string_last_index_of(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "lastIndexOf")?);
    let needle = units(&to_string(&arg(&args, 0)));
    let from = clamped_index(&arg(&args, 1), u.len(), u.len());
    if needle.len() > u.len() {
        return Ok(JsValue::from_i64(-1));
    }
    let start = from.min(u.len() - needle.len());
    let found = (0..=start).rev().find(|&i| u[i..i + needle.len()] == needle[..]);
    Ok(JsValue::from_i64(found.map(|i| i as i64).unwrap_or(-1)))
}

fn reject_regexp(value: &JsValue, method: &str) -> Result<(), JErrorType> {
    if regexp_parts(value).is_some() {
        return Err(JErrorType::TypeError(format!(
            "First argument to String.prototype.{} must not be a regular expression",
            method
        )));
    }
    Ok(())
}

fn string_includes(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "includes")?);
    let needle_value = arg(&args, 0);
    reject_regexp(&needle_value, "includes")?;
    let needle = units(&to_string(&needle_value));
    let from = clamped_index(&arg(&args, 1), u.len(), 0);
    Ok(JsValue::Boolean(find_units(&u, &needle, from).is_some()))
}

fn string_starts_with(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "startsWith")?);
    let needle_value = arg(&args, 0);
    reject_regexp(&needle_value, "startsWith")?;
    let needle = units(&to_string(&needle_value));
    let from = clamped_index(&arg(&args, 1), u.len(), 0);
    Ok(JsValue::Boolean(u[from..].starts_with(&needle)))
}

fn string_ends_with(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "endsWith")?);
    let needle_value = arg(&args, 0);
    reject_regexp(&needle_value, "endsWith")?;
    let needle = units(&to_string(&needle_value));
    let end = clamped_index(&arg(&args, 1), u.len(), u.len());
    Ok(JsValue::Boolean(u[..end].ends_with(&needle)))
}

fn string_slice(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "slice")?);
    let start = relative_index(&arg(&args, 0), u.len(), 0);
    let end = relative_index(&arg(&args, 1), u.len(), u.len());
    if start >= end {
        return Ok(JsValue::str(""));
    }
    Ok(JsValue::String(from_units(&u[start..end])))
}

fn string_substring(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "substring")?);
    let a = clamped_index(&arg(&args, 0), u.len(), 0);
    let b = clamped_index(&arg(&args, 1), u.len(), u.len());
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(JsValue::String(from_units(&u[start..end])))
}

fn string_substr(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "substr")?);
    let start = relative_index(&arg(&args, 0), u.len(), 0);
    let length = match arg(&args, 1) {
        JsValue::Undefined => u.len() - start,
        l => to_integer_or_infinity(&l).clamp(0.0, (u.len() - start) as f64) as usize,
    };
    Ok(JsValue::String(from_units(&u[start..start + length])))
}

fn string_to_upper_case(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, "toUpperCase")?.to_uppercase()))
}

fn string_to_lower_case(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::String(this_string(&this, "toLowerCase")?.to_lowercase()))
}

fn string_trim(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::str(this_string(&this, "trim")?.trim()))
}

fn string_trim_start(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::str(this_string(&this, "trimStart")?.trim_start()))
}

fn string_trim_end(_ctx: &mut EvalContext, this: JsValue, _args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    Ok(JsValue::str(this_string(&this, "trimEnd")?.trim_end()))
}

fn padding(current: usize, args: &[JsValue]) -> Vec<u16> {
    let target = to_integer_or_infinity(&arg(args, 0));
    if !(target > current as f64) {
        return vec![];
    }
    let filler = match arg(args, 1) {
        JsValue::Undefined => vec![b' ' as u16],
        f => units(&to_string(&f)),
    };
    if filler.is_empty() {
        return vec![];
    }
    let needed = target as usize - current;
    filler.iter().copied().cycle().take(needed).collect()
}

fn string_pad_start(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let u = units(&this_string(&this, "padStart")?);
    let mut out = padding(u.len(), &args);
    out.extend(u);
    Ok(JsValue::String(from_units(&out)))
}

fn string_pad_end(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut u = units(&this_string(&this, "padEnd")?);
    let pad = padding(u.len(), &args);
    u.extend(pad);
    Ok(JsValue::String(from_units(&u)))
}

fn string_repeat(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, "repeat")?;
    let count = to_integer_or_infinity(&arg(&args, 0));
    if count < 0.0 || count.is_infinite() {
        return Err(JErrorType::RangeError(format!("Invalid count value: {}", count)));
    }
    Ok(JsValue::String(s.repeat(count as usize)))
}

fn string_split(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, "split")?;
    let limit = match arg(&args, 1) {
        JsValue::Undefined => usize::MAX,
        l => to_number(&l).max(0.0) as usize,
    };
    let separator = arg(&args, 0);
    let parts: Vec<String> = if let Some((re, _)) = regexp_parts(&separator) {
        if s.is_empty() {
            if re.is_match(&s) {
                vec![]
            } else {
                vec![s]
            }
        } else {
            re.split(&s).map(|p| p.to_string()).collect()
        }
    } else if matches!(separator, JsValue::Undefined) {
        vec![s]
    } else {
        let sep = to_string(&separator);
        if sep.is_empty() {
            s.chars().map(|c| c.to_string()).collect()
        } else {
            s.split(sep.as_str()).map(|p| p.to_string()).collect()
        }
    };
    Ok(array_value(
        parts.into_iter().take(limit).map(JsValue::String).collect(),
    ))
}

/// One match as seen by replacement templates and replacer functions.
struct MatchInfo {
    start: usize,
    end: usize,
    groups: Vec<Option<String>>,
}

/// Expands `$$`, `$&`, `` $` ``, `$'` and `$n` in a replacement template.
fn expand_template(template: &str, m: &MatchInfo, input: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&input[m.start..m.end]);
                i += 2;
            }
            '`' => {
                out.push_str(&input[..m.start]);
                i += 2;
            }
            '\'' => {
                out.push_str(&input[m.end..]);
                i += 2;
            }
            d if d.is_ascii_digit() => {
                let mut n = d.to_digit(10).unwrap_or(0) as usize;
                let mut consumed = 2;
                if let Some(d2) = chars.get(i + 2).and_then(|c| c.to_digit(10)) {
                    let two = n * 10 + d2 as usize;
                    if two >= 1 && two <= m.groups.len() {
                        n = two;
                        consumed = 3;
                    }
                }
                if n >= 1 && n <= m.groups.len() {
                    if let Some(g) = &m.groups[n - 1] {
                        out.push_str(g);
                    }
                    i += consumed;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

fn find_matches(s: &str, pattern: &JsValue, all: bool) -> Vec<MatchInfo> {
    if let Some((re, global)) = regexp_parts(pattern) {
        let iter = re.captures_iter(s).map(|caps| {
            let whole = caps.get(0);
            MatchInfo {
                start: whole.map(|m| m.start()).unwrap_or(0),
                end: whole.map(|m| m.end()).unwrap_or(0),
                groups: caps
                    .iter()
                    .skip(1)
                    .map(|g| g.map(|g| g.as_str().to_string()))
                    .collect(),
            }
        });
        return if global || all {
            iter.collect()
        } else {
            iter.take(1).collect()
        };
    }
    let needle = to_string(pattern);
    let mut matches = Vec::new();
    if needle.is_empty() {
        matches.push(MatchInfo {
            start: 0,
            end: 0,
            groups: vec![],
        });
        return matches;
    }
    for (start, _) in s.match_indices(needle.as_str()) {
        matches.push(MatchInfo {
            start,
            end: start + needle.len(),
            groups: vec![],
        });
        if !all {
            break;
        }
    }
    matches
}

fn replace_impl(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>, all: bool) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, if all { "replaceAll" } else { "replace" })?;
    let pattern = arg(&args, 0);
    if all {
        if let Some((_, global)) = regexp_parts(&pattern) {
            if !global {
                return Err(JErrorType::TypeError(
                    "replaceAll must be called with a global RegExp".to_string(),
                ));
            }
        }
    }
    let replacement = arg(&args, 1);
    let mut out = String::new();
    let mut last = 0;
    for m in find_matches(&s, &pattern, all) {
        out.push_str(&s[last..m.start]);
        if replacement.is_callable() {
            let mut call_args = vec![JsValue::str(&s[m.start..m.end])];
            call_args.extend(m.groups.iter().map(|g| match g {
                Some(g) => JsValue::str(g.as_str()),
                None => JsValue::Undefined,
            }));
            call_args.push(JsValue::from_i64(s[..m.start].encode_utf16().count() as i64));
            call_args.push(JsValue::str(s.as_str()));
            let v = call_value(ctx, &replacement, JsValue::Undefined, call_args)?;
            out.push_str(&to_string(&v));
        } else {
            out.push_str(&expand_template(&to_string(&replacement), &m, &s));
        }
        last = m.end;
    }
    out.push_str(&s[last..]);
    Ok(JsValue::String(out))
}

fn string_replace(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    replace_impl(ctx, this, args, false)
}

fn string_replace_all(ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    replace_impl(ctx, this, args, true)
}

fn string_match(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, "match")?;
    let pattern = arg(&args, 0);
    let (re, global) = match regexp_parts(&pattern) {
        Some(parts) => parts,
        None => (super::regexp::compile_regex(&to_string(&pattern), "")?, false),
    };
    if global {
        let all: Vec<JsValue> = re.find_iter(&s).map(|m| JsValue::str(m.as_str())).collect();
        return Ok(if all.is_empty() {
            JsValue::Null
        } else {
            array_value(all)
        });
    }
    Ok(match re.captures(&s) {
        Some(caps) => array_value(
            caps.iter()
                .map(|g| match g {
                    Some(g) => JsValue::str(g.as_str()),
                    None => JsValue::Undefined,
                })
                .collect(),
        ),
        None => JsValue::Null,
    })
}

fn string_search(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, "search")?;
    let pattern = arg(&args, 0);
    let re = match regexp_parts(&pattern) {
        Some((re, _)) => re,
        None => super::regexp::compile_regex(&to_string(&pattern), "")?,
    };
    Ok(JsValue::from_i64(match re.find(&s) {
        Some(m) => s[..m.start()].encode_utf16().count() as i64,
        None => -1,
    }))
}

fn string_concat(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let mut s = this_string(&this, "concat")?;
    for a in &args {
        s.push_str(&to_string(a));
    }
    Ok(JsValue::String(s))
}

fn string_locale_compare(_ctx: &mut EvalContext, this: JsValue, args: Vec<JsValue>) -> Result<JsValue, JErrorType> {
    let s = this_string(&this, "localeCompare")?;
    let other = to_string(&arg(&args, 0));
    Ok(JsValue::from_i64(match s.cmp(&other) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_replacement_templates() {
        let m = MatchInfo {
            start: 4,
            end: 7,
            groups: vec![Some("b".to_string())],
        };
        assert_eq!(expand_template("[$&|$1|$$|$2]", &m, "aaa bcd"), "[bcd|b|$|$2]");
    }

    #[test]
    fn padding_repeats_the_filler() {
        let args = vec![JsValue::from_i64(5), JsValue::str("ab")];
        assert_eq!(from_units(&padding(2, &args)), "aba");
        assert!(padding(6, &args).is_empty());
    }
}
