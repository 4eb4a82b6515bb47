//! XSLT-defined and EXSLT extension functions, registered per stylesheet
//! and resolved by `{namespace-uri}localname`.

use std::collections::HashMap;

use log::warn;

use super::context::ExecutionContext;
use super::XSLT_NAMESPACE;
use crate::dom::{Document, Node};
use crate::error::{Error, Result};
use crate::xpath::{self, sort_document_order, EvalContext, Value};

pub const EXSLT_COMMON_NAMESPACE: &str = "http://exslt.org/common";
pub const EXSLT_MATH_NAMESPACE: &str = "http://exslt.org/math";

/// An extension function: the execution context plus the XPath evaluation
/// context at the call site, and the already-evaluated arguments.
pub type XsltFunction = fn(&ExecutionContext, &EvalContext, Vec<Value>) -> Result<Value>;

const INSTRUCTION_ELEMENTS: &[&str] = &[
    "apply-imports",
    "apply-templates",
    "attribute",
    "call-template",
    "choose",
    "comment",
    "copy",
    "copy-of",
    "element",
    "fallback",
    "for-each",
    "if",
    "message",
    "number",
    "processing-instruction",
    "text",
    "value-of",
    "variable",
];

fn key_of(uri: &str, local: &str) -> String {
    format!("{{{}}}{}", uri, local)
}

/// Installs the XSLT 1.0 function library and the supported EXSLT functions.
pub(crate) fn register_builtins(functions: &mut HashMap<String, XsltFunction>) {
    let mut core = |name: &str, f: XsltFunction| {
        functions.insert(key_of("", name), f);
    };
    core("document", fn_document);
    core("key", fn_key);
    core("generate-id", fn_generate_id);
    core("system-property", fn_system_property);
    core("unparsed-entity-uri", fn_unparsed_entity_uri);
    core("current", fn_current);
    core("element-available", fn_element_available);
    core("function-available", fn_function_available);
    core("format-number", fn_format_number);

    functions.insert(key_of(EXSLT_COMMON_NAMESPACE, "node-set"), fn_node_set);
    functions.insert(key_of(EXSLT_MATH_NAMESPACE, "min"), fn_math_min);
    functions.insert(key_of(EXSLT_MATH_NAMESPACE, "max"), fn_math_max);
    functions.insert(key_of(EXSLT_MATH_NAMESPACE, "abs"), fn_math_abs);
}

fn fn_document(ctx: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let arg = args
        .into_iter()
        .next()
        .ok_or_else(|| Error::Evaluation("document() requires an argument".to_string()))?;
    let (location, relative_to_source) = match &arg {
        Value::NodeSet(nodes) => match nodes.first() {
            Some(n) => (n.string_value(), true),
            None => return Ok(Value::NodeSet(vec![])),
        },
        other => (other.string(), false),
    };
    if location.is_empty() {
        // document('') is the stylesheet itself
        return Ok(Value::NodeSet(vec![ctx.style.doc.root()]));
    }
    match ctx.fetch_input_document(&location, relative_to_source) {
        Some(doc) => Ok(Value::NodeSet(vec![doc.root()])),
        None => Ok(Value::NodeSet(vec![])),
    }
}

fn fn_key(ctx: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let mut it = args.into_iter();
    let (name, value) = match (it.next(), it.next()) {
        (Some(n), Some(v)) => (n.string(), v),
        _ => return Err(Error::Evaluation("key() requires two arguments".to_string())),
    };
    let mut out = Vec::new();
    match &value {
        Value::NodeSet(nodes) => {
            for n in nodes {
                out.extend(ctx.key_entries(&name, &n.string_value()));
            }
        }
        other => out.extend(ctx.key_entries(&name, &other.string())),
    }
    sort_document_order(&mut out);
    Ok(Value::NodeSet(out))
}

fn fn_generate_id(ctx: &ExecutionContext, ectx: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let target = match args.into_iter().next() {
        None => Some(ectx.node.clone()),
        Some(v) => {
            let mut nodes = v.into_node_set()?;
            sort_document_order(&mut nodes);
            nodes.into_iter().next()
        }
    };
    Ok(Value::String(match target {
        Some(node) => generate_id(ctx, &node),
        None => String::new(),
    }))
}

fn generate_id(ctx: &ExecutionContext, node: &Node) -> String {
    format!(
        "id{}x{}",
        ctx.document_index(&node.document()),
        node.raw_id()
    )
}

fn fn_system_property(_c: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let name = args
        .into_iter()
        .next()
        .map(|v| v.string())
        .unwrap_or_default();
    Ok(match name.as_str() {
        "xsl:version" => Value::Number(1.0),
        "xsl:vendor" => Value::String(env!("CARGO_PKG_NAME").to_string()),
        "xsl:vendor-url" => Value::String(format!(
            "https://crates.io/crates/{}",
            env!("CARGO_PKG_NAME")
        )),
        other => {
            warn!("unknown system property '{}'", other);
            Value::String(String::new())
        }
    })
}

fn fn_unparsed_entity_uri(
    ctx: &ExecutionContext,
    _e: &EvalContext,
    args: Vec<Value>,
) -> Result<Value> {
    let name = args
        .into_iter()
        .next()
        .map(|v| v.string())
        .unwrap_or_default();
    Ok(Value::String(
        ctx.source.unparsed_entity_uri(&name).unwrap_or_default(),
    ))
}

fn fn_current(ctx: &ExecutionContext, _e: &EvalContext, _args: Vec<Value>) -> Result<Value> {
    Ok(Value::NodeSet(vec![ctx.current.clone()]))
}

fn fn_element_available(
    _c: &ExecutionContext,
    ectx: &EvalContext,
    args: Vec<Value>,
) -> Result<Value> {
    let qname = args
        .into_iter()
        .next()
        .map(|v| v.string())
        .unwrap_or_default();
    let available = match qname.split_once(':') {
        Some((prefix, local)) => {
            ectx.resolver.namespace(prefix).as_deref() == Some(XSLT_NAMESPACE)
                && INSTRUCTION_ELEMENTS.contains(&local)
        }
        None => false,
    };
    Ok(Value::Boolean(available))
}

fn fn_function_available(
    ctx: &ExecutionContext,
    ectx: &EvalContext,
    args: Vec<Value>,
) -> Result<Value> {
    let qname = args
        .into_iter()
        .next()
        .map(|v| v.string())
        .unwrap_or_default();
    let available = match qname.split_once(':') {
        Some((prefix, local)) => match ectx.resolver.namespace(prefix) {
            Some(uri) => ctx.style.functions.contains_key(&key_of(&uri, local)),
            None => false,
        },
        None => {
            xpath::is_core_function(&qname) || ctx.style.functions.contains_key(&key_of("", &qname))
        }
    };
    Ok(Value::Boolean(available))
}

fn fn_node_set(_c: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let arg = args
        .into_iter()
        .next()
        .ok_or_else(|| Error::Evaluation("node-set() requires an argument".to_string()))?;
    match arg {
        Value::NodeSet(nodes) => Ok(Value::NodeSet(nodes)),
        other => {
            let fragment = Document::new();
            let text = fragment.create_text(&other.string());
            fragment.root().append_child(&text);
            Ok(Value::NodeSet(vec![fragment.root()]))
        }
    }
}

fn nodeset_numbers(value: Value) -> Result<Vec<f64>> {
    Ok(value
        .into_node_set()?
        .iter()
        .map(|n| Value::String(n.string_value()).number())
        .collect())
}

fn fn_math_min(_c: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let arg = args
        .into_iter()
        .next()
        .ok_or_else(|| Error::Evaluation("math:min() requires an argument".to_string()))?;
    let numbers = nodeset_numbers(arg)?;
    Ok(Value::Number(
        numbers.into_iter().fold(f64::NAN, |acc, n| {
            if acc.is_nan() || n < acc {
                n
            } else {
                acc
            }
        }),
    ))
}

fn fn_math_max(_c: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let arg = args
        .into_iter()
        .next()
        .ok_or_else(|| Error::Evaluation("math:max() requires an argument".to_string()))?;
    let numbers = nodeset_numbers(arg)?;
    Ok(Value::Number(
        numbers.into_iter().fold(f64::NAN, |acc, n| {
            if acc.is_nan() || n > acc {
                n
            } else {
                acc
            }
        }),
    ))
}

fn fn_math_abs(_c: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let arg = args
        .into_iter()
        .next()
        .ok_or_else(|| Error::Evaluation("math:abs() requires an argument".to_string()))?;
    Ok(Value::Number(arg.number().abs()))
}

// --- format-number() and xsl:decimal-format ---

/// Separator and symbol set for `format-number()`.
#[derive(Debug, Clone)]
pub struct DecimalFormat {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub minus_sign: char,
    pub percent: char,
    pub per_mille: char,
    pub zero_digit: char,
    pub digit: char,
    pub pattern_separator: char,
    pub infinity: String,
    pub nan: String,
}

impl Default for DecimalFormat {
    fn default() -> Self {
        DecimalFormat {
            decimal_separator: '.',
            grouping_separator: ',',
            minus_sign: '-',
            percent: '%',
            per_mille: '\u{2030}',
            zero_digit: '0',
            digit: '#',
            pattern_separator: ';',
            infinity: "Infinity".to_string(),
            nan: "NaN".to_string(),
        }
    }
}

impl DecimalFormat {
    pub(crate) fn from_element(node: &Node) -> DecimalFormat {
        let mut df = DecimalFormat::default();
        let ch = |name: &str, default: char| {
            node.attribute(name)
                .and_then(|v| v.chars().next())
                .unwrap_or(default)
        };
        df.decimal_separator = ch("decimal-separator", df.decimal_separator);
        df.grouping_separator = ch("grouping-separator", df.grouping_separator);
        df.minus_sign = ch("minus-sign", df.minus_sign);
        df.percent = ch("percent", df.percent);
        df.per_mille = ch("per-mille", df.per_mille);
        df.zero_digit = ch("zero-digit", df.zero_digit);
        df.digit = ch("digit", df.digit);
        df.pattern_separator = ch("pattern-separator", df.pattern_separator);
        if let Some(inf) = node.attribute("infinity") {
            df.infinity = inf;
        }
        if let Some(nan) = node.attribute("NaN") {
            df.nan = nan;
        }
        df
    }
}

fn fn_format_number(ctx: &ExecutionContext, _e: &EvalContext, args: Vec<Value>) -> Result<Value> {
    let mut it = args.into_iter();
    let (number, pattern) = match (it.next(), it.next()) {
        (Some(n), Some(p)) => (n.number(), p.string()),
        _ => {
            return Err(Error::Evaluation(
                "format-number() requires a number and a pattern".to_string(),
            ))
        }
    };
    let format_name = it.next().map(|v| v.string()).unwrap_or_default();
    let default_format = DecimalFormat::default();
    let df = ctx
        .style
        .decimal_formats
        .get(&format_name)
        .unwrap_or(&default_format);
    Ok(Value::String(format_decimal(number, &pattern, df)))
}

/// Formats a number against a DecimalFormat pattern (`0`, `#`, separators,
/// an optional negative subpattern, percent and per-mille scaling).
pub fn format_decimal(n: f64, pattern: &str, df: &DecimalFormat) -> String {
    if n.is_nan() {
        return df.nan.clone();
    }

    let mut subpatterns = pattern.splitn(2, df.pattern_separator);
    let positive = subpatterns.next().unwrap_or("0");
    let negative = subpatterns.next();

    let (active, explicit_negative) = if n.is_sign_negative() && n != 0.0 {
        match negative {
            Some(neg) => (neg, true),
            None => (positive, false),
        }
    } else {
        (positive, true)
    };

    let mut value = n.abs();
    if active.contains(df.percent) {
        value *= 100.0;
    } else if active.contains(df.per_mille) {
        value *= 1000.0;
    }

    if value.is_infinite() {
        let sign = if n < 0.0 && !explicit_negative {
            df.minus_sign.to_string()
        } else {
            String::new()
        };
        return format!("{}{}", sign, df.infinity);
    }

    // split the subpattern into prefix, numeric core, suffix
    let is_numeric = |c: char| {
        c == df.zero_digit || c == df.digit || c == df.decimal_separator || c == df.grouping_separator
    };
    let chars: Vec<char> = active.chars().collect();
    let core_start = chars.iter().position(|&c| is_numeric(c)).unwrap_or(0);
    let core_end = chars
        .iter()
        .rposition(|&c| is_numeric(c))
        .map(|i| i + 1)
        .unwrap_or(chars.len());
    let prefix: String = chars[..core_start].iter().collect();
    let suffix: String = chars[core_end..].iter().collect();
    let core: Vec<char> = chars[core_start..core_end].to_vec();

    let mut int_part: Vec<char> = Vec::new();
    let mut frac_part: Vec<char> = Vec::new();
    let mut seen_decimal = false;
    for &c in &core {
        if c == df.decimal_separator {
            seen_decimal = true;
        } else if seen_decimal {
            frac_part.push(c);
        } else {
            int_part.push(c);
        }
    }

    let min_int = int_part.iter().filter(|&&c| c == df.zero_digit).count().max(1);
    let min_frac = frac_part.iter().filter(|&&c| c == df.zero_digit).count();
    let max_frac = frac_part.iter().filter(|&&c| c == df.zero_digit || c == df.digit).count();
    let group_size = int_part
        .iter()
        .rev()
        .position(|&c| c == df.grouping_separator);

    let rounded = format!("{:.*}", max_frac, value);
    let (int_digits, frac_digits) = match rounded.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (rounded, String::new()),
    };

    let mut int_digits = int_digits;
    while int_digits.len() < min_int {
        int_digits.insert(0, '0');
    }
    if let Some(size) = group_size.filter(|&s| s > 0) {
        let mut grouped = String::new();
        for (i, c) in int_digits.chars().rev().enumerate() {
            if i > 0 && i % size == 0 {
                grouped.push(df.grouping_separator);
            }
            grouped.push(c);
        }
        int_digits = grouped.chars().rev().collect();
    }

    let mut frac_digits = frac_digits;
    while frac_digits.len() > min_frac && frac_digits.ends_with('0') {
        frac_digits.pop();
    }

    let mut out = String::new();
    if n.is_sign_negative() && n != 0.0 && !explicit_negative {
        out.push(df.minus_sign);
    }
    out.push_str(&prefix);
    out.push_str(&int_digits);
    if !frac_digits.is_empty() {
        out.push(df.decimal_separator);
        out.push_str(&frac_digits);
    }
    out.push_str(&suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(n: f64, pattern: &str) -> String {
        format_decimal(n, pattern, &DecimalFormat::default())
    }

    #[test]
    fn plain_patterns() {
        assert_eq!(fmt(1234.56, "0"), "1235");
        assert_eq!(fmt(1234.5, "0.00"), "1234.50");
        assert_eq!(fmt(0.5, "#.#"), "0.5");
        assert_eq!(fmt(12.0, "00000"), "00012");
        assert_eq!(fmt(0.126, "0.##"), "0.13");
    }

    #[test]
    fn grouping_and_affixes() {
        assert_eq!(fmt(1234567.0, "#,###"), "1,234,567");
        assert_eq!(fmt(1234.0, "$#,##0.00"), "$1,234.00");
        assert_eq!(fmt(0.42, "0%"), "42%");
    }

    #[test]
    fn negatives_and_specials() {
        assert_eq!(fmt(-3.5, "0.0"), "-3.5");
        assert_eq!(fmt(-3.5, "0.0;(0.0)"), "(3.5)");
        assert_eq!(fmt(f64::NAN, "0"), "NaN");
        assert_eq!(fmt(f64::INFINITY, "0"), "Infinity");
    }

    #[test]
    fn custom_separators() {
        let df = DecimalFormat {
            decimal_separator: ',',
            grouping_separator: '.',
            ..DecimalFormat::default()
        };
        assert_eq!(format_decimal(1234.5, "#.##0,0", &df), "1.234,5");
    }
}
