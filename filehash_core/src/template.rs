//! A tiny interpolation language for path and etag templates.
//!
//! A template is literal text with substitution tags of the form
//! `{{= name }}` (variable lookup) or `{{= +name }}` (numeric coercion,
//! e.g. `+mtime` yields epoch milliseconds). Delimiters belong to a
//! [`Renderer`] instance; there is no process-wide configuration.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

pub const DEFAULT_OPEN: &str = "{{";
pub const DEFAULT_CLOSE: &str = "}}";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated tag starting at byte {offset} in template {template:?}")]
    Unterminated { template: String, offset: usize },

    #[error("tag at byte {offset} in template {template:?} must start with '='")]
    UnsupportedTag { template: String, offset: usize },

    #[error("malformed expression {expr:?} in template {template:?}")]
    MalformedExpression { template: String, expr: String },

    #[error("template delimiters must be non-empty")]
    EmptyDelimiter,
}

/// A value bound to a template variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl Value {
    /// Numeric coercion used by `+name`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Str(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    s.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Time(t) => t.timestamp_millis() as f64,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_number(*x)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Formats a float without a trailing `.0` for integral values.
pub fn format_number(x: f64) -> String {
    if x.is_nan() {
        "NaN".to_owned()
    } else if x.is_infinite() {
        if x > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{x}")
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Value::Int)
            .unwrap_or(Value::Float(value as f64))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

/// Variables available to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars(BTreeMap<String, Value>);

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.0.insert(name.to_owned(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Delimiters {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self, TemplateError> {
        let (open, close) = (open.into(), close.into());
        if open.is_empty() || close.is_empty() {
            return Err(TemplateError::EmptyDelimiter);
        }
        Ok(Self { open, close })
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN.to_owned(),
            close: DEFAULT_CLOSE.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Lookup(String),
    Numeric(String),
}

/// A parsed template, ready to be rendered any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders against `vars`. Unknown variables render as an empty string.
    pub fn render(&self, vars: &Vars) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Lookup(name) => {
                    if let Some(value) = vars.get(name) {
                        out.push_str(&value.to_string());
                    }
                }
                Segment::Numeric(name) => {
                    let n = vars.get(name).map_or(0.0, Value::to_number);
                    out.push_str(&format_number(n));
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    delimiters: Delimiters,
}

impl Renderer {
    pub fn new(delimiters: Delimiters) -> Self {
        Self { delimiters }
    }

    pub fn compile(&self, source: &str) -> Result<Template, TemplateError> {
        let Delimiters { open, close } = &self.delimiters;
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(start) = rest.find(open.as_str()) {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_owned()));
            }
            let offset = consumed + start;
            let after_open = &rest[start + open.len()..];
            let Some(end) = after_open.find(close.as_str()) else {
                return Err(TemplateError::Unterminated {
                    template: source.to_owned(),
                    offset,
                });
            };
            let Some(expr) = after_open[..end].strip_prefix('=') else {
                return Err(TemplateError::UnsupportedTag {
                    template: source.to_owned(),
                    offset,
                });
            };
            segments.push(parse_expression(source, expr)?);

            let advance = start + open.len() + end + close.len();
            consumed += advance;
            rest = &rest[advance..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }

        Ok(Template {
            source: source.to_owned(),
            segments,
        })
    }

    pub fn render(&self, source: &str, vars: &Vars) -> Result<String, TemplateError> {
        Ok(self.compile(source)?.render(vars))
    }
}

fn parse_expression(template: &str, expr: &str) -> Result<Segment, TemplateError> {
    let trimmed = expr.trim();
    let (numeric, name) = match trimmed.strip_prefix('+') {
        Some(name) => (true, name.trim_start()),
        None => (false, trimmed),
    };
    if !is_identifier(name) {
        return Err(TemplateError::MalformedExpression {
            template: template.to_owned(),
            expr: expr.to_owned(),
        });
    }
    Ok(if numeric {
        Segment::Numeric(name.to_owned())
    } else {
        Segment::Lookup(name.to_owned())
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_interpolates_variables() {
        let vars = Vars::new()
            .with("basename", "style")
            .with("hash", "abc123")
            .with("extname", ".css");
        let out = Renderer::default()
            .render("{{= basename}}.{{=hash}}{{= extname }}", &vars)
            .unwrap();
        assert_eq!(out, "style.abc123.css");
    }

    #[test]
    fn test_numeric_coercion_of_time() {
        let mtime = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let vars = Vars::new().with("size", 42u64).with("mtime", mtime);
        let out = Renderer::default()
            .render("{{= size}}-{{= +mtime}}", &vars)
            .unwrap();
        assert_eq!(out, "42-1700000000123");
    }

    #[test]
    fn test_time_without_coercion_renders_rfc3339() {
        let mtime = Utc.timestamp_millis_opt(0).unwrap();
        let vars = Vars::new().with("mtime", mtime);
        let out = Renderer::default().render("{{= mtime}}", &vars).unwrap();
        assert_eq!(out, "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_unknown_variables_render_empty() {
        let out = Renderer::default()
            .render("a{{= missing}}b{{= +missing}}", &Vars::new())
            .unwrap();
        assert_eq!(out, "ab0");
    }

    #[test]
    fn test_numeric_coercion_of_strings() {
        let vars = Vars::new().with("n", " 12 ").with("word", "abc");
        let r = Renderer::default();
        assert_eq!(r.render("{{= +n}}", &vars).unwrap(), "12");
        assert_eq!(r.render("{{= +word}}", &vars).unwrap(), "NaN");
    }

    #[test]
    fn test_custom_delimiters() {
        let renderer = Renderer::new(Delimiters::new("<%", "%>").unwrap());
        let vars = Vars::new().with("hash", "ff");
        assert_eq!(renderer.render("x-<%= hash %>", &vars).unwrap(), "x-ff");
        // the default delimiters are plain text for this renderer
        assert_eq!(renderer.render("{{= hash}}", &vars).unwrap(), "{{= hash}}");
    }

    #[test]
    fn test_text_only_template() {
        let template = Renderer::default().compile("hash.json").unwrap();
        assert_eq!(template.render(&Vars::new()), "hash.json");
        assert_eq!(template.source(), "hash.json");
    }

    #[test]
    fn test_unterminated_tag() {
        let err = Renderer::default().compile("a/{{= dest").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Unterminated {
                template: "a/{{= dest".into(),
                offset: 2
            }
        );
    }

    #[test]
    fn test_rejects_non_interpolation_tags() {
        let err = Renderer::default().compile("{{ if (x) }}").unwrap_err();
        assert!(matches!(err, TemplateError::UnsupportedTag { offset: 0, .. }));
    }

    #[test]
    fn test_rejects_malformed_expressions() {
        let r = Renderer::default();
        for bad in ["{{= }}", "{{= a.b}}", "{{= 1abc}}", "{{= size + 1}}"] {
            assert!(
                matches!(r.compile(bad), Err(TemplateError::MalformedExpression { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_empty_delimiters_are_rejected() {
        assert_eq!(
            Delimiters::new("", "}}").unwrap_err(),
            TemplateError::EmptyDelimiter
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }
}
