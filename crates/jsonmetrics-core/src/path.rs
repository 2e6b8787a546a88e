//! Field-path expressions over decoded JSON records.
//!
//! A path selects one value inside a record and renders it as text.
//! [`PathExpr`] is the seam; [`FieldPath`] is the built-in dialect:
//!
//! ```text
//! {.status.code}      brace-wrapped
//! $.status.code       rooted
//! status.code         bare
//! .items[0].name      array index
//! .items[-1]          index from the end
//! .labels['app id']   quoted key
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::PathError;

/// A compiled expression that selects text out of a decoded record.
pub trait PathExpr: fmt::Debug + Send + Sync {
    /// Evaluate against a record.
    ///
    /// Strings yield their raw contents, numbers and booleans their JSON
    /// text, arrays and objects compact JSON. `null` is a failure.
    fn evaluate(&self, record: &Value) -> Result<String, PathError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(i64),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "[{key:?}]"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// JSONPath-like field selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    expr: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Compile a path expression.
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        let mut body = expr.trim();
        if let Some(inner) = body.strip_prefix('{') {
            body = inner
                .strip_suffix('}')
                .ok_or_else(|| syntax(expr, "unbalanced braces"))?
                .trim();
        }
        if body.is_empty() {
            return Err(PathError::Empty);
        }
        let body = body.strip_prefix('$').unwrap_or(body);

        let segments = if body.is_empty() || body == "." {
            Vec::new()
        } else if body.starts_with(['.', '[']) {
            parse_segments(expr, body)?
        } else {
            parse_segments(expr, &format!(".{body}"))?
        };

        Ok(Self {
            expr: expr.trim().to_string(),
            segments,
        })
    }

    /// The expression as written.
    pub fn as_str(&self) -> &str {
        &self.expr
    }

    fn select<'a>(&self, record: &'a Value) -> Result<&'a Value, PathError> {
        let mut current = record;
        for segment in &self.segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(fields)) => {
                    fields.get(key).ok_or_else(|| self.not_found(segment))?
                }
                (Segment::Index(index), Value::Array(items)) => {
                    let resolved = if *index < 0 {
                        items.len() as i64 + index
                    } else {
                        *index
                    };
                    usize::try_from(resolved)
                        .ok()
                        .and_then(|i| items.get(i))
                        .ok_or_else(|| self.not_found(segment))?
                }
                (_, other) => {
                    return Err(PathError::TypeMismatch {
                        path: self.expr.clone(),
                        segment: segment.to_string(),
                        found: kind_of(other),
                    });
                }
            };
        }
        Ok(current)
    }

    fn not_found(&self, segment: &Segment) -> PathError {
        PathError::NotFound {
            path: self.expr.clone(),
            segment: segment.to_string(),
        }
    }
}

impl PathExpr for FieldPath {
    fn evaluate(&self, record: &Value) -> Result<String, PathError> {
        match self.select(record)? {
            Value::Null => Err(PathError::Null {
                path: self.expr.clone(),
            }),
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            nested => Ok(nested.to_string()),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

fn syntax(expr: &str, reason: &str) -> PathError {
    PathError::Syntax {
        expr: expr.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_segments(expr: &str, body: &str) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::new();
    let mut rest = body;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let key = after[..end].trim();
            if key.is_empty() {
                return Err(syntax(expr, "empty field name"));
            }
            segments.push(Segment::Key(key.to_string()));
            rest = &after[end..];
        } else if let Some(after) = rest.strip_prefix('[') {
            let (segment, remainder) = parse_bracket(after).map_err(|reason| syntax(expr, reason))?;
            segments.push(segment);
            rest = remainder;
        } else {
            return Err(syntax(expr, "expected '.' or '['"));
        }
    }
    Ok(segments)
}

fn parse_bracket(after: &str) -> Result<(Segment, &str), &'static str> {
    if let Some(quote) = after.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let quoted = &after[1..];
        let close = quoted.find(quote).ok_or("unterminated quoted key")?;
        let remainder = quoted[close + 1..]
            .strip_prefix(']')
            .ok_or("expected ']' after quoted key")?;
        return Ok((Segment::Key(quoted[..close].to_string()), remainder));
    }
    let close = after.find(']').ok_or("unterminated '['")?;
    let index = after[..close]
        .trim()
        .parse::<i64>()
        .map_err(|_| "array index must be an integer")?;
    Ok((Segment::Index(index), &after[close + 1..]))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
