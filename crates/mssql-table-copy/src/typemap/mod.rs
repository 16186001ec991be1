//! Type formatting between catalog metadata and column type clauses.
//!
//! [`format_type`] decorates a catalog type with its size parameters and
//! [`TypeSpec::parse`] takes a decorated type apart again. The two are inverse
//! for every type the formatter decorates.

use std::fmt;

/// Size parameter of a decorated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeParam {
    /// Explicit size, precision or scale.
    Size(u32),
    /// `max` length (catalog length -1).
    Max,
}

impl fmt::Display for TypeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeParam::Size(n) => write!(f, "{}", n),
            TypeParam::Max => f.write_str("max"),
        }
    }
}

/// A parsed column type clause: base name plus size parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub base: String,
    pub params: Vec<TypeParam>,
}

impl TypeSpec {
    pub fn bare(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(base: impl Into<String>, params: Vec<TypeParam>) -> Self {
        Self {
            base: base.into(),
            params,
        }
    }

    /// Parse a decorated type such as `numeric(10,2)` or `nvarchar(max)`.
    pub fn parse(decorated: &str) -> std::result::Result<Self, String> {
        let decorated = decorated.trim();
        let Some(open) = decorated.find('(') else {
            if decorated.is_empty() {
                return Err("empty type".to_string());
            }
            return Ok(Self::bare(decorated));
        };

        let inner = decorated[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| format!("unterminated parameter list in {:?}", decorated))?;
        let base = decorated[..open].trim();
        if base.is_empty() {
            return Err(format!("missing base type in {:?}", decorated));
        }

        let params = inner
            .split(',')
            .map(|p| {
                let p = p.trim();
                if p.eq_ignore_ascii_case("max") {
                    Ok(TypeParam::Max)
                } else {
                    p.parse::<u32>()
                        .map(TypeParam::Size)
                        .map_err(|_| format!("invalid type parameter {:?} in {:?}", p, decorated))
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self::with_params(base, params))
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
            write!(f, "({})", params.join(","))?;
        }
        Ok(())
    }
}

/// Decorate a catalog type with its size parameters.
///
/// Rules, first match wins:
/// 1. `numeric`/`decimal` get `(precision,scale)`.
/// 2. Character and binary types get `(length)`, with -1 rendered as `max`.
/// 3. `datetime2`, `time` and `datetimeoffset` get `(fractional precision)`.
/// 4. Anything else is returned unchanged.
///
/// A missing size parameter leaves the type bare so the destination default
/// applies. Legacy `datetime` accepts no precision and is never decorated.
pub fn format_type(
    raw_type: &str,
    char_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    date_precision: Option<i32>,
) -> String {
    spec_for(raw_type, char_length, numeric_precision, numeric_scale, date_precision).to_string()
}

/// Structured form of [`format_type`].
pub fn spec_for(
    raw_type: &str,
    char_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
    date_precision: Option<i32>,
) -> TypeSpec {
    let lower = raw_type.to_lowercase();
    match lower.as_str() {
        "numeric" | "decimal" => match numeric_precision.and_then(size) {
            Some(precision) => TypeSpec::with_params(
                raw_type,
                vec![precision, numeric_scale.and_then(size).unwrap_or(TypeParam::Size(0))],
            ),
            None => TypeSpec::bare(raw_type),
        },
        "varchar" | "nvarchar" | "nchar" | "char" | "varbinary" | "binary" => {
            match char_length.and_then(length) {
                Some(len) => TypeSpec::with_params(raw_type, vec![len]),
                None => TypeSpec::bare(raw_type),
            }
        }
        "datetime2" | "time" | "datetimeoffset" => match date_precision.and_then(size) {
            Some(precision) => TypeSpec::with_params(raw_type, vec![precision]),
            None => TypeSpec::bare(raw_type),
        },
        _ => TypeSpec::bare(raw_type),
    }
}

fn size(value: i32) -> Option<TypeParam> {
    u32::try_from(value).ok().map(TypeParam::Size)
}

fn length(value: i32) -> Option<TypeParam> {
    match value {
        -1 => Some(TypeParam::Max),
        n if n > 0 => Some(TypeParam::Size(n as u32)),
        _ => None,
    }
}

fn base_of(decorated: &str) -> String {
    decorated
        .split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Whether a column type holds character data and takes quoted literals.
///
/// Textual means base `text`/`ntext`, or any base containing `char`
/// (`char`, `varchar`, `nchar`, `nvarchar`).
pub fn is_textual(decorated_type: &str) -> bool {
    let base = base_of(decorated_type);
    base == "text" || base == "ntext" || base.contains("char")
}

/// Whether a textual column stores Unicode and needs `N'...'` literals.
pub fn is_unicode_text(decorated_type: &str) -> bool {
    let base = base_of(decorated_type);
    matches!(base.as_str(), "nchar" | "nvarchar" | "ntext")
}

/// Whether a column must be read through `STAsText()` because its native
/// form is binary.
pub fn is_spatial(raw_type: &str) -> bool {
    matches!(base_of(raw_type).as_str(), "geometry" | "geography")
}
