//! Field validators for spreadsheet cells.
//!
//! Spreadsheet cells arrive loosely typed: a checkbox may come through as a boolean
//! or as the text `"TRUE"`, a status code as a number or as `"301"`. Each validator
//! coerces one [`Cell`] into a typed value, falls back to a default when the cell is
//! absent or blank, and returns a [`ValidationError`] on anything else.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

/// A single loosely typed spreadsheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Blank text counts as absent.
    fn is_blank(&self) -> bool {
        matches!(self, Cell::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("value is missing")]
    Missing,
    #[error("{0} is not a host-relative path or an absolute http(s) URL")]
    InvalidPath(String),
    #[error("{0} is not a recognised boolean")]
    InvalidBoolean(String),
    #[error("{0} is not a number")]
    NotANumber(String),
    #[error("{0} is not a supported redirect status code (301, 302, 307, 308)")]
    UnsupportedCode(String),
}

/// HTTP status codes a bulk redirect may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum RedirectCode {
    MovedPermanently,
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

impl RedirectCode {
    pub fn as_u16(self) -> u16 {
        match self {
            RedirectCode::MovedPermanently => 301,
            RedirectCode::Found => 302,
            RedirectCode::TemporaryRedirect => 307,
            RedirectCode::PermanentRedirect => 308,
        }
    }
}

impl TryFrom<u16> for RedirectCode {
    type Error = ValidationError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            301 => Ok(RedirectCode::MovedPermanently),
            302 => Ok(RedirectCode::Found),
            307 => Ok(RedirectCode::TemporaryRedirect),
            308 => Ok(RedirectCode::PermanentRedirect),
            other => Err(ValidationError::UnsupportedCode(other.to_string())),
        }
    }
}

impl From<RedirectCode> for u16 {
    fn from(code: RedirectCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for RedirectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// True for paths that already carry a scheme and host.
pub fn is_absolute_url(path: &str) -> bool {
    match Url::parse(path) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Validate a source or destination cell.
///
/// Accepts host-relative paths (`/foo`) and absolute `http(s)` URLs. Returns the
/// trimmed value.
pub fn validate_path(value: Option<&Cell>) -> Result<String, ValidationError> {
    let text = match value {
        None => return Err(ValidationError::Missing),
        Some(cell) if cell.is_blank() => return Err(ValidationError::Missing),
        Some(Cell::Text(s)) => s.trim(),
        Some(other) => return Err(ValidationError::InvalidPath(other.to_string())),
    };

    if text.starts_with('/') && !text.starts_with("//") && !text.contains(char::is_whitespace) {
        return Ok(text.to_string());
    }
    if is_absolute_url(text) {
        return Ok(text.to_string());
    }
    Err(ValidationError::InvalidPath(format!("{text:?}")))
}

/// Validate a checkbox-like cell, using `default` when the cell is absent or blank.
pub fn validate_boolean(value: Option<&Cell>, default: bool) -> Result<bool, ValidationError> {
    match value {
        None => Ok(default),
        Some(cell) if cell.is_blank() => Ok(default),
        Some(Cell::Bool(b)) => Ok(*b),
        Some(Cell::Int(1)) => Ok(true),
        Some(Cell::Int(0)) => Ok(false),
        Some(Cell::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" | "on" | "x" => Ok(true),
            "false" | "no" | "n" | "0" | "off" => Ok(false),
            _ => Err(ValidationError::InvalidBoolean(format!("{:?}", s.trim()))),
        },
        Some(other) => Err(ValidationError::InvalidBoolean(other.to_string())),
    }
}

/// Validate a status code cell, using `default` when the cell is absent or blank.
pub fn validate_code(
    value: Option<&Cell>,
    default: RedirectCode,
) -> Result<RedirectCode, ValidationError> {
    let number: i64 = match value {
        None => return Ok(default),
        Some(cell) if cell.is_blank() => return Ok(default),
        Some(Cell::Int(i)) => *i,
        Some(Cell::Float(x)) if x.fract() == 0.0 => *x as i64,
        Some(Cell::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ValidationError::NotANumber(format!("{:?}", s.trim())))?,
        Some(other) => return Err(ValidationError::NotANumber(other.to_string())),
    };

    u16::try_from(number)
        .map_err(|_| ValidationError::UnsupportedCode(number.to_string()))
        .and_then(RedirectCode::try_from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_accepts_relative_and_absolute() {
        assert_eq!(validate_path(Some(&"  /docs ".into())).unwrap(), "/docs");
        assert_eq!(
            validate_path(Some(&"https://other.example/x".into())).unwrap(),
            "https://other.example/x"
        );
    }

    #[test]
    fn path_rejects_garbage() {
        assert_eq!(validate_path(None), Err(ValidationError::Missing));
        assert_eq!(validate_path(Some(&"   ".into())), Err(ValidationError::Missing));
        assert!(validate_path(Some(&"docs/page".into())).is_err());
        assert!(validate_path(Some(&"//cdn.example/x".into())).is_err());
        assert!(validate_path(Some(&"ftp://files.example/x".into())).is_err());
        assert!(validate_path(Some(&Cell::Int(301))).is_err());
    }

    #[test]
    fn boolean_accepts_checkbox_encodings() {
        assert!(validate_boolean(Some(&Cell::Bool(true)), false).unwrap());
        assert!(validate_boolean(Some(&"TRUE".into()), false).unwrap());
        assert!(validate_boolean(Some(&" x ".into()), false).unwrap());
        assert!(!validate_boolean(Some(&"False".into()), true).unwrap());
        assert!(!validate_boolean(Some(&Cell::Int(0)), true).unwrap());
    }

    #[test]
    fn boolean_defaults_when_absent_and_rejects_garbage() {
        assert!(validate_boolean(None, true).unwrap());
        assert!(!validate_boolean(Some(&"".into()), false).unwrap());
        assert!(matches!(
            validate_boolean(Some(&"maybe".into()), false),
            Err(ValidationError::InvalidBoolean(_))
        ));
        assert!(validate_boolean(Some(&Cell::Int(2)), false).is_err());
    }

    #[test]
    fn code_coerces_numbers_and_strings() {
        let default = RedirectCode::Found;
        assert_eq!(
            validate_code(Some(&Cell::Int(301)), default).unwrap(),
            RedirectCode::MovedPermanently
        );
        assert_eq!(
            validate_code(Some(&Cell::Float(308.0)), default).unwrap(),
            RedirectCode::PermanentRedirect
        );
        assert_eq!(
            validate_code(Some(&" 307 ".into()), default).unwrap(),
            RedirectCode::TemporaryRedirect
        );
        assert_eq!(validate_code(None, default).unwrap(), RedirectCode::Found);
    }

    #[test]
    fn code_rejects_unsupported_values() {
        let default = RedirectCode::Found;
        assert!(matches!(
            validate_code(Some(&Cell::Int(200)), default),
            Err(ValidationError::UnsupportedCode(_))
        ));
        assert!(matches!(
            validate_code(Some(&"moved".into()), default),
            Err(ValidationError::NotANumber(_))
        ));
        assert!(validate_code(Some(&Cell::Int(-301)), default).is_err());
        assert!(validate_code(Some(&Cell::Float(301.5)), default).is_err());
    }
}
