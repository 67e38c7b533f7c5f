//! Minimal selector grammar used to resolve capture targets.
//!
//! Supported forms, optionally comma separated:
//! - `*` every element
//! - `#name` element id
//! - `.name` class
//! - `[data-flip-id=name]` flip identifier (quotes around the value are optional)

use serde::{Deserialize, Serialize};

use crate::error::{FlipError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Any,
    Id(String),
    Class(String),
    FlipId(String),
}

impl Selector {
    /// Parse a selector list.
    pub fn parse_list(input: &str) -> Result<Vec<Selector>> {
        let mut out = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            out.push(Self::parse_one(part)?);
        }
        if out.is_empty() {
            return Err(FlipError::InvalidSelector(input.to_string()));
        }
        Ok(out)
    }

    fn parse_one(part: &str) -> Result<Selector> {
        let invalid = || FlipError::InvalidSelector(part.to_string());
        if part == "*" {
            return Ok(Selector::Any);
        }
        if let Some(name) = part.strip_prefix('#') {
            return valid_name(name).map(Selector::Id).ok_or_else(invalid);
        }
        if let Some(name) = part.strip_prefix('.') {
            return valid_name(name).map(Selector::Class).ok_or_else(invalid);
        }
        if let Some(inner) = part.strip_prefix('[').and_then(|p| p.strip_suffix(']')) {
            let (attr, value) = inner.split_once('=').ok_or_else(invalid)?;
            if attr.trim() != "data-flip-id" {
                return Err(invalid());
            }
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            return valid_name(value).map(Selector::FlipId).ok_or_else(invalid);
        }
        Err(invalid())
    }
}

fn valid_name(name: &str) -> Option<String> {
    let ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    ok.then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let list = Selector::parse_list("#hero, .card,[data-flip-id='a-1'], *").unwrap();
        assert_eq!(
            list,
            vec![
                Selector::Id("hero".into()),
                Selector::Class("card".into()),
                Selector::FlipId("a-1".into()),
                Selector::Any,
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert!(Selector::parse_list("div > p").is_err());
        assert!(Selector::parse_list("#").is_err());
        assert!(Selector::parse_list("[title=x]").is_err());
        assert!(Selector::parse_list(" , ").is_err());
    }
}
