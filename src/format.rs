//! Named string formats.
//!
//! A string type may carry `format: "<name>"`; the name is looked up here when
//! a value is validated, so formats can be registered after schemas are
//! built. Registration normally happens once at startup.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;

use crate::error::{Error, Result, ValidationError};
use crate::make::{Make, Maker};

static FORMATS: Lazy<RwLock<FormatRegistry>> = Lazy::new(|| RwLock::new(FormatRegistry::with_builtins()));

#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: HashMap<String, Maker>,
}

impl FormatRegistry {
    /// `date-time`, `date` and `uri`.
    pub fn with_builtins() -> Self {
        let mut registry = FormatRegistry::default();
        registry.formats.insert("date-time".to_string(), string_check("RFC 3339 date-time", is_date_time));
        registry.formats.insert("date".to_string(), string_check("YYYY-MM-DD date", is_date));
        registry.formats.insert("uri".to_string(), string_check("URI", looks_like_uri));
        registry
    }

    pub fn register(&mut self, name: &str, maker: Maker) -> Result<()> {
        if self.formats.contains_key(name) {
            return Err(Error::DuplicateFormat(name.to_string()));
        }
        self.formats.insert(name.to_string(), maker);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Maker> {
        self.formats.get(name)
    }
}

/// Adds a format to the process-wide registry. Names are registered once.
pub fn register_format(name: &str, maker: Maker) -> Result<()> {
    let mut registry = FORMATS.write().unwrap_or_else(PoisonError::into_inner);
    registry.register(name, maker)?;
    tracing::debug!(format = name, "registered string format");
    Ok(())
}

pub fn lookup_format(name: &str) -> Option<Maker> {
    let registry = FORMATS.read().unwrap_or_else(PoisonError::into_inner);
    registry.get(name).cloned()
}

fn string_check(what: &'static str, accept: fn(&str) -> bool) -> Maker {
    Maker::new(move |value, _| match value.as_str() {
        Some(s) if accept(s) => Make::success(value.clone()),
        _ => Make::fail(ValidationError::new(format!("expected {what}"))),
    })
}

fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

fn looks_like_uri(s: &str) -> bool {
    ["http://", "https://", "mailto:", "tel:", "urn:"]
        .iter()
        .any(|scheme| s.len() > scheme.len() && s.starts_with(scheme))
}
