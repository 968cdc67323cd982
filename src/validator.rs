//! Stateless field-level input validation.
//!
//! Handlers build a `Validator`, run the checks their endpoint needs, and
//! finish with the list of offending field names for the 400 response.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

/// Simplified RFC-5322 shape: single `@`, a dot in the host, no whitespace.
fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_match(value)
}

/// Default bound for free-text fields.
pub const MAX_TEXT_LEN: usize = 10_000;

#[derive(Debug, Default)]
pub struct Validator {
    failed_fields: Vec<String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn fail(&mut self, field: &str) -> &mut Self {
        self.failed_fields.push(field.to_string());
        self
    }

    /// Present and non-empty after trimming.
    pub fn required(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.trim().is_empty() => self,
            _ => self.fail(field),
        }
    }

    /// Required and well-formed email address.
    pub fn email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if is_valid_email(v.trim()) => self,
            _ => self.fail(field),
        }
    }

    /// When present, the value must not exceed `max` characters.
    pub fn max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        match value {
            Some(v) if v.chars().count() > max => self.fail(field),
            _ => self,
        }
    }

    /// When present, a finite number within `[lo, hi]`.
    pub fn in_range(&mut self, field: &str, value: Option<f64>, lo: f64, hi: f64) -> &mut Self {
        match value {
            Some(v) if v.is_finite() && v >= lo && v <= hi => self,
            None => self,
            _ => self.fail(field),
        }
    }

    /// Required member of a closed string set.
    pub fn one_of(&mut self, field: &str, value: Option<&str>, allowed: &[&str]) -> &mut Self {
        match value {
            Some(v) if allowed.contains(&v) => self,
            _ => self.fail(field),
        }
    }

    /// When present, an ISO-8601 calendar date (YYYY-MM-DD).
    pub fn iso_date(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if NaiveDate::parse_from_str(v, "%Y-%m-%d").is_err() => self.fail(field),
            _ => self,
        }
    }

    /// When present, a wall-clock time (HH:MM).
    pub fn hhmm_time(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if NaiveTime::parse_from_str(v, "%H:%M").is_err() => self.fail(field),
            _ => self,
        }
    }

    /// Non-empty mapping; used for the assessment responses.
    pub fn non_empty_map(
        &mut self,
        field: &str,
        value: &serde_json::Map<String, serde_json::Value>,
    ) -> &mut Self {
        if value.is_empty() {
            self.fail(field)
        } else {
            self
        }
    }

    pub fn finish(self) -> Result<(), Vec<String>> {
        if self.failed_fields.is_empty() {
            Ok(())
        } else {
            Err(self.failed_fields)
        }
    }
}
