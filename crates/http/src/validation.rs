//! Field-level validation of JSON request bodies.
//!
//! [`Fields`] reads typed values out of a JSON object and accumulates one
//! message list per field, so a handler reports every problem at once.
//! Value rules (lengths, ranges, formats) are declared on `validator`
//! forms and folded into the same map through [`Fields::check`].

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use url::{Host, Url};
use validator::{Validate, ValidationError};

use crate::error::{AppError, FieldErrors};

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";
pub const INVALID_STRING: &str = "Not a valid string.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const INVALID_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";
pub const INVALID_VALUE: &str = "Invalid value.";

const MAX_EMAIL_LENGTH: usize = 320;

static EMAIL_USER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"(?i)^(?:[-!#$%&'*+/=?^_`{}|~0-9A-Z]+(?:\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*"#,
        r#"|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")\z"#,
    ))
    .expect("email user pattern")
});

static EMAIL_DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z0-9-]{1,62}[A-Z0-9]\z")
        .expect("email domain pattern")
});

static EMAIL_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[([A-F0-9:.]+)\]\z").expect("email literal pattern")
});

/// Name of a JSON value's type as reported in validation messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Email address with a dot-atom or quoted local part and a host name
/// carrying a top-level domain, `localhost`, or a bracketed IP literal.
/// Internationalized domains are checked in their punycode form.
pub fn email_address(value: &str) -> Result<(), ValidationError> {
    let invalid = || Err(ValidationError::new("email"));

    if value.is_empty() || value.len() > MAX_EMAIL_LENGTH {
        return invalid();
    }
    let Some((user, domain)) = value.rsplit_once('@') else {
        return invalid();
    };
    if !EMAIL_USER.is_match(user) {
        return invalid();
    }
    if domain == "localhost" || valid_email_domain(domain) {
        return Ok(());
    }
    match Host::parse(domain) {
        Ok(Host::Domain(ascii)) if ascii != domain && valid_email_domain(&ascii) => Ok(()),
        _ => invalid(),
    }
}

fn valid_email_domain(domain: &str) -> bool {
    if EMAIL_DOMAIN.is_match(domain) {
        return true;
    }
    EMAIL_LITERAL
        .captures(domain)
        .and_then(|caps| caps.get(1))
        .is_some_and(|ip| validator::validate_ip(ip.as_str()))
}

/// http, https, ftp and ftps locations with a host
pub fn web_url(value: &str) -> Result<(), ValidationError> {
    let valid = Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https" | "ftp" | "ftps")
            && url.host_str().is_some_and(|host| !host.is_empty())
    });
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("url"))
    }
}

/// Message for a failed rule. An explicit `message` wins; built-in length
/// and range rules are phrased from their parameters.
pub fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let param = |key: &str| error.params.get(key).and_then(Value::as_f64);

    match &*error.code {
        "length" => match (param("max"), param("min")) {
            (Some(max), _) => format!("Ensure this field has no more than {max} characters."),
            (None, Some(min)) => format!("Ensure this field has at least {min} characters."),
            _ => INVALID_VALUE.to_string(),
        },
        "range" => match (param("value"), param("min"), param("max")) {
            (Some(value), Some(min), _) if value < min => {
                format!("Ensure this value is greater than or equal to {min}.")
            }
            (Some(_), _, Some(max)) => format!("Ensure this value is less than or equal to {max}."),
            _ => INVALID_VALUE.to_string(),
        },
        _ => INVALID_VALUE.to_string(),
    }
}

/// Reader over a request object that collects per-field errors
pub struct Fields<'a> {
    data: &'a Map<String, Value>,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    pub fn new(data: &'a Map<String, Value>) -> Self {
        Self {
            data,
            errors: FieldErrors::new(),
        }
    }

    /// Record a message against a field
    pub fn reject(&mut self, name: &str, message: impl Into<String>) {
        self.errors
            .entry(name.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn has_error(&self, name: &str) -> bool {
        self.errors.contains_key(name)
    }

    /// Run a form's declared rules and record every failure under its field
    pub fn check<T: Validate>(&mut self, form: &T) {
        let Err(failures) = form.validate() else {
            return;
        };
        for (name, errors) in failures.field_errors() {
            for error in errors.iter() {
                self.reject(name, describe(error));
            }
        }
    }

    /// Mandatory, non-blank text
    pub fn required_string(&mut self, name: &str) -> Option<String> {
        let value = self.present(name)?;
        let text = self.text(name, value)?;
        if text.is_empty() {
            self.reject(name, NOT_BLANK);
            return None;
        }
        Some(text)
    }

    /// Text that may be absent or blank but never null
    pub fn optional_string(&mut self, name: &str) -> Option<String> {
        let value = self.data.get(name)?;
        if value.is_null() {
            self.reject(name, NOT_NULL);
            return None;
        }
        self.text(name, value)
    }

    /// Text where absent and null both read as `None`; blank is allowed
    pub fn nullable_string(&mut self, name: &str) -> Option<String> {
        let value = self.data.get(name).filter(|v| !v.is_null())?;
        self.text(name, value)
    }

    /// Mandatory integer; whole floats and numeric strings are accepted
    pub fn required_int(&mut self, name: &str) -> Option<i64> {
        let value = self.present(name)?;
        let number = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if number.is_none() {
            self.reject(name, INVALID_INTEGER);
        }
        number
    }

    /// Mandatory primary key reference; existence is checked by the caller
    pub fn required_pk(&mut self, name: &str) -> Option<i64> {
        let value = self.present(name)?;
        let pk = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        if pk.is_none() {
            self.reject(
                name,
                format!(
                    "Incorrect type. Expected pk value, received {}.",
                    type_name(value)
                ),
            );
        }
        pk
    }

    /// Mandatory calendar date in `YYYY-MM-DD` form
    pub fn required_date(&mut self, name: &str) -> Option<NaiveDate> {
        let value = self.present(name)?;
        let parsed = value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok());
        if parsed.is_none() {
            self.reject(name, INVALID_DATE);
        }
        parsed
    }

    /// Finish reading; fails with every collected message
    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.errors))
        }
    }

    fn present(&mut self, name: &str) -> Option<&'a Value> {
        match self.data.get(name) {
            None => {
                self.reject(name, REQUIRED);
                None
            }
            Some(Value::Null) => {
                self.reject(name, NOT_NULL);
                None
            }
            Some(value) => Some(value),
        }
    }

    // Numbers are accepted as text, surrounding whitespace is dropped
    fn text(&mut self, name: &str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => {
                self.reject(name, INVALID_STRING);
                None
            }
        }
    }
}
