use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgeError {
    #[error("expected max age to have 2 parts: the value and the unit. Got '{input}'")]
    WrongNumberOfParts { input: String },

    #[error("expected max age to start with an integer, got '{value}'")]
    NotAnInteger { value: String },

    #[error("expected max age value '{value}' to fit into an unsigned 64 bit integer")]
    ValueOutOfRange { value: String },

    #[error("expected max age to contain an alphabetic string for the unit, got '{unit}'")]
    NotAUnit { unit: String },
}

/// Maximum age of reports, as accepted by the service's `--max-age` flag.
///
/// Written as an integer and a unit, separated by exactly one space: `"90 days"`. Surrounding or
/// embedded double quotes are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaxAge {
    value: u64,
    unit: String,
}

impl MaxAge {
    pub fn new(value: u64, unit: impl Into<String>) -> Result<Self, AgeError> {
        let unit = unit.into();
        if unit.is_empty() || !unit.chars().all(char::is_alphabetic) {
            return Err(AgeError::NotAUnit { unit });
        }
        Ok(Self { value, unit })
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The command line flag handing this age to the service.
    pub fn to_flag(&self) -> String {
        format!("--max-age={self}")
    }
}

impl Display for MaxAge {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for MaxAge {
    type Err = AgeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        parse_max_age(input)
    }
}

/// Validates `input` as `"<digits> <letters>"`.
pub fn parse_max_age(input: &str) -> Result<MaxAge, AgeError> {
    let unquoted = input.replace('"', "");
    let items: Vec<&str> = unquoted.split(' ').collect();
    let [value, unit] = items.as_slice() else {
        return Err(AgeError::WrongNumberOfParts {
            input: input.to_owned(),
        });
    };

    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(AgeError::NotAnInteger {
            value: (*value).to_owned(),
        });
    }
    let value = value.parse::<u64>().map_err(|_| AgeError::ValueOutOfRange {
        value: (*value).to_owned(),
    })?;

    MaxAge::new(value, *unit)
}
