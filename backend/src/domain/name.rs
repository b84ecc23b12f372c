//! Validated domain-name value type and TLD allowlist.
//!
//! Every name entering the system passes through [`DomainName::parse`], which
//! trims, lowercases, and enforces the wire syntax. Downstream code can rely
//! on a `DomainName` being normalized and splittable into label and TLD.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Wire syntax for a registrable name: one label, one dot, alphabetic TLD.
static DOMAIN_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]?\.[a-zA-Z]{2,}$")
        .expect("domain syntax regex compiles")
});

const MIN_NAME_LEN: usize = 3;
const MAX_NAME_LEN: usize = 253;

/// Validation errors for [`DomainName`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainNameError {
    /// The name was empty or outside the [3, 253] length window.
    InvalidLength { actual: usize },
    /// The name did not match the required `label.tld` syntax.
    InvalidSyntax,
}

impl fmt::Display for DomainNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength { actual } => {
                write!(
                    f,
                    "domain name length must be within [{MIN_NAME_LEN}, {MAX_NAME_LEN}], got {actual}"
                )
            }
            Self::InvalidSyntax => {
                write!(f, "domain name must match label.tld with an alphabetic TLD")
            }
        }
    }
}

impl std::error::Error for DomainNameError {}

/// Normalized, syntactically valid domain name.
///
/// # Examples
///
/// ```
/// # use backend::domain::DomainName;
/// let name = DomainName::parse("  Example.COM ").expect("valid name");
/// assert_eq!(name.as_str(), "example.com");
/// assert_eq!(name.label(), "example");
/// assert_eq!(name.tld(), "com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainName(String);

impl DomainName {
    /// Trim, lowercase, and validate a raw name.
    ///
    /// # Errors
    ///
    /// Returns [`DomainNameError::InvalidLength`] when the trimmed name falls
    /// outside [3, 253] characters, or [`DomainNameError::InvalidSyntax`]
    /// when it does not match the `label.tld` shape.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainNameError> {
        let normalized = raw.as_ref().trim().to_lowercase();
        let len = normalized.len();
        if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
            return Err(DomainNameError::InvalidLength { actual: len });
        }
        if !DOMAIN_SYNTAX.is_match(&normalized) {
            return Err(DomainNameError::InvalidSyntax);
        }
        Ok(Self(normalized))
    }

    /// Normalized name text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The label before the final dot.
    pub fn label(&self) -> &str {
        self.split().0
    }

    /// The TLD after the final dot, without the dot.
    pub fn tld(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        self.0
            .rsplit_once('.')
            .expect("validated names always contain a dot")
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DomainName {
    type Error = DomainNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Configured set of permitted TLDs. Empty means every TLD is permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TldAllowlist(Vec<String>);

impl TldAllowlist {
    /// Build an allowlist from raw entries, lowercasing and dropping blanks.
    pub fn new(tlds: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        let entries = tlds
            .into_iter()
            .map(|tld| tld.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|tld| !tld.is_empty())
            .collect();
        Self(entries)
    }

    /// Parse a comma-separated configuration value.
    pub fn from_csv(raw: &str) -> Self {
        Self::new(raw.split(','))
    }

    /// Whether the allowlist permits every TLD.
    pub fn is_open(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `tld` is permitted.
    pub fn permits(&self, tld: &str) -> bool {
        self.is_open() || self.0.iter().any(|entry| entry == tld)
    }

    /// Configured entries, in configuration order.
    pub fn entries(&self) -> &[String] {
        &self.0
    }
}
