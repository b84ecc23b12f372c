//! Port abstraction over upstream registrar APIs.
//!
//! The [`RegistrarDriver`] trait is the only surface the purchase and search
//! pipelines see; concrete drivers own transport, retry, and response
//! parsing. Driver errors are surfaced to callers, never swallowed.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::DomainName;

use super::define_port_error;

/// Fewest nameservers a registrar accepts.
pub const MIN_NAMESERVERS: usize = 2;

/// Most nameservers a registrar accepts.
pub const MAX_NAMESERVERS: usize = 13;

/// Supported upstream registrars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Porkbun,
    Namecheap,
}

impl Provider {
    /// Lowercase configuration/wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Porkbun => "porkbun",
            Self::Namecheap => "namecheap",
        }
    }

    /// Parse a configuration value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "porkbun" => Some(Self::Porkbun),
            "namecheap" => Some(Self::Namecheap),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a bulk availability answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityEntry {
    pub domain: DomainName,
    pub available: bool,
    /// First-year registration price when the registrar reports one.
    pub price_usd: Option<Decimal>,
    pub premium: bool,
}

/// Priced quotation for a registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub registration_price_usd: Decimal,
    pub icann_fee_usd: Decimal,
    pub privacy_price_usd: Decimal,
    pub total_usd: Decimal,
    pub premium: bool,
}

/// Registrant contact details forwarded to the registrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrantContact {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

/// Registration order sent to a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRequest {
    pub domain: DomainName,
    pub years: u8,
    pub whois_privacy: bool,
    pub contact: RegistrantContact,
}

/// Result of a registration attempt as reported by the registrar.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterReceipt {
    pub order_id: String,
    pub charged_total_usd: Decimal,
    pub success: bool,
    pub message: String,
}

/// Registrar-side lifecycle state of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarDomainState {
    Active,
    Pending,
    Expired,
    NotFound,
    Error,
}

/// Status answer from a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainStatusReport {
    pub state: RegistrarDomainState,
    pub details: String,
}

/// DNS record kinds a driver can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Txt,
    Mx,
    Ns,
}

impl RecordType {
    /// Wire name used by registrar APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Txt => "TXT",
            Self::Mx => "MX",
            Self::Ns => "NS",
        }
    }
}

/// One DNS record to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub record_type: RecordType,
    /// Fully qualified host the record answers for.
    pub name: String,
    pub value: String,
    pub ttl: u32,
    pub prio: Option<u16>,
}

define_port_error! {
    /// Errors surfaced by registrar drivers.
    pub enum RegistrarError {
        /// Non-retryable HTTP failure from the registrar.
        Http { status: u16, message: String } => "registrar returned HTTP {status}: {message}",
        /// The registrar response could not be decoded.
        Parse { message: String } => "registrar response could not be parsed: {message}",
        /// Transport-level failure reaching the registrar.
        Network { message: String } => "registrar unreachable: {message}",
        /// Retry budget exhausted on retryable failures.
        MaxRetries { attempts: u32, message: String } => "registrar call failed after {attempts} attempts: {message}",
        /// The registrar does not serve this TLD.
        TldNotSupported { tld: String } => "registrar does not support the .{tld} TLD",
        /// Nameserver count outside the accepted range.
        InvalidNameserverCount { count: usize } => "nameserver count {count} outside [2, 13]",
        /// Some DNS records applied and some failed.
        DnsApplyPartialFailure { applied: u32, failed: u32, message: String } => "applied {applied} DNS records, {failed} failed: {message}",
    }
}

/// Port for registrar capabilities.
///
/// Implementations must retry transient upstream failures (HTTP 429, 5xx,
/// network errors) internally and report everything else verbatim.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistrarDriver: Send + Sync {
    /// Which upstream this driver talks to.
    fn provider(&self) -> Provider;

    /// Whether mutating calls are simulated rather than issued.
    fn dry_run(&self) -> bool;

    /// Bulk availability with per-item pricing.
    async fn check_availability(
        &self,
        domains: &[DomainName],
    ) -> Result<Vec<AvailabilityEntry>, RegistrarError>;

    /// Price a registration without committing to it.
    async fn quote(
        &self,
        domain: &DomainName,
        years: u8,
        whois_privacy: bool,
    ) -> Result<Quote, RegistrarError>;

    /// Register a domain. Treated as potentially committed upstream even
    /// when it errors; callers must pair it with the idempotency ledger.
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterReceipt, RegistrarError>;

    /// Registrar-side lifecycle state.
    async fn domain_status(
        &self,
        domain: &DomainName,
    ) -> Result<DomainStatusReport, RegistrarError>;

    /// Replace the nameserver set. `nameservers` length must be in [2, 13].
    async fn set_nameservers(
        &self,
        domain: &DomainName,
        nameservers: &[String],
    ) -> Result<(), RegistrarError>;

    /// Create DNS records for a domain the account controls.
    async fn apply_records(
        &self,
        domain: &DomainName,
        records: &[DnsRecord],
    ) -> Result<(), RegistrarError>;
}

/// Fixture implementation for wiring tests: everything is available for
/// 12.00 USD, registrations succeed with a deterministic order id.
#[derive(Debug, Default)]
pub struct FixtureRegistrarDriver;

impl FixtureRegistrarDriver {
    const PRICE_CENTS: i64 = 1200;

    fn price() -> Decimal {
        Decimal::new(Self::PRICE_CENTS, 2)
    }
}

#[async_trait]
impl RegistrarDriver for FixtureRegistrarDriver {
    fn provider(&self) -> Provider {
        Provider::Porkbun
    }

    fn dry_run(&self) -> bool {
        true
    }

    async fn check_availability(
        &self,
        domains: &[DomainName],
    ) -> Result<Vec<AvailabilityEntry>, RegistrarError> {
        Ok(domains
            .iter()
            .map(|domain| AvailabilityEntry {
                domain: domain.clone(),
                available: true,
                price_usd: Some(Self::price()),
                premium: false,
            })
            .collect())
    }

    async fn quote(
        &self,
        _domain: &DomainName,
        years: u8,
        _whois_privacy: bool,
    ) -> Result<Quote, RegistrarError> {
        let years = Decimal::from(years);
        Ok(Quote {
            registration_price_usd: Self::price(),
            icann_fee_usd: crate::domain::money::icann_fee_per_year() * years,
            privacy_price_usd: Decimal::ZERO,
            total_usd: Self::price() * years,
            premium: false,
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterReceipt, RegistrarError> {
        Ok(RegisterReceipt {
            order_id: format!("FIXTURE-{}", request.domain),
            charged_total_usd: Self::price(),
            success: true,
            message: "registered".to_owned(),
        })
    }

    async fn domain_status(
        &self,
        _domain: &DomainName,
    ) -> Result<DomainStatusReport, RegistrarError> {
        Ok(DomainStatusReport {
            state: RegistrarDomainState::NotFound,
            details: "fixture driver".to_owned(),
        })
    }

    async fn set_nameservers(
        &self,
        _domain: &DomainName,
        nameservers: &[String],
    ) -> Result<(), RegistrarError> {
        let count = nameservers.len();
        if !(MIN_NAMESERVERS..=MAX_NAMESERVERS).contains(&count) {
            return Err(RegistrarError::invalid_nameserver_count(count));
        }
        Ok(())
    }

    async fn apply_records(
        &self,
        _domain: &DomainName,
        _records: &[DnsRecord],
    ) -> Result<(), RegistrarError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for provider in [Provider::Porkbun, Provider::Namecheap] {
            assert_eq!(Provider::parse(provider.as_str()), Some(provider));
        }
        assert_eq!(Provider::parse("godaddy"), None);
    }

    #[test]
    fn record_types_use_upstream_names() {
        assert_eq!(RecordType::Aaaa.as_str(), "AAAA");
        assert_eq!(RecordType::Cname.as_str(), "CNAME");
    }

    #[tokio::test]
    async fn fixture_driver_reports_everything_available() {
        let driver = FixtureRegistrarDriver;
        let domains = vec![DomainName::parse("example.com").expect("valid name")];
        let entries = driver
            .check_availability(&domains)
            .await
            .expect("fixture availability succeeds");
        assert_eq!(entries.len(), 1);
        assert!(entries[0].available);
        assert!(!entries[0].premium);
    }

    #[tokio::test]
    async fn fixture_driver_validates_nameserver_count() {
        let driver = FixtureRegistrarDriver;
        let domain = DomainName::parse("example.com").expect("valid name");
        let err = driver
            .set_nameservers(&domain, &["ns1.example.net".to_owned()])
            .await
            .expect_err("single nameserver should fail");
        assert_eq!(err, RegistrarError::invalid_nameserver_count(1_usize));
    }
}
