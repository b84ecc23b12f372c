//! Porkbun driver: JSON-over-POST with credentials in the request body.
//!
//! Every call POSTs a JSON document carrying the API key pair. Mutating
//! endpoints honour dry-run mode: no request is issued and a synthesized
//! success comes back with a `PB-DRYRUN-` order id so operators can tell
//! simulated orders from real ones at a glance.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::DomainName;
use crate::domain::money;
use crate::domain::ports::{
    AvailabilityEntry, DnsRecord, DomainStatusReport, MAX_NAMESERVERS, MIN_NAMESERVERS, Provider,
    Quote, RegisterReceipt, RegisterRequest, RegistrarDomainState, RegistrarDriver, RegistrarError,
};

use super::pricing_cache::{PricingCache, TldPricing};
use super::retry::{MAX_ATTEMPTS, status_is_retryable, wait_before_retry};

const DEFAULT_BASE_URL: &str = "https://api.porkbun.com/api/json/v3";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const AVAILABILITY_CONCURRENCY: usize = 5;

/// Order-id prefix marking simulated registrations.
pub const DRY_RUN_ORDER_PREFIX: &str = "PB-DRYRUN-";

/// API key pair sent in every request body.
#[derive(Debug, Clone)]
pub struct PorkbunCredentials {
    pub api_key: String,
    pub secret_key: String,
}

/// Porkbun registrar driver.
pub struct PorkbunDriver {
    client: Client,
    base_url: Url,
    credentials: PorkbunCredentials,
    dry_run: bool,
    pricing: PricingCache,
}

impl PorkbunDriver {
    /// Build a driver against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(credentials: PorkbunCredentials, dry_run: bool) -> Result<Self, RegistrarError> {
        let base_url = Url::parse(DEFAULT_BASE_URL).expect("default base URL parses");
        Self::with_base_url(credentials, dry_run, base_url)
    }

    /// Build a driver against an explicit endpoint (tests, staging).
    pub fn with_base_url(
        credentials: PorkbunCredentials,
        dry_run: bool,
        base_url: Url,
    ) -> Result<Self, RegistrarError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| RegistrarError::network(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            credentials,
            dry_run,
            pricing: PricingCache::new(),
        })
    }

    #[cfg(test)]
    pub(crate) async fn prime_pricing(&self, tld: &str, pricing: TldPricing) {
        self.pricing.insert(tld, pricing).await;
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// POST `body` (plus credentials) to `path`, retrying transient
    /// failures with exponential backoff.
    async fn post(
        &self,
        path: &str,
        mut body: serde_json::Value,
    ) -> Result<serde_json::Value, RegistrarError> {
        if let Some(object) = body.as_object_mut() {
            object.insert("apikey".to_owned(), json!(self.credentials.api_key));
            object.insert(
                "secretapikey".to_owned(),
                json!(self.credentials.secret_key),
            );
        }
        let endpoint = self.endpoint(path);

        let mut last_transient = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.client.post(&endpoint).json(&body).send().await {
                Ok(response) => response,
                Err(err) => {
                    last_transient = err.to_string();
                    debug!(path, attempt, error = %last_transient, "porkbun transport error");
                    if attempt < MAX_ATTEMPTS {
                        wait_before_retry(attempt).await;
                        continue;
                    }
                    return Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient));
                }
            };

            let status = response.status();
            let bytes = response
                .bytes()
                .await
                .map_err(|err| RegistrarError::network(err.to_string()))?;

            if status_is_retryable(status) {
                last_transient = format!("status {}", status.as_u16());
                warn!(path, attempt, status = status.as_u16(), "porkbun transient failure");
                if attempt < MAX_ATTEMPTS {
                    wait_before_retry(attempt).await;
                    continue;
                }
                return Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient));
            }

            if !status.is_success() {
                return Err(RegistrarError::http(
                    status.as_u16(),
                    body_preview(bytes.as_ref()),
                ));
            }

            let decoded: serde_json::Value = serde_json::from_slice(bytes.as_ref())
                .map_err(|err| RegistrarError::parse(format!("invalid JSON payload: {err}")))?;
            if decoded.get("status").and_then(serde_json::Value::as_str) == Some("ERROR") {
                let message = decoded
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unspecified API error");
                return Err(RegistrarError::http(status.as_u16(), message));
            }
            return Ok(decoded);
        }

        Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient))
    }

    async fn check_one(&self, domain: &DomainName) -> Result<AvailabilityEntry, RegistrarError> {
        let value = self
            .post(&format!("domain/checkDomain/{domain}"), json!({}))
            .await?;
        let decoded: CheckDomainDto = parse_dto(value)?;
        let response = decoded
            .response
            .ok_or_else(|| RegistrarError::parse("checkDomain response missing body"))?;

        let price_usd = response
            .price
            .as_deref()
            .map(parse_price)
            .transpose()?;
        Ok(AvailabilityEntry {
            domain: domain.clone(),
            available: response.avail == "yes",
            price_usd,
            premium: response.premium.as_deref() == Some("yes"),
        })
    }

    /// Per-TLD pricing, served from the cache while fresh.
    async fn tld_pricing(&self, tld: &str) -> Result<TldPricing, RegistrarError> {
        if let Some(cached) = self.pricing.get(tld).await {
            return Ok(cached);
        }

        let value = self.post("pricing/get", json!({})).await?;
        let decoded: PricingDto = parse_dto(value)?;
        let mut requested = None;
        for (entry_tld, entry) in decoded.pricing {
            let pricing = TldPricing {
                price: parse_price(&entry.registration)?,
                premium: entry.premium.unwrap_or(false),
                privacy_price: entry
                    .privacy
                    .as_deref()
                    .map(parse_price)
                    .transpose()?
                    .unwrap_or(Decimal::ZERO),
            };
            if entry_tld == tld {
                requested = Some(pricing.clone());
            }
            self.pricing.insert(&entry_tld, pricing).await;
        }

        requested.ok_or_else(|| RegistrarError::tld_not_supported(tld))
    }

    fn synthesized_receipt(&self, quote: &Quote) -> RegisterReceipt {
        RegisterReceipt {
            order_id: format!("{DRY_RUN_ORDER_PREFIX}{}", Uuid::new_v4()),
            charged_total_usd: quote.total_usd,
            success: true,
            message: "dry-run: registration simulated".to_owned(),
        }
    }
}

#[async_trait]
impl RegistrarDriver for PorkbunDriver {
    fn provider(&self) -> Provider {
        Provider::Porkbun
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }

    async fn check_availability(
        &self,
        domains: &[DomainName],
    ) -> Result<Vec<AvailabilityEntry>, RegistrarError> {
        let futures: Vec<
            std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<AvailabilityEntry, RegistrarError>> + Send + '_>,
            >,
        > = domains.iter().map(|domain| Box::pin(self.check_one(domain)) as _).collect();
        stream::iter(futures)
            .buffered(AVAILABILITY_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    async fn quote(
        &self,
        domain: &DomainName,
        years: u8,
        whois_privacy: bool,
    ) -> Result<Quote, RegistrarError> {
        let pricing = self.tld_pricing(domain.tld()).await?;
        let years_dec = Decimal::from(years);
        let icann = money::icann_fee_per_year() * years_dec;
        let privacy = if whois_privacy {
            pricing.privacy_price
        } else {
            Decimal::ZERO
        };
        let total = money::round_usd(pricing.price * years_dec + icann + privacy);
        Ok(Quote {
            registration_price_usd: pricing.price,
            icann_fee_usd: icann,
            privacy_price_usd: privacy,
            total_usd: total,
            premium: pricing.premium,
        })
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterReceipt, RegistrarError> {
        let quote = self
            .quote(&request.domain, request.years, request.whois_privacy)
            .await?;
        if self.dry_run {
            debug!(domain = %request.domain, "dry-run register");
            return Ok(self.synthesized_receipt(&quote));
        }

        let value = self
            .post(
                "domain/create",
                json!({
                    "domain": request.domain.as_str(),
                    "years": request.years,
                    "whoisPrivacy": request.whois_privacy,
                    "registrant": {
                        "firstName": request.contact.first_name,
                        "lastName": request.contact.last_name,
                        "email": request.contact.email,
                        "phone": request.contact.phone,
                        "address": request.contact.address1,
                        "city": request.contact.city,
                        "state": request.contact.state,
                        "zip": request.contact.zip,
                        "country": request.contact.country,
                    },
                }),
            )
            .await?;
        let decoded: CreateDomainDto = parse_dto(value)?;
        let charged = decoded
            .total
            .as_deref()
            .map(parse_price)
            .transpose()?
            .unwrap_or(quote.total_usd);
        Ok(RegisterReceipt {
            order_id: decoded
                .order_id
                .ok_or_else(|| RegistrarError::parse("create response missing orderId"))?,
            charged_total_usd: charged,
            success: decoded.status == "SUCCESS",
            message: decoded.message.unwrap_or_else(|| "registered".to_owned()),
        })
    }

    async fn domain_status(
        &self,
        domain: &DomainName,
    ) -> Result<DomainStatusReport, RegistrarError> {
        let value = self
            .post(&format!("domain/getStatus/{domain}"), json!({}))
            .await?;
        let decoded: DomainStatusDto = parse_dto(value)?;
        let state = match decoded.domain_status.as_deref() {
            Some("active") => RegistrarDomainState::Active,
            Some("pending") => RegistrarDomainState::Pending,
            Some("expired") => RegistrarDomainState::Expired,
            Some("not_found") | None => RegistrarDomainState::NotFound,
            Some(_) => RegistrarDomainState::Error,
        };
        Ok(DomainStatusReport {
            state,
            details: decoded.details.unwrap_or_default(),
        })
    }

    async fn set_nameservers(
        &self,
        domain: &DomainName,
        nameservers: &[String],
    ) -> Result<(), RegistrarError> {
        let count = nameservers.len();
        if !(MIN_NAMESERVERS..=MAX_NAMESERVERS).contains(&count) {
            return Err(RegistrarError::invalid_nameserver_count(count));
        }
        if self.dry_run {
            debug!(domain = %domain, count, "dry-run set_nameservers");
            return Ok(());
        }

        self.post(
            &format!("domain/updateNs/{domain}"),
            json!({ "ns": nameservers }),
        )
        .await
        .map(|_| ())
    }

    async fn apply_records(
        &self,
        domain: &DomainName,
        records: &[DnsRecord],
    ) -> Result<(), RegistrarError> {
        if self.dry_run {
            debug!(domain = %domain, count = records.len(), "dry-run apply_records");
            return Ok(());
        }

        // Porkbun creates one record per call, so a batch can land
        // partially. Report exactly what happened.
        let mut applied = 0_u32;
        let mut failed = 0_u32;
        let mut first_error: Option<RegistrarError> = None;
        for record in records {
            let result = self
                .post(
                    &format!("dns/create/{domain}"),
                    json!({
                        "type": record.record_type.as_str(),
                        "name": record.name,
                        "content": record.value,
                        "ttl": record.ttl,
                        "prio": record.prio,
                    }),
                )
                .await;
            match result {
                Ok(_) => applied += 1,
                Err(err) => {
                    failed += 1;
                    first_error.get_or_insert(err);
                }
            }
        }

        match (applied, failed) {
            (_, 0) => Ok(()),
            (0, _) => Err(first_error.expect("failed > 0 implies a stored error")),
            (applied, failed) => {
                let message = first_error
                    .map(|err| err.to_string())
                    .unwrap_or_default();
                Err(RegistrarError::dns_apply_partial_failure(
                    applied, failed, message,
                ))
            }
        }
    }
}

fn parse_dto<T: for<'de> Deserialize<'de>>(value: serde_json::Value) -> Result<T, RegistrarError> {
    serde_json::from_value(value)
        .map_err(|err| RegistrarError::parse(format!("unexpected response shape: {err}")))
}

fn parse_price(raw: &str) -> Result<Decimal, RegistrarError> {
    Decimal::from_str(raw)
        .map(money::round_usd)
        .map_err(|err| RegistrarError::parse(format!("invalid price {raw:?}: {err}")))
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[derive(Debug, Deserialize)]
struct CheckDomainDto {
    #[expect(dead_code, reason = "status handled generically before decoding")]
    status: String,
    response: Option<CheckDomainResponseDto>,
}

#[derive(Debug, Deserialize)]
struct CheckDomainResponseDto {
    avail: String,
    #[serde(default)]
    premium: Option<String>,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PricingDto {
    #[expect(dead_code, reason = "status handled generically before decoding")]
    status: String,
    pricing: std::collections::HashMap<String, TldPricingDto>,
}

#[derive(Debug, Deserialize)]
struct TldPricingDto {
    registration: String,
    #[serde(default)]
    premium: Option<bool>,
    #[serde(default)]
    privacy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateDomainDto {
    status: String,
    #[serde(rename = "orderId")]
    order_id: Option<String>,
    #[serde(default)]
    total: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainStatusDto {
    #[serde(rename = "domainStatus")]
    domain_status: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::RegistrantContact;
    use rstest::rstest;

    fn test_driver(dry_run: bool) -> PorkbunDriver {
        // Unroutable endpoint: any accidental network call fails fast.
        let base = Url::parse("http://127.0.0.1:9/api/json/v3").expect("url parses");
        PorkbunDriver::with_base_url(
            PorkbunCredentials {
                api_key: "pk1_test".to_owned(),
                secret_key: "sk1_test".to_owned(),
            },
            dry_run,
            base,
        )
        .expect("driver builds")
    }

    fn contact() -> RegistrantContact {
        RegistrantContact {
            first_name: "Ada".to_owned(),
            last_name: "Winston".to_owned(),
            email: "ops@example.net".to_owned(),
            phone: "+1.5555550100".to_owned(),
            address1: "1 Main St".to_owned(),
            city: "Springfield".to_owned(),
            state: "IL".to_owned(),
            zip: "62701".to_owned(),
            country: "US".to_owned(),
        }
    }

    fn name(raw: &str) -> DomainName {
        DomainName::parse(raw).expect("valid name")
    }

    async fn primed_driver(dry_run: bool) -> PorkbunDriver {
        let driver = test_driver(dry_run);
        driver
            .prime_pricing("com", TldPricing {
                price: Decimal::new(968, 2),
                premium: false,
                privacy_price: Decimal::new(200, 2),
            })
            .await;
        driver
    }

    #[tokio::test]
    async fn quote_applies_the_pricing_formula() {
        let driver = primed_driver(true).await;

        let quote = driver
            .quote(&name("example.com"), 2, true)
            .await
            .expect("quote from cache");
        // 9.68 * 2 + 0.18 * 2 + 2.00 = 21.72
        assert_eq!(quote.total_usd, Decimal::new(2172, 2));
        assert_eq!(quote.icann_fee_usd, Decimal::new(36, 2));
        assert!(!quote.premium);
    }

    #[tokio::test]
    async fn quote_without_privacy_skips_the_privacy_price() {
        let driver = primed_driver(true).await;

        let quote = driver
            .quote(&name("example.com"), 1, false)
            .await
            .expect("quote from cache");
        // 9.68 + 0.18 = 9.86
        assert_eq!(quote.total_usd, Decimal::new(986, 2));
        assert_eq!(quote.privacy_price_usd, Decimal::ZERO);
    }

    #[tokio::test]
    async fn dry_run_register_synthesizes_a_marked_order() {
        let driver = primed_driver(true).await;

        let receipt = driver
            .register(&RegisterRequest {
                domain: name("example.com"),
                years: 1,
                whois_privacy: true,
                contact: contact(),
            })
            .await
            .expect("dry-run register succeeds without network");

        assert!(receipt.success);
        assert!(
            receipt.order_id.starts_with(DRY_RUN_ORDER_PREFIX),
            "synthesized orders must be distinguishable: {}",
            receipt.order_id
        );
        // 9.68 + 0.18 + 2.00
        assert_eq!(receipt.charged_total_usd, Decimal::new(1186, 2));
    }

    #[tokio::test]
    async fn dry_run_skips_mutating_dns_calls() {
        let driver = primed_driver(true).await;
        let domain = name("example.com");

        driver
            .set_nameservers(
                &domain,
                &["ns1.example.net".to_owned(), "ns2.example.net".to_owned()],
            )
            .await
            .expect("dry-run set_nameservers is a no-op");
        driver
            .apply_records(&domain, &[])
            .await
            .expect("dry-run apply_records is a no-op");
    }

    #[rstest]
    #[case::too_few(1)]
    #[case::too_many(14)]
    #[tokio::test]
    async fn nameserver_count_is_validated_before_any_call(#[case] count: usize) {
        let driver = test_driver(true);
        let nameservers: Vec<String> = (0..count).map(|i| format!("ns{i}.example.net")).collect();

        let err = driver
            .set_nameservers(&name("example.com"), &nameservers)
            .await
            .expect_err("count outside [2, 13]");
        assert_eq!(err, RegistrarError::invalid_nameserver_count(count));
    }

    #[test]
    fn check_domain_payloads_decode() {
        let value = serde_json::json!({
            "status": "SUCCESS",
            "response": { "avail": "yes", "premium": "no", "price": "12.00" }
        });
        let decoded: CheckDomainDto = parse_dto(value).expect("payload decodes");
        let response = decoded.response.expect("body present");
        assert_eq!(response.avail, "yes");
        assert_eq!(response.price.as_deref(), Some("12.00"));
    }

    #[test]
    fn malformed_prices_are_parse_errors() {
        let err = parse_price("twelve dollars").expect_err("price must be decimal");
        assert!(matches!(err, RegistrarError::Parse { .. }));
    }

    #[tokio::test]
    async fn transport_failures_exhaust_the_retry_budget() {
        let driver = primed_driver(false).await;

        // Real-mode register against the unroutable endpoint must burn all
        // attempts and surface MaxRetries.
        let err = driver
            .register(&RegisterRequest {
                domain: name("example.com"),
                years: 1,
                whois_privacy: false,
                contact: contact(),
            })
            .await
            .expect_err("unroutable endpoint fails");
        assert!(
            matches!(err, RegistrarError::MaxRetries { attempts: 3, .. }),
            "unexpected error: {err:?}"
        );
    }
}
