//! Namecheap driver: XML responses over GET with query-string credentials.
//!
//! Every command is a GET against `xml.response` with the credential
//! quadruple and a `Command` name; answers arrive as attribute-heavy XML
//! decoded with `quick-xml`. API-level failures come back as HTTP 200 with
//! `Status="ERROR"` and an `<Errors>` list, translated here into driver
//! errors.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
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

const DEFAULT_BASE_URL: &str = "https://api.namecheap.com/xml.response";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const AVAILABILITY_CONCURRENCY: usize = 5;

/// Order-id prefix marking simulated registrations.
pub const DRY_RUN_ORDER_PREFIX: &str = "NC-DRYRUN-";

/// Credential quadruple required on every command.
#[derive(Debug, Clone)]
pub struct NamecheapCredentials {
    pub api_user: String,
    pub api_key: String,
    pub username: String,
    pub client_ip: String,
}

/// Namecheap registrar driver.
pub struct NamecheapDriver {
    client: Client,
    base_url: Url,
    credentials: NamecheapCredentials,
    dry_run: bool,
    pricing: PricingCache,
}

impl NamecheapDriver {
    /// Build a driver against the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(credentials: NamecheapCredentials, dry_run: bool) -> Result<Self, RegistrarError> {
        let base_url = Url::parse(DEFAULT_BASE_URL).expect("default base URL parses");
        Self::with_base_url(credentials, dry_run, base_url)
    }

    /// Build a driver against an explicit endpoint (tests, sandbox).
    pub fn with_base_url(
        credentials: NamecheapCredentials,
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

    /// GET `command` with `params`, retrying transient failures.
    async fn command<T: DeserializeOwned>(
        &self,
        command: &str,
        params: &[(String, String)],
    ) -> Result<T, RegistrarError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("ApiUser", &self.credentials.api_user)
            .append_pair("ApiKey", &self.credentials.api_key)
            .append_pair("UserName", &self.credentials.username)
            .append_pair("ClientIp", &self.credentials.client_ip)
            .append_pair("Command", command);
        for (name, value) in params {
            url.query_pairs_mut().append_pair(name, value);
        }

        let mut last_transient = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let response = match self.client.get(url.clone()).send().await {
                Ok(response) => response,
                Err(err) => {
                    last_transient = err.to_string();
                    debug!(command, attempt, error = %last_transient, "namecheap transport error");
                    if attempt < MAX_ATTEMPTS {
                        wait_before_retry(attempt).await;
                        continue;
                    }
                    return Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient));
                }
            };

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|err| RegistrarError::network(err.to_string()))?;

            if status_is_retryable(status) {
                last_transient = format!("status {}", status.as_u16());
                warn!(command, attempt, status = status.as_u16(), "namecheap transient failure");
                if attempt < MAX_ATTEMPTS {
                    wait_before_retry(attempt).await;
                    continue;
                }
                return Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient));
            }

            if !status.is_success() {
                return Err(RegistrarError::http(status.as_u16(), text));
            }

            let decoded: ApiResponseDto<T> = parse_xml(&text)?;
            if decoded.status.eq_ignore_ascii_case("error") || decoded.command_response.is_none() {
                return Err(RegistrarError::http(
                    status.as_u16(),
                    joined_errors(decoded.errors.as_ref()),
                ));
            }
            return Ok(decoded
                .command_response
                .expect("checked is_none above"));
        }

        Err(RegistrarError::max_retries(MAX_ATTEMPTS, last_transient))
    }

    async fn check_one(&self, domain: &DomainName) -> Result<AvailabilityEntry, RegistrarError> {
        let response: DomainCheckResponseDto = self
            .command(
                "namecheap.domains.check",
                &[("DomainList".to_owned(), domain.as_str().to_owned())],
            )
            .await?;
        let result = response
            .results
            .into_iter()
            .find(|result| result.domain.eq_ignore_ascii_case(domain.as_str()))
            .ok_or_else(|| {
                RegistrarError::parse(format!("check response missing {domain}"))
            })?;

        let premium = result.is_premium.as_deref() == Some("true");
        let price_usd = match (premium, result.premium_price.as_deref()) {
            (true, Some(price)) => Some(parse_price(price)?),
            _ => None,
        };
        Ok(AvailabilityEntry {
            domain: domain.clone(),
            available: result.available == "true",
            price_usd,
            premium,
        })
    }

    /// Per-TLD pricing, served from the cache while fresh.
    async fn tld_pricing(&self, tld: &str) -> Result<TldPricing, RegistrarError> {
        if let Some(cached) = self.pricing.get(tld).await {
            return Ok(cached);
        }

        let response: UserGetPricingResponseDto = self
            .command(
                "namecheap.users.getPricing",
                &[
                    ("ProductType".to_owned(), "DOMAIN".to_owned()),
                    ("ProductCategory".to_owned(), "REGISTER".to_owned()),
                ],
            )
            .await?;

        let mut requested = None;
        for product_type in response.result.product_types {
            for category in product_type.categories {
                if !category.name.eq_ignore_ascii_case("register") {
                    continue;
                }
                for product in category.products {
                    let Some(price) = first_year_price(&product)? else {
                        continue;
                    };
                    // WhoisGuard ships free with every registration, so the
                    // privacy component is always zero here.
                    let pricing = TldPricing {
                        price,
                        premium: false,
                        privacy_price: Decimal::ZERO,
                    };
                    if product.name.eq_ignore_ascii_case(tld) {
                        requested = Some(pricing.clone());
                    }
                    self.pricing.insert(&product.name.to_lowercase(), pricing).await;
                }
            }
        }

        requested.ok_or_else(|| RegistrarError::tld_not_supported(tld))
    }

    fn split(domain: &DomainName) -> [(String, String); 2] {
        [
            ("SLD".to_owned(), domain.label().to_owned()),
            ("TLD".to_owned(), domain.tld().to_owned()),
        ]
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
impl RegistrarDriver for NamecheapDriver {
    fn provider(&self) -> Provider {
        Provider::Namecheap
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

        let mut params: Vec<(String, String)> = vec![
            ("DomainName".to_owned(), request.domain.as_str().to_owned()),
            ("Years".to_owned(), request.years.to_string()),
            (
                "AddFreeWhoisguard".to_owned(),
                if request.whois_privacy { "yes" } else { "no" }.to_owned(),
            ),
        ];
        for role in ["Registrant", "Tech", "Admin", "AuxBilling"] {
            params.extend([
                (format!("{role}FirstName"), request.contact.first_name.clone()),
                (format!("{role}LastName"), request.contact.last_name.clone()),
                (format!("{role}Address1"), request.contact.address1.clone()),
                (format!("{role}City"), request.contact.city.clone()),
                (
                    format!("{role}StateProvince"),
                    request.contact.state.clone(),
                ),
                (format!("{role}PostalCode"), request.contact.zip.clone()),
                (format!("{role}Country"), request.contact.country.clone()),
                (format!("{role}Phone"), request.contact.phone.clone()),
                (format!("{role}EmailAddress"), request.contact.email.clone()),
            ]);
        }

        let response: DomainCreateResponseDto = self
            .command("namecheap.domains.create", &params)
            .await?;
        let result = response.result;
        Ok(RegisterReceipt {
            order_id: result.order_id,
            charged_total_usd: parse_price(&result.charged_amount)?,
            success: result.registered == "true",
            message: format!("transaction {}", result.transaction_id),
        })
    }

    async fn domain_status(
        &self,
        domain: &DomainName,
    ) -> Result<DomainStatusReport, RegistrarError> {
        let result: Result<DomainGetInfoResponseDto, RegistrarError> = self
            .command(
                "namecheap.domains.getinfo",
                &[("DomainName".to_owned(), domain.as_str().to_owned())],
            )
            .await;

        let response = match result {
            Ok(response) => response,
            // The API answers "domain not found" as an error document.
            Err(RegistrarError::Http { message, .. })
                if message.to_lowercase().contains("not found") =>
            {
                return Ok(DomainStatusReport {
                    state: RegistrarDomainState::NotFound,
                    details: message,
                });
            }
            Err(err) => return Err(err),
        };

        let raw_status = response.result.status;
        let state = match raw_status.to_lowercase().as_str() {
            "ok" => RegistrarDomainState::Active,
            "expired" => RegistrarDomainState::Expired,
            "locked" => RegistrarDomainState::Error,
            _ => RegistrarDomainState::Pending,
        };
        Ok(DomainStatusReport {
            state,
            details: format!("registrar status {raw_status}"),
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

        let mut params = Self::split(domain).to_vec();
        params.push(("Nameservers".to_owned(), nameservers.join(",")));
        let response: SetCustomResponseDto = self
            .command("namecheap.domains.dns.setCustom", &params)
            .await?;
        if response.result.updated != "true" {
            return Err(RegistrarError::http(200_u16, "nameserver update was not applied"));
        }
        Ok(())
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

        // setHosts replaces the whole record set in one call, so it either
        // fully lands or fully fails; there is no partial outcome here.
        let mut params = Self::split(domain).to_vec();
        for (index, record) in records.iter().enumerate() {
            let n = index + 1;
            params.push((format!("HostName{n}"), record.name.clone()));
            params.push((format!("RecordType{n}"), record.record_type.as_str().to_owned()));
            params.push((format!("Address{n}"), record.value.clone()));
            params.push((format!("TTL{n}"), record.ttl.to_string()));
            if let Some(prio) = record.prio {
                params.push((format!("MXPref{n}"), prio.to_string()));
            }
        }

        let response: SetHostsResponseDto = self
            .command("namecheap.domains.dns.setHosts", &params)
            .await?;
        if response.result.is_success != "true" {
            return Err(RegistrarError::http(200_u16, "host record update was not applied"));
        }
        Ok(())
    }
}

fn parse_xml<T: DeserializeOwned>(text: &str) -> Result<ApiResponseDto<T>, RegistrarError> {
    quick_xml::de::from_str(text)
        .map_err(|err| RegistrarError::parse(format!("invalid XML payload: {err}")))
}

fn parse_price(raw: &str) -> Result<Decimal, RegistrarError> {
    Decimal::from_str(raw)
        .map(money::round_usd)
        .map_err(|err| RegistrarError::parse(format!("invalid price {raw:?}: {err}")))
}

fn joined_errors(errors: Option<&ErrorsDto>) -> String {
    let joined = errors
        .map(|errors| {
            errors
                .errors
                .iter()
                .filter_map(|error| error.message.as_deref())
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default();
    if joined.is_empty() {
        "unspecified API error".to_owned()
    } else {
        joined
    }
}

fn first_year_price(product: &ProductDto) -> Result<Option<Decimal>, RegistrarError> {
    let Some(price) = product
        .prices
        .iter()
        .find(|price| price.duration == "1")
        .or_else(|| product.prices.first())
    else {
        return Ok(None);
    };
    parse_price(&price.price).map(Some)
}

#[derive(Debug, Deserialize)]
struct ApiResponseDto<T> {
    #[serde(rename = "@Status")]
    status: String,
    #[serde(rename = "Errors", default)]
    errors: Option<ErrorsDto>,
    #[serde(rename = "CommandResponse")]
    command_response: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorsDto {
    #[serde(rename = "Error", default)]
    errors: Vec<ErrorDto>,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    #[serde(rename = "$text")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainCheckResponseDto {
    #[serde(rename = "DomainCheckResult", default)]
    results: Vec<DomainCheckResultDto>,
}

#[derive(Debug, Deserialize)]
struct DomainCheckResultDto {
    #[serde(rename = "@Domain")]
    domain: String,
    #[serde(rename = "@Available")]
    available: String,
    #[serde(rename = "@IsPremiumName", default)]
    is_premium: Option<String>,
    #[serde(rename = "@PremiumRegistrationPrice", default)]
    premium_price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DomainCreateResponseDto {
    #[serde(rename = "DomainCreateResult")]
    result: DomainCreateResultDto,
}

#[derive(Debug, Deserialize)]
struct DomainCreateResultDto {
    #[serde(rename = "@Registered")]
    registered: String,
    #[serde(rename = "@ChargedAmount")]
    charged_amount: String,
    #[serde(rename = "@OrderID")]
    order_id: String,
    #[serde(rename = "@TransactionID")]
    transaction_id: String,
}

#[derive(Debug, Deserialize)]
struct UserGetPricingResponseDto {
    #[serde(rename = "UserGetPricingResult")]
    result: PricingResultDto,
}

#[derive(Debug, Deserialize)]
struct PricingResultDto {
    #[serde(rename = "ProductType", default)]
    product_types: Vec<ProductTypeDto>,
}

#[derive(Debug, Deserialize)]
struct ProductTypeDto {
    #[serde(rename = "ProductCategory", default)]
    categories: Vec<ProductCategoryDto>,
}

#[derive(Debug, Deserialize)]
struct ProductCategoryDto {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "Product", default)]
    products: Vec<ProductDto>,
}

#[derive(Debug, Deserialize)]
struct ProductDto {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "Price", default)]
    prices: Vec<PriceDto>,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    #[serde(rename = "@Duration")]
    duration: String,
    #[serde(rename = "@Price")]
    price: String,
}

#[derive(Debug, Deserialize)]
struct DomainGetInfoResponseDto {
    #[serde(rename = "DomainGetInfoResult")]
    result: DomainGetInfoResultDto,
}

#[derive(Debug, Deserialize)]
struct DomainGetInfoResultDto {
    #[serde(rename = "@Status")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct SetCustomResponseDto {
    #[serde(rename = "DomainDNSSetCustomResult")]
    result: SetCustomResultDto,
}

#[derive(Debug, Deserialize)]
struct SetCustomResultDto {
    #[serde(rename = "@Updated")]
    updated: String,
}

#[derive(Debug, Deserialize)]
struct SetHostsResponseDto {
    #[serde(rename = "DomainDNSSetHostsResult")]
    result: SetHostsResultDto,
}

#[derive(Debug, Deserialize)]
struct SetHostsResultDto {
    #[serde(rename = "@IsSuccess")]
    is_success: String,
}
