//! Purchase pipeline: quote, guard, register, persist, provision, record.
//!
//! The pipeline couples the durable idempotency ledger, the in-process
//! keyed mutex, a re-quote-then-commit price check, the spend ledger, and
//! post-commit DNS provisioning. Any failure inside the guarded region
//! clears the idempotency slot so a client retry is safe; the key lock is
//! released by RAII on every path.
//!
//! Registrar `register` calls must be treated as potentially committed
//! upstream even when they error, which is why the client-supplied
//! idempotency key is mandatory and stored responses are replayed verbatim.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use mockable::Clock;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::idempotency::{
    BeginOutcome, ClientKey, IdemRecord, IdempotencyConfig, PurchaseKey, RequestDigest,
};
use crate::domain::label::{LabelReason, check_label};
use crate::domain::ports::{
    AuditLog, AuditVerb, AuthenticatedUser, DomainRepository, IdempotencyStore, NewDomain,
    NewPurchase, PurchaseMetrics, PurchaseRepository, RegisterRequest, RegistrantContact,
    RegistrarDriver, SpendLedger, remaining, utc_day, would_exceed,
};
use crate::domain::{
    DomainName, DomainResult, Error, ErrorKind, KeyedMutex, TldAllowlist, dns_template, money,
};

/// Spend ceilings enforced before any registrar mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseLimits {
    pub max_per_txn_usd: Decimal,
    pub max_daily_usd: Decimal,
}

impl Default for PurchaseLimits {
    fn default() -> Self {
        Self {
            max_per_txn_usd: Decimal::new(1_000, 0),
            max_daily_usd: Decimal::new(5_000, 0),
        }
    }
}

/// Who provisions DNS after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NameserverMode {
    /// Keep registrar nameservers and apply a record template.
    Registrar,
    /// Point the domain at client-supplied nameservers.
    Custom,
}

/// Validated purchase request handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    pub domain: DomainName,
    pub years: u8,
    pub whois_privacy: bool,
    pub allow_premium: bool,
    pub allow_unicode: bool,
    pub nameserver_mode: NameserverMode,
    pub nameservers: Vec<String>,
    pub dns_template_id: Option<String>,
    pub quoted_total_usd: Decimal,
    pub client_key: ClientKey,
}

/// How the pipeline answered.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOutcome {
    /// A fresh purchase committed; the body is now durable for replay.
    Completed(serde_json::Value),
    /// A previously committed response replayed verbatim.
    Replayed(serde_json::Value),
}

impl PurchaseOutcome {
    /// Response body regardless of provenance.
    pub fn body(&self) -> &serde_json::Value {
        match self {
            Self::Completed(body) | Self::Replayed(body) => body,
        }
    }
}

/// Port bundle for [`PurchaseService`].
pub struct PurchaseServiceDeps {
    pub registrar: Arc<dyn RegistrarDriver>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub spend: Arc<dyn SpendLedger>,
    pub domains: Arc<dyn DomainRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub audit: Arc<dyn AuditLog>,
    pub metrics: Arc<dyn PurchaseMetrics>,
    pub clock: Arc<dyn Clock + Send + Sync>,
}

/// Orchestrates one purchase attempt end to end.
pub struct PurchaseService {
    registrar: Arc<dyn RegistrarDriver>,
    idempotency: Arc<dyn IdempotencyStore>,
    spend: Arc<dyn SpendLedger>,
    domains: Arc<dyn DomainRepository>,
    purchases: Arc<dyn PurchaseRepository>,
    audit: Arc<dyn AuditLog>,
    metrics: Arc<dyn PurchaseMetrics>,
    clock: Arc<dyn Clock + Send + Sync>,
    mutex: KeyedMutex,
    allowlist: TldAllowlist,
    limits: PurchaseLimits,
    idem_config: IdempotencyConfig,
    contact: RegistrantContact,
}

impl PurchaseService {
    /// Assemble the service from its ports and policy configuration.
    pub fn new(
        deps: PurchaseServiceDeps,
        allowlist: TldAllowlist,
        limits: PurchaseLimits,
        idem_config: IdempotencyConfig,
        contact: RegistrantContact,
    ) -> Self {
        Self {
            registrar: deps.registrar,
            idempotency: deps.idempotency,
            spend: deps.spend,
            domains: deps.domains,
            purchases: deps.purchases,
            audit: deps.audit,
            metrics: deps.metrics,
            clock: deps.clock,
            mutex: KeyedMutex::new(),
            allowlist,
            limits,
            idem_config,
            contact,
        }
    }

    /// Run the pipeline for an authenticated user.
    pub async fn purchase(
        &self,
        user: &AuthenticatedUser,
        request: PurchaseRequest,
    ) -> DomainResult<PurchaseOutcome> {
        let domain = &request.domain;

        if !self.allowlist.permits(domain.tld()) {
            return Err(Error::validation(format!(
                "TLD .{} is not permitted",
                domain.tld()
            )));
        }

        let verdict = check_label(domain.label(), request.allow_unicode);
        if !verdict.safe {
            return Err(label_rejection(&verdict.reasons));
        }

        if request.quoted_total_usd > self.limits.max_per_txn_usd {
            return Err(Error::new(
                ErrorKind::SpendCapExceeded,
                "quoted total exceeds the per-transaction ceiling",
            )
            .with_details(json!({ "max_per_txn_usd": self.limits.max_per_txn_usd })));
        }

        if request.nameserver_mode == NameserverMode::Custom {
            validate_nameservers(&request.nameservers)?;
        }

        // Provisional quote to detect premium pricing before any guard work.
        let provisional = self
            .registrar
            .quote(domain, request.years, request.whois_privacy)
            .await?;
        if provisional.premium && !request.allow_premium {
            return Err(Error::new(
                ErrorKind::PremiumNotAllowed,
                format!("{domain} is premium priced; set allow_premium to proceed"),
            ));
        }

        let account_key = user.account_key();
        let now = self.clock.utc();
        let day = utc_day(now);
        let today_spent = self.spend.total(&account_key, day).await?;
        if would_exceed(today_spent, request.quoted_total_usd, self.limits.max_daily_usd) {
            return Err(Error::new(
                ErrorKind::DailyCapExceeded,
                "purchase would exceed the daily spend ceiling",
            )
            .with_details(json!({
                "remaining": remaining(today_spent, self.limits.max_daily_usd),
            })));
        }

        let digest = RequestDigest::for_purchase(
            domain,
            request.years,
            request.whois_privacy,
            request.quoted_total_usd,
        )
        .map_err(|err| Error::internal(err.to_string()))?;
        let key = PurchaseKey::for_purchase(domain, &request.client_key);

        // Fast path: a committed twin replays without touching the mutex.
        if let BeginOutcome::Existing(record) = self.idempotency.begin(&key, now).await? {
            return self.replay_or_conflict(record, &digest);
        }

        let _guard = self.mutex.acquire(key.as_str()).await;

        // Authoritative re-check under the key lock: a serialized duplicate
        // may have committed while this request queued.
        let now = self.clock.utc();
        if let BeginOutcome::Existing(record) = self.idempotency.begin(&key, now).await? {
            return self.replay_or_conflict(record, &digest);
        }

        match self.run_guarded(user, &request, &digest, &key).await {
            Ok(body) => {
                self.record_audit(
                    Some(user.id),
                    AuditVerb::BuySuccess,
                    json!({
                        "domain": domain.as_str(),
                        "order_id": body.get("order_id"),
                        "charged_total_usd": body.get("charged_total_usd"),
                        "registrar": self.registrar.provider().as_str(),
                    }),
                )
                .await;
                self.metrics.record_commit(self.registrar.provider());
                info!(domain = %domain, "purchase committed");
                Ok(PurchaseOutcome::Completed(body))
            }
            Err(err) => {
                if let Err(cleanup) = self.idempotency.fail(&key).await {
                    warn!(key = %key, error = %cleanup, "failed to clear idempotency slot");
                }
                self.record_audit(
                    Some(user.id),
                    AuditVerb::BuyFail,
                    json!({
                        "domain": domain.as_str(),
                        "error": err.kind(),
                        "message": err.message(),
                    }),
                )
                .await;
                self.metrics.record_failure(kind_label(err.kind()));
                Err(err)
            }
        }
    }

    /// The region between idempotency reservation and commit. Every error
    /// here triggers `fail(key)` in the caller.
    async fn run_guarded(
        &self,
        user: &AuthenticatedUser,
        request: &PurchaseRequest,
        digest: &RequestDigest,
        key: &PurchaseKey,
    ) -> DomainResult<serde_json::Value> {
        let domain = &request.domain;

        let fresh = self
            .registrar
            .quote(domain, request.years, request.whois_privacy)
            .await?;
        if money::exceeds_drift_tolerance(fresh.total_usd, request.quoted_total_usd) {
            return Err(Error::new(
                ErrorKind::PriceDrift,
                "server quote drifted from the client quote",
            )
            .with_details(json!({
                "server_total_usd": fresh.total_usd,
                "quoted_total_usd": request.quoted_total_usd,
                "drift": money::drift(fresh.total_usd, request.quoted_total_usd),
            })));
        }

        let receipt = self
            .registrar
            .register(&RegisterRequest {
                domain: domain.clone(),
                years: request.years,
                whois_privacy: request.whois_privacy,
                contact: self.contact.clone(),
            })
            .await?;
        if !receipt.success {
            return Err(Error::validation(format!(
                "registrar rejected the registration: {}",
                receipt.message
            )));
        }
        let charged = money::round_usd(receipt.charged_total_usd);

        let domain_row = self
            .domains
            .upsert_purchased(&NewDomain {
                name: domain.clone(),
                user_id: user.id,
                registrar: self.registrar.provider(),
                privacy: request.whois_privacy,
                auto_renew: false,
            })
            .await?;
        self.purchases
            .insert(&NewPurchase {
                user_id: user.id,
                domain_id: domain_row.id,
                registrar: self.registrar.provider(),
                order_id: receipt.order_id.clone(),
                years: request.years,
                total_usd: charged,
                premium: fresh.premium,
            })
            .await?;

        let applied_template = self.provision_dns(request, domain_row.id).await?;

        let account_key = user.account_key();
        let now = self.clock.utc();
        let day = utc_day(now);
        if let Err(err) = self.spend.add(&account_key, day, charged).await {
            // The purchase is committed; the ledger is reconciled out of
            // band. Under-reporting one in-flight transaction is tolerated,
            // over-reporting never.
            warn!(account = %account_key, error = %err, "spend ledger add failed after register");
        }

        let body = json!({
            "order_id": receipt.order_id,
            "charged_total_usd": charged,
            "registrar": self.registrar.provider().as_str(),
            "nameserver_mode": request.nameserver_mode,
            "dns_template_id": applied_template,
            "domain_id": domain_row.id,
        });

        self.idempotency
            .commit(&IdemRecord {
                key: key.clone(),
                digest: digest.clone(),
                response: body.clone(),
                expires_at: now + ttl_duration(&self.idem_config),
                created_at: now,
            })
            .await?;

        Ok(body)
    }

    /// Configure DNS per the requested mode. Returns the applied template id
    /// in registrar mode.
    async fn provision_dns(
        &self,
        request: &PurchaseRequest,
        domain_id: Uuid,
    ) -> DomainResult<Option<String>> {
        let applied_template = match request.nameserver_mode {
            NameserverMode::Custom => {
                self.registrar
                    .set_nameservers(&request.domain, &request.nameservers)
                    .await?;
                None
            }
            NameserverMode::Registrar => {
                let template_id = request
                    .dns_template_id
                    .as_deref()
                    .unwrap_or(dns_template::DEFAULT_TEMPLATE_ID);
                let template = dns_template::lookup(template_id).ok_or_else(|| {
                    Error::new(
                        ErrorKind::UnknownDnsTemplate,
                        format!("unknown DNS template {template_id:?}"),
                    )
                })?;
                self.registrar
                    .apply_records(&request.domain, &template.expand(&request.domain))
                    .await?;
                Some(template.id().to_owned())
            }
        };
        self.domains.mark_dns_applied(domain_id).await?;
        Ok(applied_template)
    }

    fn replay_or_conflict(
        &self,
        record: IdemRecord,
        digest: &RequestDigest,
    ) -> DomainResult<PurchaseOutcome> {
        if record.digest == *digest {
            self.metrics.record_replay();
            Ok(PurchaseOutcome::Replayed(record.response))
        } else {
            Err(Error::new(
                ErrorKind::IdempotencyMismatch,
                "idempotency key already used with a different request",
            ))
        }
    }

    /// Audit writes never fail the business operation.
    async fn record_audit(&self, user_id: Option<Uuid>, verb: AuditVerb, payload: serde_json::Value) {
        if let Err(err) = self.audit.record(user_id, verb, &payload).await {
            warn!(verb = verb.as_str(), error = %err, "audit append failed");
        }
    }
}

fn ttl_duration(config: &IdempotencyConfig) -> ChronoDuration {
    ChronoDuration::from_std(config.ttl()).unwrap_or_else(|_| ChronoDuration::seconds(3600))
}

/// Map label filter reasons onto the error taxonomy. The Unicode opt-in
/// failures get their dedicated kinds; everything else is `UnsafeLabel`.
fn label_rejection(reasons: &[LabelReason]) -> Error {
    if reasons.contains(&LabelReason::NonAsciiNotAllowed) {
        return Error::new(
            ErrorKind::NonAsciiNotAllowed,
            "label contains non-ASCII characters; set allow_unicode to proceed",
        );
    }
    if reasons.contains(&LabelReason::UnicodeMustUsePunycode) {
        return Error::new(
            ErrorKind::UnicodeMustUsePunycode,
            "Unicode labels must be submitted in xn-- punycode form",
        );
    }
    Error::new(ErrorKind::UnsafeLabel, "label failed safety screening")
        .with_details(json!({ "reasons": reasons }))
}

fn validate_nameservers(nameservers: &[String]) -> DomainResult<()> {
    use crate::domain::ports::{MAX_NAMESERVERS, MIN_NAMESERVERS};

    if !(MIN_NAMESERVERS..=MAX_NAMESERVERS).contains(&nameservers.len()) {
        return Err(Error::new(
            ErrorKind::NameserversRequired,
            format!(
                "custom nameserver mode requires between {MIN_NAMESERVERS} and {MAX_NAMESERVERS} nameservers"
            ),
        ));
    }
    for ns in nameservers {
        let valid = !ns.is_empty()
            && ns.contains('.')
            && ns
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.');
        if !valid {
            return Err(Error::new(
                ErrorKind::NameserversRequired,
                format!("{ns:?} is not a valid nameserver host"),
            ));
        }
    }
    Ok(())
}

/// Stable metric label for an error kind.
fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ValidationError => "validation",
        ErrorKind::UnsafeLabel => "unsafe_label",
        ErrorKind::NonAsciiNotAllowed => "non_ascii",
        ErrorKind::UnicodeMustUsePunycode => "punycode_required",
        ErrorKind::PremiumNotAllowed => "premium",
        ErrorKind::SpendCapExceeded => "txn_cap",
        ErrorKind::DailyCapExceeded => "daily_cap",
        ErrorKind::UnknownDnsTemplate => "unknown_template",
        ErrorKind::NameserversRequired => "nameservers",
        ErrorKind::Unauthorized => "unauthorized",
        ErrorKind::NotFound => "not_found",
        ErrorKind::IdempotencyMismatch => "idempotency_mismatch",
        ErrorKind::PriceDrift => "price_drift",
        ErrorKind::RateLimited => "rate_limited",
        ErrorKind::InternalError => "internal",
    }
}
