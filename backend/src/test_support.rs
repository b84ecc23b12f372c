//! In-memory port implementations shared by unit and integration tests.
//!
//! These adapters honour the port contracts (expiry on `begin`, atomic spend
//! accumulation, unique order ids) so pipeline tests exercise real
//! interleavings without a database.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use mockable::Clock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::DomainName;
use crate::domain::idempotency::{BeginOutcome, IdemRecord, PurchaseKey};
use crate::domain::ports::{
    ApiKeyRepository, ApiKeyRepositoryError, AuditLog, AuditLogError, AuditVerb,
    AuthenticatedUser, AvailabilityEntry, DnsRecord, DomainRecord, DomainRepository,
    DomainRepositoryError, DomainStatus, DomainStatusReport, IdempotencyStore,
    IdempotencyStoreError, NewDomain, NewPurchase, Provider, PurchaseRecord, PurchaseRepository,
    PurchaseRepositoryError, Quote, RegisterReceipt, RegisterRequest, RegistrarDomainState,
    RegistrarDriver, RegistrarError, SpendLedger, SpendLedgerError,
};

/// Clock pinned to one instant, for deterministic day bucketing and TTLs.
#[derive(Debug, Clone)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn local(&self) -> DateTime<Local> {
        self.0.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Map-backed credential store for handler tests.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: StdMutex<HashMap<String, AuthenticatedUser>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential (test arrangement).
    pub fn seed(&self, key: &str, user: AuthenticatedUser) {
        self.keys
            .lock()
            .expect("key store poisoned")
            .insert(key.to_owned(), user);
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn find_user_by_key(
        &self,
        key: &str,
    ) -> Result<Option<AuthenticatedUser>, ApiKeyRepositoryError> {
        Ok(self.keys.lock().expect("key store poisoned").get(key).cloned())
    }
}

/// Map-backed idempotency ledger honouring expiry-on-begin.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    rows: StdMutex<HashMap<String, IdemRecord>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rows (test assertions).
    pub fn len(&self) -> usize {
        self.rows.lock().expect("store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(
        &self,
        key: &PurchaseKey,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError> {
        let mut rows = self.rows.lock().expect("store poisoned");
        match rows.get(key.as_str()) {
            Some(record) if record.is_expired(now) => {
                rows.remove(key.as_str());
                Ok(BeginOutcome::Reserved)
            }
            Some(record) => Ok(BeginOutcome::Existing(record.clone())),
            None => Ok(BeginOutcome::Reserved),
        }
    }

    async fn commit(&self, record: &IdemRecord) -> Result<(), IdempotencyStoreError> {
        self.rows
            .lock()
            .expect("store poisoned")
            .insert(record.key.as_str().to_owned(), record.clone());
        Ok(())
    }

    async fn fail(&self, key: &PurchaseKey) -> Result<(), IdempotencyStoreError> {
        self.rows.lock().expect("store poisoned").remove(key.as_str());
        Ok(())
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, IdempotencyStoreError> {
        let mut rows = self.rows.lock().expect("store poisoned");
        let before = rows.len();
        rows.retain(|_, record| !record.is_expired(now));
        Ok((before - rows.len()) as u64)
    }
}

/// Map-backed spend ledger with atomic per-day accumulation.
#[derive(Debug, Default)]
pub struct InMemorySpendLedger {
    totals: StdMutex<HashMap<(String, DateTime<Utc>), Decimal>>,
}

impl InMemorySpendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a day's total (test arrangement).
    pub fn seed(&self, account_key: &str, day: DateTime<Utc>, total: Decimal) {
        self.totals
            .lock()
            .expect("ledger poisoned")
            .insert((account_key.to_owned(), day), total);
    }
}

#[async_trait]
impl SpendLedger for InMemorySpendLedger {
    async fn total(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
    ) -> Result<Decimal, SpendLedgerError> {
        Ok(self
            .totals
            .lock()
            .expect("ledger poisoned")
            .get(&(account_key.to_owned(), day))
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn add(
        &self,
        account_key: &str,
        day: DateTime<Utc>,
        amount: Decimal,
    ) -> Result<(), SpendLedgerError> {
        let mut totals = self.totals.lock().expect("ledger poisoned");
        let entry = totals
            .entry((account_key.to_owned(), day))
            .or_insert(Decimal::ZERO);
        *entry += amount;
        Ok(())
    }

    async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, SpendLedgerError> {
        let mut totals = self.totals.lock().expect("ledger poisoned");
        let before = totals.len();
        totals.retain(|(_, day), _| *day >= cutoff);
        Ok((before - totals.len()) as u64)
    }
}

/// Map-backed domain repository keyed by unique name.
#[derive(Debug, Default)]
pub struct InMemoryDomainRepository {
    rows: StdMutex<HashMap<String, DomainRecord>>,
}

impl InMemoryDomainRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row in a chosen state (test arrangement).
    pub fn seed(&self, record: DomainRecord) {
        self.rows
            .lock()
            .expect("repository poisoned")
            .insert(record.name.as_str().to_owned(), record);
    }

    pub fn get(&self, name: &DomainName) -> Option<DomainRecord> {
        self.rows
            .lock()
            .expect("repository poisoned")
            .get(name.as_str())
            .cloned()
    }
}

#[async_trait]
impl DomainRepository for InMemoryDomainRepository {
    async fn upsert_purchased(
        &self,
        new_domain: &NewDomain,
    ) -> Result<DomainRecord, DomainRepositoryError> {
        let now = Utc::now();
        let mut rows = self.rows.lock().expect("repository poisoned");
        let record = rows
            .entry(new_domain.name.as_str().to_owned())
            .and_modify(|existing| {
                existing.user_id = new_domain.user_id;
                existing.registrar = new_domain.registrar;
                existing.status = DomainStatus::Purchased;
                existing.privacy = new_domain.privacy;
                existing.updated_at = now;
            })
            .or_insert_with(|| DomainRecord {
                id: Uuid::new_v4(),
                name: new_domain.name.clone(),
                user_id: new_domain.user_id,
                registrar: new_domain.registrar,
                status: DomainStatus::Purchased,
                privacy: new_domain.privacy,
                auto_renew: new_domain.auto_renew,
                created_at: now,
                updated_at: now,
            });
        Ok(record.clone())
    }

    async fn mark_dns_applied(&self, id: Uuid) -> Result<(), DomainRepositoryError> {
        let mut rows = self.rows.lock().expect("repository poisoned");
        for record in rows.values_mut() {
            if record.id == id {
                record.status = DomainStatus::DnsApplied;
                record.updated_at = Utc::now();
                return Ok(());
            }
        }
        Err(DomainRepositoryError::query(format!(
            "no domain row with id {id}"
        )))
    }

    async fn find_by_name(
        &self,
        name: &DomainName,
    ) -> Result<Option<DomainRecord>, DomainRepositoryError> {
        Ok(self.get(name))
    }
}

/// Vec-backed purchase log enforcing order-id uniqueness.
#[derive(Debug, Default)]
pub struct InMemoryPurchaseRepository {
    rows: StdMutex<Vec<PurchaseRecord>>,
}

impl InMemoryPurchaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("repository poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PurchaseRepository for InMemoryPurchaseRepository {
    async fn insert(
        &self,
        new_purchase: &NewPurchase,
    ) -> Result<PurchaseRecord, PurchaseRepositoryError> {
        let mut rows = self.rows.lock().expect("repository poisoned");
        if rows.iter().any(|row| row.order_id == new_purchase.order_id) {
            return Err(PurchaseRepositoryError::duplicate_order(
                new_purchase.order_id.clone(),
            ));
        }
        let record = PurchaseRecord {
            id: Uuid::new_v4(),
            user_id: new_purchase.user_id,
            domain_id: new_purchase.domain_id,
            registrar: new_purchase.registrar,
            order_id: new_purchase.order_id.clone(),
            years: new_purchase.years,
            total_usd: new_purchase.total_usd,
            premium: new_purchase.premium,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }
}

/// Audit sink retaining entries for assertions.
#[derive(Debug, Default)]
pub struct RecordingAuditLog {
    entries: StdMutex<Vec<(Option<Uuid>, AuditVerb, serde_json::Value)>>,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Option<Uuid>, AuditVerb, serde_json::Value)> {
        self.entries.lock().expect("audit poisoned").clone()
    }

    pub fn verbs(&self) -> Vec<AuditVerb> {
        self.entries().into_iter().map(|(_, verb, _)| verb).collect()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn record(
        &self,
        user_id: Option<Uuid>,
        verb: AuditVerb,
        payload: &serde_json::Value,
    ) -> Result<(), AuditLogError> {
        self.entries
            .lock()
            .expect("audit poisoned")
            .push((user_id, verb, payload.clone()));
        Ok(())
    }
}

/// Scripted registrar driver with call counting.
///
/// Quotes and receipts pop from front-loaded queues, falling back to the
/// configured defaults once drained, so tests can stage a provisional quote
/// that differs from the fresh one.
pub struct ScriptedRegistrarDriver {
    default_quote: Quote,
    quote_queue: StdMutex<VecDeque<Quote>>,
    receipt: RegisterReceipt,
    register_error: Option<RegistrarError>,
    apply_records_error: Option<RegistrarError>,
    quote_calls: AtomicUsize,
    register_calls: AtomicUsize,
    set_nameserver_calls: AtomicUsize,
    apply_record_calls: AtomicUsize,
}

impl ScriptedRegistrarDriver {
    /// Driver quoting a flat total and registering successfully.
    pub fn quoting(total_usd: Decimal) -> Self {
        Self {
            default_quote: Quote {
                registration_price_usd: total_usd,
                icann_fee_usd: Decimal::new(18, 2),
                privacy_price_usd: Decimal::ZERO,
                total_usd,
                premium: false,
            },
            quote_queue: StdMutex::new(VecDeque::new()),
            receipt: RegisterReceipt {
                order_id: "PB-TEST-1".to_owned(),
                charged_total_usd: total_usd,
                success: true,
                message: "registered".to_owned(),
            },
            register_error: None,
            apply_records_error: None,
            quote_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            set_nameserver_calls: AtomicUsize::new(0),
            apply_record_calls: AtomicUsize::new(0),
        }
    }

    /// Queue a quote served before the default.
    pub fn push_quote(self, quote: Quote) -> Self {
        self.quote_queue
            .lock()
            .expect("driver poisoned")
            .push_back(quote);
        self
    }

    /// Mark quotes as premium priced.
    pub fn premium(mut self) -> Self {
        self.default_quote.premium = true;
        self
    }

    /// Replace the registration receipt.
    pub fn with_receipt(mut self, receipt: RegisterReceipt) -> Self {
        self.receipt = receipt;
        self
    }

    /// Fail `register` with the given error.
    pub fn failing_register(mut self, error: RegistrarError) -> Self {
        self.register_error = Some(error);
        self
    }

    /// Fail `apply_records` with the given error.
    pub fn failing_apply_records(mut self, error: RegistrarError) -> Self {
        self.apply_records_error = Some(error);
        self
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn quote_calls(&self) -> usize {
        self.quote_calls.load(Ordering::SeqCst)
    }

    pub fn set_nameserver_calls(&self) -> usize {
        self.set_nameserver_calls.load(Ordering::SeqCst)
    }

    pub fn apply_record_calls(&self) -> usize {
        self.apply_record_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistrarDriver for ScriptedRegistrarDriver {
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
                price_usd: Some(self.default_quote.total_usd),
                premium: self.default_quote.premium,
            })
            .collect())
    }

    async fn quote(
        &self,
        _domain: &DomainName,
        _years: u8,
        _whois_privacy: bool,
    ) -> Result<Quote, RegistrarError> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.quote_queue.lock().expect("driver poisoned").pop_front();
        Ok(queued.unwrap_or_else(|| self.default_quote.clone()))
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<RegisterReceipt, RegistrarError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.register_error {
            return Err(error.clone());
        }
        Ok(self.receipt.clone())
    }

    async fn domain_status(
        &self,
        _domain: &DomainName,
    ) -> Result<DomainStatusReport, RegistrarError> {
        Ok(DomainStatusReport {
            state: RegistrarDomainState::Active,
            details: "scripted".to_owned(),
        })
    }

    async fn set_nameservers(
        &self,
        _domain: &DomainName,
        _nameservers: &[String],
    ) -> Result<(), RegistrarError> {
        self.set_nameserver_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_records(
        &self,
        _domain: &DomainName,
        _records: &[DnsRecord],
    ) -> Result<(), RegistrarError> {
        self.apply_record_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.apply_records_error {
            return Err(error.clone());
        }
        Ok(())
    }
}
