//! Search pipeline: candidate generation, safety screening, availability.
//!
//! Candidates come either from an explicit list or from a free-text prompt
//! slugged into a label. Unsafe labels are dropped per candidate so one bad
//! entry cannot abort a batch; the request only fails outright when nothing
//! survives screening.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::domain::label::{LabelReason, check_label};
use crate::domain::ports::{AuditLog, AuditVerb, RegistrarDriver};
use crate::domain::{DomainName, DomainResult, Error, ErrorKind, TldAllowlist};

/// TLDs tried when neither the request nor the allowlist names any.
const FALLBACK_TLDS: [&str; 4] = ["com", "net", "org", "io"];

/// Where candidates come from. The boundary guarantees exactly one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchSeed {
    /// Free-text prompt slugged into a single label.
    Prompt(String),
    /// Explicit candidate names, normalized but not yet screened.
    Candidates(Vec<String>),
}

/// Validated search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub seed: SearchSeed,
    pub tlds: Option<Vec<String>>,
    pub price_ceiling: Option<Decimal>,
    pub limit: usize,
    pub include_premium: bool,
    pub include_unicode: bool,
}

/// One scored candidate.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SearchResult {
    pub domain: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<Decimal>,
    pub premium: bool,
}

/// Search answer.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Candidate before strict name validation. Splitting label and TLD first
/// lets the safety filter report on raw Unicode input that the domain
/// syntax would reject outright.
#[derive(Debug, Clone)]
struct Candidate {
    label: String,
    tld: String,
}

impl Candidate {
    fn full_name(&self) -> String {
        format!("{}.{}", self.label, self.tld)
    }
}

/// Orchestrates one search.
pub struct SearchService {
    registrar: Arc<dyn RegistrarDriver>,
    audit: Arc<dyn AuditLog>,
    allowlist: TldAllowlist,
    max_candidates: usize,
}

impl SearchService {
    /// Assemble the service.
    pub fn new(
        registrar: Arc<dyn RegistrarDriver>,
        audit: Arc<dyn AuditLog>,
        allowlist: TldAllowlist,
        max_candidates: usize,
    ) -> Self {
        Self {
            registrar,
            audit,
            allowlist,
            max_candidates,
        }
    }

    /// Run the pipeline. `user_id` is recorded in the audit trail when the
    /// caller is authenticated.
    pub async fn search(
        &self,
        user_id: Option<Uuid>,
        request: SearchRequest,
    ) -> DomainResult<SearchResponse> {
        let tlds = self.effective_tlds(request.tlds.as_deref());
        let candidates = self.collect_candidates(&request.seed, &tlds)?;

        let permitted: Vec<Candidate> = candidates
            .iter()
            .filter(|candidate| self.allowlist.permits(&candidate.tld))
            .cloned()
            .collect();
        if permitted.is_empty() {
            return Err(Error::validation(
                "no candidate uses a permitted TLD",
            ));
        }

        let mut safe = Vec::new();
        let mut rejection_reasons = Vec::new();
        for candidate in permitted {
            let verdict = check_label(&candidate.label, request.include_unicode);
            if verdict.safe {
                if let Ok(name) = DomainName::parse(candidate.full_name()) {
                    safe.push(name);
                }
            } else {
                for reason in verdict.reasons {
                    if !rejection_reasons.contains(&reason) {
                        rejection_reasons.push(reason);
                    }
                }
            }
        }
        if safe.is_empty() {
            let samples: Vec<LabelReason> = rejection_reasons.into_iter().take(2).collect();
            return Err(Error::new(
                ErrorKind::UnsafeLabel,
                "every candidate failed label safety screening",
            )
            .with_details(json!({ "sample_reasons": samples })));
        }

        let entries = self.registrar.check_availability(&safe).await?;

        let mut results: Vec<SearchResult> = entries
            .into_iter()
            .filter(|entry| request.include_premium || !entry.premium)
            .filter(|entry| match (request.price_ceiling, entry.price_usd) {
                (Some(ceiling), Some(price)) => price <= ceiling,
                _ => true,
            })
            .map(|entry| SearchResult {
                domain: entry.domain.as_str().to_owned(),
                available: entry.available,
                price_usd: entry.price_usd,
                premium: entry.premium,
            })
            .collect();
        results.truncate(request.limit);

        let prompt = match &request.seed {
            SearchSeed::Prompt(prompt) => Some(prompt.as_str()),
            SearchSeed::Candidates(_) => None,
        };
        if let Err(err) = self
            .audit
            .record(
                user_id,
                AuditVerb::Search,
                &json!({ "prompt": prompt, "tlds": tlds, "count": results.len() }),
            )
            .await
        {
            warn!(error = %err, "audit append failed");
        }

        Ok(SearchResponse { results })
    }

    /// Resolve the TLD list: explicit, else allowlist, else fallback.
    fn effective_tlds(&self, explicit: Option<&[String]>) -> Vec<String> {
        if let Some(explicit) = explicit {
            return explicit
                .iter()
                .map(|tld| tld.trim().to_lowercase())
                .collect();
        }
        if !self.allowlist.is_open() {
            return self.allowlist.entries().to_vec();
        }
        FALLBACK_TLDS.iter().map(|tld| (*tld).to_string()).collect()
    }

    fn collect_candidates(
        &self,
        seed: &SearchSeed,
        tlds: &[String],
    ) -> DomainResult<Vec<Candidate>> {
        let mut candidates = match seed {
            SearchSeed::Candidates(raw) => raw
                .iter()
                .filter_map(|entry| split_candidate(entry))
                .collect::<Vec<_>>(),
            SearchSeed::Prompt(prompt) => {
                let base = slugify(prompt);
                if base.is_empty() {
                    return Err(Error::validation(
                        "prompt does not yield a usable label",
                    ));
                }
                tlds.iter()
                    .map(|tld| Candidate {
                        label: base.clone(),
                        tld: tld.clone(),
                    })
                    .collect()
            }
        };
        if candidates.is_empty() {
            return Err(Error::validation("no usable candidates in request"));
        }
        candidates.truncate(self.max_candidates);
        Ok(candidates)
    }
}

/// Split a raw candidate at its final dot. Returns `None` for entries
/// without exactly one label and one TLD (registration operates on
/// second-level names only).
fn split_candidate(raw: &str) -> Option<Candidate> {
    let normalized = raw.trim().to_lowercase();
    let (label, tld) = normalized.rsplit_once('.')?;
    if label.is_empty() || label.contains('.') || tld.is_empty() {
        return None;
    }
    Some(Candidate {
        label: label.to_owned(),
        tld: tld.to_owned(),
    })
}

/// Collapse a prompt into a label: lowercase, non-alphanumeric runs become
/// single hyphens, leading/trailing hyphens trimmed.
fn slugify(prompt: &str) -> String {
    let mut slug = String::with_capacity(prompt.len());
    let mut pending_hyphen = false;
    for ch in prompt.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingAuditLog, ScriptedRegistrarDriver};
    use rstest::rstest;

    fn usd(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn service_with(
        driver: ScriptedRegistrarDriver,
        allowlist: TldAllowlist,
    ) -> (SearchService, Arc<RecordingAuditLog>) {
        let audit = Arc::new(RecordingAuditLog::new());
        let service = SearchService::new(Arc::new(driver), audit.clone(), allowlist, 20);
        (service, audit)
    }

    fn prompt_request(prompt: &str, tlds: &[&str]) -> SearchRequest {
        SearchRequest {
            seed: SearchSeed::Prompt(prompt.to_owned()),
            tlds: Some(tlds.iter().map(|tld| (*tld).to_string()).collect()),
            price_ceiling: None,
            limit: 10,
            include_premium: false,
            include_unicode: false,
        }
    }

    fn candidates_request(candidates: &[&str]) -> SearchRequest {
        SearchRequest {
            seed: SearchSeed::Candidates(
                candidates.iter().map(|c| (*c).to_string()).collect(),
            ),
            tlds: None,
            price_ceiling: None,
            limit: 10,
            include_premium: false,
            include_unicode: false,
        }
    }

    #[rstest]
    #[case::spaces("AI chatbot", "ai-chatbot")]
    #[case::punctuation("best.coffee, ever!", "best-coffee-ever")]
    #[case::leading_noise("  --cool app--  ", "cool-app")]
    #[case::digits("web3 wallet", "web3-wallet")]
    #[case::empty("!!!", "")]
    fn prompts_slug_into_labels(#[case] prompt: &str, #[case] expected: &str) {
        assert_eq!(slugify(prompt), expected);
    }

    #[tokio::test]
    async fn prompt_expands_across_requested_tlds() {
        let (service, audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::default(),
        );

        let response = service
            .search(None, prompt_request("AI chatbot", &["com", "io"]))
            .await
            .expect("search succeeds");

        let names: Vec<&str> = response
            .results
            .iter()
            .map(|result| result.domain.as_str())
            .collect();
        assert_eq!(names, ["ai-chatbot.com", "ai-chatbot.io"]);

        let verbs = audit.verbs();
        assert_eq!(verbs, vec![crate::domain::ports::AuditVerb::Search]);
    }

    #[tokio::test]
    async fn premium_entries_are_dropped_by_default() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(250_000)).premium(),
            TldAllowlist::default(),
        );

        let response = service
            .search(None, prompt_request("AI chatbot", &["com"]))
            .await
            .expect("search succeeds");
        assert!(response.results.is_empty());

        let mut with_premium = prompt_request("AI chatbot", &["com"]);
        with_premium.include_premium = true;
        let response = service
            .search(None, with_premium)
            .await
            .expect("search succeeds");
        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].premium);
    }

    #[tokio::test]
    async fn price_ceiling_filters_expensive_names() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(4_500)),
            TldAllowlist::default(),
        );

        let mut request = prompt_request("startup", &["com"]);
        request.price_ceiling = Some(usd(2_000));
        let response = service
            .search(None, request)
            .await
            .expect("search succeeds");
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn unsafe_candidates_are_dropped_not_fatal() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::default(),
        );

        let response = service
            .search(None, candidates_request(&["good-name.com", "12345.com"]))
            .await
            .expect("safe subset proceeds");
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].domain, "good-name.com");
    }

    #[tokio::test]
    async fn all_unsafe_candidates_fail_with_sample_reasons() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::default(),
        );

        // Raw Cyrillic without the Unicode opt-in, as a client would paste it.
        let err = service
            .search(None, candidates_request(&["аpple.com"]))
            .await
            .expect_err("all candidates unsafe");
        assert_eq!(err.kind(), ErrorKind::UnsafeLabel);
        let samples = &err.details().expect("sample reasons")["sample_reasons"];
        assert_eq!(samples[0], "NonAsciiNotAllowed");
    }

    #[tokio::test]
    async fn disallowed_tlds_reject_only_when_nothing_survives() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::from_csv("com"),
        );

        let response = service
            .search(None, candidates_request(&["keep.com", "drop.pizza"]))
            .await
            .expect("permitted subset proceeds");
        assert_eq!(response.results.len(), 1);

        let err = service
            .search(None, candidates_request(&["drop.pizza"]))
            .await
            .expect_err("nothing permitted");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn allowlist_supplies_tlds_when_request_names_none() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::from_csv("dev,app"),
        );

        let mut request = prompt_request("tool", &[]);
        request.tlds = None;
        let response = service
            .search(None, request)
            .await
            .expect("search succeeds");
        let names: Vec<&str> = response
            .results
            .iter()
            .map(|result| result.domain.as_str())
            .collect();
        assert_eq!(names, ["tool.dev", "tool.app"]);
    }

    #[tokio::test]
    async fn limit_truncates_results() {
        let (service, _audit) = service_with(
            ScriptedRegistrarDriver::quoting(usd(1200)),
            TldAllowlist::default(),
        );

        let mut request = prompt_request("gadget", &["com", "net", "org", "io"]);
        request.limit = 2;
        let response = service
            .search(None, request)
            .await
            .expect("search succeeds");
        assert_eq!(response.results.len(), 2);
    }
}
