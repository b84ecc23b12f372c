//! Built-in DNS record templates applied after registration.
//!
//! Templates describe records relative to the purchased name: a host of
//! `"@"` expands to the apex and a value of `"@"` expands to the domain
//! itself. Unknown template ids are a client error, surfaced before any
//! registrar call.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::domain::DomainName;
use crate::domain::ports::{DnsRecord, RecordType};

/// Default template applied when the client does not choose one.
pub const DEFAULT_TEMPLATE_ID: &str = "web-basic";

/// Placeholder address parked domains resolve to until operators repoint
/// them (TEST-NET-1, guaranteed unroutable).
const PARKING_ADDRESS: &str = "192.0.2.1";

#[derive(Debug, Clone)]
struct TemplateRecord {
    record_type: RecordType,
    host: &'static str,
    value: &'static str,
    ttl: u32,
    prio: Option<u16>,
}

/// A named set of DNS records provisioned together.
#[derive(Debug, Clone)]
pub struct DnsTemplate {
    id: &'static str,
    records: Vec<TemplateRecord>,
}

impl DnsTemplate {
    /// Template identifier as sent by clients.
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Materialize the records for a concrete domain.
    pub fn expand(&self, domain: &DomainName) -> Vec<DnsRecord> {
        self.records
            .iter()
            .map(|record| DnsRecord {
                record_type: record.record_type,
                name: expand_host(record.host, domain),
                value: expand_value(record.value, domain),
                ttl: record.ttl,
                prio: record.prio,
            })
            .collect()
    }
}

fn expand_host(host: &str, domain: &DomainName) -> String {
    if host == "@" {
        domain.as_str().to_owned()
    } else {
        format!("{host}.{domain}")
    }
}

fn expand_value(value: &str, domain: &DomainName) -> String {
    if value == "@" {
        domain.as_str().to_owned()
    } else {
        value.to_owned()
    }
}

static TEMPLATES: Lazy<HashMap<&'static str, DnsTemplate>> = Lazy::new(|| {
    let templates = [
        DnsTemplate {
            id: "web-basic",
            records: vec![
                TemplateRecord {
                    record_type: RecordType::A,
                    host: "@",
                    value: PARKING_ADDRESS,
                    ttl: 3600,
                    prio: None,
                },
                TemplateRecord {
                    record_type: RecordType::Cname,
                    host: "www",
                    value: "@",
                    ttl: 3600,
                    prio: None,
                },
            ],
        },
        DnsTemplate {
            id: "parking",
            records: vec![TemplateRecord {
                record_type: RecordType::A,
                host: "@",
                value: PARKING_ADDRESS,
                ttl: 86400,
                prio: None,
            }],
        },
    ];
    templates
        .into_iter()
        .map(|template| (template.id, template))
        .collect()
});

/// Look up a template by id.
pub fn lookup(id: &str) -> Option<&'static DnsTemplate> {
    TEMPLATES.get(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(raw: &str) -> DomainName {
        DomainName::parse(raw).expect("valid name")
    }

    #[test]
    fn default_template_exists() {
        assert!(lookup(DEFAULT_TEMPLATE_ID).is_some());
    }

    #[test]
    fn unknown_template_is_absent() {
        assert!(lookup("load-balanced-saas").is_none());
    }

    #[test]
    fn web_basic_expands_apex_and_www() {
        let template = lookup("web-basic").expect("registered");
        let records = template.expand(&name("example.com"));

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, RecordType::A);
        assert_eq!(records[0].name, "example.com");
        assert_eq!(records[0].value, PARKING_ADDRESS);
        assert_eq!(records[1].record_type, RecordType::Cname);
        assert_eq!(records[1].name, "www.example.com");
        assert_eq!(records[1].value, "example.com");
    }
}
