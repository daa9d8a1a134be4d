//! Origin classifier
//!
//! Tags a connection's source address as VPN/anonymizer or not. Private and
//! loopback addresses are decided locally; everything else goes through an
//! RDAP registry lookup whose organization text is scanned for a VPN
//! offering. Classification is advisory: any lookup failure degrades to
//! "not VPN".

use anyhow::Result;
use cached::proc_macro::cached;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("registry returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("registry response carries no descriptive text")]
    MissingFields,
}

pub struct OriginClassifier {
    client: Client,
    endpoint: String,
    enabled: bool,
}

impl OriginClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("netsnare/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            enabled: config.enabled,
        })
    }

    /// Decide whether `ip` belongs to a known VPN/anonymizer network.
    /// Private and loopback sources short-circuit to `false` with no I/O.
    pub async fn classify(&self, ip: IpAddr) -> bool {
        if is_private_or_loopback(&ip) {
            return false;
        }
        if !self.enabled {
            return false;
        }
        lookup_is_vpn(ip, self.client.clone(), self.endpoint.clone()).await
    }
}

/// Loopback plus the three RFC1918 blocks (10/8, 172.16/12, 192.168/16)
fn is_private_or_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_loopback(),
        IpAddr::V6(ipv6) => ipv6.is_loopback(),
    }
}

/// Memoized per source IP so repeated probes from one host do not hammer
/// the registry; failures also stay cached for the window.
#[cached(time = 3600, key = "String", convert = r#"{ ip.to_string() }"#)]
async fn lookup_is_vpn(ip: IpAddr, client: Client, endpoint: String) -> bool {
    match registry_lookup(ip, &client, &endpoint).await {
        Ok(vpn) => {
            debug!("Registry lookup for {}: vpn={}", ip, vpn);
            vpn
        }
        Err(e) => {
            warn!("Registry lookup failed for {}: {}", ip, e);
            false
        }
    }
}

async fn registry_lookup(
    ip: IpAddr,
    client: &Client,
    endpoint: &str,
) -> Result<bool, ClassifyError> {
    let url = format!("{}/{}", endpoint, ip);
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(ClassifyError::Status(resp.status()));
    }
    let rdap: RdapResponse = resp.json().await?;
    evaluate(&rdap)
}

/// Scan the registration record's descriptive text for a VPN offering
fn evaluate(rdap: &RdapResponse) -> Result<bool, ClassifyError> {
    let text = description_text(rdap);
    if text.is_empty() {
        return Err(ClassifyError::MissingFields);
    }
    Ok(indicates_vpn(&text))
}

fn indicates_vpn(text: &str) -> bool {
    text.to_lowercase().contains("vpn")
}

// RDAP response subset: the network name, remark text and registrant vcards
// are where registries put the organization description.

#[derive(Debug, Clone, Deserialize)]
struct RdapResponse {
    name: Option<String>,
    #[serde(default)]
    remarks: Vec<RdapRemark>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Clone, Deserialize)]
struct RdapRemark {
    title: Option<String>,
    #[serde(default)]
    description: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RdapEntity {
    #[serde(rename = "vcardArray")]
    vcard_array: Option<serde_json::Value>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

fn description_text(rdap: &RdapResponse) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(name) = &rdap.name {
        parts.push(name.clone());
    }
    for remark in &rdap.remarks {
        if let Some(title) = &remark.title {
            parts.push(title.clone());
        }
        parts.extend(remark.description.iter().cloned());
    }
    for entity in &rdap.entities {
        collect_entity_text(entity, &mut parts);
    }
    parts.join("\n")
}

fn collect_entity_text(entity: &RdapEntity, parts: &mut Vec<String>) {
    if let Some(vcard) = &entity.vcard_array {
        parts.extend(vcard_text(vcard));
    }
    for nested in &entity.entities {
        collect_entity_text(nested, parts);
    }
}

/// Pull the "fn" and "org" values out of a jCard property list
fn vcard_text(vcard: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(props) = vcard.get(1).and_then(|v| v.as_array()) {
        for prop in props {
            if let Some(prop) = prop.as_array() {
                let key = prop.first().and_then(|p| p.as_str());
                if matches!(key, Some("fn") | Some("org")) {
                    if let Some(value) = prop.get(3).and_then(|p| p.as_str()) {
                        out.push(value.to_string());
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;

    fn classifier_with_endpoint(endpoint: &str) -> OriginClassifier {
        OriginClassifier::new(&ClassifierConfig {
            enabled: true,
            endpoint: endpoint.to_string(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[test]
    fn loopback_and_private_ranges_short_circuit() {
        for addr in ["127.0.0.1", "10.1.2.3", "172.16.5.5", "192.168.1.100", "::1"] {
            assert!(
                is_private_or_loopback(&addr.parse().unwrap()),
                "{} should be locally significant",
                addr
            );
        }
        for addr in ["8.8.8.8", "172.32.0.1", "203.0.113.9", "2001:db8::1"] {
            assert!(
                !is_private_or_loopback(&addr.parse().unwrap()),
                "{} should not be locally significant",
                addr
            );
        }
    }

    #[tokio::test]
    async fn private_sources_never_reach_the_registry() {
        // The endpoint is not a server at all; a lookup attempt would fail
        // loudly rather than return false instantly.
        let classifier = classifier_with_endpoint("http://127.0.0.1:1");
        for addr in ["127.0.0.1", "10.1.2.3", "172.16.5.5", "192.168.1.100"] {
            assert!(!classifier.classify(addr.parse().unwrap()).await);
        }
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_not_vpn() {
        let classifier = classifier_with_endpoint("http://127.0.0.1:1");
        assert!(!classifier.classify("198.51.100.23".parse().unwrap()).await);
    }

    #[test]
    fn vpn_description_matches_case_insensitively() {
        assert!(indicates_vpn("ExpressVPN International Ltd"));
        assert!(indicates_vpn("Anonymous vPn Services LLC"));
        assert!(!indicates_vpn("Google LLC"));
        assert!(!indicates_vpn(""));
    }

    #[test]
    fn rdap_record_with_vpn_remark_classifies_true() {
        let rdap: RdapResponse = serde_json::from_value(serde_json::json!({
            "name": "EXAMPLE-NET",
            "remarks": [
                {"title": "description", "description": ["Commercial VPN egress range"]}
            ]
        }))
        .unwrap();
        assert!(evaluate(&rdap).unwrap());
    }

    #[test]
    fn rdap_record_with_plain_org_classifies_false() {
        let rdap: RdapResponse = serde_json::from_value(serde_json::json!({
            "name": "GOOGLE",
            "entities": [
                {"vcardArray": ["vcard", [
                    ["version", {}, "text", "4.0"],
                    ["fn", {}, "text", "Google LLC"]
                ]]}
            ]
        }))
        .unwrap();
        assert!(!evaluate(&rdap).unwrap());
    }

    #[test]
    fn rdap_record_with_vpn_vcard_classifies_true() {
        let rdap: RdapResponse = serde_json::from_value(serde_json::json!({
            "entities": [
                {"entities": [
                    {"vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["org", {}, "text", "NordVPN S.A."]
                    ]]}
                ]}
            ]
        }))
        .unwrap();
        assert!(evaluate(&rdap).unwrap());
    }

    #[test]
    fn rdap_record_without_text_is_missing_fields() {
        let rdap: RdapResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(evaluate(&rdap), Err(ClassifyError::MissingFields)));
    }
}
