use crate::model::Candidate;
use lazy_regex::regex_is_match;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Hostname syntax per label: 63 chars max, letters/digits/hyphens, no
/// leading or trailing hyphen. Leading underscores are allowed for service
/// labels (`_dmarc`, `_domainkey`).
pub fn is_valid_hostname(host: &str) -> bool {
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        label.len() <= 63 && regex_is_match!(r"^[a-z0-9_]([a-z0-9_-]*[a-z0-9])?$", label)
    })
}

pub fn in_zone(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Merges per-source outputs into a deduplicated candidate set with
/// provenance. Inputs must come in registry order so that `first_seen` is
/// stable no matter which adapter finished first.
pub fn normalize(per_source: Vec<(String, Vec<String>)>, domain: &str) -> Vec<Candidate> {
    let mut merged: BTreeMap<String, Candidate> = BTreeMap::new();
    let mut order: usize = 0;

    for (source, hosts) in per_source {
        // canonicalize, then sort for a deterministic first-seen within
        // one source's output
        let mut hosts: Vec<String> = hosts
            .into_iter()
            .map(|host| host.trim().trim_end_matches('.').to_lowercase())
            .collect();
        hosts.sort();
        hosts.dedup();

        for host in hosts {
            if !is_valid_hostname(&host) {
                trace!("Discarding malformed hostname: {:?}", host);
                continue;
            }
            if !in_zone(&host, domain) {
                trace!("Discarding out of zone hostname: {:?}", host);
                continue;
            }

            match merged.get_mut(&host) {
                Some(candidate) => {
                    candidate.sources.insert(source.clone());
                }
                None => {
                    merged.insert(
                        host.clone(),
                        Candidate {
                            hostname: host,
                            sources: BTreeSet::from([source.clone()]),
                            first_seen: order,
                        },
                    );
                    order += 1;
                }
            }
        }
    }

    let mut candidates: Vec<Candidate> = merged.into_values().collect();
    candidates.sort_by_key(|candidate| candidate.first_seen);

    debug!("{} candidates after normalization", candidates.len());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_source(hosts: &[&str]) -> Vec<(String, Vec<String>)> {
        vec![(
            "sources/crtsh".to_string(),
            hosts.iter().map(|h| h.to_string()).collect(),
        )]
    }

    #[test]
    fn hostname_syntax() {
        assert!(is_valid_hostname("www.example.com"));
        assert!(is_valid_hostname("_dmarc.example.com"));
        assert!(is_valid_hostname("a-b-c.example.com"));

        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("*.example.com"));
        assert!(!is_valid_hostname("-www.example.com"));
        assert!(!is_valid_hostname("www-.example.com"));
        assert!(!is_valid_hostname("www..example.com"));
        assert!(!is_valid_hostname(&format!("{}.example.com", "a".repeat(64))));
    }

    #[test]
    fn discards_out_of_zone_and_malformed() {
        let candidates = normalize(
            one_source(&[
                "www.example.com",
                "evil.attacker.com",
                "notexample.com",
                "*.example.com",
            ]),
            "example.com",
        );

        let hostnames: Vec<&str> = candidates.iter().map(|c| c.hostname.as_str()).collect();
        assert_eq!(hostnames, vec!["www.example.com"]);
    }

    #[test]
    fn canonicalizes_case_and_trailing_dots() {
        let candidates = normalize(
            one_source(&["WWW.Example.COM", "www.example.com.", " www.example.com "]),
            "example.com",
        );

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].hostname, "www.example.com");
    }

    #[test]
    fn unions_provenance_across_sources() {
        let per_source = vec![
            (
                "sources/crtsh".to_string(),
                vec!["www.example.com".to_string(), "api.example.com".to_string()],
            ),
            (
                "sources/anubis".to_string(),
                vec!["www.example.com".to_string()],
            ),
        ];

        let candidates = normalize(per_source, "example.com");
        let www = candidates
            .iter()
            .find(|c| c.hostname == "www.example.com")
            .unwrap();

        assert_eq!(
            www.sources,
            BTreeSet::from(["sources/crtsh".to_string(), "sources/anubis".to_string()])
        );
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn first_seen_is_deterministic() {
        let per_source = || {
            vec![
                (
                    "sources/crtsh".to_string(),
                    vec!["b.example.com".to_string(), "a.example.com".to_string()],
                ),
                (
                    "sources/anubis".to_string(),
                    vec!["c.example.com".to_string()],
                ),
            ]
        };

        let first = normalize(per_source(), "example.com");
        let second = normalize(per_source(), "example.com");

        assert_eq!(first, second);
        let hostnames: Vec<&str> = first.iter().map(|c| c.hostname.as_str()).collect();
        assert_eq!(
            hostnames,
            vec!["a.example.com", "b.example.com", "c.example.com"]
        );
    }
}
