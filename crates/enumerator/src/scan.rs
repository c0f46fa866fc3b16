use crate::candidates::{self, normalize};
use crate::dns;
use crate::model::{Classification, FinalRecord, ProbeResult, ResolutionResult};
use crate::modules::{self, SourceModule};
use crate::options::EnumerateOptions;
use crate::probe;
use crate::wildcard;
use crate::{Error, Result};
use futures::{stream, StreamExt};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// All enabled sources run concurrently; each is timeout-bounded on its own,
/// so the fan-out needs no extra limit.
const SOURCES_CONCURRENCY: usize = 8;

/// Runs the whole pipeline to completion. See `enumerate_with_cancel` for
/// the cancellable variant.
pub async fn enumerate(target: &str, options: &EnumerateOptions) -> Result<Vec<FinalRecord>> {
    enumerate_with_cancel(target, options, CancellationToken::new()).await
}

/// Discovery, wildcard baseline, resolution, probing, aggregation. The
/// token cancels all in-flight workers at their next checkpoint; whatever
/// already completed is still aggregated and returned.
#[instrument(name = "enumerate", level = "info", skip_all, fields(target = target))]
pub async fn enumerate_with_cancel(
    target: &str,
    options: &EnumerateOptions,
    cancel: CancellationToken,
) -> Result<Vec<FinalRecord>> {
    let target = validate_target(target)?;

    let http_client = Client::builder().timeout(options.source_timeout).build()?;

    let source_modules: Vec<Box<dyn SourceModule>> = modules::source_modules()
        .into_iter()
        .filter(|module| is_enabled(&module.name(), &options.enabled_sources))
        .collect();

    // passive source fan-out, merged in registry order
    let per_source = fetch_sources(
        &http_client,
        &target,
        &source_modules,
        options.source_timeout,
        &cancel,
    )
    .await;
    let candidates = normalize(per_source, &target);
    info!("{} candidates to resolve", candidates.len());

    // single lookup path, shared by the baseline probes and the pool
    let dns_resolver = dns::new_resolver(options.dns_timeout);
    let dns_retries = options.dns_retries;
    let lookup = |host: String| {
        let dns_resolver = dns_resolver.clone();
        async move { dns::lookup_host(&dns_resolver, &host, dns_retries).await }
    };

    // the signature is frozen here; the pool only ever reads it
    let signature =
        wildcard::detect_signature(&target, options.wildcard_probe_count, &lookup).await;

    let resolutions = dns::resolve_all(
        candidates,
        &signature,
        options.resolver_workers,
        &cancel,
        &lookup,
    )
    .await;

    // gate: only genuinely resolved hosts reach the prober
    let to_probe: Vec<String> = resolutions
        .iter()
        .filter(|resolution| resolution.classification == Classification::Resolved)
        .map(|resolution| resolution.candidate.hostname.clone())
        .collect();
    info!("{} hosts to probe", to_probe.len());

    let probe_client = probe::new_http_client(options.http_timeout)?;
    let http_fallback = options.http_fallback;
    let probes = probe::probe_all(to_probe, options.prober_workers, &cancel, |hostname| {
        let probe_client = probe_client.clone();
        async move { probe::probe_host(&probe_client, &hostname, http_fallback).await }
    })
    .await;

    let records = aggregate(resolutions, probes);
    info!("{} subdomains in final record set", records.len());
    Ok(records)
}

/// The only failure surfaced to callers, raised before any network work.
fn validate_target(target: &str) -> Result<String> {
    let target = target.trim().trim_end_matches('.').to_lowercase();
    if !target.contains('.') || !candidates::is_valid_hostname(&target) {
        return Err(Error::InvalidDomain(target));
    }
    Ok(target)
}

fn is_enabled(name: &str, enabled_sources: &[String]) -> bool {
    enabled_sources
        .iter()
        .any(|enabled| name == enabled || name.strip_prefix("sources/") == Some(enabled.as_str()))
}

#[instrument(name = "sources", level = "info", skip_all)]
async fn fetch_sources(
    http_client: &Client,
    target: &str,
    source_modules: &[Box<dyn SourceModule>],
    source_timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<(String, Vec<String>)> {
    let mut per_source: Vec<(usize, String, Vec<String>)> =
        stream::iter(source_modules.iter().enumerate())
            .map(|(index, module)| async move {
                if cancel.is_cancelled() {
                    return (index, module.name(), Vec::new());
                }

                let fetched = tokio::select! {
                    _ = cancel.cancelled() => Ok(Vec::new()),
                    fetched = tokio::time::timeout(source_timeout, module.fetch(http_client, target)) => {
                        fetched.unwrap_or(Err(Error::SourceUnavailable(module.name())))
                    }
                };

                match fetched {
                    Ok(hostnames) => {
                        info!("{}: {} raw hostnames", module.name(), hostnames.len());
                        (index, module.name(), hostnames)
                    }
                    Err(err) => {
                        // a dead source reduces coverage, it never aborts the run
                        error!("{}: {}", module.name(), err);
                        (index, module.name(), Vec::new())
                    }
                }
            })
            .buffer_unordered(SOURCES_CONCURRENCY)
            .collect()
            .await;

    // back to registry order so normalization stays deterministic
    per_source.sort_by_key(|(index, _, _)| *index);
    per_source
        .into_iter()
        .map(|(_, name, hostnames)| (name, hostnames))
        .collect()
}

/// Joins resolution and probe outcomes by hostname. At most one record per
/// hostname; wildcard false positives and failed resolutions never appear.
fn aggregate(resolutions: Vec<ResolutionResult>, probes: Vec<ProbeResult>) -> Vec<FinalRecord> {
    let mut probe_by_host: BTreeMap<String, ProbeResult> = probes
        .into_iter()
        .map(|probe| (probe.hostname.clone(), probe))
        .collect();

    let mut records: BTreeMap<String, FinalRecord> = BTreeMap::new();
    for resolution in resolutions {
        if resolution.classification != Classification::Resolved {
            continue;
        }

        let hostname = resolution.candidate.hostname.clone();
        let record = match probe_by_host.remove(&hostname) {
            Some(probe) => FinalRecord {
                hostname: hostname.clone(),
                resolved_values: resolution.values,
                alive: probe.status_code.is_some(),
                status_code: probe.status_code,
                title: probe.title,
                server: probe.server,
                probe_failure: probe.failure,
                sources: resolution.candidate.sources.into_iter().collect(),
            },
            // resolved but never probed (cancelled or gated out): keep it,
            // dead, with null probe fields
            None => FinalRecord {
                hostname: hostname.clone(),
                resolved_values: resolution.values,
                alive: false,
                status_code: None,
                title: None,
                server: None,
                probe_failure: None,
                sources: resolution.candidate.sources.into_iter().collect(),
            },
        };

        records.entry(hostname).or_insert(record);
    }

    records.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::LookupOutcome;
    use crate::model::Candidate;
    use crate::modules::Module;
    use crate::wildcard::WildcardSignature;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    fn candidate(host: &str) -> Candidate {
        Candidate {
            hostname: host.to_string(),
            sources: BTreeSet::from(["sources/crtsh".to_string()]),
            first_seen: 0,
        }
    }

    fn resolution(host: &str, values: &[&str], classification: Classification) -> ResolutionResult {
        ResolutionResult {
            candidate: candidate(host),
            values: values.iter().map(|v| v.to_string()).collect(),
            classification,
        }
    }

    fn probe(host: &str, status: u16, title: Option<&str>, server: Option<&str>) -> ProbeResult {
        ProbeResult {
            hostname: host.to_string(),
            scheme: Some("https".to_string()),
            status_code: Some(status),
            title: title.map(|t| t.to_string()),
            server: server.map(|s| s.to_string()),
            failure: None,
        }
    }

    /// Canned source for fan-out tests; `hostnames: None` simulates a dead
    /// provider.
    struct StaticSource {
        name: &'static str,
        hostnames: Option<Vec<&'static str>>,
    }

    impl Module for StaticSource {
        fn name(&self) -> String {
            format!("sources/{}", self.name)
        }
        fn description(&self) -> String {
            "Canned source for tests".to_string()
        }
    }

    #[async_trait]
    impl SourceModule for StaticSource {
        async fn fetch(&self, _http_client: &Client, _domain: &str) -> Result<Vec<String>> {
            match &self.hostnames {
                Some(hostnames) => Ok(hostnames.iter().map(|h| h.to_string()).collect()),
                None => Err(Error::SourceUnavailable(self.name())),
            }
        }
    }

    #[tokio::test]
    async fn failing_source_never_aborts_the_fan_out() {
        let source_modules: Vec<Box<dyn SourceModule>> = vec![
            Box::new(StaticSource {
                name: "good",
                hostnames: Some(vec!["www.example.com"]),
            }),
            Box::new(StaticSource {
                name: "dead",
                hostnames: None,
            }),
            Box::new(StaticSource {
                name: "other",
                hostnames: Some(vec!["api.example.com"]),
            }),
        ];

        let http_client = Client::new();
        let per_source = fetch_sources(
            &http_client,
            "example.com",
            &source_modules,
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await;

        // run completed, registry order kept, dead source contributed nothing
        assert_eq!(per_source.len(), 3);
        assert_eq!(per_source[0].0, "sources/good");
        assert_eq!(per_source[0].1, vec!["www.example.com".to_string()]);
        assert_eq!(per_source[1].0, "sources/dead");
        assert!(per_source[1].1.is_empty());
        assert_eq!(per_source[2].1, vec!["api.example.com".to_string()]);
    }

    #[test]
    fn rejects_invalid_target_before_any_work() {
        assert!(matches!(
            validate_target("not a domain"),
            Err(Error::InvalidDomain(_))
        ));
        assert!(matches!(
            validate_target("nodots"),
            Err(Error::InvalidDomain(_))
        ));
        assert_eq!(validate_target("Example.COM.").unwrap(), "example.com");
    }

    #[test]
    fn source_filter_accepts_short_and_full_names() {
        assert!(is_enabled("sources/crtsh", &["crtsh".to_string()]));
        assert!(is_enabled("sources/crtsh", &["sources/crtsh".to_string()]));
        assert!(!is_enabled("sources/crtsh", &["anubis".to_string()]));
    }

    #[test]
    fn aggregate_joins_probe_fields() {
        // probe returns HTTP 200, a title and a server banner
        let records = aggregate(
            vec![resolution(
                "www.example.com",
                &["10.0.0.5"],
                Classification::Resolved,
            )],
            vec![probe(
                "www.example.com",
                200,
                Some("Example Domain"),
                Some("ECS (nyb/1D2A)"),
            )],
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.alive);
        assert_eq!(record.status_code, Some(200));
        assert_eq!(record.title.as_deref(), Some("Example Domain"));
        assert_eq!(record.server.as_deref(), Some("ECS (nyb/1D2A)"));
        assert_eq!(record.sources, vec!["sources/crtsh".to_string()]);
    }

    #[test]
    fn aggregate_drops_everything_but_resolved() {
        let records = aggregate(
            vec![
                resolution("www.example.com", &["10.0.0.5"], Classification::Resolved),
                resolution(
                    "random-noexist.example.com",
                    &["93.184.216.34"],
                    Classification::WildcardFalsePositive,
                ),
                resolution("gone.example.com", &[], Classification::NxDomain),
                resolution("flaky.example.com", &[], Classification::TransientError),
            ],
            Vec::new(),
        );

        let hostnames: Vec<&str> = records.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(hostnames, vec!["www.example.com"]);
    }

    #[test]
    fn unprobed_resolved_host_is_kept_dead_with_null_fields() {
        let records = aggregate(
            vec![resolution(
                "mx.example.com",
                &["10.0.0.9"],
                Classification::Resolved,
            )],
            Vec::new(),
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(!record.alive);
        assert_eq!(record.status_code, None);
        assert_eq!(record.title, None);
        assert_eq!(record.server, None);
        assert_eq!(record.resolved_values, vec!["10.0.0.9".to_string()]);
    }

    #[test]
    fn aggregate_output_is_sorted_and_unique() {
        let records = aggregate(
            vec![
                resolution("b.example.com", &["10.0.0.2"], Classification::Resolved),
                resolution("a.example.com", &["10.0.0.1"], Classification::Resolved),
                resolution("b.example.com", &["10.0.0.2"], Classification::Resolved),
            ],
            Vec::new(),
        );

        let hostnames: Vec<&str> = records.iter().map(|r| r.hostname.as_str()).collect();
        assert_eq!(hostnames, vec!["a.example.com", "b.example.com"]);
    }

    /// Full pipeline over mocks: same records no matter the pool sizes.
    #[tokio::test]
    async fn mock_pipeline_is_idempotent_across_worker_counts() {
        let candidates = vec![
            candidate("www.example.com"),
            candidate("api.example.com"),
            candidate("random-noexist.example.com"),
            candidate("gone.example.com"),
        ];

        let lookup = |host: String| async move {
            match host.as_str() {
                "www.example.com" => LookupOutcome::Records(vec!["10.0.0.5".to_string()]),
                "api.example.com" => LookupOutcome::Records(vec!["10.0.0.6".to_string()]),
                "random-noexist.example.com" => {
                    LookupOutcome::Records(vec!["93.184.216.34".to_string()])
                }
                _ => LookupOutcome::NxDomain,
            }
        };
        let mock_probe = |hostname: String| async move {
            let status = if hostname == "www.example.com" { 200 } else { 404 };
            ProbeResult {
                hostname,
                scheme: Some("https".to_string()),
                status_code: Some(status),
                title: None,
                server: None,
                failure: None,
            }
        };

        let signature =
            WildcardSignature::Fixed(BTreeSet::from(["93.184.216.34".to_string()]));
        let cancel = CancellationToken::new();
        let mut reference: Option<Vec<FinalRecord>> = None;

        for (resolver_workers, prober_workers) in [(1, 1), (8, 4)] {
            let resolutions = dns::resolve_all(
                candidates.clone(),
                &signature,
                resolver_workers,
                &cancel,
                lookup,
            )
            .await;

            let to_probe: Vec<String> = resolutions
                .iter()
                .filter(|r| r.classification == Classification::Resolved)
                .map(|r| r.candidate.hostname.clone())
                .collect();

            let probes = probe::probe_all(to_probe, prober_workers, &cancel, mock_probe).await;
            let records = aggregate(resolutions, probes);

            // wildcard artifact filtered, NXDOMAIN gone, the rest probed
            let hostnames: Vec<&str> = records.iter().map(|r| r.hostname.as_str()).collect();
            assert_eq!(hostnames, vec!["api.example.com", "www.example.com"]);

            match &reference {
                Some(expected) => assert_eq!(&records, expected),
                None => reference = Some(records),
            }
        }
    }
}
