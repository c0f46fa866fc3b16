use crate::model::{Candidate, Classification, ResolutionResult};
use crate::wildcard::WildcardSignature;
use futures::{stream, StreamExt};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

pub type DnsResolver = Arc<TokioAsyncResolver>;

/// One lookup attempt, already collapsed into what the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Records(Vec<String>),
    NxDomain,
    Transient,
}

pub fn new_resolver(timeout: Duration) -> DnsResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    let dns_resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);

    debug!("DNS resolver created: {:?}", dns_resolver);
    Arc::new(dns_resolver)
}

/// Resolves one hostname with bounded retries. NXDOMAIN is terminal and
/// never retried; timeouts and server failures are retried up to `retries`
/// times before giving up as transient.
pub async fn lookup_host(dns_resolver: &DnsResolver, host: &str, retries: usize) -> LookupOutcome {
    let mut attempts = 0;
    loop {
        match dns_resolver.lookup_ip(host).await {
            Ok(lookup_ip) => {
                let values: Vec<String> = lookup_ip.iter().map(|ip| ip.to_string()).collect();
                return LookupOutcome::Records(values);
            }
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => return LookupOutcome::NxDomain,
                _ => {
                    if attempts >= retries {
                        trace!("Giving up on {} after {} attempts", host, attempts + 1);
                        return LookupOutcome::Transient;
                    }
                    attempts += 1;
                    trace!("Retrying {} ({}/{})", host, attempts, retries);
                }
            },
        }
    }
}

pub fn classify(
    candidate: Candidate,
    outcome: LookupOutcome,
    signature: &WildcardSignature,
) -> ResolutionResult {
    match outcome {
        LookupOutcome::Records(values) => {
            let classification = if signature.matches(&values) {
                Classification::WildcardFalsePositive
            } else {
                Classification::Resolved
            };
            ResolutionResult {
                candidate,
                values,
                classification,
            }
        }
        LookupOutcome::NxDomain => ResolutionResult {
            candidate,
            values: Vec::new(),
            classification: Classification::NxDomain,
        },
        LookupOutcome::Transient => ResolutionResult {
            candidate,
            values: Vec::new(),
            classification: Classification::TransientError,
        },
    }
}

/// Bounded worker pool over the candidate set. The signature is frozen
/// before the pool starts. Lookup is injected so the pool can run against
/// mock resolvers in tests.
#[instrument(name = "resolves", level = "info", skip_all)]
pub async fn resolve_all<F, Fut>(
    candidates: Vec<Candidate>,
    signature: &WildcardSignature,
    workers: usize,
    cancel: &CancellationToken,
    lookup: F,
) -> Vec<ResolutionResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = LookupOutcome>,
{
    let results: Vec<ResolutionResult> = stream::iter(candidates.into_iter())
        .map(|candidate| {
            let lookup = &lookup;
            async move {
                if cancel.is_cancelled() {
                    return classify(candidate, LookupOutcome::Transient, signature);
                }
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => LookupOutcome::Transient,
                    outcome = lookup(candidate.hostname.clone()) => outcome,
                };
                classify(candidate, outcome, signature)
            }
        })
        .buffer_unordered(workers.max(1))
        .collect()
        .await;

    let resolved = results
        .iter()
        .filter(|r| r.classification == Classification::Resolved)
        .count();
    debug!("{}/{} candidates resolved", resolved, results.len());
    results
}
