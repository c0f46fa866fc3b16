use crate::dns::LookupOutcome;
use futures::future::join_all;
use rand::{distr::Alphanumeric, Rng};
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{info, instrument, warn};

const SYNTHETIC_LABEL_LEN: usize = 12;

/// Baseline learned from resolving synthetic labels that should not exist.
/// Frozen before the resolver pool starts; readers never see it change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardSignature {
    /// No synthetic label resolved: the zone has no wildcard record and no
    /// filtering is applied.
    None,
    /// Synthetic labels disagreed with each other. Filtering is disabled for
    /// the run rather than guessing which answers are junk.
    Unreliable,
    /// Every synthetic label resolved to exactly this value set; candidates
    /// resolving to the same set are artifacts of the wildcard.
    Fixed(BTreeSet<String>),
}

impl WildcardSignature {
    pub fn matches(&self, values: &[String]) -> bool {
        match self {
            Self::Fixed(set) => {
                let observed: BTreeSet<&str> = values.iter().map(String::as_str).collect();
                observed.len() == set.len() && set.iter().all(|v| observed.contains(v.as_str()))
            }
            Self::None | Self::Unreliable => false,
        }
    }
}

/// A random label under the target, unlikely to be provisioned.
pub fn synthetic_hostname(domain: &str) -> String {
    let label: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SYNTHETIC_LABEL_LEN)
        .map(char::from)
        .collect();
    format!("{}.{}", label.to_lowercase(), domain)
}

/// Derives the signature from per-probe observations (`None` = the label did
/// not resolve).
pub fn signature_from_probes(observations: &[Option<BTreeSet<String>>]) -> WildcardSignature {
    let resolved: Vec<&BTreeSet<String>> = observations.iter().flatten().collect();

    if resolved.is_empty() {
        return WildcardSignature::None;
    }
    if resolved.len() < observations.len() {
        return WildcardSignature::Unreliable;
    }

    let first = resolved[0];
    if first.is_empty() || resolved.iter().any(|set| *set != first) {
        return WildcardSignature::Unreliable;
    }

    WildcardSignature::Fixed(first.clone())
}

/// Probes `probe_count` synthetic labels concurrently through the same
/// lookup path candidates will use and freezes the resulting signature.
#[instrument(name = "wildcard", level = "info", skip_all, fields(domain = domain))]
pub async fn detect_signature<F, Fut>(
    domain: &str,
    probe_count: usize,
    lookup: F,
) -> WildcardSignature
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = LookupOutcome>,
{
    let probes = (0..probe_count.max(1)).map(|_| lookup(synthetic_hostname(domain)));

    let observations: Vec<Option<BTreeSet<String>>> = join_all(probes)
        .await
        .into_iter()
        .map(|outcome| match outcome {
            LookupOutcome::Records(values) => Some(values.into_iter().collect()),
            LookupOutcome::NxDomain | LookupOutcome::Transient => None,
        })
        .collect();

    let signature = signature_from_probes(&observations);
    match &signature {
        WildcardSignature::None => info!("No wildcard DNS detected"),
        WildcardSignature::Unreliable => {
            warn!("Synthetic probes disagree, wildcard filtering disabled for this run")
        }
        WildcardSignature::Fixed(set) => {
            info!("Wildcard DNS detected, filtering answers equal to {:?}", set)
        }
    }

    signature
}
