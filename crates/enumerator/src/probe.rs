use crate::model::{ProbeFailure, ProbeResult};
use crate::Result;
use futures::{stream, StreamExt};
use lazy_regex::regex;
use reqwest::{redirect, Client};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

// bounds on what we accept from untrusted hosts
const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_TITLE_CHARS: usize = 200;
const MAX_REDIRECTS: usize = 5;

const PROBE_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) enumerator/0.1";

/// Client for liveness probes. Certificate validation is off: the point is
/// confirming a listener on an untrusted host, not trusting it.
pub fn new_http_client(timeout: Duration) -> Result<Client> {
    let http_client = Client::builder()
        .timeout(timeout)
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(true)
        .user_agent(PROBE_USER_AGENT)
        .build()?;
    Ok(http_client)
}

/// Probes one hostname: HTTPS first, plain HTTP as fallback when enabled.
/// Never fails the run; everything folds into the returned record.
pub async fn probe_host(http_client: &Client, hostname: &str, http_fallback: bool) -> ProbeResult {
    let schemes: &[&str] = if http_fallback {
        &["https", "http"]
    } else {
        &["https"]
    };

    let mut failure = None;
    for scheme in schemes {
        let url = format!("{}://{}", scheme, hostname);
        trace!("Probing {}", url);

        match http_client.get(&url).send().await {
            Ok(res) => {
                let status_code = res.status().as_u16();
                let server = res
                    .headers()
                    .get(reqwest::header::SERVER)
                    .and_then(|value| value.to_str().ok())
                    .map(|value| value.to_string());
                let body = read_body_prefix(res).await;

                return ProbeResult {
                    hostname: hostname.to_string(),
                    scheme: Some(scheme.to_string()),
                    status_code: Some(status_code),
                    title: body.as_deref().and_then(extract_title),
                    server,
                    failure: None,
                };
            }
            Err(err) => {
                debug!("Probe {} failed: {}", url, err);
                failure = Some(classify_failure(&err));
            }
        }
    }

    ProbeResult {
        hostname: hostname.to_string(),
        scheme: None,
        status_code: None,
        title: None,
        server: None,
        failure,
    }
}

fn classify_failure(err: &reqwest::Error) -> ProbeFailure {
    if err.is_connect() || err.is_timeout() {
        ProbeFailure::Unreachable
    } else {
        ProbeFailure::ProtocolError
    }
}

/// Reads at most `MAX_BODY_BYTES` of the response body; anything past that
/// cannot contain the title of a page worth reporting.
async fn read_body_prefix(mut res: reqwest::Response) -> Option<String> {
    let mut buf: Vec<u8> = Vec::new();
    while let Ok(Some(chunk)) = res.chunk().await {
        let remaining = MAX_BODY_BYTES - buf.len();
        buf.extend_from_slice(&chunk[..chunk.len().min(remaining)]);
        if buf.len() >= MAX_BODY_BYTES {
            break;
        }
    }

    if buf.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Defensive title extraction: malformed or missing markup yields `None`,
/// never an error.
pub fn extract_title(body: &str) -> Option<String> {
    let caps = regex!(r"(?is)<title[^>]*>(.*?)</title>").captures(body)?;
    let raw = caps.get(1)?.as_str();

    let collapsed = raw.split_whitespace().collect::<Vec<&str>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    Some(collapsed.chars().take(MAX_TITLE_CHARS).collect())
}

/// Bounded worker pool over the gated hostnames, collecting through a
/// channel. The prober is injected so the pool can run against mocks.
#[instrument(name = "probes", level = "info", skip_all)]
pub async fn probe_all<F, Fut>(
    hostnames: Vec<String>,
    workers: usize,
    cancel: &CancellationToken,
    probe: F,
) -> Vec<ProbeResult>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = ProbeResult>,
{
    // every host sends exactly one result, so size the channel for all of
    // them and let the collection happen after the pool drains
    let (output_tx, output_rx) = mpsc::channel(hostnames.len().max(1));

    stream::iter(hostnames.into_iter())
        .for_each_concurrent(workers.max(1), |hostname| {
            let output_tx = output_tx.clone();
            let probe = &probe;
            async move {
                if cancel.is_cancelled() {
                    return;
                }
                let result = tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = probe(hostname) => result,
                };
                let _ = output_tx.send(result).await;
            }
        })
        .await;
    drop(output_tx);

    let results: Vec<ProbeResult> = ReceiverStream::new(output_rx).collect().await;
    debug!("{} hosts probed", results.len());
    results
}
