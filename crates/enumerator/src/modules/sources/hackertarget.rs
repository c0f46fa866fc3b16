use super::super::{http_request, Module, SourceModule};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct HackerTarget {}

impl HackerTarget {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for HackerTarget {
    fn name(&self) -> String {
        "sources/hackertarget".to_string()
    }

    fn description(&self) -> String {
        "Use the hackertarget.com host search API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

/// Response is CSV, one `hostname,ip` pair per line. The API reports quota
/// errors as a plain text line without a comma, which parses to nothing.
fn parse_host_lines(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.split(',').next())
        .filter(|hostname| !hostname.is_empty() && !hostname.contains(' '))
        .map(|hostname| hostname.to_string())
        .collect()
}

#[async_trait]
impl SourceModule for HackerTarget {
    #[instrument(name = "fetch", level = "debug", fields(module = %self.name()), skip_all)]
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!("https://api.hackertarget.com/hostsearch/?q={}", domain);
        let res = http_request(http_client, &url).await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let body = res.text().await?;
        let hostnames = parse_host_lines(&body);

        debug!("{} collected", hostnames.len());
        Ok(hostnames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_host_lines() {
        let body = "www.example.com,93.184.216.34\nmail.example.com,10.0.0.9\n";
        assert_eq!(
            parse_host_lines(body),
            vec!["www.example.com", "mail.example.com"]
        );
    }

    #[test]
    fn quota_error_text_parses_to_nothing() {
        let body = "API count exceeded - Increase Quota with Membership";
        assert!(parse_host_lines(body).is_empty());
    }
}
