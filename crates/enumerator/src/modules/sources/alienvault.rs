use super::super::{http_request, Module, SourceModule};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct AlienVault {}

impl AlienVault {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for AlienVault {
    fn name(&self) -> String {
        "sources/alienvault".to_string()
    }

    fn description(&self) -> String {
        "Use the AlienVault OTX url_list API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Serialize, Deserialize)]
pub struct OtxUrl {
    pub hostname: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OtxResponse {
    pub url_list: Vec<OtxUrl>,
}

fn collect_hostnames(response: OtxResponse) -> Vec<String> {
    let hostnames: HashSet<String> = response
        .url_list
        .into_iter()
        .map(|url| url.hostname)
        .filter(|hostname| !hostname.is_empty())
        .collect();

    hostnames.into_iter().collect()
}

#[async_trait]
impl SourceModule for AlienVault {
    #[instrument(name = "fetch", level = "debug", fields(module = %self.name()), skip_all)]
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!(
            "https://otx.alienvault.com/api/v1/indicators/domain/{}/url_list?limit=100&page=1",
            domain
        );
        let res = http_request(http_client, &url).await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let response: OtxResponse = match res.json().await {
            Ok(response) => response,
            Err(_) => return Err(Error::InvalidHttpResponse(self.name())),
        };

        let hostnames = collect_hostnames(response);
        debug!("{} collected", hostnames.len());
        Ok(hostnames)
    }
}
