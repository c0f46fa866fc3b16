use super::super::{http_request, Module, SourceModule};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument, trace};

// region:        --- Module info

pub struct CrtSh {}

impl CrtSh {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for CrtSh {
    fn name(&self) -> String {
        "sources/crtsh".to_string()
    }

    fn description(&self) -> String {
        "Use crt.sh/ certificate transparency logs to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[derive(Debug, Serialize, Deserialize)]
pub struct CrtShEntry {
    pub name_value: String,
}

/// `name_value` holds one certificate name per line; wildcard names carry
/// no resolvable hostname and are dropped here.
fn collect_hostnames(entries: Vec<CrtShEntry>) -> Vec<String> {
    let hostnames: HashSet<String> = entries
        .into_iter()
        .flat_map(|entry| {
            entry
                .name_value
                .split('\n')
                .map(|hostname| hostname.trim().to_string())
                .collect::<Vec<String>>()
        })
        .filter(|hostname| !hostname.contains('*'))
        .inspect(|hostname| trace!("Collecting: {:?}", hostname))
        .collect();

    hostnames.into_iter().collect()
}

#[async_trait]
impl SourceModule for CrtSh {
    #[instrument(name = "fetch", level = "debug", fields(module = %self.name()), skip_all)]
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!("https://crt.sh/?q=%25.{}&output=json", domain);
        let res = http_request(http_client, &url).await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        let entries: Vec<CrtShEntry> = match res.json().await {
            Ok(entries) => entries,
            Err(_) => return Err(Error::InvalidHttpResponse(self.name())),
        };

        let hostnames = collect_hostnames(entries);
        debug!("{} collected", hostnames.len());
        Ok(hostnames)
    }
}
