use super::super::{http_request, Module, SourceModule};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct Sublist3r {}

impl Sublist3r {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for Sublist3r {
    fn name(&self) -> String {
        "sources/sublist3r".to_string()
    }

    fn description(&self) -> String {
        "Use the sublist3r.com aggregation API to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SourceModule for Sublist3r {
    #[instrument(name = "fetch", level = "debug", fields(module = %self.name()), skip_all)]
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!("https://api.sublist3r.com/search.php?domain={}", domain);
        let res = http_request(http_client, &url).await?;

        if !res.status().is_success() {
            return Err(Error::InvalidHttpResponse(self.name()));
        }

        // plain JSON array of hostnames
        let hostnames: Vec<String> = match res.json().await {
            Ok(hostnames) => hostnames,
            Err(_) => return Err(Error::InvalidHttpResponse(self.name())),
        };

        debug!("{} collected", hostnames.len());
        Ok(hostnames)
    }
}
