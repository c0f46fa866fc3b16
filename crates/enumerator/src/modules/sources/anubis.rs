use super::super::{http_request, Module, SourceModule};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

// region:        --- Module info

pub struct Anubis {}

impl Anubis {
    pub fn new() -> Self {
        Self {}
    }
}

impl Module for Anubis {
    fn name(&self) -> String {
        "sources/anubis".to_string()
    }

    fn description(&self) -> String {
        "Use the AnubisDB (jldc.me) dataset to find subdomains".to_string()
    }
}

// endregion:     --- Module info

#[async_trait]
impl SourceModule for Anubis {
    #[instrument(name = "fetch", level = "debug", fields(module = %self.name()), skip_all)]
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>> {
        let url = format!("https://jldc.me/anubis/subdomains/{}", domain);
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
