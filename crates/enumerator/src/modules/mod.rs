pub mod sources;

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, error, info, instrument};

use self::sources::alienvault::AlienVault;
use self::sources::anubis::Anubis;
use self::sources::crtsh::CrtSh;
use self::sources::hackertarget::HackerTarget;
use self::sources::sublist3r::Sublist3r;

pub trait Module {
    fn name(&self) -> String;
    fn description(&self) -> String;
}

/// One passive intelligence provider. Adapters differ in protocol and
/// response shape but all collapse into raw candidate hostnames; new
/// providers are added by implementing this trait, never by touching the
/// pipeline.
#[async_trait]
pub trait SourceModule: Module + Send + Sync {
    async fn fetch(&self, http_client: &Client, domain: &str) -> Result<Vec<String>>;
}

/// Fixed registry order; candidate discovery order depends on it.
pub fn source_modules() -> Vec<Box<dyn SourceModule>> {
    vec![
        Box::new(CrtSh::new()),
        Box::new(Anubis::new()),
        Box::new(HackerTarget::new()),
        Box::new(Sublist3r::new()),
        Box::new(AlienVault::new()),
    ]
}

pub fn source_names() -> Vec<String> {
    source_modules()
        .into_iter()
        .map(|module| module.name())
        .collect()
}

pub fn display_all() {
    let source_modules = source_modules();
    println!("\nPassive sources");
    for module in source_modules {
        println!("- {:25}{}", module.name(), module.description());
    }
}

// region:        --- HTTP requests

#[instrument(name = "HTTP_request", level = "info", skip_all, fields(url = url))]
pub async fn http_request(http_client: &Client, url: &str) -> Result<Response> {
    info!("Sending request");
    match http_client.get(url).send().await {
        Ok(res) => {
            info!("Receive with status: {}", res.status());
            debug!("Response: {:?}", res);
            Ok(res)
        }
        Err(err) => {
            error!("Reason: {}", err);
            Err(Error::Reqwest(err))
        }
    }
}

// endregion:     --- HTTP requests
