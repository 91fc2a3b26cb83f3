use url::Url;

use crate::error::BackendError;

/// Runtime configuration, read once at startup from the environment (a
/// `.env` file is honored when present).
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub traction_base_url: Url,
    pub traction_tenant_id: String,
    pub traction_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self, BackendError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| BackendError::Config(format!("PORT is not a port number: {raw}")))?,
            Err(_) => 5511,
        };
        let traction_base_url = require("TRACTION_URL")?
            .parse()
            .map_err(|err| BackendError::Config(format!("TRACTION_URL is not a URL: {err}")))?;
        Ok(Self {
            port,
            traction_base_url,
            traction_tenant_id: require("TRACTION_TENANT_ID")?,
            traction_api_key: require("TRACTION_API_KEY")?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn require(name: &str) -> Result<String, BackendError> {
    std::env::var(name).map_err(|_| BackendError::Config(format!("{name} is not set")))
}
