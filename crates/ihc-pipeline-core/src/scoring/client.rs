use super::wire::{ScoringRequest, ScoringResponse};
use crate::config::ScoringConfig;
use crate::error::Error;
use std::io::BufReader;
use std::time::Duration;
use tracing::{debug, error};

/// Ceiling for one batch round trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Submits one batch to the attribution scoring service.
///
/// `Err` means the call itself failed (transport, non-2xx, undecodable body)
/// and the run must abort. Application-level failures come back as an `Ok`
/// response for the caller to inspect.
pub trait ScoringClient {
    fn score_batch(&self, request: &ScoringRequest) -> Result<ScoringResponse, Error>;
}

pub struct HttpScoringClient {
    agent: ureq::Agent,
    config: ScoringConfig,
}

impl HttpScoringClient {
    pub fn new(config: ScoringConfig) -> Result<Self, Error> {
        config.validate()?;
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self { agent, config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }
}

impl ScoringClient for HttpScoringClient {
    fn score_batch(&self, request: &ScoringRequest) -> Result<ScoringResponse, Error> {
        debug!(
            "POST {} (conv_type_id={}, {} records)",
            self.config.api_url,
            self.config.conv_type_id,
            request.customer_journeys.len()
        );

        let result = self
            .agent
            .post(&self.config.api_url)
            .query("conv_type_id", &self.config.conv_type_id)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("x-api-key", &self.config.api_token)
            .send_json(request);

        match result {
            Ok(response) => Ok(serde_json::from_reader(BufReader::new(response.into_reader()))?),
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                error!("Scoring service responded with HTTP {}", status);
                error!("Response text: {}", body);
                Err(Error::HttpStatus { status, body })
            }
            Err(ureq::Error::Transport(transport)) => {
                error!("Error in scoring batch call: {}", transport);
                Err(Error::Transport(transport.to_string()))
            }
        }
    }
}
