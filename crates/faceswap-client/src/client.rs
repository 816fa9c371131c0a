use crate::config::{Config, ConfigError};

/// HTTP client for a FaceFusion-style detection and swap service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct FaceSwapClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: Config,
}

impl FaceSwapClient {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        tracing::debug!(
            endpoint = %config.endpoint_base_url,
            detector_size = %config.detector_size,
            box_format = %config.box_format,
            "face swap client ready"
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
