use faceswap_core::BoxFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT_BASE_URL: &str = "http://localhost:5000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("endpoint base URL must start with http:// or https://, got '{0}'")]
    InvalidBaseUrl(String),
    #[error("cannot build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Client configuration: built-in defaults, then an optional TOML file, then
/// `FACESWAP_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the detection/swap service (default: http://localhost:5000).
    pub endpoint_base_url: String,
    /// Detector input size sent with every request.
    pub detector_size: String,
    /// Ask the service to run its face enhancer on swap results.
    pub enhance: bool,
    /// Face ordering hint sent to the swap endpoint.
    pub face_order: String,
    /// How detector boxes are read. `auto` guesses per box.
    pub box_format: BoxFormat,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_base_url: DEFAULT_ENDPOINT_BASE_URL.to_string(),
            detector_size: "640x640".to_string(),
            enhance: true,
            face_order: "right-left".to_string(),
            box_format: BoxFormat::Auto,
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Read a TOML file, then overlay the process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Overlay values from an environment lookup. Unparseable values are ignored.
    ///
    /// `FACEFUSION_API_URL` is honoured when `FACESWAP_ENDPOINT_BASE_URL` is unset.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("FACESWAP_ENDPOINT_BASE_URL").or_else(|| lookup("FACEFUSION_API_URL")) {
            self.endpoint_base_url = url;
        }
        if let Some(size) = lookup("FACESWAP_DETECTOR_SIZE") {
            self.detector_size = size;
        }
        if let Some(v) = lookup("FACESWAP_ENHANCE") {
            self.enhance = v != "0";
        }
        if let Some(order) = lookup("FACESWAP_FACE_ORDER") {
            self.face_order = order;
        }
        if let Some(format) = lookup("FACESWAP_BOX_FORMAT").and_then(|v| v.parse().ok()) {
            self.box_format = format;
        }
        if let Some(secs) = lookup("FACESWAP_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        self
    }

    /// Check the base URL and strip any trailing slash.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let url = self.endpoint_base_url.trim().trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.endpoint_base_url));
        }
        self.endpoint_base_url = url.to_string();
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn detect_url(&self) -> String {
        self.endpoint("face_detect")
    }

    pub fn swap_url(&self) -> String {
        self.endpoint("face_swap")
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint_base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoint_base_url, "http://localhost:5000");
        assert_eq!(config.detector_size, "640x640");
        assert!(config.enhance);
        assert_eq!(config.face_order, "right-left");
        assert_eq!(config.box_format, BoxFormat::Auto);
        assert_eq!(config.detect_url(), "http://localhost:5000/face_detect");
        assert_eq!(config.swap_url(), "http://localhost:5000/face_swap");
    }

    #[test]
    fn test_env_overlay() {
        let config = Config::default().with_env(env(&[
            ("FACESWAP_ENDPOINT_BASE_URL", "https://swap.example.com/"),
            ("FACESWAP_ENHANCE", "0"),
            ("FACESWAP_BOX_FORMAT", "extent"),
            ("FACESWAP_REQUEST_TIMEOUT_SECS", "not-a-number"),
        ]));
        assert_eq!(config.swap_url(), "https://swap.example.com/face_swap");
        assert!(!config.enhance);
        assert_eq!(config.box_format, BoxFormat::Extent);
        assert_eq!(config.request_timeout_secs, 120);
    }

    #[test]
    fn test_legacy_url_variable() {
        let config = Config::default().with_env(env(&[("FACEFUSION_API_URL", "http://10.0.0.2:7860")]));
        assert_eq!(config.endpoint_base_url, "http://10.0.0.2:7860");

        let config = Config::default().with_env(env(&[
            ("FACEFUSION_API_URL", "http://legacy:1"),
            ("FACESWAP_ENDPOINT_BASE_URL", "http://preferred:2"),
        ]));
        assert_eq!(config.endpoint_base_url, "http://preferred:2");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.endpoint_base_url = " http://host:5000/ ".into();
        assert_eq!(config.validate().unwrap().endpoint_base_url, "http://host:5000");

        let mut config = Config::default();
        config.endpoint_base_url = "localhost:5000".into();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint_base_url = \"http://gpu-box:5000\"\nbox_format = \"corners\"").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.endpoint_base_url, "http://gpu-box:5000");
        assert_eq!(config.box_format, BoxFormat::Corners);
        assert_eq!(config.detector_size, "640x640");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "enhance = \"sometimes\"").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load(Path::new("/nonexistent/faceswap.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
