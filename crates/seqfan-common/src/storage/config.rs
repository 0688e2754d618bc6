use serde::{Deserialize, Serialize};
use std::env;

/// Connection settings for one S3-compatible endpoint.
///
/// Credentials come from the SDK's default provider chain; only the
/// region and an optional custom endpoint (MinIO-style deployments) are
/// configured here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    /// AWS proper: region only, virtual-hosted addressing.
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: env::var("S3_ENDPOINT").ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Custom endpoint with path-style addressing, for local stacks.
    pub fn for_endpoint(endpoint: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: Some(endpoint.into()),
            path_style: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_endpoint() {
        let config = StorageConfig::for_endpoint("http://localhost:9000", "us-east-1");
        assert_eq!(config.endpoint, Some("http://localhost:9000".to_string()));
        assert!(config.path_style);
    }
}
