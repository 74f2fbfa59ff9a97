use async_trait::async_trait;
use log::{debug, info};
use semver::Version;
use serde::Deserialize;
use thiserror::Error;

/// An available update as announced by the metadata service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDescriptor {
    pub download_url: String,
    pub hash_algorithm: String,
    pub expected_hash: String,
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to query update metadata: {0}")]
    Request(#[source] reqwest::Error),
    #[error("update metadata query failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse update metadata response: {0}")]
    Parse(#[source] reqwest::Error),
    #[error("invalid update metadata endpoint {endpoint}: {details}")]
    Endpoint { endpoint: String, details: String },
}

/// Update discovery. `Ok(None)` means the current version is the latest.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn query_update(
        &self,
        current_version: &str,
    ) -> Result<Option<UpdateDescriptor>, MetadataError>;
}

#[derive(Debug, Deserialize)]
struct ReleaseDescriptor {
    #[serde(default)]
    version: Option<String>,
    download_url: String,
    hash_algorithm: String,
    expected_hash: String,
}

/// Metadata service reached over HTTP: `GET <endpoint>?version=<current>`.
///
/// `204 No Content` or a JSON `null` body means no update.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMetadataSource {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn query_url(&self, current_version: &str) -> Result<reqwest::Url, MetadataError> {
        let mut url =
            reqwest::Url::parse(&self.endpoint).map_err(|error| MetadataError::Endpoint {
                endpoint: self.endpoint.clone(),
                details: error.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("version", current_version);
        Ok(url)
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn query_update(
        &self,
        current_version: &str,
    ) -> Result<Option<UpdateDescriptor>, MetadataError> {
        let url = self.query_url(current_version)?;
        debug!("Querying update metadata at {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(MetadataError::Request)?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(MetadataError::HttpStatus {
                status,
                body_snippet,
            });
        }

        let release: Option<ReleaseDescriptor> =
            response.json().await.map_err(MetadataError::Parse)?;
        let Some(release) = release else {
            return Ok(None);
        };

        let current = current_version.strip_prefix('v').unwrap_or(current_version);
        if let Some(version) = release.version.as_deref() {
            let latest = version.strip_prefix('v').unwrap_or(version);
            if !is_newer_version(latest, current) {
                info!("Offered version {latest} is not newer than {current}, ignoring");
                return Ok(None);
            }
        }

        Ok(Some(UpdateDescriptor {
            download_url: release.download_url,
            hash_algorithm: release.hash_algorithm,
            expected_hash: release.expected_hash,
        }))
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[must_use]
pub fn is_newer_version(latest: &str, current: &str) -> bool {
    match (parse_semver(latest), parse_semver(current)) {
        (Some(latest), Some(current)) => latest > current,
        _ => latest != current,
    }
}

fn parse_semver(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let (core, suffix) = split_semver_core_and_suffix(version);
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().and_then(|part| part.parse::<u64>().ok());
    let patch = parts.next().and_then(|part| part.parse::<u64>().ok());

    if parts.next().is_some() {
        return None;
    }

    let normalized = match (minor, patch) {
        (None, None) => format!("{major}.0.0{suffix}"),
        (Some(minor), None) => format!("{major}.{minor}.0{suffix}"),
        (Some(minor), Some(patch)) => format!("{major}.{minor}.{patch}{suffix}"),
        (None, Some(_)) => return None,
    };

    Version::parse(&normalized).ok()
}

fn split_semver_core_and_suffix(version: &str) -> (&str, &str) {
    let suffix_idx = version.find(['-', '+']).unwrap_or(version.len());
    (&version[..suffix_idx], &version[suffix_idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_comparison() {
        assert!(is_newer_version("2.4.1", "2.4.0"));
        assert!(is_newer_version("2.5", "2.4.9"));
        assert!(is_newer_version("3", "2.99.0"));
        assert!(is_newer_version("2.4.0", "2.4.0-rc.1"));
        assert!(!is_newer_version("2.4.0", "2.4.0"));
        assert!(!is_newer_version("2.4", "2.4.0"));
        assert!(!is_newer_version("2.4.0-rc.2", "2.4.0-rc.10"));
        assert!(!is_newer_version("2.3.9", "2.4.0"));
    }

    #[test]
    fn query_url_appends_current_version() {
        let source = HttpMetadataSource::new(
            reqwest::Client::new(),
            "https://updates.example.com/v1/latest?channel=stable",
        );
        let url = source.query_url("2.4.0").expect("endpoint should parse");
        assert_eq!(
            url.as_str(),
            "https://updates.example.com/v1/latest?channel=stable&version=2.4.0"
        );
    }

    #[test]
    fn query_url_rejects_invalid_endpoint() {
        let source = HttpMetadataSource::new(reqwest::Client::new(), "not a url");
        assert!(matches!(
            source.query_url("2.4.0"),
            Err(MetadataError::Endpoint { .. })
        ));
    }

    #[test]
    fn response_snippet_truncates_body() {
        assert_eq!(response_snippet("", 10), "");
        assert_eq!(response_snippet("service down", 7), ": service");
    }
}
