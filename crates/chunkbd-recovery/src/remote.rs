//! HTTP client for the remote metadata/storage service.
//!
//! Downloads missing bucket files into place and answers the auxiliary
//! status queries. Every request carries an explicit per-call timeout from
//! the config; transient failures are retried with bounded backoff and the
//! whole loop can be aborted through the shared cancellation token (device
//! shutdown must not hang on a dead network).
//!
//! Downloads are staged to a `.part` sibling and renamed into place, so a
//! torn transfer never masquerades as a valid bucket file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::download::{DownloadService, RecoveryStatus};
use crate::error::{RecoveryError, RecoveryResult};
use crate::retry::{CancellationToken, RetryConfig, RetryExecutor, RetryOutcome};
use crate::token::TokenService;

/// Configuration for the remote recovery client.
#[derive(Debug, Clone)]
pub struct RemoteRecoveryConfig {
    /// Base URL of the metadata service, e.g. `https://metadata.example/api`.
    pub endpoint: String,
    /// Timeout applied to each individual HTTP request.
    pub request_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl RemoteRecoveryConfig {
    /// Config with default timeout and retry policy for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }
}

/// Recovery implementation backed by the remote metadata service.
pub struct RemoteRecovery {
    endpoint: String,
    client: reqwest::blocking::Client,
    tokens: TokenService,
    executor: RetryExecutor,
    cancel: CancellationToken,
}

impl RemoteRecovery {
    /// Build a remote recovery client.
    pub fn new(config: RemoteRecoveryConfig, tokens: TokenService) -> RecoveryResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        info!(endpoint = %config.endpoint, "remote recovery client ready");
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            client,
            tokens,
            executor: RetryExecutor::new(config.retry),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that aborts all in-flight and future recovery attempts.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One download attempt. `Ok(false)` means the remote side holds no copy.
    fn fetch_once(&self, filename: &str, target: &Path) -> RecoveryResult<bool> {
        let token = self.tokens.token().ok_or_else(|| RecoveryError::Unavailable {
            reason: "no auth token".to_string(),
        })?;

        let url = format!("{}/file/{}", self.endpoint, filename);
        let response = self.client.get(&url).bearer_auth(&token).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(RecoveryError::Unavailable {
                reason: format!("{} returned {}", url, response.status()),
            });
        }

        let body = response.bytes()?;
        let staging = part_path(target);
        let mut file = File::create(&staging)?;
        file.write_all(&body)?;
        file.sync_all()?;
        std::fs::rename(&staging, target)?;

        debug!(file = filename, bytes = body.len(), "downloaded bucket file");
        Ok(true)
    }

    /// Filenames the remote side holds for this device.
    fn list_remote_files(&self) -> RecoveryResult<Vec<String>> {
        let token = self.tokens.token().ok_or_else(|| RecoveryError::Unavailable {
            reason: "no auth token".to_string(),
        })?;

        let url = format!("{}/file/list", self.endpoint);
        let response = self.client.get(&url).bearer_auth(&token).send()?;
        if !response.status().is_success() {
            return Err(RecoveryError::Unavailable {
                reason: format!("{} returned {}", url, response.status()),
            });
        }
        Ok(response.json()?)
    }
}

impl DownloadService for RemoteRecovery {
    fn download_if_possible(&self, target: &Path) -> RecoveryStatus {
        let Some(filename) = target.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %target.display(), "recovery target has no usable filename");
            return RecoveryStatus::Failed;
        };

        match self
            .executor
            .execute(&self.cancel, || self.fetch_once(filename, target))
        {
            RetryOutcome::Success(true) => {
                info!(file = filename, "recovered bucket file from remote storage");
                RecoveryStatus::Recovered
            }
            RetryOutcome::Success(false) => {
                debug!(file = filename, "remote storage holds no copy");
                RecoveryStatus::NoRemoteCopy
            }
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                warn!(
                    file = filename,
                    attempts,
                    error = %last_error,
                    "giving up on remote recovery"
                );
                RecoveryStatus::Failed
            }
            RetryOutcome::Cancelled { attempts } => {
                warn!(file = filename, attempts, "remote recovery cancelled");
                RecoveryStatus::Failed
            }
        }
    }

    fn has_metadata(&self) -> bool {
        self.list_remote_files()
            .map(|files| !files.is_empty())
            .unwrap_or(false)
    }

    fn connected(&self) -> bool {
        self.list_remote_files().is_ok()
    }

    fn completed_percent(&self, parent_dir: &Path) -> f64 {
        match self.list_remote_files() {
            Ok(names) if !names.is_empty() => {
                let present = names
                    .iter()
                    .filter(|name| parent_dir.join(name.as_str()).exists())
                    .count();
                present as f64 * 100.0 / names.len() as f64
            }
            Ok(_) => 100.0,
            Err(e) => {
                warn!(error = %e, "unable to compute download completion");
                0.0
            }
        }
    }
}

/// Staging path for an in-flight download: `<name>.part` next to the target.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}
