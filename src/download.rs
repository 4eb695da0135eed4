//! Download a single emoji image into the save directory.
//!
//! See [`Downloader::download_one`] for the rules deciding the [`Outcome`].

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, IntoUrl, StatusCode};
use thiserror::Error;
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::api::data::EmojiRecord;
use crate::tool::{extension_for, is_safe_file_stem};

/// The error of a download attempt after the request was sent.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Saving the body failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The request failed or timed out.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

/// Why a record was not downloaded, without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The record has no name, or an empty one.
    MissingName,
    /// The record has no url, or an empty one.
    MissingUrl,
    /// The name can't be used as a file name inside the save directory.
    UnsafeName,
    /// The target file already exists.
    Existed(PathBuf),
}

/// Why a download attempt failed.
#[derive(Debug)]
pub enum FailReason {
    /// The server answered with a status other than `200 OK`.
    Status(StatusCode),
    /// The request or the file write failed.
    Error(DownloadError),
    /// The target path couldn't be checked, no request was sent.
    Io(std::io::Error),
}

/// The result of processing a single record.
#[derive(Debug)]
pub enum Outcome {
    /// The image was saved to `path`.
    Downloaded {
        /// Where the image was written.
        path: PathBuf,
        /// The size of the image.
        bytes: u64,
    },
    /// Nothing was requested or written.
    Skipped(SkipReason),
    /// The image couldn't be saved, see [`Outcome::reached_network`].
    Failed(FailReason),
}

impl Outcome {
    /// Whether the outcome involved a request to the server,
    /// which is when the caller should wait before the next one.
    #[inline]
    pub fn reached_network(&self) -> bool {
        !matches!(self, Outcome::Skipped(_) | Outcome::Failed(FailReason::Io(_)))
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingName => f.write_str("missing name"),
            SkipReason::MissingUrl => f.write_str("missing url"),
            SkipReason::UnsafeName => f.write_str("name is not a valid file name"),
            SkipReason::Existed(path) => write!(f, "already exists: {}", path.display()),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::Status(status) => write!(f, "unexpected status {status}"),
            // reqwest keeps the actual cause in `source()`
            FailReason::Error(err) => {
                write!(f, "{err}")?;
                let mut source = std::error::Error::source(err);
                while let Some(cause) = source {
                    write!(f, ": {cause}")?;
                    source = cause.source();
                }
                Ok(())
            }
            FailReason::Io(err) => write!(f, "can't check the target file: {err}"),
        }
    }
}

/// A Consuming-Builders style future to fetch one image into one file.
pub(crate) struct DownloadFutureBuilder<U, P>
where
    U: IntoUrl,
    P: AsRef<Path>,
{
    client: Client,
    url: U,
    file_path: P,
    timeout: Option<Duration>,
}

impl<U, P> DownloadFutureBuilder<U, P>
where
    U: IntoUrl,
    P: AsRef<Path>,
{
    fn new(client: Client, url: U, file_path: P) -> Self {
        Self {
            client,
            url,
            file_path,
            timeout: None,
        }
    }

    /// Bound the whole request, including reading the body.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Build the future fetching `url` and saving the body to `file_path`.
    ///
    /// The body is fully received before the file is created,
    /// so a failed request never leaves a file behind.
    pub fn build(self) -> impl Future<Output = Outcome> {
        let Self {
            client,
            url,
            file_path,
            timeout,
        } = self;

        async move {
            let mut request = client.get(url);
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => return Outcome::Failed(FailReason::Error(err.into())),
            };
            if response.status() != StatusCode::OK {
                return Outcome::Failed(FailReason::Status(response.status()));
            }
            let body = match response.bytes().await {
                Ok(body) => body,
                Err(err) => return Outcome::Failed(FailReason::Error(err.into())),
            };

            match write_new_file(file_path.as_ref(), &body).await {
                Ok(()) => Outcome::Downloaded {
                    path: file_path.as_ref().to_path_buf(),
                    // `usize` always fits in `u64` on supported targets
                    bytes: body.len() as u64,
                },
                Err(err) => Outcome::Failed(FailReason::Error(err.into())),
            }
        }
    }
}

/// Write `content` to a new file at `path`, removing it again if the write fails.
///
/// An existing file is never truncated, it's an [`std::io::ErrorKind::AlreadyExists`] error.
async fn write_new_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let result = async {
        file.write_all(content).await?;
        file.flush().await
    }
    .await;

    if result.is_err() {
        drop(file);
        // the partial file would be taken as already downloaded on the next run
        let _ = tokio::fs::remove_file(path).await;
    }
    result
}

/// Saves emoji images into one directory.
pub struct Downloader {
    client: Client,
    download_dir: PathBuf,
    timeout: Duration,
}

impl Downloader {
    /// Create a downloader saving into `download_dir`,
    /// each image request is bounded by `timeout` (zero disables it).
    pub fn session(client: Client, download_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        let download_dir = download_dir.into();
        Self {
            client,
            download_dir,
            timeout,
        }
    }

    /// Create the download directory if it does not exist.
    #[inline]
    pub async fn ensure(self) -> std::io::Result<Self> {
        create_dir_all(&self.download_dir).await?;
        Ok(self)
    }

    /// The path `record` would be saved at, or why it can't be saved.
    ///
    /// The file name is `{name}{extension}`, with the extension taken from the url.
    pub fn target_path(&self, record: &EmojiRecord) -> Result<PathBuf, SkipReason> {
        let name = match record.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(SkipReason::MissingName),
        };
        let url = match record.url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(SkipReason::MissingUrl),
        };
        if !is_safe_file_stem(name) {
            return Err(SkipReason::UnsafeName);
        }
        Ok(self
            .download_dir
            .join(format!("{name}{}", extension_for(url))))
    }

    /// Download one emoji.
    ///
    /// - Records without a name or url are skipped.
    /// - If the target file already exists, it is skipped without any request.
    /// - Otherwise the image is requested, and saved only if the status is exactly `200`.
    pub async fn download_one(&self, record: &EmojiRecord) -> Outcome {
        let file_path = match self.target_path(record) {
            Ok(file_path) => file_path,
            Err(reason) => return Outcome::Skipped(reason),
        };

        match tokio::fs::try_exists(&file_path).await {
            Ok(true) => return Outcome::Skipped(SkipReason::Existed(file_path)),
            Ok(false) => {}
            Err(err) => return Outcome::Failed(FailReason::Io(err)),
        }

        // `target_path` has checked the url is present
        let url = record.url.as_deref().unwrap_or_default();
        log::debug!("GET {url} -> {}", file_path.display());
        DownloadFutureBuilder::new(self.client.clone(), url, file_path)
            .timeout(self.timeout)
            .build()
            .await
    }
}
