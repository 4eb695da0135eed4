//! A core module for interacting with the Misskey emoji API.
//!
//! Usually, you prefer to use [`fetch_listing`] to get the [`data`] from the server.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

/// The URLs for the Misskey emoji API.
pub mod url {
    use super::*;

    /// The error returned by [`Url::parse`].
    pub type ParseError = <Url as std::str::FromStr>::Err;

    /// The path of the listing endpoint, relative to the server base URL.
    pub const LISTING_PATH: &str = "api/emojis";

    /// Resolve the listing endpoint against `server`.
    ///
    /// The path of `server` is treated as a directory, so both
    /// `https://example.com` and `https://example.com/` resolve to
    /// `https://example.com/api/emojis`, and `https://example.com/sub`
    /// resolves to `https://example.com/sub/api/emojis`.
    ///
    /// # Errors
    ///
    /// If `server` is not an absolute URL, this function will return an error.
    pub fn listing_url(server: &str) -> Result<Url, ParseError> {
        let mut base = Url::parse(server)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(LISTING_PATH)
    }
}

/// The data structure for the JSON response from the listing endpoint.
pub mod data {
    use super::*;

    /// One emoji of the listing.
    ///
    /// Both fields are optional: servers in the wild send `null` or omit them.
    /// Any other field (aliases, category, ...) is ignored.
    #[non_exhaustive]
    #[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
    pub struct EmojiRecord {
        /// The shortcode of the emoji, without colons.
        #[serde(default)]
        pub name: Option<String>,
        /// The URL of the image, which can be used to download the emoji.
        #[serde(default)]
        pub url: Option<String>,
    }

    impl EmojiRecord {
        /// Create a record from its two fields.
        pub fn new(name: Option<impl Into<String>>, url: Option<impl Into<String>>) -> Self {
            Self {
                name: name.map(Into::into),
                url: url.map(Into::into),
            }
        }

        /// The name of the emoji, or `""` if absent.
        #[inline]
        pub fn name_or_empty(&self) -> &str {
            self.name.as_deref().unwrap_or_default()
        }
    }

    /// The JSON structure response from the listing endpoint.
    #[non_exhaustive]
    #[derive(Debug, Default, Deserialize)]
    pub struct Listing {
        /// The emojis of the server, in server order.
        /// Legacy servers or proxies may omit this key, in which case it is `None`.
        #[serde(default)]
        pub emojis: Option<Vec<EmojiRecord>>,
    }

    impl Listing {
        /// Take the emojis out of the listing, an absent key is an empty listing.
        #[inline]
        pub fn into_records(self) -> Vec<EmojiRecord> {
            self.emojis.unwrap_or_default()
        }
    }
}

/// The error when the emoji listing can't be retrieved.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListingError {
    /// The server base URL is not a valid absolute URL.
    #[error("invalid server url `{server}`: {source}")]
    InvalidServer {
        /// The server base URL as given.
        server: String,
        /// The parse error.
        source: url::ParseError,
    },
    /// Network failure, timeout, non-2xx status, or undecodable body.
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Get the emoji listing of `server`.
///
/// `timeout` bounds the whole request, a zero duration disables it.
/// If the response has no `emojis` key, an empty vector is returned.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use reqwest::Client;
/// use misskey_emoji_dl::api::fetch_listing;
///
/// #[tokio::main]
/// async fn main() -> Result<(), misskey_emoji_dl::api::ListingError> {
///     let client = Client::new();
///     let emojis = fetch_listing(&client, "https://misskey.io", Duration::from_secs(15)).await?;
///     println!("{} emojis", emojis.len());
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// If the url is invalid, or the request fails, or the status is not `2xx`,
/// or the body is not the expected JSON, this function will return an error.
pub async fn fetch_listing(
    client: &Client,
    server: &str,
    timeout: Duration,
) -> Result<Vec<data::EmojiRecord>, ListingError> {
    let target_url = url::listing_url(server).map_err(|source| ListingError::InvalidServer {
        server: server.to_owned(),
        source,
    })?;
    log::debug!("GET {target_url}");

    let mut request = client.get(target_url);
    if !timeout.is_zero() {
        request = request.timeout(timeout);
    }
    let listing: data::Listing = request.send().await?.error_for_status()?.json().await?;
    Ok(listing.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_listing_url() {
        let expected = "https://example.com/api/emojis";
        assert_eq!(url::listing_url("https://example.com").unwrap().as_str(), expected);
        assert_eq!(url::listing_url("https://example.com/").unwrap().as_str(), expected);
        assert_eq!(
            url::listing_url("https://example.com/sub").unwrap().as_str(),
            "https://example.com/sub/api/emojis"
        );
        assert!(url::listing_url("example.com").is_err());
    }

    #[test]
    fn test_parse_null_fields() {
        let listing: data::Listing = serde_json::from_str(
            r#"{"emojis":[{"name":null,"url":"https://s/a.png","aliases":[]},{"category":"x"}]}"#,
        )
        .unwrap();
        let records = listing.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, None);
        assert_eq!(records[0].url.as_deref(), Some("https://s/a.png"));
        assert_eq!(records[1], data::EmojiRecord::default());
    }

    #[tokio::test]
    async fn test_fetch_listing() -> Result<(), ListingError> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/emojis")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"emojis":[
                    {"name":"pity_face","url":"https://s/a.webp"},
                    {"name":"joy","url":"https://s/b.png"}
                ]}"#,
            )
            .create_async()
            .await;

        let records = fetch_listing(&Client::new(), &server.url(), TIMEOUT).await?;
        mock.assert_async().await;

        let names: Vec<_> = records.iter().map(|r| r.name_or_empty()).collect();
        assert_eq!(names, ["pity_face", "joy"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_listing_missing_key() -> Result<(), ListingError> {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/emojis")
            .with_body(r#"{"something_else":[]}"#)
            .create_async()
            .await;

        let records = fetch_listing(&Client::new(), &server.url(), TIMEOUT).await?;
        assert!(records.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_listing_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/emojis")
            .with_status(500)
            .create_async()
            .await;
        let err = fetch_listing(&Client::new(), &server.url(), TIMEOUT)
            .await
            .expect_err("500 should be fatal");
        assert!(matches!(err, ListingError::Request(ref e) if e.is_status()));

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/emojis")
            .with_body("<html>not json</html>")
            .create_async()
            .await;
        let err = fetch_listing(&Client::new(), &server.url(), TIMEOUT)
            .await
            .expect_err("malformed json should be fatal");
        assert!(matches!(err, ListingError::Request(ref e) if e.is_decode()));

        let err = fetch_listing(&Client::new(), "not a url", TIMEOUT)
            .await
            .expect_err("invalid server should be fatal");
        assert!(matches!(err, ListingError::InvalidServer { .. }));
    }

    #[tokio::test]
    async fn test_fetch_listing_timeout() {
        // accept connections and never answer them
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let err = fetch_listing(&Client::new(), &server_url, Duration::from_millis(100))
            .await
            .expect_err("timeout should be fatal");
        assert!(matches!(err, ListingError::Request(ref e) if e.is_timeout()), "{err:?}");
    }
}
