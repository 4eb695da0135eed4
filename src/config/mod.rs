//! The settings of a download run.
//!
//! [`Config::default`] matches [`DEFAULT_CONFIG_STR`], which is also the
//! annotated template shipped as `default.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
pub use validator::Validate;

/// The annotated default config file.
pub const DEFAULT_CONFIG_STR: &str = include_str!("default.toml");

/// Default of [`Config::server`].
pub const DEFAULT_SERVER: &str = "https://voskey.icalo.net";
/// Default of [`Config::save_dir`].
pub const DEFAULT_SAVE_DIR: &str = "emoji_images";
/// Default of [`Config::keywords`].
pub const DEFAULT_KEYWORDS: &[&str] = &["pity"];
/// Default of [`Config::delay_ms`].
pub const DEFAULT_DELAY_MS: u64 = 1000;
/// Default of [`Config::listing_timeout`].
pub const DEFAULT_LISTING_TIMEOUT: u64 = 15;
/// Default of [`Config::image_timeout`].
pub const DEFAULT_IMAGE_TIMEOUT: u64 = 20;

/// The settings of a download run, see [`DEFAULT_CONFIG_STR`] for each field.
#[non_exhaustive]
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the server.
    #[validate(url(message = "server must be an absolute url"))]
    pub server: String,
    /// Where the images are saved, created if missing.
    pub save_dir: PathBuf,
    /// Matched against the lowercased emoji name.
    #[validate(length(min = 1, message = "keywords must not be empty"))]
    pub keywords: Vec<String>,
    /// Milliseconds between two image requests.
    pub delay_ms: u64,
    /// Seconds, `0` disables.
    pub listing_timeout: u64,
    /// Seconds, `0` disables.
    pub image_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            keywords: DEFAULT_KEYWORDS.iter().map(|&k| k.to_owned()).collect(),
            delay_ms: DEFAULT_DELAY_MS,
            listing_timeout: DEFAULT_LISTING_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

impl Config {
    /// [`Self::delay_ms`] as a [`Duration`].
    #[inline]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Zero means no timeout.
    #[inline]
    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_timeout)
    }

    /// Zero means no timeout.
    #[inline]
    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.image_timeout)
    }

    /// Keywords containing uppercase letters, which can never match a lowercased name.
    pub fn uppercase_keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .map(String::as_str)
            .filter(|keyword| keyword.chars().any(char::is_uppercase))
    }

    /// Parse a toml document, fields it doesn't set keep their defaults.
    ///
    /// The result is not validated, call [`Validate::validate`] on it.
    #[cfg(feature = "__toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
