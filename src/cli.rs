//! A core module for command line interface.
//!
//! See [`Cli`] for more information.

use std::path::PathBuf;

use clap::builder::{PathBufValueParser, TypedValueParser};
use clap::error::ErrorKind;
use clap::Command;
pub use clap::{CommandFactory, Parser};

use crate::config::{Config, Validate};
use crate::mosaic::DEFAULT_MAX_CHARS;

/// [`clap`] command line interface.
///
/// The config file is parsed with [`toml`], then the flags given on the
/// command line override its values, see [`Self::into_config`].
///
/// # Example
///
/// ```no_run
/// use misskey_emoji_dl::cli::{Cli, CommandFactory as _, Parser as _};
///
/// let cli = Cli::parse();
/// let config = cli.into_config(&mut Cli::command())?;
///
/// Ok::<(), clap::Error>(())
/// ```
#[non_exhaustive]
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// The config file to use.
    ///
    /// If `None`, the built-in defaults are used.
    #[arg(value_name = "PATH")]
    #[arg(value_parser = PathBufValueParser::new().try_map(Self::parse_config_from_filepath))]
    pub config: Option<Config>,

    /// Base URL of the Misskey server.
    #[arg(short, long)]
    pub server: Option<String>,

    /// Directory to save the images to.
    #[arg(short = 'd', long, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Keyword to match against the lowercased emoji name, can be repeated.
    #[arg(short, long = "keyword", value_name = "KEYWORD")]
    pub keywords: Vec<String>,

    /// Pause between two image requests, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Timeout of the listing request in seconds, `0` disables it.
    #[arg(long, value_name = "SECS")]
    pub listing_timeout: Option<u64>,

    /// Timeout of each image request in seconds, `0` disables it.
    #[arg(long, value_name = "SECS")]
    pub image_timeout: Option<u64>,

    /// Render this picture with the emojis already in the save directory,
    /// instead of downloading.
    #[arg(long, value_name = "PICTURE")]
    pub mosaic: Option<PathBuf>,

    /// Character limit of the mosaic text.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_CHARS, requires = "mosaic")]
    pub max_chars: usize,

    /// Increase logging verbosity, can be repeated.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    #[inline]
    fn parse_config_from_filepath(path: PathBuf) -> anyhow::Result<Config> {
        let config = std::fs::read_to_string(path)?;
        let config = Config::from_toml_str(&config)?;
        Ok(config)
    }

    /// The `log` level filter for [`Self::verbose`].
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// The picture and the character limit, if `--mosaic` is given.
    pub fn mosaic_request(&self) -> Option<(PathBuf, usize)> {
        self.mosaic
            .as_ref()
            .map(|picture| (picture.clone(), self.max_chars))
    }

    /// Merge the flags over the config file (or the defaults), then validate the result.
    ///
    /// # Errors
    ///
    /// If the merged config is invalid, it will return a [`ErrorKind::ValueValidation`] error.
    pub fn into_config(self, cmd: &mut Command) -> Result<Config, clap::Error> {
        let Self {
            config,
            server,
            save_dir,
            keywords,
            delay_ms,
            listing_timeout,
            image_timeout,
            mosaic: _,
            max_chars: _,
            verbose: _,
        } = self;

        let mut config = config.unwrap_or_default();
        if let Some(server) = server {
            config.server = server;
        }
        if let Some(save_dir) = save_dir {
            config.save_dir = save_dir;
        }
        if !keywords.is_empty() {
            config.keywords = keywords;
        }
        if let Some(delay_ms) = delay_ms {
            config.delay_ms = delay_ms;
        }
        if let Some(listing_timeout) = listing_timeout {
            config.listing_timeout = listing_timeout;
        }
        if let Some(image_timeout) = image_timeout {
            config.image_timeout = image_timeout;
        }

        match config.validate() {
            Ok(_) => Ok(config),
            Err(err) => Err(cmd.error(ErrorKind::ValueValidation, err)),
        }
    }
}
