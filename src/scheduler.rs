//! A core module to download the emojis of a server.
//!
//! See [`download_emojis`] for the whole run, or [`Scheduler`] to download
//! an already fetched listing.
//!
//! Following is the low-level module wrapped by this module:
//! - [`crate::api`]
//! - [`crate::filter`]
//! - [`crate::download`]

use std::fmt;
use std::time::Duration;

use anyhow::Context;
use indicatif::{HumanBytes, ProgressBar, ProgressFinish, ProgressStyle};
use reqwest::Client;

use crate::api::data::EmojiRecord;
use crate::api::fetch_listing;
use crate::config::Config;
use crate::download::{Downloader, FailReason, Outcome};
use crate::filter::filter_by_keyword;

const PB_FINISH_MODE: ProgressFinish = ProgressFinish::Abandon;
const PB_TICK_SECS: u64 = 1;
const SPINNER_FINISH_MODE: ProgressFinish = ProgressFinish::AndClear;
const SPINNER_TICK_SECS: f32 = 0.1;

/// A record that failed to download.
#[derive(Debug)]
pub struct Failure {
    /// The emoji name, `""` if absent.
    pub name: String,
    /// The image url, `""` if absent.
    pub url: String,
    /// Why it failed.
    pub reason: FailReason,
}

/// The summary of a run.
#[derive(Debug, Default)]
pub struct Report {
    /// the number of images saved in this run
    pub downloaded: u64,
    /// the number of records skipped, which means no request was sent
    pub skipped: u64,
    /// the number of images that failed to download
    pub failed: u64,
    /// the total size of the saved images
    pub bytes: u64,
    /// every failed record, in processing order
    pub failures: Vec<Failure>,
}

impl Report {
    fn record(&mut self, record: &EmojiRecord, outcome: Outcome) {
        match outcome {
            Outcome::Downloaded { bytes, .. } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(reason) => {
                self.failed += 1;
                self.failures.push(Failure {
                    name: record.name_or_empty().to_owned(),
                    url: record.url.clone().unwrap_or_default(),
                    reason,
                });
            }
        }
    }

    /// The total number of processed records.
    #[inline]
    pub fn total(&self) -> u64 {
        self.downloaded + self.skipped + self.failed
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            downloaded,
            skipped,
            failed,
            bytes,
            ..
        } = self;
        write!(
            f,
            "[downloaded:{downloaded}\tskipped:{skipped}\tfailed:{failed}] {}",
            HumanBytes(*bytes)
        )
    }
}

/** The scheduler to download emojis one after another.

- This struct will wrap a [`Downloader`] to download the images of `records` to its directory.

    *If the file already exists, the download will be skipped.*

- Only one request is in flight at any time, and `delay` is waited after
    every record that reached the server, so the server is not hammered.

- A process bar will be displayed to show the download status.

# Example
```no_run
use std::time::Duration;
use reqwest::Client;
use misskey_emoji_dl::api::fetch_listing;
use misskey_emoji_dl::download::Downloader;
use misskey_emoji_dl::filter::filter_by_keyword;
use misskey_emoji_dl::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = Client::new();

    let records = fetch_listing(&client, "https://misskey.io", Duration::from_secs(15)).await?;
    let records = filter_by_keyword(records, &["blob"]);

    let downloader = Downloader::session(client, "emoji_images", Duration::from_secs(20))
        .ensure()
        .await?;
    let report = Scheduler::new(downloader, records, Duration::from_secs(1)).launch().await;
    println!("{report}");
    Ok(())
}
```
*/
pub struct Scheduler {
    downloader: Downloader,
    records: Vec<EmojiRecord>,
    delay: Duration,
}

impl Scheduler {
    /// Create a new scheduler.
    ///
    /// `downloader` should already be [`Downloader::ensure`]d.
    pub fn new(downloader: Downloader, records: impl Into<Vec<EmojiRecord>>, delay: Duration) -> Self {
        Scheduler {
            downloader,
            records: records.into(),
            delay,
        }
    }

    /// Build a process bar with a specific length and custom style.
    #[inline]
    fn build_process_bar(len: u64) -> ProgressBar {
        // see: https://docs.rs/indicatif/latest/indicatif/#templates
        const PROCESS_CHARS: &str = "#>-";
        // `msg` for download status
        const TEMPLATE: &str =
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {msg} {human_pos}/{human_len} ({eta})";

        let style = ProgressStyle::with_template(TEMPLATE)
            .expect("progress bar template is valid")
            .progress_chars(PROCESS_CHARS);

        ProgressBar::new(len)
            .with_style(style)
            .with_message(Report::default().to_string())
            .with_finish(PB_FINISH_MODE)
    }

    /// The line printed for the `index`-th of `total` records.
    fn outcome_line(index: usize, total: usize, record: &EmojiRecord, outcome: &Outcome) -> String {
        let name = record.name_or_empty();
        match outcome {
            Outcome::Downloaded { path, .. } => {
                let file_name = path.file_name().unwrap_or(path.as_os_str());
                format!("[{index}/{total}] downloaded: {}", file_name.to_string_lossy())
            }
            Outcome::Skipped(reason) => format!("[{index}/{total}] skipped: {name} ({reason})"),
            Outcome::Failed(reason) => format!(
                "[{index}/{total}] failed: {name} <{}> ({reason})",
                record.url.as_deref().unwrap_or_default()
            ),
        }
    }

    /// Launch the scheduler and download all records in order.
    ///
    /// Failures don't stop the run, they are printed and collected in the [`Report`].
    pub async fn launch(self) -> Report {
        let Self {
            downloader,
            records,
            delay,
        } = self;

        let total = records.len();
        let process_bar = Self::build_process_bar(u64::try_from(total).unwrap_or(u64::MAX));
        process_bar.enable_steady_tick(Duration::from_secs(PB_TICK_SECS));

        let mut report = Report::default();
        let mut pending_delay = false;
        for (index, record) in records.iter().enumerate() {
            if pending_delay {
                tokio::time::sleep(delay).await;
            }

            let outcome = downloader.download_one(record).await;
            pending_delay = outcome.reached_network() && !delay.is_zero();

            let line = Self::outcome_line(index + 1, total, record, &outcome);
            // why `suspend`: https://docs.rs/indicatif/0.17.8/indicatif/struct.ProgressBar.html#method.suspend
            match outcome {
                Outcome::Failed(_) => process_bar.suspend(|| eprintln!("{line}")),
                _ => process_bar.suspend(|| println!("{line}")),
            }
            log::debug!("{line}");

            report.record(record, outcome);
            process_bar.set_message(report.to_string());
            process_bar.inc(1);
        }
        process_bar.finish();

        report
    }
}

#[inline]
fn build_spinner() -> ProgressBar {
    ProgressBar::new_spinner()
        .with_finish(SPINNER_FINISH_MODE)
        .with_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .expect("spinner template is valid")
                // For more spinners check out the cli-spinners project:
                // https://github.com/sindresorhus/cli-spinners/blob/master/spinners.json
                // NOTE: use `ascii` only, because cmd/powershell maybe not support unicode.
                .tick_strings(&[".  ", ".. ", "...", " ..", "  .", "   "]),
        )
}

/// Download the emojis of `config.server` matching `config.keywords` into `config.save_dir`.
///
/// The save directory is created first, then the listing is fetched and filtered,
/// then every match is downloaded by a [`Scheduler`].
///
/// # Errors
///
/// If the save directory can't be created, or the listing can't be fetched,
/// nothing is downloaded and an error is returned.
/// A failed image is not an error, see [`Report::failures`].
pub async fn download_emojis(client: Client, config: &Config) -> anyhow::Result<Report> {
    let downloader = Downloader::session(client.clone(), &config.save_dir, config.image_timeout())
        .ensure()
        .await
        .with_context(|| {
            format!(
                "Unable to ensure the existence of the save directory: {}",
                config.save_dir.display()
            )
        })?;

    for keyword in config.uppercase_keywords() {
        log::warn!("keyword `{keyword}` has uppercase letters, it can't match any lowercased name");
    }

    let spinner = build_spinner();
    spinner.set_message(format!("Fetching emoji listing from {}...", config.server));
    spinner.enable_steady_tick(Duration::from_secs_f32(SPINNER_TICK_SECS));
    let records = fetch_listing(&client, &config.server, config.listing_timeout())
        .await
        .with_context(|| format!("failed to get emoji listing from {}", config.server))?;
    spinner.finish_with_message("Emoji listing fetched successfully!");

    if records.is_empty() {
        // an absent `emojis` key also ends up here
        log::warn!("the emoji listing of {} is empty", config.server);
    }
    let found = records.len();
    let records = filter_by_keyword(records, &config.keywords);
    println!(
        "{found} emojis in total, {} matched keywords {:?}",
        records.len(),
        config.keywords
    );

    let report = Scheduler::new(downloader, records, config.delay())
        .launch()
        .await;
    println!("Done! {report}");

    Ok(report)
}
