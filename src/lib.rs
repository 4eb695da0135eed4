#![warn(missing_docs)]

//! <div class="warning">
//!
//! Note: API is unstable, and may change in `0.x` versions.
//!
//! </div>
//!
//! # As a library
//!
//! As a library, usually you prefer to use [`scheduler::download_emojis`]
//! with a [`config::Config`] to download the matching emojis of a Misskey server.
//!
//! The steps are also available on their own:
//! [`api::fetch_listing`], [`filter::filter_by_keyword`], [`download::Downloader`]
//! and [`scheduler::Scheduler`]. See [`scheduler::Scheduler#example`] for example.
//!
//! Once downloaded, the emojis can be arranged into a picture with [`mosaic`].
//!
//! # As a binary
//!
//! In addition to the above, you also need [`cli`] (feature `cli`) to build the command line.
//!
//! See `main.rs` to know how to assemble these modules as a binary.

pub mod api;
#[cfg(feature = "cli")]
pub mod cli;
pub mod scheduler;

pub mod config;
pub mod download;
pub mod filter;
pub mod mosaic;
pub mod tool;
