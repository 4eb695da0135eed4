use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use reqwest::Client;
use tokio::runtime::Runtime;
use tokio::signal;

use misskey_emoji_dl::cli::{Cli, CommandFactory, Parser};
use misskey_emoji_dl::config::Config;
use misskey_emoji_dl::mosaic::mosaic_from_dir;
use misskey_emoji_dl::scheduler::download_emojis;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[inline]
fn build_client() -> reqwest::Result<Client> {
    // timeouts differ between the listing and the images, so they are set per request
    Client::builder().user_agent(USER_AGENT).build()
}

#[inline]
fn init_logger(level: log::LevelFilter) {
    // `RUST_LOG` takes precedence over `-v`
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

#[inline]
async fn async_main(config: Config) -> anyhow::Result<()> {
    let client = build_client().context("failed to build reqwest client")?;

    let report = download_emojis(client, &config).await?;
    // HACK: failed images are not considered an error, they are retried by running again.
    if report.failed > 0 {
        eprintln!(
            "{} emoji(s) failed to download, run again to retry them",
            report.failed
        );
    }

    Ok(())
}

fn mosaic_main(config: &Config, picture: &Path, max_chars: usize) -> anyhow::Result<()> {
    let mosaic = mosaic_from_dir(&config.save_dir, picture, max_chars)
        .with_context(|| format!("failed to make a mosaic of {}", picture.display()))?;

    print!("{}", mosaic.text);
    eprintln!("{}", mosaic.status());
    if mosaic.over_limit() {
        log::warn!("the mosaic has more than {max_chars} characters");
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    // here, if parse fails, the program will exit with clap's usage message,
    // but it's okay, because we don't need to clean up anything.
    let cli = Cli::parse();
    init_logger(cli.log_level());
    let mosaic = cli.mosaic_request();

    let config = match cli.into_config(&mut Cli::command()) {
        Ok(config) => config,
        Err(err) => {
            let _ = err.print();
            return Ok(ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(2)));
        }
    };
    log::debug!("{config:?}");

    if let Some((picture, max_chars)) = mosaic {
        mosaic_main(&config, &picture, max_chars)?;
        return Ok(ExitCode::SUCCESS);
    }

    let runtime = Runtime::new().context("failed to build tokio runtime")?;
    runtime.block_on(async {
        tokio::select! {
            result = async_main(config) => {result},
            result = signal::ctrl_c() => {
                result.context("failed to listen for ctrl-c signal")?;
                println!("Ctrl-C received, exiting...");
                Ok(())
            },
        }
    })?;

    Ok(ExitCode::SUCCESS)
}
