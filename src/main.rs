use clap::Parser;
use pagegrab::convert::{self, OutputFormat};
use pagegrab::utils::sanitize_filename;
use pagegrab::{AcquireConfig, AcquireRequest, Acquirer, PageSnapshot, Strategy};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

mod args;
use args::{Args, Command, PageFormat};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let start_time = Instant::now();
    match run(args).await {
        Ok(()) => {
            ::log::info!(
                "Done in {:.2} seconds",
                start_time.elapsed().as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => AcquireConfig::from_file(path)?,
        None => AcquireConfig::default(),
    }
    .with_env_overrides();
    let acquirer = Acquirer::new(config)?;

    match args.command {
        Command::Fetch {
            url,
            wait_selector,
            render,
            timeout_ms,
            format,
            screenshot,
        } => {
            ::log::info!("Fetching {}", url);
            let snapshot = acquirer
                .acquire(request(&url, wait_selector, render, timeout_ms))
                .await?;

            if let Some(path) = screenshot {
                save_screenshot(&snapshot, &path, &url)?;
            }

            match format {
                PageFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot.page)?),
                PageFormat::Markdown => print!("{}", convert::page_to_markdown(&snapshot.page)),
            }
        }
        Command::Extract {
            url,
            selector,
            render,
            format,
        } => {
            ::log::info!("Extracting {} from {}", selector, url);
            let snapshot = acquirer.acquire(request(&url, None, render, None)).await?;
            let elements = acquirer.extract(&snapshot.page.html, &selector)?;
            ::log::debug!("Selector matched {} elements", elements.len());

            let records = elements
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?;
            println!(
                "{}",
                convert::render_records(&records, OutputFormat::from(format))?
            );
        }
    }
    Ok(())
}

fn request(
    url: &str,
    wait_selector: Option<String>,
    render: bool,
    timeout_ms: Option<u64>,
) -> AcquireRequest {
    let mut request = AcquireRequest::new(url);
    request.wait_selector = wait_selector;
    request.timeout = timeout_ms.map(Duration::from_millis);
    if render {
        request.strategy = Strategy::Rendered;
    }
    request
}

fn save_screenshot(
    snapshot: &PageSnapshot,
    path: &Path,
    url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(png) = &snapshot.screenshot else {
        ::log::warn!("No screenshot for {}; the page was fetched without a browser", url);
        return Ok(());
    };

    let path = if path == Path::new("-") {
        PathBuf::from(format!("{}.png", sanitize_filename(url)))
    } else {
        path.to_path_buf()
    };
    std::fs::write(&path, png)?;
    ::log::info!("Saved screenshot to {}", path.display());
    Ok(())
}
