use clap::{Parser, Subcommand, ValueEnum};
use pagegrab::convert::OutputFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pagegrab")]
#[command(about = "Fetches web pages statically or in a browser and normalizes them")]
#[command(version)]
pub struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch a page and print its normalized form
    Fetch {
        url: String,

        /// Render in a browser and wait until this selector matches
        #[arg(short, long)]
        wait_selector: Option<String>,

        /// Always render in a browser
        #[arg(short, long)]
        render: bool,

        /// Budget for a rendered fetch in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(short, long, value_enum, default_value_t = PageFormat::Json)]
        format: PageFormat,

        /// Write the screenshot of a rendered fetch here (`-` picks a name from the URL)
        #[arg(long)]
        screenshot: Option<PathBuf>,
    },

    /// Fetch a page and print the elements matching a selector
    Extract {
        url: String,

        #[arg(short, long)]
        selector: String,

        /// Render in a browser before extracting
        #[arg(short, long)]
        render: bool,

        #[arg(short, long, value_enum, default_value_t = RecordFormat::Json)]
        format: RecordFormat,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PageFormat {
    Json,
    Markdown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RecordFormat {
    Json,
    Csv,
    Xml,
    Markdown,
}

impl From<RecordFormat> for OutputFormat {
    fn from(format: RecordFormat) -> Self {
        match format {
            RecordFormat::Json => OutputFormat::Json,
            RecordFormat::Csv => OutputFormat::Csv,
            RecordFormat::Xml => OutputFormat::Xml,
            RecordFormat::Markdown => OutputFormat::Markdown,
        }
    }
}
