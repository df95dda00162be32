use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the merged package index of every channel
    #[clap(name = "packages")]
    Packages,

    /// Show a package from the first channel that has it
    #[command(arg_required_else_help = true)]
    #[clap(name = "package", visible_alias = "p")]
    Package {
        /// Package name
        #[arg(required = true)]
        name: String,

        /// Only keep versions numbered exactly this
        #[arg(required = false)]
        version: Option<String>,
    },

    /// Show a channel's packages, one of its packages, or matching versions
    #[command(arg_required_else_help = true)]
    #[clap(name = "channel", visible_alias = "c")]
    Channel {
        /// Channel label
        #[arg(required = true)]
        label: String,

        /// Package name
        #[arg(required = false)]
        name: Option<String>,

        /// Version number
        #[arg(required = false, requires = "name")]
        version: Option<String>,
    },

    /// Show every channel with its package count and last update
    #[clap(name = "status")]
    Status,

    /// Keep every channel loaded, reloading them on an interval
    #[clap(name = "watch")]
    Watch {
        /// Override the configured refresh interval, e.g. 30s or 15m
        #[arg(required = false, short, long)]
        interval: Option<String>,
    },

    /// Print the default configuration
    #[clap(name = "defconfig")]
    DefConfig,
}
