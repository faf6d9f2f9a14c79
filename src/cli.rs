//! Command-line surface (§4.9). Each subcommand is thin glue: parse args,
//! load ambient state via [`crate::context::Context`], call into the core,
//! report results. No business logic lives here.

use clap::{builder::styling::AnsiColor, builder::Styles, Parser, Subcommand};

const CLI_STYLE: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Debug, Clone, Parser)]
#[command(name = "vendorlock", about = "A deterministic constraint solver and vendor tree writer")]
#[command(version)]
#[command(styles = CLI_STYLE)]
pub struct Cli {
    /// Project root (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub project: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Opt,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Opt {
    /// Write a starter Manifest.toml for the current project
    Init,

    /// Solve and write Manifest.toml's dependencies, updating Lock.toml and vendor/
    #[command(alias = "up")]
    Ensure {
        /// Re-solve even if Lock.toml's inputs digest still matches
        #[arg(long)]
        force: bool,

        /// Skip writing the vendor tree (manifest/lock only)
        #[arg(long)]
        no_vendor: bool,
    },

    /// Verify Lock.toml's inputs digest against the current manifest/analysis, without writing anything
    Check,

    /// Print a summary of the locked projects and whether vendor/ matches
    Status,

    /// Re-apply the manifest's prune settings to the existing vendor tree
    Prune,
}
