use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

/// fwi - filewatcher installer
///
/// Downloads the filewatcher release binary for the current platform,
/// verifies its published SHA-256 checksum, and installs it with executable
/// permissions.
///
/// Examples:
///   fwi                 # Install the pinned release to the default directory
///   fwi --dir ~/bin     # Install somewhere else
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Install directory (overrides defaults; also via FWI_INSTALL_DIR)
    #[arg(
        long = "dir",
        short = 'd',
        env = "FWI_INSTALL_DIR",
        value_name = "PATH"
    )]
    install_dir: Option<PathBuf>,

    /// Release host URL (defaults to https://github.com)
    #[arg(long = "base-url", value_name = "URL")]
    base_url: Option<String>,

    /// Release tag to install (defaults to this installer's own version)
    #[arg(long = "tag", value_name = "TAG")]
    tag: Option<String>,

    /// GitHub repository in the format "owner/repo"
    #[arg(long = "repo", value_name = "OWNER/REPO")]
    repository: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = fwi::runtime::RealRuntime;

    fwi::install::install(
        runtime,
        cli.install_dir,
        cli.base_url,
        cli.tag,
        cli.repository,
    )
    .await
}
