//! kiln CLI - static-site asset pipeline with live reload.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Parser;
use kiln_tasks::TaskName;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Build static-site assets and serve them with live reload")]
#[command(version)]
pub struct Cli {
    /// Task to run: clean, less, html, js, img:copy, css:copy, fonts:copy,
    /// svgstore, js:font:loading:LS:min, css:fonts:woff, css:fonts:woff2,
    /// build, serve or default
    #[arg(default_value = "default", value_parser = TaskName::from_str)]
    task: TaskName,

    /// Path to kiln.toml or package.json (defaults to kiln.toml, then
    /// package.json, in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let path = commands::config_path(cli.config.as_deref(), &std::env::current_dir()?)?;
    let config = commands::load_config(&path)?;

    if cli.task.is_serve() {
        commands::serve::run(config).await
    } else {
        commands::run::run(config, cli.task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults_to_default() {
        let cli = Cli::try_parse_from(["kiln"]).unwrap();
        assert_eq!(cli.task, TaskName::Default);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn parses_task_and_flags() {
        let cli =
            Cli::try_parse_from(["kiln", "--verbose", "-c", "site/kiln.toml", "css:fonts:woff2"])
                .unwrap();
        assert_eq!(cli.task, TaskName::FontsWoff2);
        assert_eq!(cli.config, Some(PathBuf::from("site/kiln.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_unknown_tasks() {
        assert!(Cli::try_parse_from(["kiln", "sass"]).is_err());
    }
}
