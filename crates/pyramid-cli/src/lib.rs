//! Pyramid CLI
//!
//! The `pyramid` binary: figure-spec tooling, chapter import/export and
//! access-code administration over local files.

#![warn(unreachable_pub)]

pub mod cli;
pub mod commands;
pub mod logging;

use anyhow::{Context, Result};
use clap::ArgMatches;
use pyramid_editor::EditorConfig;
use std::path::{Path, PathBuf};

/// What a command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Text for stdout
    pub output: String,
    /// Exit status
    pub success: bool,
}

impl Report {
    /// Successful output
    #[must_use]
    pub fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }

    /// Failed output
    #[must_use]
    pub fn failed(output: String) -> Self {
        Self {
            output,
            success: false,
        }
    }
}

/// Editor configuration from `path`, or defaults
///
/// # Errors
/// Unreadable file or invalid configuration
pub fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    let Some(path) = path else {
        return Ok(EditorConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    EditorConfig::from_toml_str(&text).with_context(|| format!("loading config {}", path.display()))
}

fn read(matches: &ArgMatches) -> Result<(PathBuf, String)> {
    let path = required_path(matches, "file")?;
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok((path, text))
}

fn required_path(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(name)
        .cloned()
        .with_context(|| format!("missing <{name}>"))
}

fn required_str<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}>"))
}

/// Send `text` to `--output` when given, else return it for stdout
fn deliver(matches: &ArgMatches, text: String) -> Result<Report> {
    match matches.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "written");
            Ok(Report::ok(String::new()))
        }
        None => Ok(Report::ok(text)),
    }
}

/// Run parsed arguments
///
/// # Errors
/// Any command failure
pub async fn run(matches: &ArgMatches) -> Result<Report> {
    let config = load_config(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("figures", figures)) => match figures.subcommand() {
            Some(("check", args)) => {
                let (_, text) = read(args)?;
                Ok(commands::figures::check(&text))
            }
            Some(("pending", args)) => {
                let (_, text) = read(args)?;
                let as_json = args.get_one::<String>("format").map(String::as_str) == Some("json");
                commands::figures::pending(&text, as_json)
            }
            Some(("render", args)) => {
                let (_, text) = read(args)?;
                let out = commands::figures::render(&text, args.get_flag("strip-pending"))?;
                deliver(args, out)
            }
            Some(("lock", args)) => {
                let (path, text) = read(args)?;
                let id = required_str(args, "id")?;
                let out = commands::figures::lock(&text, id, required_str(args, "src")?)?;
                if args.get_flag("write") {
                    std::fs::write(&path, out)
                        .with_context(|| format!("writing {}", path.display()))?;
                    Ok(Report::ok(format!("locked {id}\n")))
                } else {
                    Ok(Report::ok(out))
                }
            }
            _ => anyhow::bail!("unknown figures subcommand"),
        },
        Some(("import", args)) => {
            let (_, text) = read(args)?;
            let doc = commands::chapter::import(&text, &config).await?;
            let mut json = serde_json::to_string_pretty(&doc)?;
            json.push('\n');
            deliver(args, json)
        }
        Some(("export", args)) => {
            let (_, text) = read(args)?;
            deliver(args, commands::chapter::export(&text)?)
        }
        Some(("codes", codes)) => match codes.subcommand() {
            Some(("add", args)) => commands::codes::add(
                &required_path(args, "book")?,
                required_str(args, "code")?,
                args.get_one::<u32>("max-uses").copied(),
                args.get_one::<String>("expires").map(String::as_str),
            ),
            Some(("redeem", args)) => {
                commands::codes::redeem(
                    &required_path(args, "book")?,
                    required_str(args, "code")?,
                    args.get_one::<PathBuf>("access-file").map(PathBuf::as_path),
                )
                .await
            }
            _ => anyhow::bail!("unknown codes subcommand"),
        },
        Some(("config", _)) => Ok(Report::ok(toml::to_string_pretty(&config)?)),
        _ => anyhow::bail!("no command given"),
    }
}
