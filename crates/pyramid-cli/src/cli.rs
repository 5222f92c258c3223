//! Argument definitions

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn file_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help(help)
}

fn book_arg() -> Arg {
    Arg::new("book")
        .long("book")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Code book JSON file")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_parser(value_parser!(PathBuf))
        .help("Write to this file instead of stdout")
}

/// The `pyramid` command tree
#[must_use]
pub fn command() -> Command {
    Command::new("pyramid")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Pivot Pyramid ebook tooling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Editor configuration TOML"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("figures")
                .about("Figure specs in chapter markdown")
                .subcommand_required(true)
                .subcommand(
                    Command::new("check")
                        .about("Validate every figure spec")
                        .arg(file_arg("file", "Chapter markdown")),
                )
                .subcommand(
                    Command::new("pending")
                        .about("List specs without an image")
                        .arg(file_arg("file", "Chapter markdown"))
                        .arg(
                            Arg::new("format")
                                .long("format")
                                .default_value("text")
                                .value_parser(["text", "json"])
                                .help("Listing format"),
                        ),
                )
                .subcommand(
                    Command::new("render")
                        .about("Replace locked specs with markdown images")
                        .arg(file_arg("file", "Chapter markdown"))
                        .arg(
                            Arg::new("strip-pending")
                                .long("strip-pending")
                                .action(ArgAction::SetTrue)
                                .help("Replace pending specs with a placeholder comment"),
                        )
                        .arg(output_arg()),
                )
                .subcommand(
                    Command::new("lock")
                        .about("Record the image location of a spec")
                        .arg(file_arg("file", "Chapter markdown"))
                        .arg(Arg::new("id").required(true).help("Figure id"))
                        .arg(Arg::new("src").required(true).help("Image URL"))
                        .arg(
                            Arg::new("write")
                                .long("write")
                                .action(ArgAction::SetTrue)
                                .help("Rewrite the file in place"),
                        ),
                ),
        )
        .subcommand(
            Command::new("import")
                .about("Stage chapter markdown through the editor and print chapter JSON")
                .arg(file_arg("file", "Chapter markdown"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Render chapter JSON as markdown")
                .arg(file_arg("file", "Chapter JSON"))
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("codes")
                .about("Access codes kept in a JSON code book")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Add or replace a code")
                        .arg(Arg::new("code").required(true).help("Code text"))
                        .arg(book_arg())
                        .arg(
                            Arg::new("max-uses")
                                .long("max-uses")
                                .value_parser(value_parser!(u32))
                                .help("Redemption limit"),
                        )
                        .arg(
                            Arg::new("expires")
                                .long("expires")
                                .help("Expiry as RFC 3339, e.g. 2026-12-31T23:59:59Z"),
                        ),
                )
                .subcommand(
                    Command::new("redeem")
                        .about("Redeem a code and record the use")
                        .arg(Arg::new("code").required(true).help("Code text"))
                        .arg(book_arg())
                        .arg(
                            Arg::new("access-file")
                                .long("access-file")
                                .value_parser(value_parser!(PathBuf))
                                .help("Remember the grant in this JSON file"),
                        ),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective editor configuration"))
}
