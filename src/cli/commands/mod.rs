pub mod admin;
pub mod logging;
pub mod mail;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_FORM_DATA_DIR: &str = "form-data-dir";

pub const DEFAULT_FORM_DATA_DIR: &str = "form-data";

fn serve() -> Command {
    let command = Command::new("serve")
        .about("Serve the form relay endpoints")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("TARAFTAR_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_FORM_DATA_DIR)
                .long(ARG_FORM_DATA_DIR)
                .help("Directory where every submission is saved before mailing")
                .default_value(DEFAULT_FORM_DATA_DIR)
                .env("TARAFTAR_FORM_DATA_DIR"),
        );

    mail::with_args(command)
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("taraftar")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(serve())
        .subcommand(admin::command());

    logging::with_args(command)
}
