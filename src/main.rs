//! weft - an HTML-first bundler and dev server.

#![allow(dead_code)]

mod actor;
mod bundle;
mod cli;
mod config;
mod core;
mod document;
mod embed;
mod hmr;
mod logger;
mod plugin;
mod related;
mod session;
mod utils;
mod vfs;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::{WeftConfig, init_config};
use plugin::Plugins;

fn main() -> Result<()> {
    core::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    if let Some(colored) = forced_color(cli.color) {
        owo_colors::set_override(colored);
    }

    let config = init_config(WeftConfig::load(cli)?);

    if cli.is_watch() {
        cli::serve::serve(Plugins::builtin())
    } else {
        cli::build::build_project(&config, Plugins::builtin()).map(|_| ())
    }
}

/// `None` leaves terminal detection to owo-colors.
fn forced_color(choice: ColorChoice) -> Option<bool> {
    match choice {
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
        ColorChoice::Auto => None,
    }
}
