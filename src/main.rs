use anyhow::{Context, Result};
use clap::{App, Arg, ArgMatches};
use quill::build::build_site;
use quill::config::Config;
use quill::serve::serve;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut app = App::new("quill")
        .version(clap::crate_version!())
        .about("Builds a static blog from markdown posts")
        .arg(
            Arg::with_name("generate")
                .short("g")
                .long("generate")
                .help("Clean the output directory and generate the site"),
        )
        .arg(
            Arg::with_name("serve")
                .short("s")
                .long("serve")
                .help("Serve the output directory over HTTP"),
        )
        .arg(
            Arg::with_name("directory")
                .short("C")
                .long("directory")
                .takes_value(true)
                .value_name("DIR")
                .help("The project directory (default: the current directory)"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("DIR")
                .help("Overrides the output directory (relative to the project root)"),
        )
        .arg(
            Arg::with_name("address")
                .short("a")
                .long("address")
                .takes_value(true)
                .value_name("ADDR")
                .help("Overrides the address to serve on, e.g. 0.0.0.0:8080"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log every file and page"),
        );
    let matches = app.clone().get_matches();

    init_logging(matches.is_present("verbose"));

    if !matches.is_present("generate") && !matches.is_present("serve") {
        if let Err(e) = app.print_help() {
            tracing::error!("Printing help: {}", e);
            std::process::exit(1);
        }
        println!();
        return;
    }

    if let Err(e) = run(&matches) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let directory = match matches.value_of("directory") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("Getting the current directory")?,
    };
    let mut config = Config::from_directory(&directory)?;
    if let Some(output) = matches.value_of("output") {
        config.set_output_directory(Path::new(output));
    }
    if let Some(address) = matches.value_of("address") {
        config.address = address
            .parse()
            .with_context(|| format!("Parsing address `{}`", address))?;
    }

    if matches.is_present("generate") {
        build_site(&config)?;
    }
    if matches.is_present("serve") {
        serve(&config)?;
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "quill=debug" } else { "quill=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
