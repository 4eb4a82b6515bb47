//! Command-line front end: run an input document through a stylesheet and
//! print the result.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use stilo::{dom, xslt, StylesheetOptions};

#[derive(Parser)]
#[command(version, about = "Apply an XSLT 1.0 stylesheet to an XML document")]
struct Args {
    /// Attempt to indent any XML output.
    #[arg(long)]
    indent: bool,

    /// Set a global stylesheet parameter (name=value); repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// The stylesheet to apply.
    stylesheet: PathBuf,

    /// The input document.
    input: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", env!("CARGO_PKG_NAME"), e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> stilo::Result<String> {
    let stylesheet = xslt::parse_stylesheet_file(&args.stylesheet)?;
    let input = dom::parse_file(&args.input)?;

    let mut options = StylesheetOptions {
        indent: args.indent,
        ..Default::default()
    };
    for param in &args.params {
        match param.split_once('=') {
            Some((name, value)) => {
                options
                    .parameters
                    .insert(name.to_string(), value.to_string());
            }
            None => {
                options.parameters.insert(param.clone(), String::new());
            }
        }
    }

    stylesheet.process(&input, &options)
}
