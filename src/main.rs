//! Declassify CLI

use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::path::PathBuf;

use declassify::{parse_tsx, transform_module};

#[derive(ClapParser)]
#[command(name = "declassify")]
#[command(about = "Rewrite React class components into function components")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform a TSX file and print the resulting module AST
    Transform {
        /// Input file
        file: PathBuf,
    },
    /// Report which class components in a TSX file are transformable
    Check {
        /// Input file
        file: PathBuf,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn read_source(file: &PathBuf) -> String {
    match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = <Cli as ClapParser>::parse();

    match cli.command {
        Commands::Transform { file } => {
            let source = read_source(&file);
            let parsed = match parse_tsx(&source) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Parse error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut module = parsed.module;
            let report = transform_module(&mut module, Some(&parsed.comments));

            for outcome in &report.components {
                let name = outcome.name.as_deref().unwrap_or("<default export>");
                if outcome.transformed {
                    eprintln!("transformed: {}", name);
                } else if let Some(reason) = &outcome.reason {
                    eprintln!("kept: {} ({})", name, reason);
                }
            }
            eprintln!(
                "{} component(s) transformed, {} kept",
                report.transformed(),
                report.failed()
            );

            println!("Transformed {:?}", file);
            println!("{:-<60}", "");
            println!("{:#?}", module);
        }
        Commands::Check { file, json } => {
            let source = read_source(&file);
            let parsed = match parse_tsx(&source) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("Parse error: {}", e);
                    std::process::exit(1);
                }
            };
            let mut module = parsed.module;
            let report = transform_module(&mut module, Some(&parsed.comments));

            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("Error serializing report: {}", e);
                        std::process::exit(1);
                    }
                }
                return;
            }

            for outcome in &report.components {
                let name = outcome.name.as_deref().unwrap_or("<default export>");
                if outcome.transformed {
                    println!("ok: {}", name);
                } else if outcome.skipped {
                    println!("skipped: {}", name);
                } else {
                    match &outcome.reason {
                        Some(reason) => println!("cannot transform: {} ({})", name, reason),
                        None => println!("cannot transform: {}", name),
                    }
                }
            }

            if report.failed() == 0 {
                println!("Check passed: {:?}", file);
            } else {
                eprintln!("Check failed: {} component(s) not transformable", report.failed());
                std::process::exit(1);
            }
        }
    }
}
