use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use clap::{CommandFactory, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ncsdis_lib::{Disassembler, NcsError, OutputFormat, RenderOptions, StaticAnalysis};

use crate::cli::{Cli, DisassembleCommand, OutputFormatCli, TopLevel};

mod cli;

fn render(path: &Path, options: RenderOptions, out: &mut dyn Write) -> Result<(), NcsError> {
    debug!(?path, ?options, "loading analysis dump");
    let engine = StaticAnalysis::from_reader(BufReader::new(File::open(path)?))?;
    let mut dis = Disassembler::new(engine);

    dis.analyze_stack()?;
    if matches!(options.format, OutputFormat::Dot | OutputFormat::Nss) {
        dis.analyze_control_flow()?;
    }

    let mut out = BufWriter::new(out);
    dis.render(&mut out, options)?;
    out.flush()?;
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Disassemble { command }) => match command {
            DisassembleCommand::File {
                path,
                format,
                print_stack,
                print_control_types,
                output,
            } => {
                let format = match format {
                    OutputFormatCli::Listing => OutputFormat::Listing,
                    OutputFormatCli::Assembly => OutputFormat::Assembly,
                    OutputFormatCli::Dot => OutputFormat::Dot,
                    OutputFormatCli::Nss => OutputFormat::Nss,
                };
                let options = RenderOptions {
                    format,
                    print_stack,
                    print_control_types,
                };

                let result = match output {
                    Some(out_path) => match File::create(&out_path) {
                        Ok(mut f) => render(&path, options, &mut f),
                        Err(e) => {
                            eprintln!("failed to create {out_path:?}: {e}");
                            std::process::exit(1);
                        }
                    },
                    None => render(&path, options, &mut io::stdout().lock()),
                };

                if let Err(e) = result {
                    eprintln!("failed to render {path:?}: {e}");
                    std::process::exit(1);
                }
            }
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut io::stdout());
        }
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("{e}");
            }
        }
    }
}
