use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_version};
use clap_complete::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatCli {
    /// Addresses, raw bytes and mnemonics
    Listing,
    /// Mnemonics only
    Assembly,
    /// GraphViz control flow graph
    Dot,
    /// NSS pseudo-source
    Nss,
}

#[derive(Parser)]
#[command(name = "ncsdis",
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Renders an analyzed NWScript file
    Disassemble {
        #[command(subcommand)]
        command: DisassembleCommand,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DisassembleCommand {
    /// Renders a JSON analysis dump
    File {
        /// Path to the analysis dump
        path: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormatCli::Listing)]
        format: OutputFormatCli,

        /// Print the stack before each instruction (listing and assembly)
        #[arg(long, default_value_t = false)]
        print_stack: bool,

        /// Tag graph nodes with their control structures (dot)
        #[arg(long, default_value_t = false)]
        print_control_types: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    }
}
