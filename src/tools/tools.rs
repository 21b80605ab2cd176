mod disasm;
use disasm::disasm;
mod report;
use report::print_report;
mod symbols;
use symbols::export_symbols;
mod translate;
use translate::translate;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use recomp16::analysis::Analysis;
use recomp16::ExeImage;

/// Statically recompile an MS-DOS overlay executable
#[derive(Clone, Debug, Parser)]
struct Args {
    /// input executable to process
    input: PathBuf,
    // operation to execute
    #[command(subcommand)]
    operation: Operation,
}

#[derive(Clone, Debug, Subcommand)]
enum Operation {
    /// Disassemble a byte range, the resident image or one overlay module
    Disasm(DisasmArgs),
    /// Detect functions, build the call graph and print the analysis report
    Analyze(AnalyzeArgs),
    /// Translate every detected function into target source
    Lift(LiftArgs),
}

#[derive(Clone, Debug, clap::Args)]
struct DisasmArgs {
    /// decode the resident code window
    #[arg(long)]
    resident: bool,
    /// decode the code of this overlay module (1-based)
    #[arg(long)]
    overlay: Option<u8>,
    /// start offset of the range to decode, decimal or 0x-prefixed hex
    #[arg(long, value_parser = parse_offset)]
    start: Option<usize>,
    /// length of the range to decode, defaults to the rest of the file
    #[arg(long, value_parser = parse_offset)]
    length: Option<usize>,
}

#[derive(Clone, Debug, clap::Args)]
struct AnalyzeArgs {
    /// also list every detected function
    #[arg(short, long)]
    verbose: bool,
    /// write the machine-readable function table to this path
    #[arg(long)]
    symbols: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::Args)]
struct LiftArgs {
    /// write the generated source here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_offset(value: &str) -> Result<usize, std::num::ParseIntError> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

fn load_image(args: &Args) -> Result<ExeImage> {
    let mut input = File::open(&args.input)
        .with_context(|| format!("unable to open {}", args.input.display()))?;
    ExeImage::read(&mut input)
}

fn analyze(args: &Args, analyze_args: &AnalyzeArgs) -> Result<()> {
    let image = load_image(args)?;
    let analysis = Analysis::run(&image);
    print_report(&analysis, analyze_args.verbose);
    if let Some(path) = &analyze_args.symbols {
        export_symbols(&analysis, path)?;
        println!("\nSymbols exported to: {}", path.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    match &args.operation {
        Operation::Disasm(disasm_args) => disasm(&args, disasm_args),
        Operation::Analyze(analyze_args) => analyze(&args, analyze_args),
        Operation::Lift(lift_args) => translate(&args, lift_args),
    }
}
