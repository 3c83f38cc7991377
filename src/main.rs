use std::io::Read;
use std::process::ExitCode;
use std::{fs, io};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pl0c::cli::Cli;
use pl0c::compiler::Compiler;
use pl0c::error::format_diagnostic;
use pl0c::vm::Vm;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = match read_source(&cli) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("{}", format_diagnostic(&cli.program_name(), err));
            return ExitCode::FAILURE;
        }
    };

    let output = Compiler::new(&source).compile();
    let program = cli.program_name();
    for error in &output.errors {
        eprintln!("{}", format_diagnostic(&program, error));
    }

    if !output.errors.is_empty() {
        return ExitCode::from(output.errors.len().min(255) as u8);
    }

    let mut vm = Vm::new(output.code, cli.stack_words);
    if let Err(err) = vm.run() {
        eprintln!("{}", format_diagnostic(&program, err));
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn read_source(cli: &Cli) -> io::Result<String> {
    if cli.reads_stdin() {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(cli.source.as_ref().expect("checked by reads_stdin"))
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pl0c=trace" } else { "pl0c=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
