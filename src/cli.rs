//! # Command-line interface
//!
//! `pl0c [-v] [-] [sourcefile]`. `-` and a bare sourcefile are mutually
//! exclusive ways of naming the input; omitting both also reads standard
//! input, matching the source text's own convention that `-` is explicit
//! about it while an absent argument falls back to it implicitly.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "pl0c", version, about = "PL/0C compiler and interpreter")]
pub struct Cli {
    /// Enable verbose tracing: token events, emit/patch events, and an
    /// interpreter register dump before each instruction.
    #[arg(short, long)]
    pub verbose: bool,

    /// Data stack size in words.
    #[arg(long, default_value_t = 512)]
    pub stack_words: usize,

    /// Source file to compile, or `-` for standard input. Omitted entirely
    /// also means standard input.
    pub source: Option<PathBuf>,
}

impl Cli {
    /// `true` when the source should be read from stdin: an explicit `-`
    /// or no path given at all.
    pub fn reads_stdin(&self) -> bool {
        match &self.source {
            None => true,
            Some(path) => path.as_os_str() == "-",
        }
    }

    /// The name to use in diagnostics: the source path, or `<stdin>`.
    pub fn program_name(&self) -> String {
        match &self.source {
            Some(path) if path.as_os_str() != "-" => path.display().to_string(),
            _ => "<stdin>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn no_source_means_stdin() {
        let cli = Cli::parse_from(["pl0c"]);
        assert!(cli.reads_stdin());
        assert_eq!(cli.program_name(), "<stdin>");
    }

    #[test]
    fn dash_means_stdin() {
        let cli = Cli::parse_from(["pl0c", "-"]);
        assert!(cli.reads_stdin());
    }

    #[test]
    fn named_file_is_not_stdin() {
        let cli = Cli::parse_from(["pl0c", "prog.pl0"]);
        assert!(!cli.reads_stdin());
        assert_eq!(cli.program_name(), "prog.pl0");
    }

    #[test]
    fn stack_words_defaults_to_512() {
        let cli = Cli::parse_from(["pl0c", "prog.pl0"]);
        assert_eq!(cli.stack_words, 512);
    }

    #[test]
    fn verbose_flag_parses() {
        let cli = Cli::parse_from(["pl0c", "-v", "prog.pl0"]);
        assert!(cli.verbose);
    }

    #[test]
    fn stack_words_flag_overrides_default() {
        let cli = Cli::parse_from(["pl0c", "--stack-words", "1024", "prog.pl0"]);
        assert_eq!(cli.stack_words, 1024);
    }
}
