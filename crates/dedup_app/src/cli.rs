use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "dedup", about = "Deduplicate user identifier lists")]
pub struct Cli {
    /// Engine settings in RON; defaults apply when missing.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory receiving the result files.
    #[arg(long, short, global = true, default_value = "output")]
    pub out_dir: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Merge one or more files into a single deduplicated list.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write the identifiers unique to each of two files.
    Compare { file_a: PathBuf, file_b: PathBuf },
    /// Deduplicate a single file.
    Dedup { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, LogTarget};
    use clap::Parser;

    #[test]
    fn merge_accepts_many_files() {
        let cli = Cli::parse_from(["dedup", "merge", "a.txt", "b.txt", "c.txt"]);
        match cli.command {
            Command::Merge { files } => assert_eq!(files.len(), 3),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.log, LogTarget::Terminal);
    }

    #[test]
    fn compare_requires_two_files() {
        assert!(Cli::try_parse_from(["dedup", "compare", "a.txt"]).is_err());
        assert!(Cli::try_parse_from(["dedup", "compare", "a.txt", "b.txt"]).is_ok());
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::parse_from(["dedup", "dedup", "u.txt", "--log", "both", "-o", "res"]);
        assert_eq!(cli.log, LogTarget::Both);
        assert_eq!(cli.out_dir.to_str(), Some("res"));
    }
}
