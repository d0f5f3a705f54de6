//! CLI argument parsing for the simola-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::types::ImportKind;

#[derive(Parser)]
#[command(name = "simola-worker", about = "SIMOLA 110 backend worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Write an import template spreadsheet
    Template {
        /// report or feedback
        #[arg(long)]
        kind: ImportKind,
        /// Output path (defaults to the template's download name)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import a spreadsheet directly into the database and print the tally
    Import {
        /// report or feedback
        #[arg(long)]
        kind: ImportKind,
        /// Staff member recorded as the importer
        #[arg(long)]
        user: Option<Uuid>,
        /// .xlsx or .xls file
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_migrate_command_parses() {
        let cli = Cli::parse_from(["simola-worker", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["simola-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_template_command_parses() {
        let cli = Cli::parse_from(["simola-worker", "template", "--kind", "feedback"]);
        match cli.command {
            Some(Command::Template { kind, output }) => {
                assert_eq!(kind, ImportKind::Feedback);
                assert!(output.is_none());
            }
            _ => panic!("expected template command"),
        }
    }

    #[test]
    fn test_cli_import_command_parses() {
        let cli = Cli::parse_from(["simola-worker", "import", "--kind", "report", "laporan.xlsx"]);
        match cli.command {
            Some(Command::Import { kind, user, file }) => {
                assert_eq!(kind, ImportKind::Report);
                assert!(user.is_none());
                assert_eq!(file, PathBuf::from("laporan.xlsx"));
            }
            _ => panic!("expected import command"),
        }
    }

    #[test]
    fn test_cli_import_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["simola-worker", "import", "--kind", "customer", "a.xlsx"]).is_err());
    }
}
