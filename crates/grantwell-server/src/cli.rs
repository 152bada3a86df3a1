use std::path::PathBuf;

use clap::{Parser, Subcommand};
use grantwell_core::model::{ApplicationId, GroupId, UserId};

#[derive(Debug, Parser)]
#[command(name = "grantwell-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Serve,
    Migrate,
    /// Recompute and store one user's effective permissions.
    RecalculateUser {
        #[arg(long)]
        user_id: UserId,
    },
    /// Recompute every member of a group, removing orphaned memberships.
    RecalculateGroup {
        #[arg(long)]
        group_id: GroupId,
    },
    /// Print cached records and effective permissions for a user.
    ShowUser {
        #[arg(long)]
        user_id: UserId,
        #[arg(long)]
        application_id: Option<ApplicationId>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const USER: &str = "6f1c1b0a-3c2e-4d4f-9a6b-0e1f2a3b4c5d";
    const APP: &str = "0b8e7c44-1d2a-4f6b-8c3d-5e6f7a8b9c0d";

    #[test]
    fn cli_parses_serve_subcommand() {
        let cli = Cli::parse_from(["grantwell-server", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn cli_parses_migrate_subcommand() {
        let cli = Cli::parse_from(["grantwell-server", "migrate"]);
        assert!(matches!(cli.command, Some(Command::Migrate)));
    }

    #[test]
    fn cli_parses_config_flag() {
        let cli = Cli::parse_from(["grantwell-server", "--config", "/etc/grantwell.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/grantwell.toml")));
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_defaults_to_no_subcommand() {
        let cli = Cli::parse_from(["grantwell-server"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn cli_parses_recalculate_user() {
        let cli = Cli::parse_from(["grantwell-server", "recalculate-user", "--user-id", USER]);
        assert!(matches!(
            cli.command,
            Some(Command::RecalculateUser { user_id }) if user_id.to_string() == USER
        ));
    }

    #[test]
    fn cli_parses_recalculate_group() {
        let cli = Cli::parse_from(["grantwell-server", "recalculate-group", "--group-id", USER]);
        assert!(matches!(
            cli.command,
            Some(Command::RecalculateGroup { group_id }) if group_id.to_string() == USER
        ));
    }

    #[test]
    fn cli_parses_show_user_with_application() {
        let cli = Cli::parse_from([
            "grantwell-server",
            "show-user",
            "--user-id",
            USER,
            "--application-id",
            APP,
        ]);
        assert!(matches!(
            cli.command,
            Some(Command::ShowUser { application_id: Some(app), .. }) if app.to_string() == APP
        ));
    }

    #[test]
    fn cli_rejects_malformed_user_id() {
        let result = Cli::try_parse_from(["grantwell-server", "recalculate-user", "--user-id", "bob"]);
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
    }

    #[test]
    fn cli_config_flag_works_after_subcommand() {
        let cli = Cli::parse_from(["grantwell-server", "serve", "--config", "/etc/grantwell.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/grantwell.toml")));
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn cli_version_flag() {
        let result = Cli::try_parse_from(["grantwell-server", "--version"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
