pub mod commands;
pub mod runtime;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use opsdesk_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use opsdesk_core::domain::request::{Priority, RequestStatus};
use opsdesk_core::domain::user::Role;
use rust_decimal::Decimal;

use crate::commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Parser)]
#[command(
    name = "opsdesk",
    about = "Opsdesk request approval CLI",
    long_about = "Submit, review, and track operations requests against an Opsdesk API. Only actions the signed-in role may take on a request are attempted.",
    after_help = "Examples:\n  opsdesk login --email emp@corp.test --password secret\n  opsdesk requests list --status SUBMITTED\n  opsdesk requests approve 42 --comment \"ok\"\n  opsdesk doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file to load instead of ./opsdesk.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override api.base_url")]
    pub base_url: Option<String>,
    #[arg(long, global = true, help = "Override session.path")]
    pub session_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the stored session, and API reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(flatten)]
    Workflow(WorkflowCommand),
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    #[command(about = "Sign in and store the session")]
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    #[command(about = "Clear the stored session")]
    Logout,
    #[command(about = "Show the signed-in user")]
    Whoami,
    #[command(about = "Create an account and sign in")]
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "EMPLOYEE", help = "EMPLOYEE, MANAGER or ADMIN")]
        role: Role,
        #[arg(long, help = "Approving manager for an employee")]
        manager_id: Option<i64>,
    },
    #[command(subcommand, about = "List, create, and act on requests")]
    Requests(RequestsCommand),
    #[command(subcommand, about = "Manage the request type catalog")]
    Types(TypesCommand),
}

#[derive(Debug, Subcommand)]
pub enum RequestsCommand {
    #[command(about = "List requests visible to the signed-in user")]
    List {
        #[arg(long)]
        status: Option<RequestStatus>,
        #[arg(long)]
        type_id: Option<i64>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    #[command(about = "Show a request with its comments and audit trail")]
    Show { id: i64 },
    #[command(about = "Submit a new request")]
    Create {
        #[arg(long)]
        type_id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long, default_value = "MEDIUM")]
        priority: Priority,
    },
    #[command(about = "Edit a submitted request you own")]
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    #[command(about = "Cancel a submitted request you own")]
    Cancel { id: i64 },
    #[command(about = "Approve a submitted request assigned to you")]
    Approve {
        id: i64,
        #[arg(long)]
        comment: String,
    },
    #[command(about = "Reject a submitted request assigned to you")]
    Reject {
        id: i64,
        #[arg(long)]
        comment: String,
    },
    #[command(about = "Move an approved request to IN_PROGRESS or DONE")]
    Status {
        id: i64,
        #[arg(long)]
        to: RequestStatus,
        #[arg(long)]
        note: Option<String>,
    },
    #[command(about = "Add a comment to a request")]
    Comment {
        id: i64,
        #[arg(long)]
        text: String,
    },
    #[command(about = "List the actions available to you on a request")]
    Actions { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum TypesCommand {
    #[command(about = "List request types")]
    List,
    #[command(about = "Create a request type")]
    Create {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
    },
    #[command(about = "Rename, recode, or (de)activate a request type")]
    Update {
        id: i64,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                api_base_url: self.base_url.clone(),
                session_path: self.session_path.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn execute(cli: Cli) -> CommandResult {
    let options = cli.load_options();

    let command = match cli.command {
        Command::Config => return commands::config::run(&options),
        Command::Doctor { json } => {
            return CommandResult { exit_code: 0, output: commands::doctor::run(&options, json) }
        }
        Command::Workflow(command) => command,
    };

    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            )
        }
    };
    let api = match runtime::connect(&config) {
        Ok(api) => api,
        Err(error) => return CommandResult::client_failure("connect", &error),
    };
    let executor = match runtime::build() {
        Ok(executor) => executor,
        Err(error) => return CommandResult::failure("runtime", "runtime", format!("{error:#}"), 1),
    };

    executor.block_on(commands::dispatch(Arc::new(api), command))
}
