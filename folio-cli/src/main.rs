//! Folio CLI - command line client for the Folio page editor

mod commands;
mod console;
mod edit;
mod surface;

use clap::{Arg, ArgAction, ArgMatches, Command};
use folio_core::{Config, ConfigLoadContext, ConfigMetadata, ValidationStatus};
use folio_store::HttpStore;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};

use crate::edit::EditOptions;

/// Subcommand selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    List,
    Show {
        name: String,
    },
    History {
        name: String,
    },
    Status {
        name: String,
    },
    Publish {
        name: String,
        file: Option<PathBuf>,
        comment: Option<String>,
    },
    Edit {
        name: String,
        new: bool,
        workdir: Option<PathBuf>,
        hostname: Option<String>,
        port: Option<u16>,
    },
    ValidateConfig,
}

/// CLI arguments structure
#[derive(Debug, Clone)]
pub struct Args {
    pub config_file: Option<PathBuf>,
    pub store_url: Option<String>,
    pub dev_mode: bool,
    pub command: CliCommand,
}

fn name_arg(help: &'static str) -> Arg {
    Arg::new("name").help(help).required(true).index(1)
}

fn build_cli() -> Command {
    Command::new("folio")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Edit, preview and publish pages held by a Folio store")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("Path to configuration file (JSON format)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("store")
                .short('s')
                .long("store")
                .global(true)
                .help("Base URL of the page store, e.g. http://wiki.local")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("dev-mode")
                .long("dev-mode")
                .global(true)
                .help("Enable debug logging with source locations")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("list").about("List the pages in the store"))
        .subcommand(
            Command::new("show")
                .about("Print the stored markup of a page")
                .arg(name_arg("Page to print")),
        )
        .subcommand(
            Command::new("history")
                .about("Show the version listing of a page")
                .arg(name_arg("Page whose history to show")),
        )
        .subcommand(
            Command::new("status")
                .about("Show the revision-control status of a page")
                .arg(name_arg("Page to check")),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish a page from a file or stdin")
                .arg(name_arg("Name to publish under"))
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .help("Read the body from this file instead of stdin")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("comment")
                        .short('m')
                        .long("comment")
                        .help("Change annotation stored with the publish"),
                ),
        )
        .subcommand(
            Command::new("edit")
                .about("Open a page for editing with a live preview")
                .arg(name_arg("Page to open"))
                .arg(
                    Arg::new("new")
                        .long("new")
                        .help("Start a blank page instead of loading one")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("workdir")
                        .short('w')
                        .long("workdir")
                        .help("Directory holding the working copy")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("hostname")
                        .short('H')
                        .long("hostname")
                        .help("Hostname or IP address for the preview server"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .help("Port for the preview server (1-65535)")
                        .value_parser(clap::value_parser!(u16)),
                ),
        )
        .subcommand(
            Command::new("validate-config").about("Print the effective configuration and check it"),
        )
}

impl Args {
    /// Parse the process arguments
    pub fn parse() -> Self {
        Self::from_matches(&build_cli().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let name = |sub: &ArgMatches| {
            sub.get_one::<String>("name")
                .cloned()
                .unwrap_or_default()
        };

        let command = match matches.subcommand() {
            Some(("show", sub)) => CliCommand::Show { name: name(sub) },
            Some(("history", sub)) => CliCommand::History { name: name(sub) },
            Some(("status", sub)) => CliCommand::Status { name: name(sub) },
            Some(("publish", sub)) => CliCommand::Publish {
                name: name(sub),
                file: sub.get_one::<PathBuf>("file").cloned(),
                comment: sub.get_one::<String>("comment").cloned(),
            },
            Some(("edit", sub)) => CliCommand::Edit {
                name: name(sub),
                new: sub.get_flag("new"),
                workdir: sub.get_one::<PathBuf>("workdir").cloned(),
                hostname: sub.get_one::<String>("hostname").cloned(),
                port: sub.get_one::<u16>("port").copied(),
            },
            Some(("validate-config", _)) => CliCommand::ValidateConfig,
            _ => CliCommand::List,
        };

        Self {
            config_file: matches.get_one::<PathBuf>("config").cloned(),
            store_url: matches.get_one::<String>("store").cloned(),
            dev_mode: matches.get_flag("dev-mode"),
            command,
        }
    }

    /// Overrides applied on top of the file and environment settings
    pub fn cli_overrides(&self) -> HashMap<String, serde_json::Value> {
        let mut overrides = HashMap::new();
        if let Some(url) = &self.store_url {
            overrides.insert("store.base_url".to_string(), url.clone().into());
        }
        if let CliCommand::Edit {
            workdir,
            hostname,
            port,
            ..
        } = &self.command
        {
            if let Some(dir) = workdir {
                overrides.insert(
                    "editor.working_dir".to_string(),
                    dir.to_string_lossy().to_string().into(),
                );
            }
            if let Some(hostname) = hostname {
                overrides.insert("preview.hostname".to_string(), hostname.clone().into());
            }
            if let Some(port) = port {
                overrides.insert("preview.port".to_string(), (*port).into());
            }
        }
        if self.dev_mode {
            overrides.insert("global.dev_mode".to_string(), true.into());
        }
        overrides
    }

    pub fn load_context(&self) -> ConfigLoadContext {
        ConfigLoadContext {
            base_path: self.config_file.clone().or_else(Config::default_path),
            require_base: self.config_file.is_some(),
            environment_overrides: Config::environment_overrides_from_process(),
            cli_overrides: self.cli_overrides(),
        }
    }
}

fn init_logging(dev_mode: bool) {
    let log_level = if dev_mode { Level::DEBUG } else { Level::INFO };

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level)
        .with_target(dev_mode)
        .with_line_number(dev_mode)
        .with_file(dev_mode);

    if dev_mode {
        subscriber.pretty().init();
        debug!("Development mode enabled");
    } else {
        subscriber.init();
    }
}

async fn run(command: CliCommand, config: Config, metadata: ConfigMetadata) -> anyhow::Result<bool> {
    for file in &metadata.source_files {
        debug!("Loaded configuration from {}", file.display());
    }

    if command == CliCommand::ValidateConfig {
        return commands::validate_config(&config, &metadata);
    }

    if metadata.validation_status == ValidationStatus::Invalid {
        config.validate()?;
    }
    for issue in &metadata.validation.warnings {
        warn!("{}: {}", issue.field_path, issue.message);
    }

    match command {
        CliCommand::Edit { name, new, .. } => {
            info!("Starting edit session for {}", name);
            edit::run_edit(config, EditOptions { name, new }).await?;
        }
        command => {
            let store = HttpStore::new(&config.store)?;
            match command {
                CliCommand::List => commands::list(&store).await?,
                CliCommand::Show { name } => commands::show(&store, &name).await?,
                CliCommand::History { name } => commands::history(&store, &name).await?,
                CliCommand::Status { name } => commands::status(&store, &name).await?,
                CliCommand::Publish {
                    name,
                    file,
                    comment,
                } => {
                    commands::publish(&store, &name, file.as_deref(), comment.as_deref()).await?
                }
                CliCommand::Edit { .. } | CliCommand::ValidateConfig => {}
            }
        }
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let loaded = Config::load_with_context(&args.load_context());
    let dev_mode = match &loaded {
        Ok((config, _)) => config.dev_mode(),
        Err(_) => args.dev_mode,
    };
    init_logging(dev_mode);

    let result = match loaded {
        Ok((config, metadata)) => run(args.command, config, metadata).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("folio: {:#}", e);
            std::process::exit(1);
        }
    }
}
