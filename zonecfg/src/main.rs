use clap::{Parser, Subcommand};
use miette::{miette, IntoDiagnostic};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zonecfg::{DriverConfig, OperationRequest, Properties, Zonecfg};

/// Command line arguments for the zonecfg driver
#[derive(Parser, Debug)]
#[clap(author, version, about = "Configure illumos zones through zonecfg", long_about = None)]
struct Args {
    /// Configuration file layered over /etc/zonecfg-driver
    #[clap(short = 'c', long = "config")]
    config_file: Option<PathBuf>,

    /// Run even if this host is not a global zone with zonecfg installed
    #[clap(long)]
    skip_host_check: bool,

    /// Pretty print the JSON result
    #[clap(long)]
    pretty: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an in-memory configuration for a zone
    Create {
        zone: String,
        brand: String,
        zonepath: String,
        /// Overwrite an existing configuration
        #[clap(short = 'F', long)]
        force: bool,
    },
    /// Create a configuration from a template, overwriting any existing one
    CreateFromTemplate { zone: String, template: String },
    /// Delete a configuration from memory and stable storage
    Delete { zone: String },
    /// Export a configuration to stdout or a file
    Export {
        zone: String,
        #[clap(short = 'f', long)]
        path: Option<String>,
    },
    /// Import a configuration from a command file
    Import { zone: String, path: String },
    /// Set a top-level property
    SetProperty {
        zone: String,
        key: String,
        value: String,
    },
    /// Clear a top-level property
    ClearProperty { zone: String, key: String },
    /// Add a resource, properties given as key=value
    AddResource {
        zone: String,
        resource_type: String,
        #[clap(value_parser = parse_key_value)]
        properties: Vec<(String, String)>,
    },
    /// Update the resource whose SELECTOR property matches the given value
    UpdateResource {
        zone: String,
        resource_type: String,
        selector: String,
        #[clap(value_parser = parse_key_value)]
        properties: Vec<(String, String)>,
    },
    /// Remove resources matching key=value
    RemoveResource {
        zone: String,
        resource_type: String,
        key: String,
        value: String,
    },
    /// Print the configuration as JSON
    Info {
        zone: String,
        /// Include values calculated by zonecfg (capped-cpu, cpu-shares, ...)
        #[clap(short = 'a', long)]
        show_all: bool,
    },
    /// Print what was detected about this host
    HostCheck,
}

impl Commands {
    fn into_request(self) -> miette::Result<Option<OperationRequest>> {
        let request = match self {
            Commands::Create {
                zone,
                brand,
                zonepath,
                force,
            } => OperationRequest::Create {
                zone,
                brand,
                zonepath,
                force,
            },
            Commands::CreateFromTemplate { zone, template } => {
                OperationRequest::CreateFromTemplate { zone, template }
            }
            Commands::Delete { zone } => OperationRequest::Delete { zone },
            Commands::Export { zone, path } => OperationRequest::Export { zone, path },
            Commands::Import { zone, path } => OperationRequest::Import { zone, path },
            Commands::SetProperty { zone, key, value } => {
                OperationRequest::SetProperty { zone, key, value }
            }
            Commands::ClearProperty { zone, key } => OperationRequest::ClearProperty { zone, key },
            Commands::AddResource {
                zone,
                resource_type,
                properties,
            } => OperationRequest::AddResource {
                zone,
                resource_type,
                properties: collect_properties(properties)?,
            },
            Commands::UpdateResource {
                zone,
                resource_type,
                selector,
                properties,
            } => OperationRequest::UpdateResource {
                zone,
                resource_type,
                selector,
                properties: collect_properties(properties)?,
            },
            Commands::RemoveResource {
                zone,
                resource_type,
                key,
                value,
            } => OperationRequest::RemoveResource {
                zone,
                resource_type,
                key,
                value,
            },
            Commands::Info { zone, show_all } => OperationRequest::Info { zone, show_all },
            Commands::HostCheck => return Ok(None),
        };
        Ok(Some(request))
    }
}

/// Each key may be given once; zonecfg would only ever see the last value.
fn collect_properties(pairs: Vec<(String, String)>) -> miette::Result<Properties> {
    let mut properties = Properties::new();
    for (key, value) in pairs {
        if properties.contains_key(&key) {
            return Err(miette!("property {} given more than once", key));
        }
        properties.insert(key, value);
    }
    Ok(properties)
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {}", s))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> miette::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

fn main() -> miette::Result<()> {
    // stdout carries the JSON result, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = DriverConfig::load(args.config_file.as_deref())?;
    debug!("using configuration {:?}", cfg);
    let driver = Zonecfg::system(cfg);

    let Some(request) = args.command.into_request()? else {
        return print_json(&driver.host_capabilities(), args.pretty);
    };

    if !args.skip_host_check && !driver.is_supported_host() {
        return Err(miette!(
            "zonecfg can only be driven from the global zone of an illumos or Solaris 10 host"
        ));
    }

    let outcome = driver.execute(&request)?;
    print_json(&outcome, args.pretty)?;
    if !outcome.success() {
        std::process::exit(1);
    }
    Ok(())
}
