//! The zonecfg operations.
//!
//! Each operation is a single zonecfg invocation. Mutating operations return
//! an [`OperationResult`], `info` returns a [`ParsedConfig`]. Invalid input
//! detected before zonecfg runs (an unknown method name, a missing selector)
//! yields a failed result rather than an error; [`Error`](crate::Error) is
//! reserved for failures of the host itself (spawning, file I/O).

use crate::config::DriverConfig;
use crate::error::Result;
use crate::fs::{Filesystem, HostFilesystem, ScriptFile, ZONEPATH_MODE};
use crate::host::{self, HostCapabilities};
use crate::info::{parse_info, ParsedConfig};
use crate::process::{CommandLine, CommandOutput, CommandRunner, SystemRunner};
use crate::script::{self, CommandScript, Properties, PropertyMethod, ResourceMethod};
use serde::Serialize;
use std::cell::OnceCell;
use std::path::Path;
use tracing::{info, warn};

/// zonecfg prefixes its diagnostics with this label.
pub const TOOL_PREFIX: &str = "zonecfg: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub status: bool,
    /// Absent, not empty, when zonecfg had nothing to say.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationResult {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
        }
    }

    /// stdout on success, stderr on failure, without the `zonecfg: ` label.
    pub fn from_output(out: &CommandOutput) -> Self {
        let status = out.success();
        let text = if status { &out.stdout } else { &out.stderr };
        let message = text.replace(TOOL_PREFIX, "").trim_end().to_string();
        Self {
            status,
            message: if message.is_empty() { None } else { Some(message) },
        }
    }
}

/// A request for one of the driver operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Create {
        zone: String,
        brand: String,
        zonepath: String,
        force: bool,
    },
    CreateFromTemplate {
        zone: String,
        template: String,
    },
    Delete {
        zone: String,
    },
    Export {
        zone: String,
        path: Option<String>,
    },
    Import {
        zone: String,
        path: String,
    },
    SetProperty {
        zone: String,
        key: String,
        value: String,
    },
    ClearProperty {
        zone: String,
        key: String,
    },
    AddResource {
        zone: String,
        resource_type: String,
        properties: Properties,
    },
    UpdateResource {
        zone: String,
        resource_type: String,
        selector: String,
        properties: Properties,
    },
    RemoveResource {
        zone: String,
        resource_type: String,
        key: String,
        value: String,
    },
    Info {
        zone: String,
        show_all: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Status(OperationResult),
    Config(ParsedConfig),
}

impl Outcome {
    pub fn success(&self) -> bool {
        match self {
            Outcome::Status(res) => res.status,
            Outcome::Config(_) => true,
        }
    }
}

pub struct Zonecfg<R = SystemRunner, F = HostFilesystem> {
    runner: R,
    fs: F,
    config: DriverConfig,
    host: OnceCell<HostCapabilities>,
}

impl Zonecfg {
    /// A driver acting on the local host.
    pub fn system(config: DriverConfig) -> Self {
        Self::new(SystemRunner, HostFilesystem, config)
    }
}

impl<R: CommandRunner, F: Filesystem> Zonecfg<R, F> {
    pub fn new(runner: R, fs: F, config: DriverConfig) -> Self {
        Self {
            runner,
            fs,
            config,
            host: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    /// Probed once per driver.
    pub fn host_capabilities(&self) -> HostCapabilities {
        *self
            .host
            .get_or_init(|| host::probe(&self.runner, &self.config))
    }

    pub fn is_supported_host(&self) -> bool {
        self.host_capabilities().supported()
    }

    pub fn execute(&self, request: &OperationRequest) -> Result<Outcome> {
        let res = match request {
            OperationRequest::Create {
                zone,
                brand,
                zonepath,
                force,
            } => self.create(zone, brand, zonepath, *force)?,
            OperationRequest::CreateFromTemplate { zone, template } => {
                self.create_from_template(zone, template)?
            }
            OperationRequest::Delete { zone } => self.delete(zone)?,
            OperationRequest::Export { zone, path } => self.export(zone, path.as_deref())?,
            OperationRequest::Import { zone, path } => self.import(zone, path)?,
            OperationRequest::SetProperty { zone, key, value } => {
                self.set_property(zone, key, value)?
            }
            OperationRequest::ClearProperty { zone, key } => self.clear_property(zone, key)?,
            OperationRequest::AddResource {
                zone,
                resource_type,
                properties,
            } => self.add_resource(zone, resource_type, properties)?,
            OperationRequest::UpdateResource {
                zone,
                resource_type,
                selector,
                properties,
            } => self.update_resource(zone, resource_type, selector, properties)?,
            OperationRequest::RemoveResource {
                zone,
                resource_type,
                key,
                value,
            } => self.remove_resource(zone, resource_type, key, value)?,
            OperationRequest::Info { zone, show_all } => {
                return Ok(Outcome::Config(self.info(zone, *show_all)?));
            }
        };
        Ok(Outcome::Status(res))
    }

    /// Create an in-memory configuration. The zonepath is created with mode
    /// 0700 when missing.
    pub fn create(
        &self,
        zone: &str,
        brand: &str,
        zonepath: &str,
        force: bool,
    ) -> Result<OperationResult> {
        info!(
            target: "zonecfg",
            zone = %zone,
            brand = %brand,
            zonepath = %zonepath,
            force,
            "creating zone configuration"
        );
        let script = script::create(brand, zonepath, force);
        if let Err(e) = script.check() {
            return Ok(rejected(zone, e));
        }
        let file = ScriptFile::create(&self.fs, &self.config.script_dir, &script)?;

        let zonepath = Path::new(zonepath);
        if !self.fs.directory_exists(zonepath) {
            self.fs.make_directory(zonepath, ZONEPATH_MODE)?;
        }

        self.run(&self.zonecfg(zone).arg("-f").arg(file.path().to_string_lossy()))
    }

    /// Create a configuration from a template, overwriting any existing one.
    pub fn create_from_template(&self, zone: &str, template: &str) -> Result<OperationResult> {
        info!(
            target: "zonecfg",
            zone = %zone,
            template = %template,
            "creating zone configuration from template"
        );
        self.run(&self.zonecfg(zone).args(["create", "-t", template, "-F"]))
    }

    /// Delete the configuration from memory and stable storage.
    pub fn delete(&self, zone: &str) -> Result<OperationResult> {
        info!(target: "zonecfg", zone = %zone, "deleting zone configuration");
        self.run(&self.zonecfg(zone).args(["delete", "-F"]))
    }

    /// Export the configuration, to stdout (the message) or to `path`.
    pub fn export(&self, zone: &str, path: Option<&str>) -> Result<OperationResult> {
        info!(target: "zonecfg", zone = %zone, "exporting zone configuration");
        let mut cmd = self.zonecfg(zone).arg("export");
        if let Some(path) = path {
            cmd = cmd.args(["-f", path]);
        }
        self.run(&cmd)
    }

    /// Run a command file, typically one written by `export`.
    pub fn import(&self, zone: &str, path: &str) -> Result<OperationResult> {
        info!(target: "zonecfg", zone = %zone, path = %path, "importing zone configuration");
        self.run(&self.zonecfg(zone).args(["-f", path]))
    }

    pub fn set_property(&self, zone: &str, key: &str, value: &str) -> Result<OperationResult> {
        self.property("set", zone, key, Some(value))
    }

    pub fn clear_property(&self, zone: &str, key: &str) -> Result<OperationResult> {
        self.property("clear", zone, key, None)
    }

    /// Set or clear a top-level property; `method` is `set` or `clear`.
    pub fn property(
        &self,
        method: &str,
        zone: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<OperationResult> {
        let method = match PropertyMethod::parse(method) {
            Ok(method) => method,
            Err(e) => return Ok(rejected(zone, e)),
        };
        info!(target: "zonecfg", zone = %zone, key = %key, %method, "updating property");
        self.run_script(zone, &script::property(method, key, value))
    }

    pub fn add_resource(
        &self,
        zone: &str,
        resource_type: &str,
        properties: &Properties,
    ) -> Result<OperationResult> {
        self.resource("add", zone, resource_type, None, properties)
    }

    /// Update the resource whose `selector` property matches the value
    /// given for it in `properties`.
    pub fn update_resource(
        &self,
        zone: &str,
        resource_type: &str,
        selector: &str,
        properties: &Properties,
    ) -> Result<OperationResult> {
        self.resource("update", zone, resource_type, Some(selector), properties)
    }

    /// Add or update a resource; `method` is `add` or `update`.
    pub fn resource(
        &self,
        method: &str,
        zone: &str,
        resource_type: &str,
        selector: Option<&str>,
        properties: &Properties,
    ) -> Result<OperationResult> {
        let script = ResourceMethod::parse(method)
            .and_then(|method| script::resource(method, resource_type, selector, properties));
        match script {
            Ok(script) => {
                info!(
                    target: "zonecfg",
                    zone = %zone,
                    resource = %resource_type,
                    %method,
                    "updating resource"
                );
                self.run_script(zone, &script)
            }
            Err(e) => Ok(rejected(zone, e)),
        }
    }

    pub fn remove_resource(
        &self,
        zone: &str,
        resource_type: &str,
        key: &str,
        value: &str,
    ) -> Result<OperationResult> {
        info!(
            target: "zonecfg",
            zone = %zone,
            resource = %resource_type,
            key = %key,
            value = %value,
            "removing resource"
        );
        self.run_script(zone, &script::remove_resource(resource_type, key, value))
    }

    /// Read the configuration from memory. A zonecfg failure (e.g. an unknown
    /// zone) gives an empty configuration.
    pub fn info(&self, zone: &str, show_all: bool) -> Result<ParsedConfig> {
        let out = self.runner.run(&self.zonecfg(zone).arg("info"))?;
        if !out.success() {
            let reason = out.stderr.replace(TOOL_PREFIX, "");
            warn!(target: "zonecfg", zone = %zone, "info failed: {}", reason.trim_end());
            return Ok(ParsedConfig::default());
        }
        Ok(parse_info(&out.stdout, show_all))
    }

    fn zonecfg(&self, zone: &str) -> CommandLine {
        CommandLine::new(self.config.zonecfg_bin.as_str()).args(["-z", zone])
    }

    fn run_script(&self, zone: &str, script: &CommandScript) -> Result<OperationResult> {
        if let Err(e) = script.check() {
            return Ok(rejected(zone, e));
        }
        let file = ScriptFile::create(&self.fs, &self.config.script_dir, script)?;
        self.run(&self.zonecfg(zone).arg("-f").arg(file.path().to_string_lossy()))
    }

    fn run(&self, cmd: &CommandLine) -> Result<OperationResult> {
        let res = OperationResult::from_output(&self.runner.run(cmd)?);
        if !res.status {
            let reason = res.message.as_deref().unwrap_or_default();
            warn!(target: "zonecfg", "{} failed: {}", cmd, reason);
        }
        Ok(res)
    }
}

fn rejected(zone: &str, e: script::ScriptError) -> OperationResult {
    warn!(target: "zonecfg", zone = %zone, "rejected before running zonecfg: {}", e);
    OperationResult::failed(e.to_string())
}
