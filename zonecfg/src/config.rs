use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DEFAULT_ZONECFG_BIN: &str = "/usr/sbin/zonecfg";
pub const DEFAULT_ZONENAME_BIN: &str = "/usr/bin/zonename";
pub const DEFAULT_RELEASE_FILE: &str = "/etc/release";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// zonecfg binary to drive
    pub zonecfg_bin: String,
    /// binary printing the name of the current zone
    pub zonename_bin: String,
    /// where generated command files are written
    pub script_dir: PathBuf,
    /// used to detect the OS distribution
    pub release_file: PathBuf,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            zonecfg_bin: DEFAULT_ZONECFG_BIN.to_string(),
            zonename_bin: DEFAULT_ZONENAME_BIN.to_string(),
            script_dir: std::env::temp_dir(),
            release_file: PathBuf::from(DEFAULT_RELEASE_FILE),
        }
    }
}

impl DriverConfig {
    /// Layer the defaults, `/etc/zonecfg-driver.*`, an optional explicit file
    /// and `ZONECFG_DRIVER_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = Config::builder()
            .set_default("zonecfg_bin", defaults.zonecfg_bin)?
            .set_default("zonename_bin", defaults.zonename_bin)?
            .set_default(
                "script_dir",
                defaults.script_dir.to_string_lossy().into_owned(),
            )?
            .set_default(
                "release_file",
                defaults.release_file.to_string_lossy().into_owned(),
            )?
            // system wide defaults are optional so the driver works unconfigured
            .add_source(File::with_name("/etc/zonecfg-driver").required(false));

        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }

        let cfg = builder
            .add_source(Environment::with_prefix("ZONECFG_DRIVER"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}
