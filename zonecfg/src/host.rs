//! Detection of hosts that can run the driver: the global zone of an
//! illumos or Solaris 10 derived system with zonecfg installed.

use crate::config::DriverConfig;
use crate::process::{CommandLine, CommandRunner};
use serde::Serialize;
use std::fs;
use tracing::debug;

/// Distributions whose zonecfg speaks the grammar this crate generates.
pub const SUPPORTED_DISTRIBUTIONS: &[&str] = &[
    "solaris",
    "opensolaris",
    "smartos",
    "omnios",
    "openindiana",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostCapabilities {
    pub sunos: bool,
    pub distribution: bool,
    pub global_zone: bool,
    pub zonecfg_present: bool,
}

impl HostCapabilities {
    pub fn supported(&self) -> bool {
        self.sunos && self.distribution && self.global_zone && self.zonecfg_present
    }
}

pub fn probe<R: CommandRunner + ?Sized>(runner: &R, config: &DriverConfig) -> HostCapabilities {
    let sunos = kernel_is_sunos();
    let caps = HostCapabilities {
        sunos,
        distribution: fs::read_to_string(&config.release_file)
            .map(|text| is_supported_release(&text))
            .unwrap_or(false),
        // zonename does not exist off SunOS
        global_zone: sunos && is_global_zone(runner, &config.zonename_bin),
        zonecfg_present: which::which(&config.zonecfg_bin).is_ok(),
    };
    debug!(target: "zonecfg", "host capabilities: {:?}", caps);
    caps
}

fn kernel_is_sunos() -> bool {
    nix::sys::utsname::uname()
        .map(|u| u.sysname() == "SunOS")
        .unwrap_or(false)
}

/// True when `zonename` reports that we run in the global zone.
pub fn is_global_zone<R: CommandRunner + ?Sized>(runner: &R, zonename_bin: &str) -> bool {
    match runner.run(&CommandLine::new(zonename_bin)) {
        Ok(out) => out.success() && out.stdout.trim() == "global",
        Err(e) => {
            debug!(target: "zonecfg", "zonename failed: {}", e);
            false
        }
    }
}

/// Check the first line of `/etc/release`. Oracle Solaris 11 ships an
/// incompatible zonecfg and is rejected.
pub fn is_supported_release(release: &str) -> bool {
    let first = release
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_lowercase();
    if first.contains("solaris 11") {
        return false;
    }
    SUPPORTED_DISTRIBUTIONS.iter().any(|d| first.contains(d))
}
