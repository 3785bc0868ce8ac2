// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host identity from the platform's hardware UUID.

use std::process::Command;

use tracing::debug;
use trex_core::Identity;

/// Supplies this host's stable identity.
pub trait HardwareIdentityProvider: Send + Sync {
    fn identity(&self) -> anyhow::Result<Identity>;
}

/// Where the identity comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// `dmidecode -s system-uuid`
    LinuxDmi,
    /// `Win32_ComputerSystemProduct.UUID` via PowerShell.
    WindowsWmi,
    /// `IOPlatformUUID` from `ioreg`.
    MacIoreg,
    /// Configured override.
    Fixed(String),
}

impl IdentitySource {
    /// The hardware source for the OS this binary was built for.
    pub fn for_host() -> Self {
        if cfg!(target_os = "windows") {
            Self::WindowsWmi
        } else if cfg!(target_os = "macos") {
            Self::MacIoreg
        } else {
            Self::LinuxDmi
        }
    }

    /// `Fixed` if an override is configured, otherwise [`Self::for_host`].
    pub fn select(identity_override: Option<&str>) -> Self {
        match identity_override {
            Some(id) => Self::Fixed(id.to_owned()),
            None => Self::for_host(),
        }
    }

    fn raw(&self) -> anyhow::Result<String> {
        match self {
            Self::LinuxDmi => run_command("dmidecode", &["-s", "system-uuid"]),
            Self::WindowsWmi => run_command(
                "powershell",
                &[
                    "-NoProfile",
                    "-Command",
                    "(Get-CimInstance -Class Win32_ComputerSystemProduct).UUID",
                ],
            ),
            Self::MacIoreg => {
                let out = run_command("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
                parse_ioreg_uuid(&out)
                    .map(str::to_owned)
                    .ok_or_else(|| anyhow::anyhow!("IOPlatformUUID not found in ioreg output"))
            }
            Self::Fixed(id) => Ok(id.clone()),
        }
    }
}

impl HardwareIdentityProvider for IdentitySource {
    fn identity(&self) -> anyhow::Result<Identity> {
        let raw = self.raw()?;
        debug!(source = ?self, "resolved hardware identity");
        Identity::normalize(&raw).ok_or_else(|| anyhow::anyhow!("{self:?} returned an empty identity"))
    }
}

fn run_command(program: &str, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| anyhow::anyhow!("failed to run {program}: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract the value of `"IOPlatformUUID" = "..."` from `ioreg` output.
pub fn parse_ioreg_uuid(output: &str) -> Option<&str> {
    output.lines().find(|line| line.contains("\"IOPlatformUUID\"")).and_then(|line| {
        let (_, value) = line.split_once('=')?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then_some(value)
    })
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
