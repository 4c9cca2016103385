use tracing::debug;

use crate::utils::Result;

/// Machine-identity lookup used to derive the secret key
#[cfg_attr(test, mockall::automock)]
pub trait MachineIdentity: Send + Sync {
    /// Stable identifier of this machine; empty when the platform has none
    fn machine_id(&self) -> Result<String>;
}

/// Reads the identifier the operating system keeps for this machine
#[derive(Debug, Default, Clone, Copy)]
pub struct OsMachineIdentity;

impl MachineIdentity for OsMachineIdentity {
    fn machine_id(&self) -> Result<String> {
        platform_machine_id()
    }
}

#[cfg(target_os = "linux")]
fn platform_machine_id() -> Result<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        match std::fs::read_to_string(path) {
            Ok(id) if !id.trim().is_empty() => return Ok(id.trim().to_string()),
            Ok(_) => debug!(path, "Machine id file is empty"),
            Err(e) => debug!(path, error = %e, "Machine id file not readable"),
        }
    }
    Ok(String::new())
}

#[cfg(target_os = "macos")]
fn platform_machine_id() -> Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ioreg_uuid(&stdout).unwrap_or_default())
}

#[cfg(windows)]
fn platform_machine_id() -> Result<String> {
    let output = std::process::Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
            "/reg:64",
        ])
        .output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_reg_query(&stdout).unwrap_or_default())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_machine_id() -> Result<String> {
    debug!("No machine identity source on this platform");
    Ok(String::new())
}

/// `"IOPlatformUUID" = "XXXXXXXX-..."`
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_ioreg_uuid(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('=').nth(1))
        .map(|value| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `    MachineGuid    REG_SZ    xxxxxxxx-...`
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_reg_query(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.trim_start().starts_with("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .filter(|value| *value != "REG_SZ")
        .map(str::to_string)
}
