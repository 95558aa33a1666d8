//! Hardware fingerprinting for license binding.
//!
//! Produces a stable digest of a machine's identifying attributes, used to
//! lock a license to one device. The digest is a pure function of the
//! supplied fields: missing fields are treated as empty strings, so the
//! same machine reproduces the same digest regardless of which optional
//! identifiers were available to the caller.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identifying attributes of a machine, as reported by the client.
///
/// Every field is optional; installers report whatever they can query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareInfo {
    /// CPU identifier.
    pub cpu_id: Option<String>,
    /// Motherboard serial number.
    pub motherboard_id: Option<String>,
    /// Primary disk serial number.
    pub disk_id: Option<String>,
    /// MAC address of the primary network interface.
    pub mac_address: Option<String>,
    /// System UUID (SMBIOS or OS machine id).
    pub system_uuid: Option<String>,
}

impl HardwareInfo {
    /// Best-effort collection of this machine's identifiers.
    ///
    /// Only the OS machine id is queried here; the remaining fields are
    /// populated by installers that can read SMBIOS.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            system_uuid: machine_id(),
            ..Self::default()
        }
    }
}

/// A stable digest identifying one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareFingerprint(String);

impl HardwareFingerprint {
    /// Computes the fingerprint of the given hardware attributes.
    ///
    /// The fields are concatenated in a fixed order with a fixed separator
    /// and hashed; two machines differ as long as at least one reported
    /// field differs.
    #[must_use]
    pub fn compute(info: &HardwareInfo) -> Self {
        let fields = [
            info.cpu_id.as_deref().unwrap_or(""),
            info.motherboard_id.as_deref().unwrap_or(""),
            info.disk_id.as_deref().unwrap_or(""),
            info.mac_address.as_deref().unwrap_or(""),
            info.system_uuid.as_deref().unwrap_or(""),
        ];
        let combined = fields.join("|");

        let mut hasher = Sha256::new();
        hasher.update(combined.as_bytes());
        let hash = hasher.finalize();

        Self(BASE64.encode(&hash[..16]))
    }

    /// Returns the digest string as persisted on the license row.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HardwareFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reads the OS machine id, when the platform exposes one.
fn machine_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}
