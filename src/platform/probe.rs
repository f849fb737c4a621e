//! Single-shot device state queries used when assembling a record

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::CollectorConfig;
use crate::models::{Location, RingerProfile};

/// Stateless queries against the host platform
///
/// Every method answers from the current device state and never fails;
/// unavailable information maps to a neutral value.
pub trait DeviceProbe: Send + Sync {
    fn location(&self) -> Option<Location>;
    fn ringer_profile(&self) -> RingerProfile;
    fn screen_on(&self) -> bool;
    fn running_app_count(&self) -> usize;
    fn headset_connected(&self) -> bool;
    fn in_call(&self) -> bool;
    /// BSSID of the connected access point, empty when not connected
    fn ap_mac(&self) -> String;
}

/// Probe backed by sysfs, procfs and `iw`
///
/// Ringer mode, call state and the position fix have no kernel interface
/// and come from configuration.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    root: PathBuf,
    wifi_iface: String,
    ringer_profile: RingerProfile,
    in_call: bool,
    location: Option<Location>,
}

impl SystemProbe {
    pub fn new(config: &CollectorConfig) -> Self {
        SystemProbe {
            root: PathBuf::from("/"),
            wifi_iface: config.wifi_iface.clone(),
            ringer_profile: config.ringer_profile,
            in_call: config.in_call,
            location: config.location,
        }
    }

    /// Read sysfs and procfs below `root` instead of `/`
    #[cfg(test)]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

impl DeviceProbe for SystemProbe {
    fn location(&self) -> Option<Location> {
        self.location
    }

    fn ringer_profile(&self) -> RingerProfile {
        self.ringer_profile
    }

    fn screen_on(&self) -> bool {
        screen_on_from_backlight(&self.path("sys/class/backlight"))
    }

    fn running_app_count(&self) -> usize {
        count_processes(&self.path("proc"))
    }

    fn headset_connected(&self) -> bool {
        fs::read_to_string(self.path("sys/class/switch/h2w/state"))
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
            .map(|state| state != 0)
            .unwrap_or(false)
    }

    fn in_call(&self) -> bool {
        self.in_call
    }

    fn ap_mac(&self) -> String {
        match Command::new("iw")
            .args(["dev", &self.wifi_iface, "link"])
            .output()
        {
            Ok(output) if output.status.success() => {
                parse_iw_link(&String::from_utf8_lossy(&output.stdout)).unwrap_or_default()
            }
            Ok(output) => {
                debug!("iw exited with {} for {}", output.status, self.wifi_iface);
                String::new()
            }
            Err(e) => {
                debug!("Failed to run iw: {}", e);
                String::new()
            }
        }
    }
}

/// Screen is on if any backlight reports `bl_power` 0 (FB_BLANK_UNBLANK).
/// Hosts without a backlight are treated as on.
fn screen_on_from_backlight(dir: &Path) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return true,
    };

    let mut seen = false;
    for entry in entries.flatten() {
        let power = match fs::read_to_string(entry.path().join("bl_power")) {
            Ok(power) => power,
            Err(_) => continue,
        };
        seen = true;
        if power.trim() == "0" {
            return true;
        }
    }

    !seen
}

fn count_processes(proc_dir: &Path) -> usize {
    match fs::read_dir(proc_dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|name| !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
                    .unwrap_or(false)
            })
            .count(),
        Err(_) => 0,
    }
}

/// Extract the BSSID from `iw dev <iface> link` output
pub fn parse_iw_link(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Connected to ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(|mac| mac.to_string())
    })
}
