//! Host metadata attached to each registration.
//!
//! Collection is best-effort: a source that fails is logged and left out of
//! the map, it never prevents the registration itself.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::Path;
use sysinfo::System;
use tracing::{debug, warn};

pub const HOSTNAME_KEY: &str = "hostname";
pub const GPUS_KEY: &str = "gpus";
pub const MEMORY_KEY: &str = "mem";

const NVIDIA_GPUS_DIR: &str = "/proc/driver/nvidia/gpus";

/// Collects host name, accelerator inventory and total memory for this machine.
pub fn collect() -> BTreeMap<String, String> {
    assemble(hostname(), gpu_devices(), total_memory())
}

/// Builds the metadata map from whatever sources succeeded.
pub fn assemble<E1, E2, E3>(
    hostname: Result<String, E1>,
    gpus: Result<Vec<String>, E2>,
    memory: Result<u64, E3>,
) -> BTreeMap<String, String>
where
    E1: Display,
    E2: Display,
    E3: Display,
{
    let mut meta = BTreeMap::new();

    match hostname {
        Ok(name) => {
            meta.insert(HOSTNAME_KEY.to_string(), name);
        }
        Err(e) => warn!("Failed to read host name, skipping: {}", e),
    }

    match gpus {
        Ok(gpus) if gpus.is_empty() => debug!("No GPU devices found"),
        Ok(gpus) => {
            meta.insert(GPUS_KEY.to_string(), gpus.join(","));
        }
        Err(e) => warn!("Failed to enumerate GPU devices, skipping: {}", e),
    }

    match memory {
        Ok(total) => {
            meta.insert(MEMORY_KEY.to_string(), human_size(total as f64));
        }
        Err(e) => warn!("Failed to read total memory, skipping: {}", e),
    }

    meta
}

pub fn hostname() -> io::Result<String> {
    let name = hostname::get()?;
    Ok(name.to_string_lossy().to_string())
}

/// Lists GPU model names reported by the NVIDIA driver. No driver means no GPUs.
pub fn gpu_devices() -> io::Result<Vec<String>> {
    gpu_devices_in(Path::new(NVIDIA_GPUS_DIR))
}

fn gpu_devices_in(dir: &Path) -> io::Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut devices = Vec::new();
    for entry in entries {
        let info = fs::read_to_string(entry?.path().join("information"))?;
        if let Some(model) = info
            .lines()
            .find_map(|line| line.strip_prefix("Model:"))
            .map(str::trim)
        {
            devices.push(model.to_string());
        }
    }
    devices.sort();
    Ok(devices)
}

pub fn total_memory() -> Result<u64, String> {
    let mut sys = System::new();
    sys.refresh_memory();
    match sys.total_memory() {
        0 => Err("total memory reported as zero".to_string()),
        total => Ok(total),
    }
}

/// Decimal units with four significant digits, e.g. `16.78GB`.
pub fn human_size(size: f64) -> String {
    const UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

    let mut size = size;
    let mut unit = 0;
    while size >= 1000.0 && unit < UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }
    format!("{}{}", significant(size, 4), UNITS[unit])
}

fn significant(value: f64, digits: i32) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs().log10().floor() as i32 + 1;
    let decimals = (digits - magnitude).max(0) as usize;
    let formatted = format!("{:.*}", decimals, value);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_uses_decimal_units() {
        assert_eq!(human_size(0.0), "0B");
        assert_eq!(human_size(999.0), "999B");
        assert_eq!(human_size(1000.0), "1kB");
        assert_eq!(human_size(16_777_216_000.0), "16.78GB");
        assert_eq!(human_size(1_500_000.0), "1.5MB");
    }

    #[test]
    fn assemble_keeps_successful_sources() {
        let meta = assemble::<String, String, String>(
            Ok("node-1".to_string()),
            Ok(vec!["GeForce RTX 3090".to_string(), "Tesla T4".to_string()]),
            Ok(2_000_000_000),
        );
        assert_eq!(meta.get(HOSTNAME_KEY).unwrap(), "node-1");
        assert_eq!(meta.get(GPUS_KEY).unwrap(), "GeForce RTX 3090,Tesla T4");
        assert_eq!(meta.get(MEMORY_KEY).unwrap(), "2GB");
    }

    #[test]
    fn assemble_skips_failed_sources() {
        let meta = assemble(
            Err("no hostname"),
            Err("driver busy"),
            Ok::<u64, &str>(8_000_000_000),
        );
        assert!(!meta.contains_key(HOSTNAME_KEY));
        assert!(!meta.contains_key(GPUS_KEY));
        assert_eq!(meta.get(MEMORY_KEY).unwrap(), "8GB");
    }

    #[test]
    fn assemble_omits_empty_gpu_list() {
        let meta = assemble::<&str, &str, &str>(Ok("node-1".into()), Ok(vec![]), Err("nope"));
        assert_eq!(meta.len(), 1);
        assert!(meta.contains_key(HOSTNAME_KEY));
    }

    #[test]
    fn collect_reads_this_host() {
        let meta = collect();
        assert_eq!(meta.get(HOSTNAME_KEY), Some(&hostname().unwrap()));
        let mem = meta.get(MEMORY_KEY).expect("total memory is readable on test hosts");
        assert!(mem.ends_with('B'), "unexpected memory size {}", mem);
        assert!(total_memory().unwrap() > 0);
    }

    #[test]
    fn missing_driver_dir_means_no_gpus() {
        let dir = std::env::temp_dir().join("service-registry-no-such-gpu-dir");
        assert!(gpu_devices_in(&dir).unwrap().is_empty());
    }

    #[test]
    fn reads_gpu_models_from_driver_dir() {
        let root = std::env::temp_dir().join(format!("service-registry-gpus-{}", std::process::id()));
        let card = root.join("0000:01:00.0");
        fs::create_dir_all(&card).unwrap();
        fs::write(card.join("information"), "Model: \t Tesla T4\nIRQ: 42\n").unwrap();

        let devices = gpu_devices_in(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        assert_eq!(devices, vec!["Tesla T4".to_string()]);
    }
}
