//! Datacenter configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Parses config value string, which consists of two parts - name and options.
/// Example: Random[seed=42] parts are name Random and options string "seed=42".
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.split_once('[') {
        Some((l, r)) => (l.trim().to_string(), Some(r.to_string().replace(']', ""))),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string from config value, returns map with option names and values.
pub fn parse_options(options_str: &str) -> HashMap<String, String> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',') {
        if let Some((name, value)) = option_str.split_once('=') {
            options.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    options
}

/// Parses a numeric option, panics if the value is malformed.
pub(crate) fn parse_option_value<T: std::str::FromStr>(
    options: &HashMap<String, String>,
    name: &str,
    config_str: &str,
) -> Option<T> {
    options.get(name).map(|value| {
        value
            .parse::<T>()
            .unwrap_or_else(|_| panic!("Can't parse option {} in {}", name, config_str))
    })
}

/// Holds raw datacenter config parsed from YAML.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawDatacenterConfig {
    pub hosts: Option<Vec<HostConfig>>,
    pub allocation_policy: Option<String>,
    pub host_count_for_parallel_search: Option<usize>,
    pub parallel_search_workers: Option<usize>,
}

/// Holds configuration of a single physical host or a set of identical hosts.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    /// Host name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Host name prefix.
    /// Full name is produced by appending host instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Number of PEs.
    pub pes: u32,
    /// MIPS of each PE.
    pub pe_mips: f64,
    /// RAM capacity in MB.
    pub ram: u64,
    /// Bandwidth capacity in Mbps.
    pub bw: u64,
    /// Storage capacity in MB.
    pub storage: u64,
    /// VM scheduler name, TimeShared if absent.
    pub vm_scheduler: Option<String>,
    /// Number of such hosts.
    pub count: Option<u32>,
}

/// Represents datacenter configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct DatacenterConfig {
    /// Configurations of physical hosts.
    pub hosts: Vec<HostConfig>,
    /// VM placement algorithm used by allocation policy.
    pub allocation_policy: String,
    /// Minimal number of hosts starting from which suitable hosts are searched in parallel.
    pub host_count_for_parallel_search: usize,
    /// Number of threads used for parallel search.
    pub parallel_search_workers: usize,
}

impl Default for DatacenterConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            allocation_policy: "FirstFit".to_string(),
            host_count_for_parallel_search: 20_000,
            parallel_search_workers: 4,
        }
    }
}

impl DatacenterConfig {
    /// Creates datacenter config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Self {
        let yaml = std::fs::read_to_string(file_name).unwrap_or_else(|_| panic!("Can't read file {}", file_name));
        let raw: RawDatacenterConfig =
            serde_yaml::from_str(&yaml).unwrap_or_else(|_| panic!("Can't parse YAML from file {}", file_name));
        Self::from_raw(raw)
    }

    /// Creates datacenter config from YAML string.
    pub fn from_yaml(yaml: &str) -> Self {
        let raw: RawDatacenterConfig = serde_yaml::from_str(yaml).unwrap_or_else(|e| panic!("Can't parse YAML: {}", e));
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawDatacenterConfig) -> Self {
        let default = Self::default();
        Self {
            hosts: raw.hosts.unwrap_or_default(),
            allocation_policy: raw.allocation_policy.unwrap_or(default.allocation_policy),
            host_count_for_parallel_search: raw
                .host_count_for_parallel_search
                .unwrap_or(default.host_count_for_parallel_search),
            parallel_search_workers: raw.parallel_search_workers.unwrap_or(default.parallel_search_workers),
        }
    }
}
