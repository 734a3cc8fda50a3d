//! Configuration of the IGD client.
//!
//! The defaults live in an embedded YAML document. A caller can merge a
//! partial YAML document over them ([`IgdConfig::from_yaml_str`],
//! [`IgdConfig::load`]) and override single keys from the environment with
//! `PMOIGD_CONFIG__<SECTION>__<KEY>=<value>` ([`IgdConfig::from_env`]).
//!
//! ```no_run
//! use pmoigd::IgdConfig;
//!
//! let config = IgdConfig::from_yaml_str("ssdp:\n  mx: 2\n")?;
//! assert_eq!(config.ssdp.mx, 2);
//! # Ok::<(), pmoigd::IgdError>(())
//! ```

use std::{env, fs, net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::errors::IgdError;
use crate::resolver::DEFAULT_MAX_DEPTH;

const DEFAULT_CONFIG: &str = include_str!("pmoigd.yaml");

const ENV_PREFIX: &str = "PMOIGD_CONFIG__";

const DEFAULT_SEARCH_TARGET: &str = "ssdp:all";
const DEFAULT_MX: u32 = 5;
const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;
const DEFAULT_USER_AGENT: &str = "PMOMusic/1.0 UPnP/1.1 pmoigd/0.1";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IgdConfig {
    pub ssdp: SsdpConfig,
    pub http: HttpConfig,
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsdpConfig {
    /// Destination of the M-SEARCH probe.
    pub multicast_addr: SocketAddr,
    pub search_target: String,
    /// Search window announced to devices (MX header), in seconds.
    pub mx: u32,
    /// Rolling per-read deadline of the collection loop.
    pub read_timeout_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Deepest device level visited, the root device being level 0.
    /// `0` searches the root device's own services only.
    pub max_depth: usize,
}

impl Default for SsdpConfig {
    fn default() -> Self {
        Self {
            multicast_addr: SocketAddr::from(([239, 255, 255, 250], 1900)),
            search_target: DEFAULT_SEARCH_TARGET.to_string(),
            mx: DEFAULT_MX,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SsdpConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl IgdConfig {
    /// Merges a (possibly partial) YAML document over the embedded defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, IgdError> {
        let mut value = default_value()?;
        let external: Value = serde_yaml::from_str(yaml).map_err(config_error)?;
        if !external.is_null() {
            merge_yaml(&mut value, &lower_keys(external));
        }
        Self::from_value(value)
    }

    /// Reads a YAML file and merges it over the embedded defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IgdError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            IgdError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(config_file = %path.display(), "Loaded IGD config file");
        Self::from_yaml_str(&data)
    }

    /// Embedded defaults with `PMOIGD_CONFIG__...` environment overrides applied.
    pub fn from_env() -> Result<Self, IgdError> {
        let mut value = default_value()?;
        apply_env_overrides(&mut value, env::vars());
        Self::from_value(value)
    }

    pub fn validate(&self) -> Result<(), IgdError> {
        if self.ssdp.mx == 0 {
            return Err(IgdError::Config("ssdp.mx must be at least 1".to_string()));
        }
        if self.ssdp.read_timeout_ms == 0 {
            return Err(IgdError::Config(
                "ssdp.read_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.ssdp.search_target.trim().is_empty() {
            return Err(IgdError::Config(
                "ssdp.search_target must not be empty".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(IgdError::Config(
                "http.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    fn from_value(value: Value) -> Result<Self, IgdError> {
        let config: IgdConfig = serde_yaml::from_value(value).map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }
}

fn config_error(err: serde_yaml::Error) -> IgdError {
    IgdError::Config(err.to_string())
}

fn default_value() -> Result<Value, IgdError> {
    serde_yaml::from_str(DEFAULT_CONFIG).map_err(config_error)
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = path
            .split("__")
            .map(|part| part.to_lowercase())
            .collect::<Vec<_>>();
        debug!(key = %key, "Applying IGD config override");
        set_value(config, &key_path, convert_env_value(&value));
    }
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

fn set_value(config: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = config;
    for part in parents {
        current = match current {
            Value::Mapping(map) => map
                .entry(Value::String(part.clone()))
                .or_insert_with(|| Value::Mapping(Mapping::new())),
            _ => return,
        };
    }

    if let Value::Mapping(map) = current {
        map.insert(Value::String(last.clone()), value);
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(k, lower_keys(v));
            }
            Value::Mapping(new_map)
        }
        _ => value,
    }
}

/// Recursively merges `external` into `default`; scalars and sequences replace.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}
