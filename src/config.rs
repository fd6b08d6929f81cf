//! Session configuration
//!
//! Settings are held as string-keyed properties with change listeners and
//! JSON persistence. [`EngineConfig`] is the validated, typed view the
//! session is built from.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::lib3270::display::ScreenSize;
use crate::lib3270::transfer::{DEFAULT_BINARY_BLOCK_SIZE, DEFAULT_TEXT_BLOCK_SIZE};

pub const KEY_HOST: &str = "connection.host";
pub const KEY_PORT: &str = "connection.port";
pub const KEY_TIMEOUT: &str = "connection.timeout";
pub const KEY_MODEL: &str = "terminal.model";
pub const KEY_LU_NAME: &str = "terminal.luName";
pub const KEY_TN3270E: &str = "tn3270e.enabled";
pub const KEY_TEXT_BLOCK_SIZE: &str = "transfer.textBlockSize";
pub const KEY_BINARY_BLOCK_SIZE: &str = "transfer.binaryBlockSize";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TN3270R_CONFIG";

/// Configuration change event
#[derive(Debug, Clone)]
pub struct ConfigChangeEvent {
    pub property_name: String,
    pub old_value: Option<ConfigValue>,
    pub new_value: Option<ConfigValue>,
}

pub trait ConfigChangeListener: Send + Sync {
    fn on_config_changed(&mut self, event: &ConfigChangeEvent);
}

/// Supported configuration value types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ConfigValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

/// Property store for one session
pub struct SessionConfig {
    properties: HashMap<String, ConfigValue>,
    listeners: Vec<Box<dyn ConfigChangeListener>>,
    session_name: String,
    config_resource: String,
}

impl SessionConfig {
    pub fn new(config_resource: String, session_name: String) -> Self {
        let mut config = Self {
            properties: HashMap::new(),
            listeners: Vec::new(),
            session_name,
            config_resource,
        };
        config.set_defaults();
        config
    }

    fn set_defaults(&mut self) {
        let defaults: [(&str, ConfigValue); 8] = [
            (KEY_HOST, "".into()),
            (KEY_PORT, 23i64.into()),
            (KEY_TIMEOUT, 30i64.into()),
            (KEY_MODEL, 2i64.into()),
            (KEY_LU_NAME, "".into()),
            (KEY_TN3270E, true.into()),
            (KEY_TEXT_BLOCK_SIZE, (DEFAULT_TEXT_BLOCK_SIZE as i64).into()),
            (KEY_BINARY_BLOCK_SIZE, (DEFAULT_BINARY_BLOCK_SIZE as i64).into()),
        ];
        for (key, value) in defaults {
            self.properties.insert(key.to_string(), value);
        }
    }

    pub fn get_string_property(&self, key: &str) -> Option<String> {
        self.properties.get(key).and_then(|v| v.as_string().map(|s| s.to_string()))
    }

    pub fn get_string_property_or(&self, key: &str, default: &str) -> String {
        self.get_string_property(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int_property(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(|v| v.as_integer())
    }

    pub fn get_int_property_or(&self, key: &str, default: i64) -> i64 {
        self.get_int_property(key).unwrap_or(default)
    }

    pub fn get_boolean_property(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_boolean())
    }

    pub fn get_boolean_property_or(&self, key: &str, default: bool) -> bool {
        self.get_boolean_property(key).unwrap_or(default)
    }

    /// Set a property and notify listeners
    pub fn set_property<T: Into<ConfigValue>>(&mut self, key: &str, value: T) {
        let new_value = value.into();
        let old_value = self.properties.insert(key.to_string(), new_value.clone());
        self.fire_change_event(&ConfigChangeEvent {
            property_name: key.to_string(),
            old_value,
            new_value: Some(new_value),
        });
    }

    /// Remove a property and notify listeners
    pub fn remove_property(&mut self, key: &str) -> Option<ConfigValue> {
        let old_value = self.properties.remove(key)?;
        self.fire_change_event(&ConfigChangeEvent {
            property_name: key.to_string(),
            old_value: Some(old_value.clone()),
            new_value: None,
        });
        Some(old_value)
    }

    pub fn add_listener(&mut self, listener: Box<dyn ConfigChangeListener>) {
        self.listeners.push(listener);
    }

    fn fire_change_event(&mut self, event: &ConfigChangeEvent) {
        for listener in &mut self.listeners {
            listener.on_config_changed(event);
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn get_session_name(&self) -> &str {
        &self.session_name
    }

    pub fn get_config_resource(&self) -> &str {
        &self.config_resource
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.properties)
    }

    /// Merge properties from JSON, notifying listeners of each one
    pub fn from_json(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let loaded: HashMap<String, ConfigValue> = serde_json::from_str(json)?;
        for (key, value) in loaded {
            self.set_property(&key, value);
        }
        Ok(())
    }
}

pub type SharedSessionConfig = Arc<Mutex<SessionConfig>>;

pub fn create_shared_config(config_resource: String, session_name: String) -> SharedSessionConfig {
    Arc::new(Mutex::new(SessionConfig::new(config_resource, session_name)))
}

/// Default config file location
///
/// `TN3270R_CONFIG` wins; otherwise `<config dir>/tn3270r/session.json`,
/// falling back to `./session.json` where no config dir is known.
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    match dirs::config_dir() {
        Some(base) => base.join("tn3270r").join("session.json"),
        None => PathBuf::from("session.json"),
    }
}

/// Load the configuration at `path`, or defaults if it does not exist
///
/// A file that exists but cannot be parsed is an error.
pub fn load_config(path: PathBuf, session_name: String) -> ConfigResult<SessionConfig> {
    let mut config = SessionConfig::new(path.to_string_lossy().into_owned(), session_name);
    if !path.exists() {
        debug!("no config file at {}, using defaults", path.display());
        return Ok(config);
    }
    let json = fs::read_to_string(&path).map_err(|e| file_error(&path, e))?;
    config.from_json(&json).map_err(|e| file_error(&path, e))?;
    Ok(config)
}

/// Load the shared configuration from [`default_config_path`]
///
/// Unreadable files are logged and defaults are used.
pub fn load_shared_config(session_name: String) -> SharedSessionConfig {
    let path = default_config_path();
    let config = match load_config(path.clone(), session_name.clone()) {
        Ok(config) => config,
        Err(e) => {
            warn!("ignoring config file: {e}");
            SessionConfig::new(path.to_string_lossy().into_owned(), session_name)
        }
    };
    Arc::new(Mutex::new(config))
}

/// Write the configuration to its `config_resource` path
pub fn save_config(config: &SessionConfig) -> ConfigResult<()> {
    let path = PathBuf::from(config.get_config_resource());
    let json = config.to_json().map_err(|e| file_error(&path, e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| file_error(parent, e))?;
    }
    fs::write(&path, json).map_err(|e| file_error(&path, e))
}

fn file_error(path: &Path, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::FileError {
        path: path.display().to_string(),
        error: error.to_string(),
    }
}

pub fn save_shared_config(shared: &SharedSessionConfig) -> ConfigResult<()> {
    let config = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    save_config(&config)
}

/// Validated settings the session is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Alternate screen size; the primary size is always 24x80
    pub screen_size: ScreenSize,
    pub lu_name: Option<String>,
    pub tn3270e_enabled: bool,
    pub text_block_size: usize,
    pub binary_block_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 23,
            connect_timeout: Duration::from_secs(30),
            screen_size: ScreenSize::Model2,
            lu_name: None,
            tn3270e_enabled: true,
            text_block_size: DEFAULT_TEXT_BLOCK_SIZE,
            binary_block_size: DEFAULT_BINARY_BLOCK_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn from_session_config(config: &SessionConfig) -> ConfigResult<Self> {
        let defaults = EngineConfig::default();

        let port = config.get_int_property_or(KEY_PORT, defaults.port as i64);
        let port = u16::try_from(port)
            .ok()
            .filter(|&p| p != 0)
            .ok_or_else(|| invalid(KEY_PORT, port))?;

        let timeout = config.get_int_property_or(KEY_TIMEOUT, 30);
        if timeout <= 0 {
            return Err(invalid(KEY_TIMEOUT, timeout));
        }

        let model = config.get_int_property_or(KEY_MODEL, 2);
        let screen_size = u8::try_from(model)
            .ok()
            .and_then(ScreenSize::from_model)
            .ok_or_else(|| invalid(KEY_MODEL, model))?;

        let text_block_size = block_size(config, KEY_TEXT_BLOCK_SIZE, defaults.text_block_size)?;
        let binary_block_size = block_size(config, KEY_BINARY_BLOCK_SIZE, defaults.binary_block_size)?;

        let lu_name = config
            .get_string_property(KEY_LU_NAME)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            host: config.get_string_property_or(KEY_HOST, ""),
            port,
            connect_timeout: Duration::from_secs(timeout as u64),
            screen_size,
            lu_name,
            tn3270e_enabled: config.get_boolean_property_or(KEY_TN3270E, true),
            text_block_size,
            binary_block_size,
        })
    }

    /// Host is required to open a connection
    pub fn require_host(&self) -> ConfigResult<&str> {
        if self.host.is_empty() {
            Err(ConfigError::MissingRequired {
                parameter: KEY_HOST.to_string(),
            })
        } else {
            Ok(&self.host)
        }
    }
}

fn block_size(config: &SessionConfig, key: &str, default: usize) -> ConfigResult<usize> {
    let value = config.get_int_property_or(key, default as i64);
    // Data must fit the two-byte length of a Get reply
    if (1..=32000).contains(&value) {
        Ok(value as usize)
    } else {
        Err(invalid(key, value))
    }
}

fn invalid(key: &str, value: i64) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter: key.to_string(),
        value: value.to_string(),
        reason: "out of range".to_string(),
    }
}
