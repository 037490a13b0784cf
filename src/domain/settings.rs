use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "blesquare".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Adapter to use without prompting, e.g. "hci0". `None` asks.
    #[serde(default)]
    pub adapter: Option<String>,

    /// Name advertised to scanning centrals and set as the adapter alias.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Fixed credential handed out by the pairing agent.
    #[serde(default = "default_passkey")]
    pub passkey: String,

    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,

    #[serde(default = "default_true")]
    pub discoverable: bool,
    #[serde(default = "default_true")]
    pub pairable: bool,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            adapter: None,
            device_name: default_device_name(),
            passkey: default_passkey(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            discoverable: true,
            pairable: true,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_device_name() -> String {
    "blesquare".to_string()
}
fn default_passkey() -> String {
    "123456".to_string()
}
fn default_service_uuid() -> String {
    "12345678-1234-5678-1234-56789abcdef1".to_string()
}
fn default_characteristic_uuid() -> String {
    "12345678-1234-5678-1234-56789abcdef2".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path,
        })
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("blesquare");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.passkey, "123456");
        assert_eq!(settings.service_uuid, "12345678-1234-5678-1234-56789abcdef1");
        assert!(settings.adapter.is_none());
        assert!(settings.discoverable);
    }

    #[test]
    fn settings_round_trip() {
        let mut settings = Settings::default();
        settings.adapter = Some("hci1".to_string());
        settings.pairable = false;

        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.adapter.as_deref(), Some("hci1"));
        assert!(!back.pairable);
    }
}
