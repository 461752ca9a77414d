use crate::error::AppError;
use ::config::{Config, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const APP_NAME: &str = "autopilot";
pub const CONFIG_FILE: &str = "autopilot.json";
pub const ENV_PREFIX: &str = "AUTOPILOT";

pub const DEFAULT_PRICING_URL: &str = "https://prices.azure.com/api/retail/prices";
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";
pub const DEFAULT_DESKTOP_MARKER: &str = "AVD";

const ACTIVE_SUBSCRIPTION_KEY: &str = "active_subscription";

fn app_home_dir() -> Result<PathBuf, AppError> {
    if let Ok(custom) = std::env::var("AUTOPILOT_HOME") {
        return Ok(PathBuf::from(custom));
    }

    if let Some(dirs) = ProjectDirs::from("com", APP_NAME, APP_NAME) {
        let candidate = dirs.data_local_dir().to_path_buf();
        if fs::create_dir_all(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    Ok(std::env::current_dir()?)
}

pub fn config_path() -> Result<PathBuf, AppError> {
    Ok(app_home_dir()?.join(CONFIG_FILE))
}

/// Settings for one invocation: the on-disk JSON file layered under
/// `AUTOPILOT_*` environment variables. Loaded once in `main` and passed down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub active_subscription: Option<String>,
    #[serde(default = "default_pricing_url")]
    pub pricing_url: String,
    #[serde(default = "default_management_url")]
    pub management_url: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_desktop_marker")]
    pub desktop_marker: String,
}

fn default_pricing_url() -> String {
    DEFAULT_PRICING_URL.into()
}

fn default_management_url() -> String {
    DEFAULT_MANAGEMENT_URL.into()
}

fn default_desktop_marker() -> String {
    DEFAULT_DESKTOP_MARKER.into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_subscription: None,
            pricing_url: default_pricing_url(),
            management_url: default_management_url(),
            access_token: None,
            desktop_marker: default_desktop_marker(),
        }
    }
}

impl AppConfig {
    /// The active subscription id, treating a blank value as unset.
    pub fn subscription(&self) -> Result<&str, AppError> {
        self.active_subscription
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(AppError::NoActiveSubscription)
    }
}

fn load_layered(path: &Path, env: Environment) -> Result<AppConfig, AppError> {
    let settings = Config::builder()
        .add_source(
            File::from(path.to_path_buf())
                .format(FileFormat::Json)
                .required(false),
        )
        .add_source(env)
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_config_at(path: &Path) -> Result<AppConfig, AppError> {
    debug!(path = %path.display(), "loading config");
    load_layered(path, Environment::with_prefix(ENV_PREFIX))
}

pub fn load_config() -> Result<AppConfig, AppError> {
    load_config_at(&config_path()?)
}

/// Writes `active_subscription` into the config file, keeping any other keys
/// already stored there.
pub fn save_active_subscription_at(path: &Path, subscription_id: &str) -> Result<(), AppError> {
    let mut object = if path.exists() {
        match serde_json::from_str::<Value>(&fs::read_to_string(path)?)? {
            Value::Object(map) => map,
            _ => {
                return Err(AppError::Config(format!(
                    "{} does not contain a JSON object",
                    path.display()
                )))
            }
        }
    } else {
        Map::new()
    };

    object.insert(
        ACTIVE_SUBSCRIPTION_KEY.into(),
        Value::String(subscription_id.to_string()),
    );

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&Value::Object(object))?)?;
    Ok(())
}

pub fn save_active_subscription(subscription_id: &str) -> Result<(), AppError> {
    save_active_subscription_at(&config_path()?, subscription_id)
}
