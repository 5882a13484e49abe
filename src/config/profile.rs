use crate::adapters::auth::{Authenticator, CommandAuthenticator, StaticCookieAuthenticator};
use crate::adapters::http::{ClientSettings, DEFAULT_BASE_URL};
use crate::config::units::UnitRegistry;
use crate::core::aggregator::FailurePolicy;
use crate::core::metrics::{default_metrics, DerivedMetric};
use crate::domain::model::Unit;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// The TOML profile: who to log in as, which units to report on and where
/// the output goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub profile: ProfileInfo,
    #[serde(default)]
    pub source: SourceConfig,
    pub auth: AuthConfig,
    pub units: UnitsConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    pub error_handling: Option<ErrorHandlingConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileInfo {
    /// Name used for the output file and chart titles, usually the stake.
    pub unit_name: String,
    /// The signed-in user's own unit.
    pub unit_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub beta: bool,
    pub timeout_seconds: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            beta: false,
            timeout_seconds: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Session cookies copied from a logged-in browser.
    Cookies,
    /// An external login helper that prints the session cookies.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    pub cookies: Option<BTreeMap<String, String>>,
    pub command: Option<Vec<String>>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitsConfig {
    /// JSON registry file of `{name, number}` records.
    pub registry: Option<String>,
    #[serde(default)]
    pub inline: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    /// File name pattern; `{unit_name}` is replaced by the profile unit name.
    pub filename: Option<String>,
    pub charts: Option<bool>,
    pub compression: Option<CompressionConfig>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            filename: None,
            charts: None,
            compression: None,
        }
    }
}

fn default_output_path() -> String {
    "analytics/data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    /// Configured entries replace the built-in metric of the same name; new
    /// names are appended after the built-in ones.
    #[serde(default = "default_metrics", deserialize_with = "merge_with_default_metrics")]
    pub metrics: Vec<DerivedMetric>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            metrics: default_metrics(),
        }
    }
}

fn default_start_year() -> i32 {
    2022
}

fn merge_with_default_metrics<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<DerivedMetric>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let configured = Vec::<DerivedMetric>::deserialize(deserializer)?;
    let mut metrics = default_metrics();
    for metric in configured {
        match metrics.iter_mut().find(|m| m.name() == metric.name()) {
            Some(existing) => *existing = metric,
            None => metrics.push(metric),
        }
    }
    Ok(metrics)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    #[serde(default)]
    pub on_period_failure: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// "compact" (default) or "json".
    pub log_format: Option<String>,
}

impl Profile {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LCR_PASSWORD})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_file_name_component("profile.unit_name", &self.profile.unit_name)?;
        validation::validate_url("source.base_url", &self.source.base_url)?;
        if let Some(timeout) = self.source.timeout_seconds {
            validation::validate_positive_number("source.timeout_seconds", timeout, 1)?;
        }
        validation::validate_output_dir("load.output_path", &self.load.output_path)?;
        validation::validate_range("analytics.start_year", self.analytics.start_year, 1900, 2200)?;

        match self.auth.method {
            AuthMethod::Cookies => {
                let cookies =
                    validation::validate_required_field("auth.cookies", &self.auth.cookies)?;
                if cookies.is_empty() {
                    return Err(EtlError::MissingConfigError {
                        field: "auth.cookies".to_string(),
                    });
                }
            }
            AuthMethod::Command => {
                let command =
                    validation::validate_required_field("auth.command", &self.auth.command)?;
                if command.is_empty() {
                    return Err(EtlError::MissingConfigError {
                        field: "auth.command".to_string(),
                    });
                }
                validation::validate_required_field("auth.username", &self.auth.username)?;
                validation::validate_required_field("auth.password", &self.auth.password)?;
            }
        }

        if self.units.registry.is_none() && self.units.inline.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "units.registry".to_string(),
            });
        }
        if let Some(registry) = &self.units.registry {
            validation::validate_file_extension("units.registry", registry, &["json"])?;
        }

        if let Some(compression) = &self.load.compression {
            if compression.enabled {
                validation::validate_file_extension(
                    "load.compression.filename",
                    &compression.filename,
                    &["zip"],
                )?;
            }
        }

        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.source.base_url.clone(),
            unit_number: self.profile.unit_number,
            beta: self.source.beta,
            timeout: Duration::from_secs(self.source.timeout_seconds.unwrap_or(30)),
        }
    }

    pub fn authenticator(&self) -> Result<Box<dyn Authenticator>> {
        match self.auth.method {
            AuthMethod::Cookies => {
                let cookies =
                    validation::validate_required_field("auth.cookies", &self.auth.cookies)?;
                Ok(Box::new(StaticCookieAuthenticator::new(cookies.clone())))
            }
            AuthMethod::Command => {
                let command =
                    validation::validate_required_field("auth.command", &self.auth.command)?;
                let username =
                    validation::validate_required_field("auth.username", &self.auth.username)?;
                let password =
                    validation::validate_required_field("auth.password", &self.auth.password)?;
                let timeout = Duration::from_secs(self.auth.timeout_seconds.unwrap_or(120));
                Ok(Box::new(CommandAuthenticator::new(command, username, password, timeout)?))
            }
        }
    }

    /// Registry file units followed by inline units.
    pub fn load_units(&self) -> Result<UnitRegistry> {
        let mut units = Vec::new();
        if let Some(path) = &self.units.registry {
            units.extend(UnitRegistry::from_file(path)?.units().iter().cloned());
        }
        units.extend(self.units.inline.iter().cloned());
        UnitRegistry::from_units(units)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.error_handling
            .as_ref()
            .map(|e| e.on_period_failure)
            .unwrap_or_default()
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            .is_some_and(|format| format.eq_ignore_ascii_case("json"))
    }
}

impl ConfigProvider for Profile {
    fn report_title(&self) -> &str {
        &self.profile.unit_name
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_filename(&self) -> String {
        self.load
            .filename
            .as_deref()
            .unwrap_or("{unit_name}.csv")
            .replace("{unit_name}", &self.profile.unit_name)
    }

    fn start_year(&self) -> i32 {
        self.analytics.start_year
    }

    fn metrics(&self) -> &[DerivedMetric] {
        &self.analytics.metrics
    }

    fn charts_enabled(&self) -> bool {
        self.load.charts.unwrap_or(true)
    }

    fn archive_filename(&self) -> Option<&str> {
        self.load
            .compression
            .as_ref()
            .filter(|c| c.enabled)
            .map(|c| c.filename.as_str())
    }
}

impl Validate for Profile {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
