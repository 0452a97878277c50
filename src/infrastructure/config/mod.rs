use crate::domain::error::{AppError, Result};
use crate::infrastructure::security::pat_store::PatStore;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "casebridge.toml";
const KEYRING_SERVICE: &str = "casebridge";
const KEYRING_PAT_ENTRY: &str = "azure_devops_pat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunEnvironment {
    Development,
    Production,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AzureDevOpsSettings {
    pub organization_url: String,
    pub project: String,
    #[serde(default)]
    pub personal_access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: RunEnvironment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub azure_devops: AzureDevOpsSettings,
    pub cost_ceiling_run_usd: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: RunEnvironment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3001,
            },
            database: DatabaseConfig {
                path: PathBuf::from("./data/casebridge.db"),
            },
            azure_devops: AzureDevOpsSettings::default(),
            cost_ceiling_run_usd: 10.0,
        }
    }
}

/// Connection settings for one Azure DevOps organization/project pair.
#[derive(Clone, PartialEq, Eq)]
pub struct AzureDevOpsConfig {
    pub organization_url: String,
    pub project: String,
    pub personal_access_token: String,
}

impl std::fmt::Debug for AzureDevOpsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureDevOpsConfig")
            .field("organization_url", &self.organization_url)
            .field("project", &self.project)
            .field("personal_access_token", &"****")
            .finish()
    }
}

impl AzureDevOpsConfig {
    pub fn new(organization_url: &str, project: &str, personal_access_token: &str) -> Self {
        Self {
            organization_url: organization_url.trim().trim_end_matches('/').to_string(),
            project: project.trim().to_string(),
            personal_access_token: personal_access_token.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults, then the TOML file, then `CASEBRIDGE_*` variables (`__` nests), then the
    /// bare `ADO_*`/`DB_PATH`/`PORT` variables.
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("CASEBRIDGE_").split("__"))
            .merge(
                Env::raw()
                    .only(&["ADO_ORG_URL", "ADO_PROJECT", "ADO_PAT", "DB_PATH", "PORT", "NODE_ENV"])
                    .map(|key| {
                        match key.as_str().to_ascii_uppercase().as_str() {
                            "ADO_ORG_URL" => "azure_devops.organization_url",
                            "ADO_PROJECT" => "azure_devops.project",
                            "ADO_PAT" => "azure_devops.personal_access_token",
                            "DB_PATH" => "database.path",
                            "PORT" => "server.port",
                            _ => "environment",
                        }
                        .into()
                    }),
            )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let org_url = self.azure_devops.organization_url.trim();
        if org_url.is_empty() {
            return Err(AppError::ConfigError(
                "azure_devops.organization_url is required".to_string(),
            ));
        }
        match url::Url::parse(org_url) {
            Ok(parsed) if parsed.scheme() == "https" || parsed.scheme() == "http" => {}
            _ => {
                return Err(AppError::ConfigError(format!(
                    "azure_devops.organization_url must be a valid http(s) URL, got `{}`",
                    org_url
                )))
            }
        }
        if self.azure_devops.project.trim().is_empty() {
            return Err(AppError::ConfigError(
                "azure_devops.project is required".to_string(),
            ));
        }
        if self.server.port == 0 {
            return Err(AppError::ConfigError(
                "server.port must be a valid port number".to_string(),
            ));
        }
        if !(self.cost_ceiling_run_usd > 0.0) {
            return Err(AppError::ConfigError(
                "cost_ceiling_run_usd must be a positive number".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == RunEnvironment::Development
    }

    /// Loggable view of the configuration with the PAT masked.
    pub fn redacted(&self) -> serde_json::Value {
        let pat = self
            .azure_devops
            .personal_access_token
            .as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "<keyring>".to_string());
        serde_json::json!({
            "environment": self.environment,
            "server": self.server,
            "database": self.database,
            "azure_devops": {
                "organization_url": self.azure_devops.organization_url,
                "project": self.azure_devops.project,
                "personal_access_token": pat,
            },
            "cost_ceiling_run_usd": self.cost_ceiling_run_usd,
        })
    }
}

fn mask_secret(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{}****", prefix)
}

pub struct ConfigService {
    pat_store: PatStore,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            pat_store: PatStore::new(KEYRING_SERVICE, KEYRING_PAT_ENTRY),
        }
    }

    /// Reads `.env.local`/`.env` into the process environment, then builds the config.
    pub fn load(&self, config_file: &Path) -> Result<AppConfig> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::dotenv();
        AppConfig::from_figment(AppConfig::figment(config_file))
    }

    /// Configured PAT first, then the OS keyring.
    pub fn azure_devops_config(&self, config: &AppConfig) -> Result<AzureDevOpsConfig> {
        let settings = &config.azure_devops;
        let configured = settings
            .personal_access_token
            .as_deref()
            .map(str::trim)
            .filter(|pat| !pat.is_empty())
            .map(str::to_string);

        let pat = match configured {
            Some(pat) => pat,
            None => self.pat_store.load()?.ok_or_else(|| {
                AppError::ConfigError(
                    "No Azure DevOps personal access token configured (set ADO_PAT or store one in the keyring)"
                        .to_string(),
                )
            })?,
        };

        Ok(AzureDevOpsConfig::new(
            &settings.organization_url,
            &settings.project,
            &pat,
        ))
    }

    pub fn save_pat(&self, pat: &str) -> Result<()> {
        let pat = pat.trim();
        if pat.is_empty() {
            return Err(AppError::ValidationError(
                "Personal access token is empty".to_string(),
            ));
        }
        self.pat_store.save(pat)
    }

    pub fn clear_pat(&self) -> Result<()> {
        self.pat_store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
    }

    #[test]
    fn test_defaults_need_azure_devops_settings() {
        let err = AppConfig::from_figment(base_figment()).unwrap_err();
        assert!(err.to_string().contains("organization_url"));
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = base_figment().merge(Toml::string(
            r#"
            environment = "test"
            cost_ceiling_run_usd = 2.5

            [server]
            port = 8080

            [azure_devops]
            organization_url = "https://dev.azure.com/contoso/"
            project = "Web"
            personal_access_token = "abcd1234"
            "#,
        ));
        let config = AppConfig::from_figment(figment).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.environment, RunEnvironment::Test);
        assert_eq!(config.cost_ceiling_run_usd, 2.5);

        let ado = ConfigService::new().azure_devops_config(&config).unwrap();
        assert_eq!(ado.organization_url, "https://dev.azure.com/contoso");
        assert_eq!(ado.project, "Web");
        assert_eq!(ado.personal_access_token, "abcd1234");
    }

    #[test]
    fn test_rejects_non_http_org_url() {
        let figment = base_figment().merge(Toml::string(
            r#"
            [azure_devops]
            organization_url = "ftp://contoso"
            project = "Web"
            "#,
        ));
        assert!(AppConfig::from_figment(figment).is_err());
    }

    #[test]
    fn test_rejects_non_positive_cost_ceiling() {
        let figment = base_figment().merge(Toml::string(
            r#"
            cost_ceiling_run_usd = 0.0
            [azure_devops]
            organization_url = "https://dev.azure.com/contoso"
            project = "Web"
            "#,
        ));
        let err = AppConfig::from_figment(figment).unwrap_err();
        assert!(err.to_string().contains("cost_ceiling_run_usd"));
    }

    #[test]
    fn test_redacted_masks_pat() {
        let mut config = AppConfig::default();
        config.azure_devops.personal_access_token = Some("abcdefghijkl".to_string());
        let view = config.redacted();
        assert_eq!(view["azure_devops"]["personal_access_token"], "abcd****");
    }

    #[test]
    fn test_debug_never_prints_pat() {
        let ado = AzureDevOpsConfig::new("https://dev.azure.com/o", "p", "supersecret");
        assert!(!format!("{:?}", ado).contains("supersecret"));
    }
}
