use faultline_common::types::QuickActionConfig;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    #[serde(default = "default_node_id")]
    pub node_id: i32,

    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub quick_action: QuickActionConfig,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Quick-login session lifetime; also the cookie max-age.
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expire_secs: default_token_expire_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            machine_id: default_machine_id(),
            node_id: default_node_id(),
            auth: AuthConfig::default(),
            quick_action: QuickActionConfig::default(),
        }
    }
}

fn default_http_port() -> u16 {
    9001
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

fn default_jwt_secret() -> String {
    "faultline-dev-secret".to_string()
}

fn default_token_expire_secs() -> u64 {
    86400
}

/// Load configuration from a TOML file; a missing path yields the defaults.
pub fn load(path: Option<&str>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&raw)?)
        }
        None => Ok(ServerConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config: ServerConfig = toml::from_str(
            r#"
            http_port = 8080

            [quick_action]
            enabled = true
            base_url = "https://alerts.example.com"
            api_url = ""
            secret_key = "k"
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.auth.token_expire_secs, 86400);
        assert!(config.quick_action.buttons_available());
        assert_eq!(config.quick_action.api_or_base_url(), "https://alerts.example.com");
    }
}
