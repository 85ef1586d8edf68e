use rocket::figment::Figment;
use serde::Deserialize;

/// Service settings read from `Rocket.toml` / `ROCKET_*` alongside Rocket's own.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub allowed_origins: Vec<String>,
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    pub session_ttl_days: i64,
    pub default_slot_minutes: i64,
    pub max_slot_window_days: i64,
    pub maintenance_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://basariyolum.com".to_string(),
                "http://localhost:5173".to_string(),
            ],
            cookie_domain: None,
            cookie_secure: false,
            session_ttl_days: 7,
            default_slot_minutes: 60,
            max_slot_window_days: 62,
            maintenance_interval_secs: 3600,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, rocket::figment::Error> {
        figment.extract()
    }

    /// Origin sent back when the caller's origin is not on the list.
    pub fn primary_origin(&self) -> &str {
        self.allowed_origins
            .first()
            .map(String::as_str)
            .unwrap_or("https://basariyolum.com")
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::figment::providers::Serialized;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let figment = Figment::from(Serialized::defaults(serde_json::json!({
            "port": 8000,
            "session_ttl_days": 3
        })));

        let config = AppConfig::from_figment(&figment).unwrap();
        assert_eq!(config.session_ttl_days, 3);
        assert_eq!(config.default_slot_minutes, 60);
        assert_eq!(config.max_slot_window_days, 62);
        assert_eq!(config.primary_origin(), "https://basariyolum.com");
    }

    #[test]
    fn test_origin_allow_list() {
        let config = AppConfig::default();
        assert!(config.allows_origin("http://localhost:5173"));
        assert!(!config.allows_origin("https://evil.example"));
    }
}
