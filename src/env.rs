use std::path::Path;

use tracing::{info, warn};

/// Rocket's production profile is called `release`; `production` is accepted too.
pub fn is_production_profile(profile: &str) -> bool {
    matches!(profile, "release" | "production")
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let profile = dotenvy::var("ROCKET_PROFILE").unwrap_or("debug".to_string());

    let env_files = if is_production_profile(&profile) {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[cfg(test)]
pub fn load_test_environment() -> Result<(), Box<dyn std::error::Error>> {
    let test_env_files = vec!["config/common.env", ".secrets.env"];

    for env_file in test_env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_profiles() {
        assert!(is_production_profile("release"));
        assert!(is_production_profile("production"));
        assert!(!is_production_profile("debug"));
    }

    #[test]
    fn test_missing_file_is_skipped() {
        assert!(load_env_file("config/does-not-exist.env").is_ok());
    }
}
