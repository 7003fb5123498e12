use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Environment variable holding the deployment environment
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

/// Deployment environment a module is configured for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, test, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl Environment {
    /// Read the environment from `APP_ENV`, defaulting to development when unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(ENVIRONMENT_VAR) {
            Ok(value) => value.parse(),
            Err(env::VarError::NotPresent) => Ok(Environment::default()),
            Err(env::VarError::NotUnicode(_)) => Err(ConfigError::environment_error(format!(
                "{} is not valid unicode",
                ENVIRONMENT_VAR
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if environment is test
    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("Testing".parse::<Environment>().unwrap(), Environment::Test);
        assert_eq!(" prod ".parse::<Environment>().unwrap(), Environment::Production);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for env in [Environment::Development, Environment::Test, Environment::Production] {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::remove_var(ENVIRONMENT_VAR);
        assert_eq!(Environment::from_env().unwrap(), Environment::Development);

        env::set_var(ENVIRONMENT_VAR, "production");
        assert_eq!(Environment::from_env().unwrap(), Environment::Production);

        env::set_var(ENVIRONMENT_VAR, "nope");
        assert!(Environment::from_env().is_err());

        env::remove_var(ENVIRONMENT_VAR);
    }
}
