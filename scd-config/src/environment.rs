use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Variable selecting the runtime environment. Unset means [`Environment::Dev`].
const APP_ENVIRONMENT_VAR: &str = "APP_ENVIRONMENT";

/// Runtime environment, naming the environment configuration file and picking the log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown environment `{0}`, expected `dev` or `prod`")]
pub struct UnknownEnvironment(String);

impl Environment {
    /// Reads the environment from `APP_ENVIRONMENT`.
    pub fn load() -> Result<Self, UnknownEnvironment> {
        match std::env::var(APP_ENVIRONMENT_VAR) {
            Ok(name) => name.parse(),
            Err(_) => Ok(Environment::Dev),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(UnknownEnvironment(name.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
