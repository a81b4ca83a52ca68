use std::env;

use ivy_core::session::parse_flag;
use ivy_core::SessionConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellConfig {
    pub session: SessionConfig,
    /// Send a notification to the client for each runtime exception.
    pub notify_client_on_error: bool,
    /// Log exceptions no earlier sink handled, and treat them as handled.
    pub log_unhandled: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            notify_client_on_error: true,
            log_unhandled: true,
        }
    }
}

impl ShellConfig {
    /// Session settings from the environment, plus `IVY_NOTIFY_ERRORS`.
    pub fn from_env() -> Self {
        let mut config = Self {
            session: SessionConfig::from_env(),
            ..Self::default()
        };
        if let Ok(value) = env::var("IVY_NOTIFY_ERRORS") {
            match parse_flag(&value) {
                Some(flag) => config.notify_client_on_error = flag,
                None => log::warn!("ignoring invalid IVY_NOTIFY_ERRORS={value}"),
            }
        }
        config
    }
}
