use dotenvy::dotenv;
use std::env;
use std::sync::{Arc, OnceLock};

/// ✅ Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    /// Base URL of the frontend, used to build links in notification emails.
    pub app_url: String,
    /// Resend API key. When absent, notifications are logged instead of sent.
    pub resend_api_key: Option<String>,
    pub notify_from: String,
    /// Legacy account that holds requester + reviewer capability regardless of
    /// its stored role tags. Kept as configuration so the exception lives in
    /// one place instead of being hard-coded into every permission check.
    pub bridge_account_email: Option<String>,
    /// Policy flag: when true, only admins may soft-delete requests.
    pub requester_delete_disabled: bool,
    pub reminder_interval_hours: u64,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> Self {
        dotenv().ok(); // Load .env only once

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            app_url: env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            notify_from: env::var("NOTIFY_FROM")
                .unwrap_or_else(|_| "po-requests@example.com".to_string()),
            bridge_account_email: env::var("BRIDGE_ACCOUNT_EMAIL")
                .ok()
                .filter(|e| !e.is_empty()),
            requester_delete_disabled: env::var("REQUESTER_DELETE_DISABLED")
                .unwrap_or_else(|_| "false".to_string())
                == "true",
            reminder_interval_hours: parse_reminder_hours(
                env::var("REMINDER_INTERVAL_HOURS").ok(),
            ),
        }
    }

    /// ✅ Initialize the global config
    pub fn init() {
        CONFIG
            .set(Arc::new(Self::from_env()))
            .expect("Config already initialized");
    }

    /// ✅ Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }

    pub fn bridge_account() -> Option<String> {
        Config::get().bridge_account_email.clone()
    }
}

/// Clamped to at least one hour: a zero period would panic the interval
/// timer driving the reminder task.
fn parse_reminder_hours(raw: Option<String>) -> u64 {
    raw.and_then(|v| v.parse().ok()).unwrap_or(24).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_hours_defaults_and_clamps() {
        assert_eq!(parse_reminder_hours(None), 24);
        assert_eq!(parse_reminder_hours(Some("12".into())), 12);
        assert_eq!(parse_reminder_hours(Some("garbage".into())), 24);
        assert_eq!(parse_reminder_hours(Some("0".into())), 1);
    }
}
