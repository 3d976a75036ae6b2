use std::{env, time::Duration};

/// Everything the bot reads from the environment on start.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Like `sqlite:bump_bot.sqlite`.
    pub database_url: String,
    /// Port of the keep-alive responder.
    pub port: u16,
    pub reminder_poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables, after reading `.env`
    /// if there is one.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let discord_token = lookup("DISCORD_BOT_TOKEN")
            .filter(|x| !x.trim().is_empty())
            .ok_or("DISCORD_BOT_TOKEN must be set")?;

        let database_url = lookup("DATABASE_URL")
            .filter(|x| !x.trim().is_empty())
            .ok_or("DATABASE_URL must be set")?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "10000".to_string())
            .parse()
            .map_err(|_| "Invalid PORT")?;

        let poll_secs: u64 = lookup("REMINDER_POLL_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .map_err(|_| "Invalid REMINDER_POLL_SECS")?;
        if poll_secs == 0 {
            return Err("REMINDER_POLL_SECS must be at least 1".to_string());
        }

        Ok(Config {
            discord_token,
            database_url,
            port,
            reminder_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("DATABASE_URL", "sqlite:bumps.sqlite"),
        ])
        .unwrap();
        assert_eq!(config.discord_token, "token");
        assert_eq!(config.database_url, "sqlite:bumps.sqlite");
        assert_eq!(config.port, 10000);
        assert_eq!(config.reminder_poll_interval, Duration::from_secs(60));
    }

    #[test]
    fn overrides() {
        let config = load(&[
            ("DISCORD_BOT_TOKEN", "token"),
            ("DATABASE_URL", "sqlite:bumps.sqlite"),
            ("PORT", "8080"),
            ("REMINDER_POLL_SECS", "15"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.reminder_poll_interval, Duration::from_secs(15));
    }

    #[test]
    fn missing_mandatory_values() {
        assert!(load(&[("DATABASE_URL", "sqlite:bumps.sqlite")]).is_err());
        assert!(load(&[("DISCORD_BOT_TOKEN", "token")]).is_err());
        assert!(load(&[("DISCORD_BOT_TOKEN", " "), ("DATABASE_URL", "sqlite:x")]).is_err());
    }

    #[test]
    fn garbage_numbers() {
        let base = [("DISCORD_BOT_TOKEN", "token"), ("DATABASE_URL", "sqlite:x")];
        assert!(load(&[base[0], base[1], ("PORT", "lots")]).is_err());
        assert!(load(&[base[0], base[1], ("REMINDER_POLL_SECS", "0")]).is_err());
    }
}
