//! Server configuration from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_NIGHT_DELAY_MS: u64 = 3000;
const DEFAULT_CHARACTER_SELECT_MS: u64 = 30_000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `SERVER_ADDR`
    pub addr: SocketAddr,
    /// `NIGHT_DELAY_MS`: how long night submissions stay open before the host resolves
    pub night_delay: Duration,
    /// `CHARACTER_SELECT_MS`: after this, players still choosing get a random character
    pub character_select: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(
            std::env::var("SERVER_ADDR").ok(),
            std::env::var("NIGHT_DELAY_MS").ok(),
            std::env::var("CHARACTER_SELECT_MS").ok(),
        )
    }

    fn from_vars(
        addr: Option<String>,
        night_delay_ms: Option<String>,
        character_select_ms: Option<String>,
    ) -> anyhow::Result<Self> {
        let addr = addr
            .as_deref()
            .unwrap_or(DEFAULT_ADDR)
            .parse()
            .context("SERVER_ADDR is not a socket address")?;
        let night_delay_ms = match night_delay_ms {
            Some(ms) => ms.parse().context("NIGHT_DELAY_MS is not a number")?,
            None => DEFAULT_NIGHT_DELAY_MS,
        };
        let character_select_ms = match character_select_ms {
            Some(ms) => ms.parse().context("CHARACTER_SELECT_MS is not a number")?,
            None => DEFAULT_CHARACTER_SELECT_MS,
        };

        Ok(Self {
            addr,
            night_delay: Duration::from_millis(night_delay_ms),
            character_select: Duration::from_millis(character_select_ms),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            night_delay: Duration::from_millis(DEFAULT_NIGHT_DELAY_MS),
            character_select: Duration::from_millis(DEFAULT_CHARACTER_SELECT_MS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_vars(None, None, None).unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.night_delay, Duration::from_millis(3000));
        assert_eq!(config.character_select, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_vars(
            Some("127.0.0.1:9000".into()),
            Some("250".into()),
            Some("5000".into()),
        )
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.night_delay, Duration::from_millis(250));
        assert_eq!(config.character_select, Duration::from_millis(5000));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(ServerConfig::from_vars(Some("nope".into()), None, None).is_err());
        assert!(ServerConfig::from_vars(None, Some("soon".into()), None).is_err());
        assert!(ServerConfig::from_vars(None, None, Some("-1".into())).is_err());
    }
}
