use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub venue: VenueConfig,
    pub holds: HoldConfig,
    pub client: ClientConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// Схема зала: сетка rows x cols, последние vip_rows рядов - VIP
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    pub rows: u16,
    pub cols: u16,
    pub vip_rows: u16,
    pub standard_price: u32,
    pub vip_price: u32,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            rows: 8,
            cols: 10,
            vip_rows: 2,
            standard_price: 12,
            vip_price: 18,
        }
    }
}

// Настройки истечения холдов
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    /// 0 отключает истечение холдов.
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl HoldConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds.max(1))
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            sweep_interval_seconds: 30,
        }
    }
}

// Настройки клиентского цикла опроса
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub api_url: String,
    pub poll_interval_seconds: u64,
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".to_string(),
            poll_interval_seconds: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("venue layout is invalid: {0}")]
    Layout(String),
}

/// Читает переменную окружения, при отсутствии возвращает значение по умолчанию.
fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => parse_var(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        expected: std::any::type_name::<T>(),
        value: raw.to_string(),
    })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let venue_defaults = VenueConfig::default();
        let hold_defaults = HoldConfig::default();
        let client_defaults = ClientConfig::default();

        let config = Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: var_or("PORT", 8000)?,
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "seat_booking=debug,tower_http=debug".to_string()),
            },
            venue: VenueConfig {
                rows: var_or("SEAT_ROWS", venue_defaults.rows)?,
                cols: var_or("SEAT_COLS", venue_defaults.cols)?,
                vip_rows: var_or("VIP_ROWS", venue_defaults.vip_rows)?,
                standard_price: var_or("PRICE_STANDARD", venue_defaults.standard_price)?,
                vip_price: var_or("PRICE_VIP", venue_defaults.vip_price)?,
            },
            holds: HoldConfig {
                ttl_seconds: var_or("HOLD_TTL_SECONDS", hold_defaults.ttl_seconds)?,
                sweep_interval_seconds: var_or(
                    "HOLD_SWEEP_INTERVAL_SECONDS",
                    hold_defaults.sweep_interval_seconds,
                )?,
            },
            client: ClientConfig {
                api_url: env::var("SEAT_API_URL").unwrap_or_else(|_| client_defaults.api_url.clone()),
                poll_interval_seconds: var_or(
                    "POLL_INTERVAL_SECONDS",
                    client_defaults.poll_interval_seconds,
                )?,
            },
        };

        config.venue.validate()?;
        Ok(config)
    }

    /// Конфигурация по умолчанию без чтения окружения (для тестов и встраивания).
    pub fn for_venue(venue: VenueConfig) -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "seat_booking=debug".to_string(),
            },
            venue,
            holds: HoldConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

impl VenueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::Layout("rows and cols must be > 0".to_string()));
        }
        if self.vip_rows > self.rows {
            return Err(ConfigError::Layout(format!(
                "vip_rows ({}) exceeds rows ({})",
                self.vip_rows, self.rows
            )));
        }
        Ok(())
    }

    pub fn seat_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_reports_key_and_value() {
        let err = parse_var::<u16>("PORT", "eighty").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("PORT"));
        assert!(text.contains("eighty"));
        assert_eq!(parse_var::<u16>("PORT", " 8080 ").unwrap(), 8080);
    }

    #[test]
    fn default_venue_matches_hall_layout() {
        let venue = VenueConfig::default();
        assert!(venue.validate().is_ok());
        assert_eq!(venue.seat_count(), 80);
    }

    #[test]
    fn vip_rows_cannot_exceed_rows() {
        let venue = VenueConfig { rows: 2, vip_rows: 3, ..VenueConfig::default() };
        assert!(matches!(venue.validate(), Err(ConfigError::Layout(_))));

        let empty = VenueConfig { cols: 0, ..VenueConfig::default() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let holds = HoldConfig { ttl_seconds: 0, sweep_interval_seconds: 0 };
        assert!(holds.ttl().is_none());
        assert_eq!(holds.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn poll_interval_is_at_least_one_second() {
        let client = ClientConfig { poll_interval_seconds: 0, ..ClientConfig::default() };
        assert_eq!(client.poll_interval(), Duration::from_secs(1));
        assert_eq!(ClientConfig::default().poll_interval(), Duration::from_secs(5));
    }
}
