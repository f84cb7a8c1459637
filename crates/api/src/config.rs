//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use autoshop_analytics::LocalCalendar;
use autoshop_orders::TransitionPolicy;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    InMemory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub persistence: Persistence,
    pub metrics_refresh: Duration,
    pub calendar: LocalCalendar,
    pub transition_policy: TransitionPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source; unset and blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr: SocketAddr = parse_or(get("BIND_ADDR"), "BIND_ADDR", "0.0.0.0:8080".parse().ok())?;

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let persistent: bool = parse_or(get("USE_PERSISTENT_STORES"), "USE_PERSISTENT_STORES", Some(false))?;
        let persistence = if persistent {
            Persistence::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: parse_or(
                    get("DATABASE_MAX_CONNECTIONS"),
                    "DATABASE_MAX_CONNECTIONS",
                    Some(10),
                )?,
            }
        } else {
            Persistence::InMemory
        };

        let refresh_secs: u64 = parse_or(get("METRICS_REFRESH_SECS"), "METRICS_REFRESH_SECS", Some(30))?;
        if refresh_secs == 0 {
            return Err(invalid("METRICS_REFRESH_SECS", "0", "must be at least 1"));
        }

        let offset: i32 = parse_or(get("SHOP_UTC_OFFSET_MINUTES"), "SHOP_UTC_OFFSET_MINUTES", Some(0))?;
        let calendar = LocalCalendar::from_offset_minutes(offset)
            .map_err(|e| invalid("SHOP_UTC_OFFSET_MINUTES", &offset.to_string(), e))?;

        let transition_policy: TransitionPolicy = parse_or(
            get("ORDER_TRANSITION_POLICY"),
            "ORDER_TRANSITION_POLICY",
            Some(TransitionPolicy::Permissive),
        )?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            persistence,
            metrics_refresh: Duration::from_secs(refresh_secs),
            calendar,
            transition_policy,
        })
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(raw: Option<String>, var: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e| invalid(var, &v, e)),
        None => default.ok_or(ConfigError::Missing(var)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_are_in_memory_and_permissive() {
        let c = config(&[]).unwrap();
        assert_eq!(c.bind_addr.port(), 8080);
        assert_eq!(c.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(c.persistence, Persistence::InMemory);
        assert_eq!(c.metrics_refresh, Duration::from_secs(30));
        assert_eq!(c.transition_policy, TransitionPolicy::Permissive);
    }

    #[test]
    fn persistent_stores_need_a_database_url() {
        assert_eq!(
            config(&[("USE_PERSISTENT_STORES", "true")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let c = config(&[
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/shop"),
        ])
        .unwrap();
        assert!(matches!(c.persistence, Persistence::Postgres { max_connections: 10, .. }));
    }

    #[test]
    fn malformed_values_are_rejected() {
        for vars in [
            [("METRICS_REFRESH_SECS", "soon")],
            [("METRICS_REFRESH_SECS", "0")],
            [("ORDER_TRANSITION_POLICY", "strict")],
            [("SHOP_UTC_OFFSET_MINUTES", "100000")],
            [("BIND_ADDR", "localhost")],
        ] {
            assert!(
                matches!(config(&vars), Err(ConfigError::Invalid { .. })),
                "{vars:?} should be invalid"
            );
        }
    }

    #[test]
    fn forward_policy_and_offset_are_read() {
        let c = config(&[
            ("ORDER_TRANSITION_POLICY", " Forward "),
            ("SHOP_UTC_OFFSET_MINUTES", "-300"),
        ])
        .unwrap();
        assert_eq!(c.transition_policy, TransitionPolicy::Forward);
        assert_eq!(c.calendar.offset().local_minus_utc(), -300 * 60);
    }
}
