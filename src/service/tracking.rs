use crate::config::TrackingConfig;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of `ip|user_agent|salt`; raw addresses are never stored.
pub fn visitor_hash(ip: &str, user_agent: &str, salt: &str) -> String {
    let digest = Sha256::digest(format!("{}|{}|{}", ip, user_agent, salt).as_bytes());
    hex::encode(digest)
}

/// First `X-Forwarded-For` entry, else the socket address, else `unknown`.
pub fn client_ip(forwarded_for: Option<&str>, remote: Option<String>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or(remote)
        .unwrap_or_else(|| "unknown".to_string())
}

/// The instant of the most recent local midnight in `tz`.
pub fn local_day_start(now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let local_date = now.with_timezone(&tz).date_naive();
    tz.from_local_datetime(&local_date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|start| start.with_timezone(&Utc))
        .unwrap_or(now)
}

impl TrackingConfig {
    /// The configured timezone, falling back to Asia/Seoul when it does not parse.
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = %self.timezone, "unknown tracking timezone; using Asia/Seoul");
            chrono_tz::Asia::Seoul
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitor_hash_is_stable_and_salted() {
        let first = visitor_hash("203.0.113.9", "Mozilla/5.0", "salt-a");
        assert_eq!(first.len(), 64);
        assert_eq!(first, visitor_hash("203.0.113.9", "Mozilla/5.0", "salt-a"));
        assert_ne!(first, visitor_hash("203.0.113.9", "Mozilla/5.0", "salt-b"));
    }

    #[test]
    fn forwarded_for_wins_over_socket_address() {
        assert_eq!(client_ip(Some("198.51.100.7, 10.0.0.1"), Some("10.0.0.2".to_string())), "198.51.100.7");
        assert_eq!(client_ip(Some("  "), Some("10.0.0.2".to_string())), "10.0.0.2");
        assert_eq!(client_ip(None, None), "unknown");
    }

    #[test]
    fn seoul_day_starts_at_fifteen_utc() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 16, 30, 0).unwrap();
        assert_eq!(local_day_start(now, chrono_tz::Asia::Seoul), Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap());

        let before_midnight = Utc.with_ymd_and_hms(2024, 5, 10, 14, 59, 0).unwrap();
        assert_eq!(
            local_day_start(before_midnight, chrono_tz::Asia::Seoul),
            Utc.with_ymd_and_hms(2024, 5, 9, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn invalid_timezone_falls_back() {
        let config = TrackingConfig {
            timezone: "Mars/Olympus".to_string(),
            ..TrackingConfig::default()
        };
        assert_eq!(config.tz(), chrono_tz::Asia::Seoul);
    }
}
