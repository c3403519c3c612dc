use chrono::{DateTime, SecondsFormat, Utc};

/// Fixed-precision RFC 3339 so that string order is chronological order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Human distance between `at` and `now`, e.g. "5 minutes ago".
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds();
    let (magnitude, future) = if seconds < 0 {
        (-seconds, true)
    } else {
        (seconds, false)
    };

    let phrase = match magnitude {
        0..=44 => "less than a minute".to_string(),
        45..=89 => "1 minute".to_string(),
        90..=2_669 => format!("{} minutes", (magnitude + 30) / 60),
        2_670..=5_399 => "about 1 hour".to_string(),
        5_400..=86_399 => format!("about {} hours", (magnitude + 1_800) / 3_600),
        86_400..=172_799 => "1 day".to_string(),
        172_800..=2_591_999 => format!("{} days", (magnitude + 43_200) / 86_400),
        2_592_000..=31_535_999 => {
            let months = ((magnitude + 1_296_000) / 2_592_000).max(1);
            if months == 1 {
                "about 1 month".to_string()
            } else {
                format!("{} months", months)
            }
        }
        _ => {
            let years = magnitude / 31_536_000;
            if years == 1 {
                "about 1 year".to_string()
            } else {
                format!("about {} years", years)
            }
        }
    };

    if future {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

/// Uppercased first letter of a username, for avatar placeholders.
pub fn initial(username: &str) -> String {
    username
        .chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| "U".to_string())
}
