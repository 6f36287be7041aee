use time::{macros::format_description, Date, OffsetDateTime};

/// FreshBooks sends and accepts plain `YYYY-MM-DD` dates.
pub fn parse_date(date_str: &str) -> Result<Date, String> {
    // Some endpoints append a time component; only the date part matters.
    let date_part = date_str.split([' ', 'T']).next().unwrap_or(date_str);
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(date_part, &format).map_err(|e| format!("Failed to parse date '{date_str}': {e}"))
}

pub fn format_date(date: Date) -> Result<String, time::error::Format> {
    date.format(&format_description!("[year]-[month]-[day]"))
}

/// Today's date in the local time zone, falling back to UTC when the offset is unknown.
#[must_use]
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

// Serialization module for time::Date
pub mod freshbooks_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = super::format_date(*date).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let date_str = String::deserialize(deserializer)?;
        super::parse_date(&date_str).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parses_plain_and_timestamped_dates() {
        assert_eq!(parse_date("2024-03-05").unwrap(), date!(2024 - 03 - 05));
        assert_eq!(parse_date("2024-03-05 10:11:12").unwrap(), date!(2024 - 03 - 05));
        assert!(parse_date("05/03/2024").is_err());
    }
}
