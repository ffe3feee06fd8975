//! Serde helpers for calendar dates (`YYYY-MM-DD`) and wall-clock times
//! (`HH:MM:SS`, `HH:MM` also accepted on input).

use time::{format_description::FormatItem, macros::format_description, Date, Time};

const DATE: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const CLOCK: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
const CLOCK_SHORT: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

pub fn parse_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw.trim(), DATE)
}

pub fn parse_clock(raw: &str) -> Result<Time, time::error::Parse> {
    let raw = raw.trim();
    Time::parse(raw, CLOCK).or_else(|_| Time::parse(raw, CLOCK_SHORT))
}

pub mod date {
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(value: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let out = value.format(super::DATE).map_err(ser::Error::custom)?;
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw)
            .map_err(|e| de::Error::custom(format!("invalid date {raw:?}, expected YYYY-MM-DD: {e}")))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            value: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::super::parse_date(&raw)
                    .map(Some)
                    .map_err(|e| serde::de::Error::custom(format!("invalid date {raw:?}: {e}"))),
                None => Ok(None),
            }
        }
    }
}

pub mod clock {
    use serde::{de, ser, Deserialize, Deserializer, Serializer};
    use time::Time;

    pub fn serialize<S: Serializer>(value: &Time, serializer: S) -> Result<S::Ok, S::Error> {
        let out = value.format(super::CLOCK).map_err(ser::Error::custom)?;
        serializer.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Time, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_clock(&raw)
            .map_err(|e| de::Error::custom(format!("invalid time {raw:?}, expected HH:MM[:SS]: {e}")))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Time;

        pub fn serialize<S: Serializer>(
            value: &Option<Time>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Time>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::super::parse_clock(&raw)
                    .map(Some)
                    .map_err(|e| serde::de::Error::custom(format!("invalid time {raw:?}: {e}"))),
                None => Ok(None),
            }
        }
    }
}
