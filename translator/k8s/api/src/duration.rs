use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

/// A non-negative duration.
///
/// Parses Go `time.Duration` strings (`"1h2m"`, `"1.5s"`, `"250ms"`) as used in custom
/// resources, and serializes in the protobuf JSON form (`"1.500s"`) that Istio's resources use.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtoDuration(Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty duration")]
    Empty,

    #[error("negative durations are not supported")]
    Negative,

    #[error("missing a unit in {0:?}")]
    NoUnit(String),

    #[error("invalid unit {0:?}: expected one of 'ns', 'us', 'ms', 's', 'm', or 'h'")]
    InvalidUnit(String),

    #[error("invalid number {0:?}")]
    NotANumber(String),
}

// === impl ProtoDuration ===

impl ProtoDuration {
    pub const ZERO: Self = Self(Duration::ZERO);

    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    pub const fn as_duration(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for ProtoDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl From<ProtoDuration> for Duration {
    fn from(ProtoDuration(d): ProtoDuration) -> Self {
        d
    }
}

impl fmt::Display for ProtoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let nanos = self.0.subsec_nanos();
        if nanos == 0 {
            write!(f, "{secs}s")
        } else if nanos % 1_000_000 == 0 {
            write!(f, "{secs}.{:03}s", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            write!(f, "{secs}.{:06}s", nanos / 1_000)
        } else {
            write!(f, "{secs}.{nanos:09}s")
        }
    }
}

impl FromStr for ProtoDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if s.starts_with('-') {
            return Err(ParseError::Negative);
        }
        let mut rest = s.trim_start_matches('+');
        if rest == "0" {
            return Ok(Self::ZERO);
        }

        let mut total = Duration::ZERO;
        while !rest.is_empty() {
            let value_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| ParseError::NoUnit(s.to_string()))?;
            let (value, tail) = rest.split_at(value_end);
            let unit_end = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_end);

            let value = value
                .parse::<f64>()
                .map_err(|_| ParseError::NotANumber(value.to_string()))?;
            let base = match unit {
                "ns" => Duration::from_nanos(1),
                "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
                "ms" => Duration::from_millis(1),
                "s" => Duration::from_secs(1),
                "m" => Duration::from_secs(60),
                "h" => Duration::from_secs(60 * 60),
                unit => return Err(ParseError::InvalidUnit(unit.to_string())),
            };
            total += base.mul_f64(value);
            rest = tail;
        }

        Ok(Self(total))
    }
}

impl Serialize for ProtoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProtoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = ProtoDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a duration string such as \"1.5s\" or \"1m30s\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for ProtoDuration {
    fn schema_name() -> String {
        "Duration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            ..Default::default()
        }
        .into()
    }
}
