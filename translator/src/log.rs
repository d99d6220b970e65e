use std::{io, str::FromStr};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Selects how log events are written to stderr.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, thiserror::Error)]
#[error("invalid log format {0:?}: expected 'plain' or 'json'")]
pub struct InvalidLogFormat(String);

// === impl LogFormat ===

impl LogFormat {
    /// Installs the global subscriber.
    ///
    /// Stdout is reserved for translated objects, so all events go to stderr.
    pub fn try_init(self, filter: &str) -> Result<(), LogInitError> {
        let filter = EnvFilter::try_new(filter)?;
        let registry = tracing_subscriber::registry().with(filter);
        match self {
            Self::Plain => registry
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .try_init()?,
            Self::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_writer(io::stderr),
                )
                .try_init()?,
        }
        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = InvalidLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            s => Err(InvalidLogFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_formats() {
        assert_eq!("plain".parse::<LogFormat>().unwrap(), LogFormat::Plain);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(
            "xml".parse::<LogFormat>().unwrap_err().to_string(),
            "invalid log format \"xml\": expected 'plain' or 'json'"
        );
    }
}
