//! INI configuration loading.
//!
//! Reads handler options from one section of an INI file and turns them into
//! a [`LogstashHandlerBuilder`]. Recognised keys mirror the builder setters:
//!
//! ```ini
//! [logstash]
//! host = logs.internal
//! port = 5044
//! tls_enabled = true
//! tls_verify = false
//! queue_capacity = 10000
//! backpressure_policy = drop-oldest
//! backoff_initial_ms = 100
//! backoff_max_ms = 10000
//! backoff_multiplier = 2.0
//! field.service = billing
//! ```
//!
//! `queue_capacity = unbounded` keeps the default unbounded queue. Keys of the
//! form `field.<name>` become static fields in every JSON document.

use std::{fs, io, path::Path, str::FromStr};

use ini::Ini;
use thiserror::Error;

use crate::handlers::{BackoffOverrides, HandlerBuildError, LogstashHandlerBuilder};

const FIELD_PREFIX: &str = "field.";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} is an empty file")]
    Empty(String),
    #[error("invalid ini syntax: {0}")]
    Parse(#[from] ini::ParseError),
    #[error("section [{0}] not found")]
    MissingSection(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("unknown key {0:?}")]
    UnknownKey(String),
    #[error(transparent)]
    Build(#[from] HandlerBuildError),
}

/// Load `section` from the INI file at `path`.
pub fn builder_from_ini(
    path: impl AsRef<Path>,
    section: &str,
) -> Result<LogstashHandlerBuilder, ConfigFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ConfigFileError::Empty(path.display().to_string()));
    }
    builder_from_ini_str(&text, section)
}

/// Load `section` from INI `text`.
pub fn builder_from_ini_str(
    text: &str,
    section: &str,
) -> Result<LogstashHandlerBuilder, ConfigFileError> {
    let ini = Ini::load_from_str(text)?;
    let props = ini
        .section(Some(section))
        .ok_or_else(|| ConfigFileError::MissingSection(section.to_owned()))?;

    let mut builder = LogstashHandlerBuilder::new();
    let mut backoff = BackoffOverrides::new();
    let mut host = None;
    let mut port = None;
    let mut tls_enabled = false;
    let mut tls_verify = true;

    for (key, value) in props.iter() {
        let value = value.trim();
        if let Some(name) = key.strip_prefix(FIELD_PREFIX) {
            builder = builder.with_static_field(name, value);
            continue;
        }
        builder = match key {
            "host" => {
                host = Some(value.to_owned());
                builder
            }
            "port" => {
                port = Some(parse_value::<u16>(key, value)?);
                builder
            }
            "tls_enabled" => {
                tls_enabled = parse_bool(key, value)?;
                builder
            }
            "tls_verify" => {
                tls_verify = parse_bool(key, value)?;
                builder
            }
            "tls_domain" => builder.with_tls_domain(value),
            "queue_capacity" if value.eq_ignore_ascii_case("unbounded") => builder,
            "queue_capacity" => builder.with_capacity(parse_value(key, value)?),
            "backpressure_policy" => builder.with_policy_str(value)?,
            "enqueue_timeout_ms" => builder.with_enqueue_timeout_ms(parse_value(key, value)?),
            "connect_timeout_ms" => builder.with_connect_timeout_ms(parse_value(key, value)?),
            "write_timeout_ms" => builder.with_write_timeout_ms(parse_value(key, value)?),
            "drain_timeout_ms" => builder.with_drain_timeout_ms(parse_value(key, value)?),
            "warn_interval_ms" => builder.with_warn_interval_ms(parse_value(key, value)?),
            "max_frame_size" => builder.with_max_frame_size(parse_value(key, value)?),
            "source_host" => builder.with_source_host(value),
            "backoff_initial_ms" => {
                backoff = backoff.with_initial_ms(parse_value(key, value)?);
                builder
            }
            "backoff_max_ms" => {
                backoff = backoff.with_max_ms(parse_value(key, value)?);
                builder
            }
            "backoff_multiplier" => {
                backoff = backoff.with_multiplier(parse_value(key, value)?);
                builder
            }
            other => return Err(ConfigFileError::UnknownKey(other.to_owned())),
        };
    }

    let Some(host) = host else {
        return Err(ConfigFileError::Build(HandlerBuildError::InvalidConfig(
            "handler requires a tcp endpoint".into(),
        )));
    };
    let Some(port) = port else {
        return Err(ConfigFileError::InvalidValue {
            key: "port".into(),
            value: String::new(),
            reason: "port is required when host is set".into(),
        });
    };
    builder = builder.with_tcp(host, port).with_backoff(backoff);
    if tls_enabled {
        builder = builder.with_tls(tls_verify);
    }
    builder.build_config()?;
    Ok(builder)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigFileError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigFileError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigFileError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: "expected a boolean".into(),
        }),
    }
}
