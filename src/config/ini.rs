//! INI front end for [`CourierConfig`].
//!
//! Files are read as bytes, decoded with `encoding_rs` (UTF-8 unless a label
//! is supplied) and parsed with `rust-ini`. Keys map one-to-one onto the
//! typed config structs; unknown sections and keys are rejected so typos do
//! not silently fall back to defaults. Empty values keep the default.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use encoding_rs::Encoding;
use ini::Ini;

use super::{ConfigError, CourierConfig};
use crate::level::LevelMask;

/// Read, decode, parse and validate the configuration file at `path`.
pub fn load_config(path: &Path, encoding: Option<&str>) -> Result<CourierConfig, ConfigError> {
    let bytes = read_file_bytes(path)?;
    if bytes.is_empty() {
        return Err(ConfigError::Empty(path.to_path_buf()));
    }
    let text = decode_with_encoding(&bytes, encoding.unwrap_or("utf-8"))?;
    parse_config(&text, &path.display().to_string())
}

/// Parse and validate INI text. `origin` names the source in errors.
pub fn parse_config(text: &str, origin: &str) -> Result<CourierConfig, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse {
        origin: origin.to_owned(),
        message: err.to_string(),
    })?;
    let mut config = CourierConfig::default();
    for (section, props) in ini.iter() {
        let Some(section) = section else {
            if let Some((key, _)) = props.iter().next() {
                return Err(ConfigError::UnknownKey {
                    section: "DEFAULT".to_owned(),
                    key: key.to_owned(),
                });
            }
            continue;
        };
        for (key, value) in props.iter() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            apply(&mut config, section, key, value)?;
        }
    }
    config.validate()?;
    Ok(config)
}

fn read_file_bytes(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source: err,
        },
    })
}

fn decode_with_encoding(bytes: &[u8], label: &str) -> Result<String, ConfigError> {
    let normalized_label = label.trim().to_ascii_lowercase();
    let encoding = Encoding::for_label(normalized_label.as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_owned()))?;
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(ConfigError::Decode(encoding.name()));
    }
    Ok(decoded.into_owned())
}

fn apply(config: &mut CourierConfig, section: &str, key: &str, value: &str) -> Result<(), ConfigError> {
    let field = Field { section, key, value };
    match (section, key) {
        ("app", "name") => config.app.name = value.to_owned(),
        ("app", "version") => config.app.version = value.to_owned(),

        ("queue", "host") => config.queue.host = value.to_owned(),
        ("queue", "port") => config.queue.port = field.parse()?,
        ("queue", "vhost") => config.queue.vhost = value.to_owned(),
        ("queue", "user") => config.queue.user = value.to_owned(),
        ("queue", "password") => config.queue.password = value.to_owned(),
        ("queue", "poll_interval") => config.queue.poll_interval = Duration::from_millis(field.parse()?),

        ("request", "schema") => config.request.schema = value.to_owned(),
        ("request", "host") => config.request.host = value.to_owned(),
        ("request", "path") => config.request.path = value.to_owned(),
        ("request", "timeout") => config.request.timeout = Duration::from_secs(field.parse()?),

        ("logger", "log_file") => config.logger.log_file = PathBuf::from(value),
        ("logger", "max_file_size") => config.logger.max_file_size = field.parse::<u64>()?.max(1),
        ("logger", "max_log_files") => config.logger.max_log_files = field.parse::<usize>()?.max(1),
        ("logger", "levels") => config.logger.levels = field.parse::<LevelMask>()?,
        ("logger", "categories") => config.logger.categories = split_list(value),
        ("logger", "except") => config.logger.except = split_list(value),
        ("logger", "trace_level") => config.logger.trace_level = field.parse()?,
        ("logger", "file_mode") => config.logger.file_mode = Some(field.octal()?),
        ("logger", "dir_mode") => config.logger.dir_mode = field.octal()?,

        ("command", "queue") => config.command.queue = value.to_owned(),
        ("command", "retry_limit") => config.command.retry_limit = field.parse()?,
        ("command", "requeue_delay") => config.command.requeue_delay = Duration::from_millis(field.parse()?),
        ("command", "exchange") => config.command.exchange = value.to_owned(),

        ("app" | "queue" | "request" | "logger" | "command", _) => {
            return Err(ConfigError::UnknownKey {
                section: section.to_owned(),
                key: key.to_owned(),
            });
        }
        _ => return Err(ConfigError::UnknownSection(section.to_owned())),
    }
    Ok(())
}

struct Field<'a> {
    section: &'a str,
    key: &'a str,
    value: &'a str,
}

impl Field<'_> {
    fn invalid(&self, reason: impl ToString) -> ConfigError {
        ConfigError::InvalidValue {
            section: self.section.to_owned(),
            key: self.key.to_owned(),
            value: self.value.to_owned(),
            reason: reason.to_string(),
        }
    }

    fn parse<T>(&self) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: ToString,
    {
        self.value.parse().map_err(|err| self.invalid(err))
    }

    /// Permission bits written as octal, with or without a `0`/`0o` prefix.
    fn octal(&self) -> Result<u32, ConfigError> {
        let digits = self.value.strip_prefix("0o").unwrap_or(self.value);
        let mode = u32::from_str_radix(digits, 8).map_err(|err| self.invalid(err))?;
        if mode > 0o7777 {
            return Err(self.invalid("permission bits out of range"));
        }
        Ok(mode)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}
