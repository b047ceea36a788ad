//! INI-style credentials file parser: `[authentication]`, `[connection]`,
//! `[ssl]` sections. Unknown sections are skipped without error, so a file
//! shared with other tools never fails to parse here.

use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub certfile: Option<String>,
    pub keyfile: Option<String>,
    pub ca_certs: Option<String>,
    pub validate: Option<bool>,
}

const KNOWN_SECTIONS: [&str; 3] = ["authentication", "connection", "ssl"];

pub fn parse(contents: &str) -> Result<Credentials> {
    let mut creds = Credentials::default();
    let mut current_section: Option<String> = None;

    for (line_number, raw_line) in contents.lines().enumerate() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') {
            let section = line
                .strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .ok_or_else(|| {
                    Error::from(ErrorKind::Configuration {
                        message: format!("malformed section header at line {}", line_number + 1),
                    })
                })?
                .trim()
                .to_ascii_lowercase();
            current_section = Some(section);
            continue;
        }

        let section = match &current_section {
            Some(section) => section,
            None => {
                return Err(Error::from(ErrorKind::Configuration {
                    message: format!("key outside any section at line {}", line_number + 1),
                }))
            }
        };

        if !KNOWN_SECTIONS.contains(&section.as_str()) {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::from(ErrorKind::Configuration {
                message: format!("expected `key = value` at line {}", line_number + 1),
            })
        })?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        apply_field(&mut creds, section, &key, value, line_number + 1)?;
    }

    Ok(creds)
}

fn apply_field(
    creds: &mut Credentials,
    section: &str,
    key: &str,
    value: &str,
    line_number: usize,
) -> Result<()> {
    match (section, key) {
        ("authentication", "username") => creds.username = Some(value.to_string()),
        ("authentication", "password") => creds.password = Some(value.to_string()),
        ("connection", "hostname") => creds.hostname = Some(value.to_string()),
        ("connection", "port") => {
            creds.port = Some(parse_int(value, line_number)?);
        }
        ("connection", "timeout") => {
            creds.timeout_secs = Some(parse_int(value, line_number)?);
        }
        ("ssl", "certfile") => creds.certfile = Some(value.to_string()),
        ("ssl", "keyfile") => creds.keyfile = Some(value.to_string()),
        ("ssl", "ca_certs") => creds.ca_certs = Some(value.to_string()),
        ("ssl", "validate") => creds.validate = Some(parse_bool(value)),
        _ => {}
    }
    Ok(())
}

fn parse_int<T: std::str::FromStr>(value: &str, line_number: usize) -> Result<T> {
    value.parse().map_err(|_| {
        Error::from(ErrorKind::Configuration {
            message: format!("expected an integer at line {line_number}, got {value:?}"),
        })
    })
}

/// Anything other than `"true"`/`"1"` (case-insensitive) is false, matching
/// a permissive driver-config convention rather than erroring on typos.
fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1")
}

/// Strips a trailing `#`/`;` comment, including one that starts mid-line
/// after a value (`port = 9042 # native port`).
fn strip_comment(line: &str) -> &str {
    let cut = line
        .char_indices()
        .find(|(_, c)| *c == '#' || *c == ';')
        .map(|(idx, _)| idx);
    match cut {
        Some(idx) => &line[..idx],
        None => line,
    }
}
