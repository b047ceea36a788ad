//! Runtime configuration: aggregates the CLI surface into one struct, with
//! environment-variable overrides layered on top.

pub mod credentials;

use std::net::SocketAddr;
use std::time::Duration;

use crate::driver::{ConnectOptions, ConsistencyLevel};
use crate::host::DEFAULT_NATIVE_PORT;
use crate::probes::ProbeType;
use crate::scheduler::Trigger;

pub const ENV_CONTACT_POINTS: &str = "CASSANDRA_PROBE_CONTACT_POINTS";
pub const ENV_USERNAME: &str = "CASSANDRA_PROBE_USERNAME";
pub const ENV_PASSWORD: &str = "CASSANDRA_PROBE_PASSWORD";
pub const ENV_LOG_DIR: &str = "CASSANDRA_PROBE_LOG_DIR";

#[derive(Debug, Clone)]
pub struct ProbeRuntimeConfig {
    pub contact_points: Vec<SocketAddr>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub tls: bool,
    pub consistency: ConsistencyLevel,
    pub test_query: String,
    pub socket_timeout: Duration,
    pub query_timeout: Duration,
    pub tracing_enabled: bool,
    pub probe_types: Vec<ProbeType>,
    pub concurrency: usize,
    pub interval: Option<Duration>,
    pub cron_expr: Option<String>,
    pub max_duration: Option<Duration>,
    pub max_runs: Option<u64>,
    pub concurrent_execution_allowed: bool,
    pub log_dir: Option<String>,
}

impl ProbeRuntimeConfig {
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            contact_points: self.contact_points.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            connect_timeout: self.connect_timeout,
            tls: self.tls,
        }
    }

    pub fn trigger(&self) -> crate::error::Result<Trigger> {
        crate::scheduler::SchedulerConfig::resolve_trigger(self.interval, self.cron_expr.clone())
    }

    /// Layers environment-variable overrides on top of CLI-sourced values.
    /// Unset or unparseable environment variables are left as-is rather
    /// than clearing an already-configured field.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_CONTACT_POINTS) {
            let parsed: Vec<SocketAddr> = raw
                .split(',')
                .filter_map(|entry| parse_contact_point(entry.trim()))
                .collect();
            if !parsed.is_empty() {
                self.contact_points = parsed;
            }
        }
        if let Ok(username) = std::env::var(ENV_USERNAME) {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var(ENV_PASSWORD) {
            self.password = Some(password);
        }
        if let Ok(log_dir) = std::env::var(ENV_LOG_DIR) {
            self.log_dir = Some(log_dir);
        }
    }

    pub fn apply_credentials_file(&mut self, creds: &credentials::Credentials) {
        if self.username.is_none() {
            self.username = creds.username.clone();
        }
        if self.password.is_none() {
            self.password = creds.password.clone();
        }
        if let (true, Some(hostname)) = (self.contact_points.is_empty(), &creds.hostname) {
            let port = creds.port.unwrap_or(DEFAULT_NATIVE_PORT);
            if let Some(addr) = parse_contact_point(&format!("{hostname}:{port}")) {
                self.contact_points = vec![addr];
            }
        }
        if let Some(timeout_secs) = creds.timeout_secs {
            self.connect_timeout = Duration::from_secs(timeout_secs);
        }
    }
}

fn parse_contact_point(entry: &str) -> Option<SocketAddr> {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Some(addr);
    }
    let ip: std::net::IpAddr = entry.parse().ok()?;
    Some(SocketAddr::new(ip, DEFAULT_NATIVE_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ip_defaults_to_native_port() {
        let addr = parse_contact_point("10.0.0.1").unwrap();
        assert_eq!(addr.port(), DEFAULT_NATIVE_PORT);
    }

    #[test]
    fn ip_with_explicit_port_is_preserved() {
        let addr = parse_contact_point("10.0.0.1:9999").unwrap();
        assert_eq!(addr.port(), 9999);
    }

    #[test]
    fn credentials_file_fills_empty_contact_points() {
        let mut config = ProbeRuntimeConfig {
            contact_points: vec![],
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(5),
            tls: false,
            consistency: ConsistencyLevel::One,
            test_query: "SELECT now() FROM system.local".to_string(),
            socket_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
            tracing_enabled: false,
            probe_types: ProbeType::all().to_vec(),
            concurrency: 8,
            interval: Some(Duration::from_secs(60)),
            cron_expr: None,
            max_duration: None,
            max_runs: None,
            concurrent_execution_allowed: false,
            log_dir: None,
        };
        let creds = credentials::Credentials {
            hostname: Some("10.0.0.5".to_string()),
            port: Some(9043),
            ..Default::default()
        };
        config.apply_credentials_file(&creds);
        assert_eq!(config.contact_points.len(), 1);
        assert_eq!(config.contact_points[0].port(), 9043);
    }

    #[test]
    fn cli_values_are_not_overwritten_by_credentials_file() {
        let mut config = ProbeRuntimeConfig {
            contact_points: vec!["10.0.0.1:9042".parse().unwrap()],
            username: Some("cli_user".to_string()),
            password: None,
            connect_timeout: Duration::from_secs(5),
            tls: false,
            consistency: ConsistencyLevel::One,
            test_query: "SELECT now() FROM system.local".to_string(),
            socket_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
            tracing_enabled: false,
            probe_types: ProbeType::all().to_vec(),
            concurrency: 8,
            interval: Some(Duration::from_secs(60)),
            cron_expr: None,
            max_duration: None,
            max_runs: None,
            concurrent_execution_allowed: false,
            log_dir: None,
        };
        let creds = credentials::Credentials {
            username: Some("file_user".to_string()),
            hostname: Some("10.0.0.9".to_string()),
            ..Default::default()
        };
        config.apply_credentials_file(&creds);
        assert_eq!(config.username.as_deref(), Some("cli_user"));
        assert_eq!(config.contact_points[0].ip().to_string(), "10.0.0.1");
    }
}
