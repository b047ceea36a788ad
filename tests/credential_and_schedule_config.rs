//! Integration coverage for the config surface that does not require a live
//! cluster: the credentials-file parser and the scheduler's trigger
//! resolution/validation.

mod common;

use std::time::Duration;

use cassandra_probe::config::credentials;
use cassandra_probe::scheduler::{SchedulerConfig, Trigger};

#[test]
fn credential_file_round_trip_parses_every_known_field() {
    common::init_tracing();

    let contents = "\
[authentication]
username = probe_user
password = hunter2

[connection]
hostname = cassandra.internal
port = 9142
timeout = 15 ; seconds

[ssl]
certfile = /etc/probe/cert.pem
keyfile = /etc/probe/key.pem
ca_certs = /etc/probe/ca.pem
validate = true
";

    let creds = credentials::parse(contents).expect("well-formed credential file parses");
    assert_eq!(creds.username.as_deref(), Some("probe_user"));
    assert_eq!(creds.password.as_deref(), Some("hunter2"));
    assert_eq!(creds.hostname.as_deref(), Some("cassandra.internal"));
    assert_eq!(creds.port, Some(9142));
    assert_eq!(creds.timeout_secs, Some(15));
    assert_eq!(creds.validate, Some(true));
}

#[test]
fn nonexistent_field_under_known_section_is_silently_ignored() {
    common::init_tracing();

    let contents = "[connection]\nunknown_key = whatever\nhostname = 10.1.1.1\n";
    let creds = credentials::parse(contents).expect("unknown keys within a known section are ignored");
    assert_eq!(creds.hostname.as_deref(), Some("10.1.1.1"));
}

#[test]
fn scheduler_rejects_invalid_cron_as_configuration_error() {
    let result = SchedulerConfig::resolve_trigger(None, Some("nonsense cron".to_string()));
    assert!(result.is_err(), "an invalid cron expression must be a fatal configuration error");
}

#[test]
fn scheduler_prefers_interval_when_both_are_configured() {
    let trigger = SchedulerConfig::resolve_trigger(
        Some(Duration::from_secs(30)),
        Some("*/5 * * * * *".to_string()),
    )
    .expect("interval + cron together is not itself an error");

    match trigger {
        Trigger::Interval(duration) => assert_eq!(duration, Duration::from_secs(30)),
        Trigger::Cron(_) => panic!("interval should win when both are configured"),
    }
}
