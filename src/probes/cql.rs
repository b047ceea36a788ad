//! CQL query probe: validates the statement is SELECT/INSERT/UPDATE before
//! ever reaching the driver, then executes it with the configured
//! consistency level and timeout.

use async_trait::async_trait;

use super::{timed, MetadataValue, Probe, ProbeContext, ProbeResult, ProbeType};
use crate::host::Host;

pub struct CqlQueryProbe;

#[async_trait]
impl Probe for CqlQueryProbe {
    fn probe_type(&self) -> ProbeType {
        ProbeType::CqlQuery
    }

    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult {
        if let Err(message) = validate_statement(&context.test_query) {
            return ProbeResult::failure(
                host.id.clone(),
                ProbeType::CqlQuery,
                std::time::Duration::ZERO,
                message,
            );
        }

        let query = context.test_query.clone();
        let consistency = context.consistency;
        let query_timeout = context.query_timeout;
        let tracing_enabled = context.tracing_enabled;
        let session = context.session.clone();

        timed(host, ProbeType::CqlQuery, || async move {
            match session
                .execute_query(&query, consistency, query_timeout, tracing_enabled)
                .await
            {
                Ok(outcome) => {
                    let mut metadata = std::collections::HashMap::new();
                    metadata.insert("RowCount".to_string(), MetadataValue::Integer(outcome.row_count as i64));
                    if let Some(trace_id) = outcome.tracing_id {
                        metadata.insert("TraceId".to_string(), trace_id.to_string().into());
                    }
                    if let Some(coordinator) = outcome.coordinator {
                        metadata.insert("Coordinator".to_string(), coordinator.to_string().into());
                    }
                    Ok(metadata)
                }
                Err(e) => Err(classify_message(&e)),
            }
        })
        .await
    }
}

/// Only SELECT/INSERT/UPDATE statements are accepted; everything else is
/// rejected pre-flight so the probe never reaches the driver.
fn validate_statement(statement: &str) -> Result<(), String> {
    let trimmed = statement.trim_start();
    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();

    match first_word.as_str() {
        "SELECT" | "INSERT" | "UPDATE" => Ok(()),
        _ => Err(
            "Invalid query type: Only SELECT, INSERT, and UPDATE are allowed".to_string(),
        ),
    }
}

/// Classifies known driver errors into specific messages; anything else
/// collapses to a generic query-error message.
fn classify_message(error: &crate::error::Error) -> String {
    use crate::error::ErrorKind;
    match error.kind() {
        ErrorKind::Authentication { message } => format!("Authentication failed: {message}"),
        ErrorKind::Authorization { message } => format!("Authorization failed: {message}"),
        ErrorKind::Validation { message } => format!("Syntax error: {message}"),
        ErrorKind::Timeout { elapsed_ms } => format!("Query timed out after {elapsed_ms}ms"),
        ErrorKind::NoHostAvailable { message } => format!("No host available: {message}"),
        _ => format!("Query error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_drop_statement() {
        assert!(validate_statement("DROP TABLE x").is_err());
    }

    #[test]
    fn rejects_delete_statement() {
        assert!(validate_statement("DELETE FROM x WHERE id = 1").is_err());
    }

    #[test]
    fn accepts_select_insert_update_case_insensitively() {
        assert!(validate_statement("select * from system.local").is_ok());
        assert!(validate_statement("INSERT INTO t (a) VALUES (1)").is_ok());
        assert!(validate_statement("Update t set a = 1 where id = 1").is_ok());
    }

    #[tokio::test]
    async fn invalid_query_does_not_reach_the_driver() {
        use std::net::{IpAddr, Ipv4Addr};
        let host = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9042);
        let mut context = super::super::tests_support::context_for_test();
        context.test_query = "DROP TABLE x".to_string();
        let probe = CqlQueryProbe;
        let result = probe.execute(&host, &context).await;
        assert!(!result.success);
        assert_eq!(result.duration, std::time::Duration::ZERO);
        assert!(result
            .error_message
            .unwrap()
            .contains("Only SELECT, INSERT, and UPDATE are allowed"));
    }
}
