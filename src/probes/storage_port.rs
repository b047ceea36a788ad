//! Storage port probe: TCP-connect to the inter-node (gossip) port. Success
//! on connect alone — the gossip protocol itself is never spoken.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{timed, Probe, ProbeContext, ProbeResult, ProbeType};
use crate::host::{Host, DEFAULT_SECURE_STORAGE_PORT};

pub struct StoragePortProbe;

#[async_trait]
impl Probe for StoragePortProbe {
    fn probe_type(&self) -> ProbeType {
        ProbeType::StoragePort
    }

    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult {
        let address = (host.address(), host.storage_port);
        let is_secure_default = host.storage_port == DEFAULT_SECURE_STORAGE_PORT;
        let socket_timeout = context.socket_timeout;
        let cancellation = context.cancellation.clone();

        timed(host, ProbeType::StoragePort, || async move {
            let outcome = tokio::select! {
                result = timeout(socket_timeout, TcpStream::connect(address)) => result,
                _ = cancellation.cancelled() => return Err("cancelled".to_string()),
            };
            match outcome {
                Ok(Ok(_stream)) => {
                    let mut metadata = std::collections::HashMap::new();
                    if is_secure_default {
                        metadata.insert("PortType".to_string(), "SecureStorage".into());
                    }
                    Ok(metadata)
                }
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("storage port connect timed out".to_string()),
            }
        })
        .await
    }
}
