//! Socket probe: open TCP to `(host.address, host.native_port)`.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{timed, Probe, ProbeContext, ProbeResult, ProbeType};
use crate::host::Host;

const MAX_RETRIES: u32 = 2;
const BASE_BACKOFF: Duration = Duration::from_secs(2);

pub struct SocketProbe;

#[async_trait]
impl Probe for SocketProbe {
    fn probe_type(&self) -> ProbeType {
        ProbeType::Socket
    }

    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult {
        let address = (host.address(), host.native_port());
        timed(host, ProbeType::Socket, || async move {
            let mut attempt = 0;
            let mut backoff = BASE_BACKOFF;
            loop {
                if context.cancellation.is_cancelled() {
                    return Err("cancelled".to_string());
                }
                let connect = timeout(context.socket_timeout, TcpStream::connect(address));
                let outcome = tokio::select! {
                    result = connect => result,
                    _ = context.cancellation.cancelled() => return Err("cancelled".to_string()),
                };
                match outcome {
                    Ok(Ok(_stream)) => return Ok(Default::default()),
                    Ok(Err(e)) if attempt < MAX_RETRIES && is_transient(&e) => {
                        attempt += 1;
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = context.cancellation.cancelled() => return Err("cancelled".to_string()),
                        }
                        backoff *= 2;
                    }
                    Ok(Err(e)) => return Err(e.to_string()),
                    Err(_) => return Err("socket connect timed out".to_string()),
                }
            }
        })
        .await
    }
}

fn is_transient(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::WouldBlock
    )
}
