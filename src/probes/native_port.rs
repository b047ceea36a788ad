//! Native port probe: TCP-connect then send a minimal protocol OPTIONS
//! frame and confirm the 9-byte SUPPORTED response header, distinguishing
//! "this is a CQL endpoint" from "some socket happens to be open".

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{timed, Probe, ProbeContext, ProbeResult, ProbeType};
use crate::host::Host;

/// Protocol v4 OPTIONS frame: version/flags/stream/opcode/zero-length body.
pub const OPTIONS_FRAME: [u8; 9] = [0x04, 0x00, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00];
const SUPPORTED_OPCODE: u8 = 0x06;
const OPCODE_OFFSET: usize = 4;

pub struct NativePortProbe;

#[async_trait]
impl Probe for NativePortProbe {
    fn probe_type(&self) -> ProbeType {
        ProbeType::NativePort
    }

    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult {
        let address = (host.address(), host.native_port());
        let socket_timeout = context.socket_timeout;
        let cancellation = context.cancellation.clone();

        timed(host, ProbeType::NativePort, || async move {
            let mut stream = tokio::select! {
                result = timeout(socket_timeout, TcpStream::connect(address)) => result
                    .map_err(|_| "connect timed out".to_string())?
                    .map_err(|e| e.to_string())?,
                _ = cancellation.cancelled() => return Err("cancelled".to_string()),
            };

            tokio::select! {
                result = timeout(socket_timeout, stream.write_all(&OPTIONS_FRAME)) => result
                    .map_err(|_| "write timed out".to_string())?
                    .map_err(|e| e.to_string())?,
                _ = cancellation.cancelled() => return Err("cancelled".to_string()),
            };

            let mut header = [0u8; 9];
            tokio::select! {
                result = timeout(socket_timeout, stream.read_exact(&mut header)) => result
                    .map_err(|_| "read timed out".to_string())?
                    .map_err(|e| e.to_string())?,
                _ = cancellation.cancelled() => return Err("cancelled".to_string()),
            };

            if header[OPCODE_OFFSET] == SUPPORTED_OPCODE {
                Ok(Default::default())
            } else {
                Err(format!(
                    "unexpected opcode 0x{:02x}, expected SUPPORTED (0x{:02x})",
                    header[OPCODE_OFFSET], SUPPORTED_OPCODE
                ))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_frame_matches_expected_bytes() {
        assert_eq!(
            OPTIONS_FRAME,
            [0x04, 0x00, 0x00, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn handshake_against_closed_port_fails_cleanly() {
        use std::net::{IpAddr, Ipv4Addr};
        let host = Host::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 1);
        let context = super::super::tests_support::context_for_test();
        let probe = NativePortProbe;
        let result = probe.execute(&host, &context).await;
        assert!(!result.success);
        assert!(result.invariant_holds());
    }
}
