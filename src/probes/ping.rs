//! Ping probe: ICMP echo with a TCP-connect fallback when ICMP is
//! unavailable (permission denied or unsupported platform).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use surge_ping::{Client, Config, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{timed, Probe, ProbeContext, ProbeResult, ProbeType};
use crate::host::Host;

pub struct PingProbe;

#[async_trait]
impl Probe for PingProbe {
    fn probe_type(&self) -> ProbeType {
        ProbeType::Ping
    }

    async fn execute(&self, host: &Host, context: &ProbeContext) -> ProbeResult {
        let address = host.address();
        let native_port = host.native_port();
        let icmp_timeout = context.socket_timeout;
        let cancellation = context.cancellation.clone();

        timed(host, ProbeType::Ping, || async move {
            match icmp_echo(address, icmp_timeout).await {
                Ok(()) => Ok(Default::default()),
                Err(icmp_err) => {
                    tracing::debug!(
                        target: "cassandra_probe::probes::ping",
                        host = %address,
                        error = %icmp_err,
                        "ICMP unavailable, falling back to TCP connect",
                    );
                    let start = Instant::now();
                    let fallback = tokio::select! {
                        result = timeout(icmp_timeout, TcpStream::connect((address, native_port))) => result,
                        _ = cancellation.cancelled() => return Err("cancelled".to_string()),
                    };
                    match fallback {
                        Ok(Ok(_stream)) => {
                            let mut metadata = std::collections::HashMap::new();
                            metadata.insert("FallbackMethod".to_string(), "TCP".into());
                            metadata.insert(
                                "FallbackLatencyMs".to_string(),
                                (start.elapsed().as_millis() as i64).into(),
                            );
                            Ok(metadata)
                        }
                        Ok(Err(e)) => Err(format!("ICMP failed ({icmp_err}) and TCP fallback failed: {e}")),
                        Err(_) => Err(format!(
                            "ICMP failed ({icmp_err}) and TCP fallback timed out"
                        )),
                    }
                }
            }
        })
        .await
    }
}

async fn icmp_echo(address: std::net::IpAddr, timeout_dur: Duration) -> Result<(), String> {
    let config = Config::default();
    let client = Client::new(&config).map_err(|e| format!("cannot create ICMP client: {e}"))?;
    let mut pinger = client
        .pinger(address, PingIdentifier(rand::random()))
        .await;
    pinger.timeout(timeout_dur);

    match pinger.ping(PingSequence(0), &[]).await {
        Ok(_reply) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}
