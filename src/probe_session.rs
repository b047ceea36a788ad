//! The probe `Session` record (distinct from the driver's `ClientSession`):
//! one per orchestration tick, frozen once closed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::probes::ProbeResult;
use crate::topology::Topology;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSession {
    pub id: Uuid,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub results: Vec<ProbeResult>,
    pub topology: Option<Topology>,
    pub failed: bool,
}

impl ProbeSession {
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time: chrono::Utc::now(),
            end_time: None,
            results: Vec::new(),
            topology: None,
            failed: false,
        }
    }

    pub fn close(&mut self) {
        self.end_time = Some(chrono::Utc::now());
    }

    pub fn duration(&self) -> chrono::Duration {
        match self.end_time {
            Some(end) => end - self.start_time,
            None => chrono::Duration::zero(),
        }
    }

    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.failed && self.successful_count() == self.total_count() && self.total_count() > 0
    }

    /// `Summary: K/N successful` — the console surface's final line,
    /// defined here so every output format shares one source of truth.
    pub fn summary_line(&self) -> String {
        format!("Summary: {}/{} successful", self.successful_count(), self.total_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_zero_before_close() {
        let session = ProbeSession::start();
        assert_eq!(session.duration(), chrono::Duration::zero());
    }

    #[test]
    fn duration_is_nonnegative_after_close() {
        let mut session = ProbeSession::start();
        session.close();
        assert!(session.duration() >= chrono::Duration::zero());
    }

    #[test]
    fn summary_line_matches_expected_format() {
        let session = ProbeSession::start();
        assert_eq!(session.summary_line(), "Summary: 0/0 successful");
    }

    #[test]
    fn round_trips_through_json() {
        use pretty_assertions::assert_eq;

        let mut session = ProbeSession::start();
        session.close();
        let json = serde_json::to_string(&session).unwrap();
        let decoded: ProbeSession = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, session.id);
        assert_eq!(decoded.start_time, session.start_time);
        assert_eq!(decoded.end_time, session.end_time);
    }
}
