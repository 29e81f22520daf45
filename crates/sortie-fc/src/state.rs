use sortie_proto::{FlightMode, Position};
use std::time::{Duration, Instant};

/// Latest telemetry seen by the reporter.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub connected: bool,
    pub url: Option<String>,
    pub position: Option<Position>,
    pub flight_mode: Option<FlightMode>,
    pub last_update: Option<Instant>,
}

impl LinkStatus {
    pub fn new(url: &str) -> Self {
        Self { url: Some(url.to_string()), ..Self::default() }
    }

    pub fn age(&self) -> Option<Duration> {
        self.last_update.map(|t| t.elapsed())
    }

    pub fn record_position(&mut self, pos: Position) {
        self.connected = true;
        self.position = Some(pos);
        self.last_update = Some(Instant::now());
    }

    pub fn record_mode(&mut self, mode: FlightMode) {
        self.connected = true;
        self.flight_mode = Some(mode);
        self.last_update = Some(Instant::now());
    }
}
