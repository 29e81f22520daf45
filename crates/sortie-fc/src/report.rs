use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::LinkError;
use crate::link::VehicleLink;
use crate::state::LinkStatus;

/// Background position / flight-mode reporting. Runs beside a launch and
/// never waits on it.
pub struct Reporter {
    position: JoinHandle<()>,
    mode: JoinHandle<()>,
}

impl Reporter {
    pub fn stop(self) {
        self.position.abort();
        self.mode.abort();
    }
}

/// Spawn the two reporting loops. Each takes the next sample, logs it, updates
/// `status`, then waits at least `min_interval` before sampling again.
pub fn spawn_reporter(link: Arc<dyn VehicleLink>, min_interval: Duration, status: Arc<Mutex<LinkStatus>>) -> Reporter {
    let position = {
        let link = link.clone();
        let status = status.clone();
        tokio::spawn(async move {
            loop {
                match link.read_position().await {
                    Ok(pos) => {
                        info!("telemetry: current pos {}", pos);
                        if let Ok(mut st) = status.lock() {
                            st.record_position(pos);
                        }
                    }
                    Err(LinkError::Closed) => break,
                    Err(e) => warn!("telemetry: position read failed: {}", e),
                }
                tokio::time::sleep(min_interval).await;
            }
        })
    };

    let mode = tokio::spawn(async move {
        loop {
            match link.read_flight_mode().await {
                Ok(mode) => {
                    info!("telemetry: flight mode {}", mode);
                    if let Ok(mut st) = status.lock() {
                        st.record_mode(mode);
                    }
                }
                Err(LinkError::Closed) => break,
                Err(e) => warn!("telemetry: flight mode read failed: {}", e),
            }
            tokio::time::sleep(min_interval).await;
        }
    });

    Reporter { position, mode }
}
