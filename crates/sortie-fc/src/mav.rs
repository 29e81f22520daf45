use anyhow::{Context, Result};
use async_trait::async_trait;
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavFrame, MavMessage, MavMissionResult, MavModeFlag, MavParamType, MavResult,
        MavState, MavType, COMMAND_INT_DATA, COMMAND_LONG_DATA, HEARTBEAT_DATA, MISSION_CLEAR_ALL_DATA,
        MISSION_COUNT_DATA, MISSION_ITEM_INT_DATA, PARAM_SET_DATA,
    },
    MavConnection, MavHeader,
};
use sortie_mission::encode::encode_degrees;
use sortie_proto::{CommandCode, FlightMode, Frame, MissionItem, Position};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::error::LinkError;
use crate::link::{ParamValue, VehicleLink};
use crate::LinkConfig;

type Conn = Arc<dyn MavConnection<MavMessage> + Send + Sync>;
type Inbound = (MavHeader, MavMessage);

const FANOUT_CAPACITY: usize = 256;

/// MAV_DO_REPOSITION_FLAGS_CHANGE_MODE: switch to guided on reposition.
const REPOSITION_CHANGE_MODE: f32 = 1.0;

/// MAVLink 2 vehicle link over any transport `mavlink::connect` understands.
///
/// A blocking reader fans every inbound message out on a broadcast channel;
/// each request subscribes before sending and picks its own reply, so the
/// telemetry reporter and a launch can share one link.
pub struct MavLink {
    conn: Conn,
    seq: AtomicU8,
    sys_id: u8,
    comp_id: u8,
    target_sys: u8,
    target_comp: u8,
    reply_timeout: Duration,
    fanout: broadcast::Sender<Inbound>,
    closed: Arc<AtomicBool>,
    heartbeat: Option<JoinHandle<()>>,
}

impl MavLink {
    pub async fn connect(cfg: &LinkConfig) -> Result<Self> {
        if let Some(rest) = cfg.url.strip_prefix("serial:") {
            // quick validate device
            let (dev, baud) = rest.rsplit_once(':').context("serial url must be serial:<dev>:<baud>")?;
            let baud: u32 = baud.parse().with_context(|| format!("bad baud in {}", cfg.url))?;
            let _ = tokio_serial::new(dev, baud)
                .open_native_async()
                .with_context(|| format!("open fc serial device {}", dev))?;
        }

        let url = cfg.url.clone();
        let conn = tokio::task::spawn_blocking(move || mavlink::connect::<MavMessage>(&url))
            .await
            .context("mavlink connect task")?
            .with_context(|| format!("mavlink connect {}", cfg.url))?;
        let conn: Conn = Arc::from(conn);

        let (fanout, _) = broadcast::channel(FANOUT_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));
        spawn_reader(conn.clone(), fanout.clone(), closed.clone());

        let mut link = Self {
            conn,
            seq: AtomicU8::new(0),
            sys_id: cfg.sys_id,
            comp_id: cfg.comp_id,
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            reply_timeout: Duration::from_millis(cfg.reply_timeout_ms.unwrap_or(5000)),
            fanout,
            closed,
            heartbeat: None,
        };
        link.heartbeat = Some(link.spawn_heartbeat(cfg.send_heartbeat_hz.unwrap_or(1.0).max(0.2)));

        info!("fc: connected {} (target {}/{})", cfg.url, cfg.target_sys, cfg.target_comp);
        Ok(link)
    }

    fn spawn_heartbeat(&self, hz: f32) -> JoinHandle<()> {
        let conn = self.conn.clone();
        let hdr = MavHeader { system_id: self.sys_id, component_id: self.comp_id, sequence: 0 };
        let closed = self.closed.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs_f32(1.0 / hz));
            while !closed.load(Ordering::Relaxed) {
                tick.tick().await;
                if let Err(e) = conn.send(&hdr, &companion_heartbeat()) {
                    debug!("fc: heartbeat send failed: {:?}", e);
                }
            }
        })
    }

    fn send(&self, msg: MavMessage) -> Result<(), LinkError> {
        let hdr = MavHeader {
            system_id: self.sys_id,
            component_id: self.comp_id,
            sequence: self.seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1),
        };
        self.conn.send(&hdr, &msg).map_err(|e| LinkError::Transport(format!("{:?}", e)))?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.fanout.subscribe()
    }

    /// Next message from the target system for which `pick` returns `Some`.
    async fn next_from_target<T, F>(&self, rx: &mut broadcast::Receiver<Inbound>, mut pick: F) -> Result<T, LinkError>
    where
        F: FnMut(&MavMessage) -> Option<T> + Send,
        T: Send,
    {
        loop {
            match rx.recv().await {
                Ok((hdr, msg)) => {
                    if hdr.system_id != self.target_sys {
                        continue;
                    }
                    if let Some(v) = pick(&msg) {
                        return Ok(v);
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("fc: reply listener lagged, {} messages dropped", n),
                Err(RecvError::Closed) => return Err(LinkError::Closed),
            }
        }
    }

    async fn await_reply<T, F>(&self, rx: &mut broadcast::Receiver<Inbound>, what: &'static str, pick: F) -> Result<T, LinkError>
    where
        F: FnMut(&MavMessage) -> Option<T> + Send,
        T: Send,
    {
        tokio::time::timeout(self.reply_timeout, self.next_from_target(rx, pick))
            .await
            .map_err(|_| LinkError::NoReply(what))?
    }

    async fn command(&self, what: &'static str, cmd: MavCmd, param1: f32) -> Result<(), LinkError> {
        let msg = MavMessage::COMMAND_LONG(command_long(self.target_sys, self.target_comp, cmd, param1));
        self.command_acked(what, cmd, msg).await
    }

    /// Send `msg` (a COMMAND_LONG or COMMAND_INT carrying `cmd`) and wait for
    /// its final COMMAND_ACK.
    async fn command_acked(&self, what: &'static str, cmd: MavCmd, msg: MavMessage) -> Result<(), LinkError> {
        let mut rx = self.subscribe();
        self.send(msg)?;
        loop {
            let result = self
                .await_reply(&mut rx, what, |m| match m {
                    MavMessage::COMMAND_ACK(ack) if ack.command == cmd => Some(ack.result),
                    _ => None,
                })
                .await?;
            match result {
                MavResult::MAV_RESULT_ACCEPTED => return Ok(()),
                MavResult::MAV_RESULT_IN_PROGRESS => continue,
                other => return Err(LinkError::Rejected { what, result: format!("{:?}", other) }),
            }
        }
    }
}

impl Drop for MavLink {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        if let Some(h) = self.heartbeat.take() {
            h.abort();
        }
    }
}

// Reader loop in a blocking task (mavlink recv blocks).
fn spawn_reader(conn: Conn, fanout: broadcast::Sender<Inbound>, closed: Arc<AtomicBool>) {
    tokio::task::spawn_blocking(move || {
        while !closed.load(Ordering::Relaxed) {
            match conn.recv() {
                // no subscribers is fine, nobody is waiting
                Ok(frame) => {
                    let _ = fanout.send(frame);
                }
                Err(e) => {
                    debug!("fc: recv error: {:?}", e);
                    std::thread::sleep(Duration::from_millis(10));
                }
            }
        }
        debug!("fc: reader stopped");
    });
}

enum UploadEvent {
    Request(u16),
    Ack(MavMissionResult),
}

#[async_trait]
impl VehicleLink for MavLink {
    async fn read_position(&self) -> Result<Position, LinkError> {
        let mut rx = self.subscribe();
        self.next_from_target(&mut rx, |m| match m {
            MavMessage::GLOBAL_POSITION_INT(p) => Some(Position {
                lat_deg: p.lat as f64 / 1e7,
                lon_deg: p.lon as f64 / 1e7,
                rel_alt_m: p.relative_alt as f32 / 1000.0,
                abs_alt_m: p.alt as f32 / 1000.0,
            }),
            _ => None,
        })
        .await
    }

    async fn read_flight_mode(&self) -> Result<FlightMode, LinkError> {
        let mut rx = self.subscribe();
        self.next_from_target(&mut rx, |m| match m {
            MavMessage::HEARTBEAT(hb) => Some(FlightMode::from_custom_mode(hb.custom_mode)),
            _ => None,
        })
        .await
    }

    async fn clear_mission(&self) -> Result<(), LinkError> {
        let mut rx = self.subscribe();
        self.send(MavMessage::MISSION_CLEAR_ALL(MISSION_CLEAR_ALL_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            ..Default::default()
        }))?;
        let result = self
            .await_reply(&mut rx, "mission clear", |m| match m {
                MavMessage::MISSION_ACK(ack) => Some(ack.mavtype),
                _ => None,
            })
            .await?;
        match result {
            MavMissionResult::MAV_MISSION_ACCEPTED => Ok(()),
            other => Err(LinkError::Rejected { what: "mission clear", result: format!("{:?}", other) }),
        }
    }

    async fn upload_mission(&self, items: &[MissionItem]) -> Result<(), LinkError> {
        let what = "mission upload";
        let count = u16::try_from(items.len()).map_err(|_| LinkError::Rejected {
            what,
            result: format!("{} items exceed protocol limit", items.len()),
        })?;

        let mut rx = self.subscribe();
        self.send(MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
            count,
            target_system: self.target_sys,
            target_component: self.target_comp,
            ..Default::default()
        }))?;

        loop {
            let ev = self
                .await_reply(&mut rx, what, |m| match m {
                    MavMessage::MISSION_REQUEST_INT(r) => Some(UploadEvent::Request(r.seq)),
                    MavMessage::MISSION_REQUEST(r) => Some(UploadEvent::Request(r.seq)),
                    MavMessage::MISSION_ACK(ack) => Some(UploadEvent::Ack(ack.mavtype)),
                    _ => None,
                })
                .await?;

            match ev {
                UploadEvent::Request(seq) => {
                    let item = items.get(seq as usize).ok_or_else(|| LinkError::Rejected {
                        what,
                        result: format!("vehicle requested item {} of {}", seq, count),
                    })?;
                    debug!("fc: upload {}", item);
                    self.send(MavMessage::MISSION_ITEM_INT(to_wire(item, self.target_sys, self.target_comp)))?;
                }
                UploadEvent::Ack(MavMissionResult::MAV_MISSION_ACCEPTED) => {
                    info!("fc: mission upload accepted ({} items)", count);
                    return Ok(());
                }
                UploadEvent::Ack(other) => {
                    return Err(LinkError::Rejected { what, result: format!("{:?}", other) });
                }
            }
        }
    }

    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<(), LinkError> {
        let id = param_id(name);
        let (param_value, param_type) = match value {
            ParamValue::Float(v) => (v, MavParamType::MAV_PARAM_TYPE_REAL32),
            ParamValue::Int(v) => (v as f32, MavParamType::MAV_PARAM_TYPE_INT32),
        };

        let mut rx = self.subscribe();
        self.send(MavMessage::PARAM_SET(PARAM_SET_DATA {
            param_value,
            target_system: self.target_sys,
            target_component: self.target_comp,
            param_id: id,
            param_type,
        }))?;

        let echoed = self
            .await_reply(&mut rx, "param set", |m| match m {
                MavMessage::PARAM_VALUE(pv) if pv.param_id == id => Some(pv.param_value),
                _ => None,
            })
            .await?;
        if (echoed - param_value).abs() > 1e-3 {
            return Err(LinkError::Rejected { what: "param set", result: format!("{} stayed at {}", name, echoed) });
        }
        debug!("fc: {} = {}", name, value);
        Ok(())
    }

    async fn arm(&self) -> Result<(), LinkError> {
        self.command("arm", MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, 1.0).await
    }

    async fn start_mission(&self) -> Result<(), LinkError> {
        self.command("mission start", MavCmd::MAV_CMD_MISSION_START, 0.0).await
    }

    async fn land(&self) -> Result<(), LinkError> {
        self.command("land", MavCmd::MAV_CMD_NAV_LAND, 0.0).await
    }

    async fn goto(&self, lat: f64, lon: f64, alt_m: f32) -> Result<(), LinkError> {
        let what = "goto";
        let reject = |e: sortie_mission::MissionError| LinkError::Rejected { what, result: e.to_string() };
        let (x, y) = (encode_degrees(lat).map_err(reject)?, encode_degrees(lon).map_err(reject)?);
        info!("fc: goto lat={:.6} lon={:.6} alt={:.1}m", lat, lon, alt_m);
        let msg = MavMessage::COMMAND_INT(reposition(self.target_sys, self.target_comp, x, y, alt_m));
        self.command_acked(what, MavCmd::MAV_CMD_DO_REPOSITION, msg).await
    }
}

fn companion_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

fn command_long(target_sys: u8, target_comp: u8, cmd: MavCmd, param1: f32) -> COMMAND_LONG_DATA {
    COMMAND_LONG_DATA {
        target_system: target_sys,
        target_component: target_comp,
        command: cmd,
        confirmation: 0,
        param1,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
    }
}

/// DO_REPOSITION at default speed and loiter radius, heading left to the vehicle.
fn reposition(target_sys: u8, target_comp: u8, x: i32, y: i32, alt_m: f32) -> COMMAND_INT_DATA {
    COMMAND_INT_DATA {
        param1: -1.0,
        param2: REPOSITION_CHANGE_MODE,
        param3: 0.0,
        param4: f32::NAN,
        x,
        y,
        z: alt_m,
        command: MavCmd::MAV_CMD_DO_REPOSITION,
        target_system: target_sys,
        target_component: target_comp,
        frame: MavFrame::MAV_FRAME_GLOBAL_INT,
        current: 0,
        autocontinue: 0,
    }
}

pub fn mav_frame(frame: Frame) -> MavFrame {
    match frame {
        Frame::GlobalRelativeAlt => MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
        Frame::Global => MavFrame::MAV_FRAME_GLOBAL,
    }
}

pub fn mav_cmd(command: CommandCode) -> MavCmd {
    match command {
        CommandCode::Waypoint => MavCmd::MAV_CMD_NAV_WAYPOINT,
        CommandCode::Takeoff => MavCmd::MAV_CMD_NAV_TAKEOFF,
        CommandCode::Land => MavCmd::MAV_CMD_NAV_LAND,
        CommandCode::Jump => MavCmd::MAV_CMD_DO_JUMP,
    }
}

/// MISSION_ITEM_INT for `item`. mission_type stays at its default (MISSION).
pub fn to_wire(item: &MissionItem, target_sys: u8, target_comp: u8) -> MISSION_ITEM_INT_DATA {
    MISSION_ITEM_INT_DATA {
        param1: item.params[0],
        param2: item.params[1],
        param3: item.params[2],
        param4: item.params[3],
        x: item.x,
        y: item.y,
        z: item.z,
        seq: item.seq,
        command: mav_cmd(item.command),
        target_system: target_sys,
        target_component: target_comp,
        frame: mav_frame(item.frame),
        current: item.current as u8,
        autocontinue: item.autocontinue as u8,
        ..Default::default()
    }
}

/// Param ids are 16 bytes, NUL padded, not necessarily NUL terminated.
pub fn param_id(name: &str) -> [u8; 16] {
    let mut id = [0u8; 16];
    let bytes = name.as_bytes();
    let n = bytes.len().min(16);
    id[..n].copy_from_slice(&bytes[..n]);
    id
}
