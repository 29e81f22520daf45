use async_trait::async_trait;
use sortie_fc::{
    arm, compile_and_launch, fly_to, force_land, launch, launch_patrol, LaunchError, LaunchOptions, LaunchProfile,
    LaunchState, LinkError, ParamValue, Step, Vehicle, VehicleLink,
};
use sortie_mission::{Mission, MissionError};
use sortie_proto::{CommandCode, FlightMode, MissionItem, Position, Waypoint};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Records every call; can refuse or stall one named call.
#[derive(Default)]
struct MockLink {
    calls: Mutex<Vec<(String, Instant)>>,
    uploaded: Mutex<Vec<MissionItem>>,
    home: Option<Position>,
    home_err: Option<LinkError>,
    fail_on: Option<&'static str>,
    hang_on: Option<&'static str>,
}

impl MockLink {
    fn at_home(lat: f64, lon: f64) -> Self {
        Self { home: Some(Position::new(lat, lon)), ..Self::default() }
    }

    fn failing(mut self, call: &'static str) -> Self {
        self.fail_on = Some(call);
        self
    }

    fn stalling(mut self, call: &'static str) -> Self {
        self.hang_on = Some(call);
        self
    }

    fn names(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn time_of(&self, name: &str) -> Instant {
        self.calls.lock().unwrap().iter().find(|(n, _)| n == name).map(|(_, t)| *t).unwrap()
    }

    async fn act(&self, name: String) -> Result<(), LinkError> {
        self.calls.lock().unwrap().push((name.clone(), Instant::now()));
        if self.hang_on == Some(name.as_str()) {
            std::future::pending::<()>().await;
        }
        if self.fail_on == Some(name.as_str()) {
            return Err(LinkError::Rejected { what: "mock", result: "MAV_RESULT_DENIED".into() });
        }
        Ok(())
    }
}

#[async_trait]
impl VehicleLink for MockLink {
    async fn read_position(&self) -> Result<Position, LinkError> {
        self.calls.lock().unwrap().push(("read_position".into(), Instant::now()));
        if let Some(e) = &self.home_err {
            return Err(e.clone());
        }
        match self.home {
            Some(p) => Ok(p),
            None => std::future::pending().await,
        }
    }

    async fn read_flight_mode(&self) -> Result<FlightMode, LinkError> {
        Ok(FlightMode::Fbwa)
    }

    async fn clear_mission(&self) -> Result<(), LinkError> {
        self.act("clear".into()).await
    }

    async fn upload_mission(&self, items: &[MissionItem]) -> Result<(), LinkError> {
        *self.uploaded.lock().unwrap() = items.to_vec();
        self.act("upload".into()).await
    }

    async fn set_parameter(&self, name: &str, value: ParamValue) -> Result<(), LinkError> {
        self.act(format!("{}={}", name, value)).await
    }

    async fn arm(&self) -> Result<(), LinkError> {
        self.act("arm".into()).await
    }

    async fn start_mission(&self) -> Result<(), LinkError> {
        self.act("start".into()).await
    }

    async fn land(&self) -> Result<(), LinkError> {
        self.act("land".into()).await
    }

    async fn goto(&self, lat: f64, lon: f64, alt_m: f32) -> Result<(), LinkError> {
        self.act(format!("goto {:.6},{:.6},{:.1}", lat, lon, alt_m)).await
    }
}

const FULL_SEQUENCE: [&str; 7] = [
    "clear",
    "upload",
    "TKOFF_THR_MINACC=0",
    "TKOFF_THR_MINSPD=0",
    "TKOFF_THR_DELAY=0",
    "arm",
    "start",
];

fn items() -> Vec<MissionItem> {
    let wps = vec![
        Waypoint { order: 1, lat: 10.001, lon: 20.001, alt: 50.0 },
        Waypoint { order: 2, lat: 10.002, lon: 20.002, alt: 50.0 },
    ];
    sortie_mission::compile(&wps, &Position::new(10.0, 20.0)).unwrap()
}

fn two_point_mission() -> Mission {
    Mission::new(
        "hop",
        vec![
            Waypoint { order: 1, lat: 10.001, lon: 20.001, alt: 50.0 },
            Waypoint { order: 2, lat: 10.002, lon: 20.002, alt: 0.0 },
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn all_steps_run_in_order() {
    let link = MockLink::default();
    let report = launch(&link, &items(), &LaunchProfile::mission()).await.unwrap();

    assert_eq!(link.names(), FULL_SEQUENCE);
    assert_eq!(report.items, 3);
    assert_eq!(report.completed.len(), 7);
    assert_eq!(report.completed.last(), Some(&Step::Start));
    assert_eq!(
        report.trace,
        vec![
            LaunchState::Idle,
            LaunchState::Clearing,
            LaunchState::Uploading,
            LaunchState::Configuring,
            LaunchState::Settling,
            LaunchState::Arming,
            LaunchState::Starting,
            LaunchState::Succeeded,
        ]
    );
    assert_eq!(link.uploaded.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn settle_happens_before_arm() {
    let link = MockLink::default();
    launch(&link, &items(), &LaunchProfile::mission()).await.unwrap();

    let gap = link.time_of("arm") - link.time_of("TKOFF_THR_DELAY=0");
    assert!(gap >= Duration::from_secs(1), "gap was {:?}", gap);
    assert!(link.time_of("start") - link.time_of("arm") < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn upload_rejection_stops_everything_after() {
    let link = MockLink::default().failing("upload");
    let err = launch(&link, &items(), &LaunchProfile::mission()).await.unwrap_err();

    assert_eq!(link.names(), vec!["clear", "upload"]);
    match &err {
        LaunchError::StepRejected { step, source } => {
            assert_eq!(*step, Step::Upload);
            assert!(matches!(source, LinkError::Rejected { .. }));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(err.to_string().starts_with("step upload rejected"));
    assert_eq!(err.step(), Some(Step::Upload));
}

#[tokio::test(start_paused = true)]
async fn parameter_rejection_prevents_arming() {
    let link = MockLink::default().failing("TKOFF_THR_MINSPD=0");
    let err = launch(&link, &items(), &LaunchProfile::mission()).await.unwrap_err();

    assert_eq!(err.step(), Some(Step::SetParam("TKOFF_THR_MINSPD")));
    assert_eq!(link.names(), FULL_SEQUENCE[..4].to_vec());
}

#[tokio::test(start_paused = true)]
async fn start_rejection_is_the_outcome() {
    let link = MockLink::default().failing("start");
    let err = launch(&link, &items(), &LaunchProfile::mission()).await.unwrap_err();
    assert_eq!(err.step(), Some(Step::Start));
    assert_eq!(link.names(), FULL_SEQUENCE);
}

#[tokio::test(start_paused = true)]
async fn patrol_profile_settles_after_arm() {
    let link = MockLink::default();
    let report = launch(&link, &items(), &LaunchProfile::patrol()).await.unwrap();

    assert_eq!(link.names(), FULL_SEQUENCE);
    assert_eq!(
        report.trace[3..],
        [
            LaunchState::Configuring,
            LaunchState::Arming,
            LaunchState::Settling,
            LaunchState::Starting,
            LaunchState::Succeeded,
        ]
    );
    assert!(link.time_of("start") - link.time_of("arm") >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn stalled_step_times_out() {
    let link = MockLink::default().stalling("arm");
    let started = Instant::now();
    let err = launch(&link, &items(), &LaunchProfile::patrol()).await.unwrap_err();

    assert!(matches!(err, LaunchError::StepTimeout(Step::Arm)));
    assert_eq!(err.to_string(), "step arm timed out");
    assert_eq!(link.names().last().map(String::as_str), Some("arm"));
    assert!(!link.names().contains(&"start".to_string()));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn stalled_upload_uses_upload_bound() {
    let link = MockLink::default().stalling("upload");
    let started = Instant::now();
    let err = launch(&link, &items(), &LaunchProfile::patrol()).await.unwrap_err();

    assert!(matches!(err, LaunchError::StepTimeout(Step::Upload)));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10) && waited < Duration::from_secs(11), "waited {:?}", waited);
}

#[tokio::test(start_paused = true)]
async fn compile_and_launch_anchors_home() {
    let link = Arc::new(MockLink::at_home(10.0, 20.0));
    let vehicle = Vehicle::new("sitl-1", link.clone()).with_mission(two_point_mission());

    let report = compile_and_launch(&vehicle, &LaunchOptions::default()).await.unwrap();
    assert_eq!(report.items, 3);

    let names = link.names();
    assert_eq!(names[0], "read_position");
    assert_eq!(names[1..], FULL_SEQUENCE);

    let uploaded = link.uploaded.lock().unwrap();
    assert_eq!((uploaded[0].x, uploaded[0].y), (100000000, 200000000));
    assert_eq!(uploaded[1].command, CommandCode::Takeoff);
    assert_eq!(uploaded[2].command, CommandCode::Land);
}

#[tokio::test(start_paused = true)]
async fn settle_override_is_honoured() {
    let link = Arc::new(MockLink::at_home(10.0, 20.0));
    let vehicle = Vehicle::new("sitl-1", link.clone()).with_mission(two_point_mission());
    let opts = LaunchOptions { settle: Some(Duration::from_secs(4)), ..LaunchOptions::default() };

    compile_and_launch(&vehicle, &opts).await.unwrap();
    assert!(link.time_of("arm") - link.time_of("TKOFF_THR_DELAY=0") >= Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn missing_mission_is_refused() {
    let link = Arc::new(MockLink::at_home(10.0, 20.0));
    let vehicle = Vehicle::new("sitl-1", link.clone());

    let err = compile_and_launch(&vehicle, &LaunchOptions::default()).await.unwrap_err();
    assert!(matches!(err, LaunchError::NoActiveMission));
    assert!(link.names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn bad_shape_never_touches_link() {
    let link = Arc::new(MockLink::at_home(10.0, 20.0));
    let gappy = Mission::new(
        "gappy",
        vec![
            Waypoint { order: 1, lat: 10.0, lon: 20.0, alt: 30.0 },
            Waypoint { order: 3, lat: 10.0, lon: 20.0, alt: 0.0 },
        ],
    );
    let vehicle = Vehicle::new("sitl-1", link.clone()).with_mission(gappy);

    let err = compile_and_launch(&vehicle, &LaunchOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        LaunchError::InvalidMissionShape(MissionError::OrderGap { expected: 2, found: 3 })
    ));
    assert!(err.step().is_none());
    assert!(link.names().is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_home_sample_times_out() {
    let link = Arc::new(MockLink::default());
    let vehicle = Vehicle::new("sitl-1", link.clone()).with_mission(two_point_mission());

    let err = compile_and_launch(&vehicle, &LaunchOptions::default()).await.unwrap_err();
    assert!(matches!(err, LaunchError::HomePositionUnavailable(d) if d == Duration::from_secs(10)));
    assert_eq!(link.names(), vec!["read_position"]);
}

#[tokio::test(start_paused = true)]
async fn patrol_uploads_jump_loop() {
    let link = Arc::new(MockLink::at_home(-35.363261, 149.16523));
    let vehicle = Vehicle::new("sitl-1", link.clone());

    launch_patrol(&vehicle, 60.0, &LaunchOptions::default()).await.unwrap();

    let uploaded = link.uploaded.lock().unwrap();
    assert_eq!(uploaded.len(), 4);
    assert_eq!(uploaded[1].z, 60.0);
    assert_eq!(uploaded[3].command, CommandCode::Jump);
    assert_eq!(uploaded[3].params[..2], [2.0f32, -1.0]);
}

#[tokio::test(start_paused = true)]
async fn patrol_rejects_bad_altitude_before_reading_home() {
    let link = Arc::new(MockLink::at_home(10.0, 20.0));
    let vehicle = Vehicle::new("sitl-1", link.clone());

    let err = launch_patrol(&vehicle, -10.0, &LaunchOptions::default()).await.unwrap_err();
    assert!(matches!(err, LaunchError::InvalidMissionShape(MissionError::InvalidAltitude(_))));
    assert!(link.names().is_empty());
}

#[tokio::test]
async fn force_land_reports_outcome() {
    let ok = Vehicle::new("sitl-1", Arc::new(MockLink::default()));
    force_land(&ok).await.unwrap();

    let refused = Vehicle::new("sitl-1", Arc::new(MockLink::default().failing("land")));
    let err = force_land(&refused).await.unwrap_err();
    assert!(matches!(err, LaunchError::StepRejected { step: Step::Land, .. }));
}

#[tokio::test(start_paused = true)]
async fn closed_link_keeps_home_read_cause() {
    let link = Arc::new(MockLink { home_err: Some(LinkError::Closed), ..MockLink::default() });
    let vehicle = Vehicle::new("sitl-1", link.clone()).with_mission(two_point_mission());
    let started = Instant::now();

    let err = compile_and_launch(&vehicle, &LaunchOptions::default()).await.unwrap_err();
    assert!(matches!(err, LaunchError::HomeReadFailed(LinkError::Closed)));
    assert_eq!(err.to_string(), "home position read failed: link closed");
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("link closed"));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(link.names(), vec!["read_position"]);
}

#[tokio::test(start_paused = true)]
async fn stalled_land_is_bounded() {
    let vehicle = Vehicle::new("sitl-1", Arc::new(MockLink::default().stalling("land")));
    let started = Instant::now();

    let err = force_land(&vehicle).await.unwrap_err();
    assert!(matches!(err, LaunchError::StepTimeout(Step::Land)));
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test]
async fn standalone_arm_sends_only_arm() {
    let link = Arc::new(MockLink::default());
    let vehicle = Vehicle::new("sitl-1", link.clone());
    arm(&vehicle).await.unwrap();
    assert_eq!(link.names(), vec!["arm"]);

    let refused = Vehicle::new("sitl-1", Arc::new(MockLink::default().failing("arm")));
    let err = arm(&refused).await.unwrap_err();
    assert_eq!(err.step(), Some(Step::Arm));
}

#[tokio::test]
async fn fly_to_sends_target() {
    let link = Arc::new(MockLink::default());
    let vehicle = Vehicle::new("sitl-1", link.clone());

    fly_to(&vehicle, -35.36038425, 149.15558299, 800.0).await.unwrap();
    assert_eq!(link.names(), vec!["goto -35.360384,149.155583,800.0"]);
}

#[tokio::test]
async fn fly_to_rejects_bad_target_before_link() {
    let link = Arc::new(MockLink::default());
    let vehicle = Vehicle::new("sitl-1", link.clone());

    let err = fly_to(&vehicle, 95.0, 20.0, 100.0).await.unwrap_err();
    assert!(matches!(err, LaunchError::InvalidTarget(MissionError::OutOfRange { field: "latitude", .. })));
    let err = fly_to(&vehicle, 10.0, 20.0, f32::NAN).await.unwrap_err();
    assert!(matches!(err, LaunchError::InvalidTarget(MissionError::InvalidAltitude(_))));
    assert!(link.names().is_empty());
}

#[tokio::test]
async fn refused_goto_reports_step() {
    let vehicle = Vehicle::new("sitl-1", Arc::new(MockLink::default().failing("goto 10.000000,20.000000,120.0")));
    let err = fly_to(&vehicle, 10.0, 20.0, 120.0).await.unwrap_err();
    assert!(matches!(err, LaunchError::StepRejected { step: Step::Goto, .. }));
}
