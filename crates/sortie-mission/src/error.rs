/// Reasons a waypoint list or numeric input is rejected before compilation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MissionError {
    #[error("mission has no waypoints")]
    Empty,

    #[error("waypoint order must be >= 1, got {order}")]
    InvalidOrder { order: i32 },

    #[error("mission has {count} waypoints, at most {max} fit in one upload")]
    TooManyWaypoints { count: usize, max: usize },

    #[error("duplicate waypoint order {order}")]
    DuplicateOrder { order: i32 },

    #[error("waypoint orders not contiguous: expected {expected}, found {found}")]
    OrderGap { expected: i32, found: i32 },

    #[error("non-finite {field} on waypoint {order}")]
    NonFinite { field: &'static str, order: i32 },

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("invalid altitude {0}m")]
    InvalidAltitude(f32),
}
