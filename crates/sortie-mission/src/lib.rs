pub mod compiler;
pub mod doctor;
pub mod encode;
pub mod error;
pub mod patrol;
pub mod store;

pub use compiler::{compile, validate_shape};
pub use error::MissionError;
pub use patrol::compile_patrol;
pub use store::{load_mission, Mission};
