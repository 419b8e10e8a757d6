//! Workload definitions and request generation

pub mod request_source;
pub mod workload_type;

pub use request_source::{
    pubsub_key, sensor_key, worker_rng, LastN, RandomWrites, RequestSource, SequentialWrites, SENSOR_PREFIX,
};
pub use workload_type::{BackendKind, WorkloadType};
