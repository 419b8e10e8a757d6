//! Per-operation request generation

use crate::utils::{ReadSelector, Request};

/// Default prefix of the multi-writer sensor keys
pub const SENSOR_PREFIX: &str = "benchmark_sensor";

/// Key written by multi-writer worker `index`
pub fn sensor_key(index: usize) -> String {
    format!("{}_{}", SENSOR_PREFIX, index)
}

/// Key the pub/sub test publishes under, unique to one run
///
/// Deliveries left over from earlier runs carry a different tag and are
/// not counted.
pub fn pubsub_key(sensor: &str, run_id: u32) -> String {
    format!("{}_run{:08x}", sensor, run_id)
}

/// Builds the request for operation `index` of a worker
///
/// Shared by reference across worker threads; any randomness comes from
/// the worker-local `rng`.
pub trait RequestSource: Sync {
    fn request<'k>(&self, key: &'k str, index: u64, rng: &mut fastrand::Rng) -> Request<'k>;
}

/// Writes `index` as the value: `0, 1, 2, ...`
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialWrites;

impl RequestSource for SequentialWrites {
    fn request<'k>(&self, key: &'k str, index: u64, _rng: &mut fastrand::Rng) -> Request<'k> {
        Request::write(key, index as f64)
    }
}

/// Writes uniform random values in `[0, 100)`
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWrites;

impl RequestSource for RandomWrites {
    fn request<'k>(&self, key: &'k str, _index: u64, rng: &mut fastrand::Rng) -> Request<'k> {
        Request::write(key, rng.f64() * 100.0)
    }
}

/// Reads the last `n` points
#[derive(Debug, Clone, Copy)]
pub struct LastN(pub u32);

impl RequestSource for LastN {
    fn request<'k>(&self, key: &'k str, _index: u64, _rng: &mut fastrand::Rng) -> Request<'k> {
        Request::read(key, ReadSelector::last(self.0))
    }
}

/// Worker RNG; `seed == 0` means unseeded
pub fn worker_rng(seed: u64, worker_id: usize) -> fastrand::Rng {
    if seed == 0 {
        fastrand::Rng::new()
    } else {
        fastrand::Rng::with_seed(seed.wrapping_add(worker_id as u64))
    }
}
