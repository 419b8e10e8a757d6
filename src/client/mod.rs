//! Client connection layer

pub mod backend;
pub mod gtsdb;
pub mod influx;
pub mod nsq_connection;
pub mod raw_connection;

pub use backend::{Backend, Delivery, InterruptHandle, PubSubBackend, RoundTrip};
pub use gtsdb::{GtsdbBackend, GtsdbSession, GtsdbSubscriber};
pub use influx::{DataPoint, InfluxClient, InfluxConfig, InfluxSession};
pub use nsq_connection::{NsqBackend, NsqConfig, NsqConsumer, NsqProducer};
pub use raw_connection::{ConnectionFactory, LineConnection};
