//! Workload and backend type definitions

/// Supported benchmark workload types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadType {
    /// Sequential writes of increasing values to one sensor
    Write,
    /// One last-N read of one sensor
    Read,
    /// One writer thread per sensor, random values
    MultiWrite,
    /// Publish to a key while a subscriber counts deliveries
    PubSub,
}

impl WorkloadType {
    /// All workloads in the order they run by default
    pub const ALL: [WorkloadType; 4] = [Self::Write, Self::Read, Self::MultiWrite, Self::PubSub];

    /// Parse workload type from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "write" => Some(Self::Write),
            "read" => Some(Self::Read),
            "multi-write" | "multi_write" | "multiwrite" => Some(Self::MultiWrite),
            "pubsub" | "pub-sub" | "pub_sub" => Some(Self::PubSub),
            _ => None,
        }
    }

    /// Get display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "Write",
            Self::Read => "Read",
            Self::MultiWrite => "Multi-Write",
            Self::PubSub => "PubSub",
        }
    }

    /// Check whether `backend` can run this workload
    pub fn supports(&self, backend: BackendKind) -> bool {
        match self {
            Self::Write | Self::MultiWrite => true,
            Self::Read => matches!(backend, BackendKind::Gtsdb | BackendKind::Influx),
            Self::PubSub => matches!(backend, BackendKind::Gtsdb | BackendKind::Nsq),
        }
    }
}

impl std::fmt::Display for WorkloadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Benchmark targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Gtsdb,
    Influx,
    Nsq,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [Self::Gtsdb, Self::Influx, Self::Nsq];

    /// Parse backend kind from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gtsdb" => Some(Self::Gtsdb),
            "influx" | "influxdb" => Some(Self::Influx),
            "nsq" => Some(Self::Nsq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtsdb => "GTSDB",
            Self::Influx => "InfluxDB",
            Self::Nsq => "NSQ",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
