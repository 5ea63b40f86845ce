//! Replica pick policies.
//!
//! A policy decides which member of a replica group serves a request:
//!
//! - **Master**: always the master, active or not
//! - **Slave**: an active slave, falling back to the master
//! - **RoundRobin**: alternates between an active slave and the master

use std::fmt;
use std::str::FromStr;

use corelib::Error;

/// Which replica group member should serve a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReplicaPick {
    #[default]
    Master,
    Slave,
    RoundRobin,
}

impl ReplicaPick {
    pub fn name(&self) -> &'static str {
        match self {
            ReplicaPick::Master => "master",
            ReplicaPick::Slave => "slave",
            ReplicaPick::RoundRobin => "round-robin",
        }
    }
}

impl fmt::Display for ReplicaPick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReplicaPick {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(ReplicaPick::Master),
            "slave" => Ok(ReplicaPick::Slave),
            "round-robin" | "round_robin" | "rr" => Ok(ReplicaPick::RoundRobin),
            other => Err(Error::InvalidArgument(format!("unknown replica pick {:?}", other))),
        }
    }
}
