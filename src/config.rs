/*

THIS SOFTWARE IS OPEN SOURCE UNDER THE MIT LICENSE

Copyright 2025 Vincent Maciejewski, & M2 Tech
Contact:
v@m2te.ch
mayeski@gmail.com
https://www.linkedin.com/in/vmayeski/
http://m2te.ch/

*/

//! Configuration for sponsors, their worker threads, and domains.
//!
//! Everything has a usable `Default`; the serde derives let a deployment
//! keep these in JSON next to the binary.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a worker thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadConfig {
    /// CPU cores to pin the thread to (empty = no pinning)
    #[serde(default)]
    pub affinity: Vec<usize>,
    /// Thread priority (1-99 for RT, 0 = default)
    #[serde(default)]
    pub priority: i32,
    /// Scheduling policy (SCHED_OTHER, SCHED_FIFO, SCHED_RR)
    #[serde(default = "default_sched_policy")]
    pub sched_policy: i32,
}

fn default_sched_policy() -> i32 {
    libc::SCHED_OTHER
}

impl Default for ThreadConfig {
    fn default() -> Self {
        ThreadConfig {
            affinity: vec![],
            priority: 0,
            sched_policy: default_sched_policy(),
        }
    }
}

impl ThreadConfig {
    /// Create config with CPU affinity
    pub fn with_affinity(cores: Vec<usize>) -> Self {
        ThreadConfig {
            affinity: cores,
            ..Default::default()
        }
    }

    /// Create config with real-time priority
    pub fn with_priority(priority: i32, policy: i32) -> Self {
        ThreadConfig {
            priority,
            sched_policy: policy,
            ..Default::default()
        }
    }
}

/// How a sponsor runs its deliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SponsorConfig {
    /// Name used for worker threads and log fields
    #[serde(default = "default_sponsor_name")]
    pub name: String,
    /// Worker threads draining the ready queue (0 = caller drives `run_pending`)
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Applied to every worker thread
    #[serde(default)]
    pub thread: ThreadConfig,
}

fn default_sponsor_name() -> String {
    "sponsor".to_string()
}

fn default_workers() -> usize {
    1
}

impl Default for SponsorConfig {
    fn default() -> Self {
        SponsorConfig {
            name: default_sponsor_name(),
            workers: default_workers(),
            thread: ThreadConfig::default(),
        }
    }
}

impl SponsorConfig {
    pub fn named(name: &str) -> Self {
        SponsorConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings for a marshaling domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// `scheme://host:port` this domain answers on
    pub base: String,
    /// Resolve this domain's own addresses straight to the exported capability
    #[serde(default = "default_short_circuit")]
    pub short_circuit_local: bool,
}

fn default_short_circuit() -> bool {
    true
}

impl DomainConfig {
    pub fn new(base: &str) -> Self {
        DomainConfig {
            base: base.to_string(),
            short_circuit_local: default_short_circuit(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_config() {
        let config = ThreadConfig::with_affinity(vec![0, 1]);
        assert_eq!(config.affinity, vec![0, 1]);
        assert_eq!(config.priority, 0);

        let config2 = ThreadConfig::with_priority(50, libc::SCHED_FIFO);
        assert_eq!(config2.priority, 50);
        assert_eq!(config2.sched_policy, libc::SCHED_FIFO);
    }

    #[test]
    fn test_sponsor_config_defaults_from_json() {
        let config = SponsorConfig::from_json(r#"{"name": "edge"}"#).unwrap();
        assert_eq!(config.name, "edge");
        assert_eq!(config.workers, 1);
        assert_eq!(config.thread, ThreadConfig::default());

        let config = SponsorConfig::from_json(
            r#"{"workers": 4, "thread": {"affinity": [2], "priority": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.name, "sponsor");
        assert_eq!(config.workers, 4);
        assert_eq!(config.thread.affinity, vec![2]);
        assert_eq!(config.thread.sched_policy, libc::SCHED_OTHER);
    }

    #[test]
    fn test_sponsor_config_builders() {
        let config = SponsorConfig::named("pool").with_workers(0);
        assert_eq!(config.name, "pool");
        assert_eq!(config.workers, 0);
    }

    #[test]
    fn test_domain_config() {
        let config = DomainConfig::from_json(r#"{"base": "tcp://localhost:7777"}"#).unwrap();
        assert_eq!(config, DomainConfig::new("tcp://localhost:7777"));
        assert!(config.short_circuit_local);

        let config =
            DomainConfig::from_json(r#"{"base": "mem://a:1", "short_circuit_local": false}"#).unwrap();
        assert!(!config.short_circuit_local);

        assert!(DomainConfig::from_json(r#"{"short_circuit_local": true}"#).is_err());
    }
}
