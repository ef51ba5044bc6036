//! Data, configuration and log trees left behind by database engines.
//!
//! Purging an engine's packages keeps its data directory on purpose, so this
//! phase deletes those trees outright. An engine whose packages belong to the
//! baseline is left alone.

use super::remove_paths;
use crate::host::Host;
use anyhow::Result;
use reconcile::{BaselineManifest, CandidateSet, ExecutionOutcome, Phase, PhaseKind, ScanContext};
use std::path::Path;

/// A database engine and the trees it leaves on disk.
struct Engine {
    name: &'static str,
    packages: &'static [&'static str],
    paths: &'static [&'static str],
}

const ENGINES: &[Engine] = &[
    Engine {
        name: "mysql",
        packages: &["mysql-server", "mysql-server-core-8.0", "mariadb-server", "mysql-common"],
        paths: &[
            "/etc/mysql",
            "/var/lib/mysql",
            "/var/lib/mysql-files",
            "/var/lib/mysql-keyring",
            "/var/log/mysql",
        ],
    },
    Engine {
        name: "postgresql",
        packages: &["postgresql", "postgresql-common"],
        paths: &[
            "/etc/postgresql",
            "/etc/postgresql-common",
            "/var/lib/postgresql",
            "/var/log/postgresql",
        ],
    },
    Engine {
        name: "mongodb",
        packages: &["mongodb-org", "mongodb-org-server", "mongodb-server"],
        paths: &["/etc/mongod.conf", "/var/lib/mongodb", "/var/log/mongodb"],
    },
    Engine {
        name: "redis",
        packages: &["redis-server", "redis"],
        paths: &["/etc/redis", "/var/lib/redis", "/var/log/redis"],
    },
    Engine {
        name: "elasticsearch",
        packages: &["elasticsearch"],
        paths: &["/etc/elasticsearch", "/var/lib/elasticsearch", "/var/log/elasticsearch"],
    },
    Engine {
        name: "cassandra",
        packages: &["cassandra"],
        paths: &["/etc/cassandra", "/var/lib/cassandra", "/var/log/cassandra"],
    },
    Engine {
        name: "influxdb",
        packages: &["influxdb", "influxdb2"],
        paths: &["/etc/influxdb", "/var/lib/influxdb", "/var/log/influxdb"],
    },
    Engine {
        name: "couchdb",
        packages: &["couchdb"],
        paths: &["/var/lib/couchdb", "/var/log/couchdb"],
    },
];

impl Engine {
    fn in_baseline(&self, baseline: &BaselineManifest) -> bool {
        self.packages.iter().any(|p| baseline.contains(p))
    }
}

/// Whether a host path lies inside a tree this phase is responsible for.
pub(crate) fn claims(host_path: &str) -> bool {
    let path = Path::new(host_path);
    ENGINES
        .iter()
        .flat_map(|e| e.paths)
        .any(|tree| path.starts_with(tree))
}

/// Deletes database trees of engines outside the baseline.
#[derive(Debug)]
pub struct DatabasesPhase<'a> {
    host: &'a Host,
}

impl<'a> DatabasesPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for DatabasesPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Databases
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        for engine in ENGINES {
            let present: Vec<&str> = engine
                .paths
                .iter()
                .copied()
                .filter(|p| self.host.exists(p))
                .collect();
            if present.is_empty() {
                continue;
            }
            if engine.in_baseline(ctx.baseline) {
                builder.note(format!("{}: part of the baseline, data kept", engine.name));
                continue;
            }
            log::debug!("{}: {} tree(s) on disk", engine.name, present.len());
            builder.extend(present);
        }

        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        Ok(remove_paths(self.host, candidates))
    }
}
