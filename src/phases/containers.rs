//! Docker containers, images, volumes and user networks.
//!
//! Candidate ids carry their object type (`container:<id>`, `image:<id>`,
//! `volume:<name>`, `network:<name>`) and are ordered so that containers go
//! before the images, volumes and networks they reference.

use super::classify::{Site, removal_site, tolerate};
use crate::host::Host;
use anyhow::Result;
use hostkit::Docker;
use reconcile::{CandidateSet, ExecutionOutcome, Phase, PhaseKind, RemovalPrimitive, ScanContext, remove_batched};

/// Object types in removal order.
const KINDS: [&str; 4] = ["container", "image", "volume", "network"];

fn split(id: &str) -> Option<(&str, &str)> {
    id.split_once(':').filter(|(kind, name)| KINDS.contains(kind) && !name.is_empty())
}

/// Removes every container object; a fresh server runs none.
#[derive(Debug)]
pub struct ContainersPhase<'a> {
    host: &'a Host,
}

impl<'a> ContainersPhase<'a> {
    /// Create the phase.
    pub fn new(host: &'a Host) -> Self {
        Self { host }
    }
}

impl Phase for ContainersPhase<'_> {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Containers
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<CandidateSet> {
        let docker = self.host.tools().docker();
        let mut builder = CandidateSet::builder(self.kind(), ctx.protected);

        if !docker.is_available() {
            builder.note("docker not installed");
            return Ok(builder.build());
        }

        for kind in KINDS {
            let names = list(&docker, kind)?;
            builder.extend(names.into_iter().map(|n| format!("{kind}:{n}")));
        }
        Ok(builder.build())
    }

    fn clean(&self, candidates: &CandidateSet, _ctx: &ScanContext<'_>) -> Result<ExecutionOutcome> {
        let removal = DockerRemoval {
            docker: self.host.tools().docker(),
        };
        Ok(remove_batched(candidates.items(), self.host.batch(), &removal))
    }
}

fn list(docker: &Docker, kind: &str) -> hostkit::Result<Vec<String>> {
    match kind {
        "container" => docker.containers(),
        "image" => docker.images(),
        "volume" => docker.volumes(),
        _ => docker.networks(),
    }
}

/// Routes each prefixed id to the matching `docker ... rm`.
struct DockerRemoval {
    docker: Docker,
}

impl RemovalPrimitive for DockerRemoval {
    fn remove(&self, items: &[String]) -> Result<()> {
        let site = removal_site(items);
        for kind in KINDS {
            let names: Vec<String> = items
                .iter()
                .filter_map(|id| split(id))
                .filter(|(k, _)| *k == kind)
                .map(|(_, name)| name.to_string())
                .collect();
            if names.is_empty() {
                continue;
            }
            let result = match kind {
                "container" => self.docker.remove_containers(&names),
                "image" => self.docker.remove_images(&names),
                "volume" => self.docker.remove_volumes(&names),
                _ => self.docker.remove_networks(&names),
            };
            tolerate(site, result)?;
        }
        Ok(())
    }

    fn is_present(&self, item: &str) -> Result<bool> {
        let Some((kind, name)) = split(item) else {
            return Ok(false);
        };
        let present = tolerate(Site::Inventory, list(&self.docker, kind))?;
        Ok(present.iter().any(|n| n == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::testing::Fixture;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> Fixture {
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner
            .ok("docker ps -aq", "c1\nc2\n")
            .ok("docker images -aq", "sha256:aa\nsha256:bb\nsha256:aa\n")
            .ok("docker volume ls -q", "pgdata\n")
            .ok("docker network ls", "bridge\nhost\nnone\napp_default\n");
        fx
    }

    #[test]
    fn test_scan_orders_containers_first() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        let found = ContainersPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert_eq!(
            found.items(),
            [
                "container:c1",
                "container:c2",
                "image:sha256:aa",
                "image:sha256:bb",
                "volume:pgdata",
                "network:app_default",
            ]
        );
    }

    #[test]
    fn test_docker_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let fx = Fixture::new(dir.path(), &["bash"]);
        fx.runner.missing("docker");
        let found = ContainersPhase::new(&fx.host).scan(&fx.ctx()).unwrap();
        assert!(found.is_empty());
        assert_eq!(found.notes(), ["docker not installed"]);
    }

    #[test]
    fn test_clean_groups_removals_by_kind() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        let phase = ContainersPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.removed_count(), 6);
        let removals: Vec<String> = fx
            .runner
            .calls_matching("docker")
            .into_iter()
            .filter(|c| c.contains(" rm"))
            .collect();
        assert_eq!(
            removals,
            vec![
                "docker rm -f -v c1 c2",
                "docker rmi -f sha256:aa sha256:bb",
                "docker volume rm -f pgdata",
                "docker network rm app_default",
            ]
        );
    }

    #[test]
    fn test_network_in_use_stays_unresolved() {
        let dir = TempDir::new().unwrap();
        let fx = fixture(&dir);
        fx.runner.fail(
            "docker network rm app_default",
            "Error response from daemon: error while removing network: network app_default has active endpoints",
        );
        let phase = ContainersPhase::new(&fx.host);
        let found = phase.scan(&fx.ctx()).unwrap();
        let outcome = phase.clean(&found, &fx.ctx()).unwrap();

        assert_eq!(outcome.unresolved, vec!["network:app_default"]);
        assert_eq!(outcome.removed_count(), 5);
    }
}
