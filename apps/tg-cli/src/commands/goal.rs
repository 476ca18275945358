// goal.rs — `tg goal`: parse a goal (or observation) description and print
// the normalised export.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tg_domain::exchange::OBSERVATION_TAG;
use tg_domain::Node;
use tg_graph::Graph;

#[derive(Args)]
pub struct GoalArgs {
    /// JSON description file (a `Goal` or `Observation` node).
    pub file: PathBuf,
}

pub fn execute(args: &GoalArgs, graph: &Graph) -> anyhow::Result<()> {
    println!("{}", normalise(graph, &args.file)?);
    Ok(())
}

/// Parse the description at `path` and render it back as pretty JSON.
fn normalise(graph: &Graph, path: &Path) -> anyhow::Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let node = Node::from_json(&text)
        .with_context(|| format!("{} is not a description node", path.display()))?;

    let exported = if node.tag == OBSERVATION_TAG {
        let observation = graph.parse_observation(&node)?;
        tracing::debug!(timeline = observation.object(), predicate = observation.name(), "observation parsed");
        graph.export_observation(&observation)
    } else {
        let goal = graph.parse_goal(&node)?;
        graph.export_goal(&goal)?
    };
    Ok(exported.to_json_pretty()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tg_graph::GraphConfig;

    fn graph() -> Graph {
        let config = GraphConfig {
            epoch: Some("2024-03-01T12:00:00Z".to_string()),
            ..GraphConfig::default()
        };
        Graph::from_config(&config).unwrap()
    }

    #[test]
    fn goal_is_normalised_to_ticks_and_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("goal.json");
        std::fs::write(
            &path,
            r#"{
                "tag": "Goal",
                "attributes": {
                    "on": "drifter",
                    "predicate": "Track",
                    "id": "67e55044-10b1-426f-9247-bb680e5fe0c8"
                },
                "children": [
                    { "tag": "Variable", "attributes": { "name": "start" },
                      "children": [ { "tag": "date", "attributes": { "min": "2024-03-01T12:00:10.4Z" } } ] },
                    { "tag": "Variable", "attributes": { "name": "center" },
                      "children": [ { "tag": "float", "attributes": { "value": "36.8" } } ] }
                ]
            }"#,
        )
        .unwrap();

        let out = normalise(&graph(), &path).unwrap();
        let node = Node::from_json(&out).unwrap();
        assert_eq!(node.attr("id"), Some("67e55044-10b1-426f-9247-bb680e5fe0c8"));

        let start = node
            .children_tagged("Variable")
            .find(|v| v.attr("name") == Some("start"))
            .and_then(|v| v.child("date"))
            .unwrap();
        // 10.4 s floors to tick 10 on a one-second clock.
        assert_eq!(start.attr("min"), Some("2024-03-01T12:00:10Z"));
        assert!(node
            .children_tagged("Variable")
            .all(|v| v.attr("name") != Some("duration")));
    }

    #[test]
    fn observation_is_recognised_by_its_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("obs.json");
        std::fs::write(
            &path,
            r#"{ "tag": "Observation", "attributes": { "on": "state", "predicate": "Holds" } }"#,
        )
        .unwrap();

        let node = Node::from_json(&normalise(&graph(), &path).unwrap()).unwrap();
        assert_eq!(node.tag, OBSERVATION_TAG);
        assert_eq!(node.attr("predicate"), Some("Holds"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        let err = normalise(&graph(), &path).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }
}
