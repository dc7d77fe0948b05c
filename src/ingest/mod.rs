//! One ingestion cycle: fetch states and automations concurrently, validate,
//! assemble the relation graph and lay it out.
//!
//! A failed state fetch aborts the cycle. A failed automation fetch degrades
//! to zero automations so the entity graph is still produced.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::{Config, LayoutConfig};
use crate::controller::automations::AutomationSource;
use crate::controller::{AutomationFetcher, ControllerClient, RelatedResolver};
use crate::error::{HagraphError, Result};
use crate::graph::{build_graph, layout, neighborhood, GraphPayload, NodeKind, RelationGraph};
use crate::model::{parse_entities, AutomationConfig, EntityState};

/// Validated controller data for one cycle
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub entities: Vec<EntityState>,
    pub automations: Vec<AutomationConfig>,
    /// `None` when every automation tier failed
    pub automation_source: Option<AutomationSource>,
}

impl Snapshot {
    pub fn graph(&self) -> RelationGraph {
        build_graph(&self.entities, &self.automations)
    }
}

/// Result of `/api/ingest`
#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub generated_at: DateTime<Utc>,
    pub entities: usize,
    pub automations: usize,
    pub automation_source: Option<AutomationSource>,
    pub graph: GraphPayload,
}

/// Runs ingestion cycles against one controller
#[derive(Clone)]
pub struct Ingestor {
    client: Arc<ControllerClient>,
    automations: AutomationFetcher,
    layout: LayoutConfig,
}

impl Ingestor {
    pub fn new(client: Arc<ControllerClient>, automations: AutomationFetcher, layout: LayoutConfig) -> Self {
        Self {
            client,
            automations,
            layout,
        }
    }

    /// Wire up client, related-items resolver and fetcher from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(ControllerClient::from_config(config)?);
        let related = RelatedResolver::new(Arc::clone(&client), config.controller.related_concurrency);
        let automations = AutomationFetcher::new(
            Arc::clone(&client),
            related,
            config.controller.legacy_rest_automations,
        );
        Ok(Self::new(client, automations, config.layout.clone()))
    }

    /// Fetch and validate states and automations; both requests run concurrently
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (states, automations) = tokio::join!(
            self.client.fetch_states(),
            self.automations.fetch_automations_with_source()
        );

        let entities = parse_entities(states?);

        let (automation_source, automations) = match automations {
            Ok((source, automations)) => (Some(source), automations),
            Err(e) => {
                log::warn!("Continuing without automations: {}", e);
                (None, Vec::new())
            }
        };

        log::info!(
            "Snapshot: {} entities, {} automations",
            entities.len(),
            automations.len()
        );

        Ok(Snapshot {
            entities,
            automations,
            automation_source,
        })
    }

    /// Full cycle: snapshot, graph, layout
    pub async fn ingest(&self) -> Result<IngestionReport> {
        let snapshot = self.snapshot().await?;
        let entities = snapshot.entities.len();
        let automations = snapshot.automations.len();
        let automation_source = snapshot.automation_source;

        let graph = self
            .run_layout(move || Some(snapshot.graph()))
            .await?
            .unwrap_or_default();

        Ok(IngestionReport {
            generated_at: Utc::now(),
            entities,
            automations,
            automation_source,
            graph,
        })
    }

    /// Laid-out graph, optionally restricted to the neighbourhood of `focus`.
    ///
    /// Returns `Ok(None)` when `focus` is not an automation in the graph.
    pub async fn graph(&self, focus: Option<&str>, depth: usize) -> Result<Option<GraphPayload>> {
        let snapshot = self.snapshot().await?;
        let focus = focus.map(str::to_string);

        self.run_layout(move || {
            let graph = snapshot.graph();
            match focus {
                Some(center) => match graph.node(&center) {
                    Some(node) if node.kind == NodeKind::Automation => {
                        neighborhood(&graph, &center, depth)
                    }
                    _ => None,
                },
                None => Some(graph),
            }
        })
        .await
    }

    /// Build and lay out a graph on the blocking pool
    async fn run_layout<F>(&self, build: F) -> Result<Option<GraphPayload>>
    where
        F: FnOnce() -> Option<RelationGraph> + Send + 'static,
    {
        let config = self.layout.clone();
        tokio::task::spawn_blocking(move || build().map(|graph| layout(&graph, &config)))
            .await
            .map_err(|e| HagraphError::Layout(e.to_string()))
    }
}
