use anyhow::Result;
use clap::Parser;
use hagraph::graph::{neighborhood, NodeKind, Relation};
use hagraph::{Config, Ingestor};
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "graph-stats")]
#[command(about = "Fetch a controller snapshot and summarise the relation graph")]
struct Args {
    /// Only report the neighbourhood of this automation id
    #[arg(short, long)]
    automation: Option<String>,

    /// Hops around --automation
    #[arg(short, long, default_value_t = 1)]
    depth: usize,

    /// Print the laid-out graph as JSON instead of the summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let args = Args::parse();

    let config = Config::load()?;
    let ingestor = Ingestor::from_config(&config)?;

    if args.json {
        let payload = ingestor
            .graph(args.automation.as_deref(), args.depth)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Automation not found in graph: {}", args.automation.clone().unwrap_or_default()))?;
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let snapshot = ingestor.snapshot().await?;
    let mut graph = snapshot.graph();
    if let Some(center) = &args.automation {
        graph = graph
            .node(center)
            .filter(|node| node.kind == NodeKind::Automation)
            .and_then(|_| neighborhood(&graph, center, args.depth))
            .ok_or_else(|| anyhow::anyhow!("Automation not found in graph: {}", center))?;
    }

    let with_related = snapshot.automations.iter().filter(|a| !a.related.is_empty()).count();
    let total_related: usize = snapshot.automations.iter().map(|a| a.related.len()).sum();

    let mut per_relation: BTreeMap<Relation, usize> = BTreeMap::new();
    for edge in graph.edges() {
        *per_relation.entry(edge.relation).or_default() += 1;
    }
    let automation_nodes = graph.nodes().filter(|n| n.kind == NodeKind::Automation).count();

    println!("\n=== hagraph snapshot ===\n");
    println!("Controller:              {}", config.controller.url);
    match snapshot.automation_source {
        Some(source) => println!("Automation source:       {:?}", source),
        None => println!("Automation source:       none (all tiers failed)"),
    }
    println!("Entities:                {}", snapshot.entities.len());
    println!("Automations:             {}", snapshot.automations.len());
    println!("  with related items:    {}", with_related);
    println!("  related items total:   {}", total_related);

    println!("\nGraph{}:", args.automation.as_ref().map(|a| format!(" around {} (depth {})", a, args.depth)).unwrap_or_default());
    println!("{:-<40}", "");
    println!("{:<24} {:>8}", "Nodes", graph.node_count());
    println!("{:<24} {:>8}", "  automations", automation_nodes);
    println!("{:<24} {:>8}", "Edges", graph.edge_count());
    for relation in [Relation::Trigger, Relation::Action, Relation::Related] {
        println!("{:<24} {:>8}", format!("  {}", relation), per_relation.get(&relation).copied().unwrap_or(0));
    }
    println!("{:-<40}", "");

    if args.automation.is_none() && total_related > 0 && per_relation.get(&Relation::Related).copied().unwrap_or(0) == 0 {
        println!("\nWarning: automations report related items but the graph has no related edges.");
    }

    Ok(())
}
