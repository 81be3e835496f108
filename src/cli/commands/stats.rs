use anyhow::Result;
use console::{Emoji, style};

use crate::cli::SourceArgs;
use crate::config::Config;
use crate::graph::analytics;

static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
static GRAPH: Emoji<'_, '_> = Emoji("🔗 ", "");
static ANCHOR: Emoji<'_, '_> = Emoji("⚓ ", "");

pub async fn run(config: &Config, source: SourceArgs, top: usize) -> Result<()> {
    println!();
    println!("{}", style(" kgscope - View Statistics ").bold().reverse());
    println!();

    let (mut view, _) = super::open_view(config, &source).await?;
    let subgraph = view.resolve();
    let stats = analytics::compute_stats(&subgraph, top);

    println!();
    println!("{}View Overview", CHART);
    println!();
    println!(
        "  {} Connected nodes:      {}",
        style("•").cyan(),
        style(stats.connected_nodes).green().bold()
    );
    println!(
        "  {} Connected edges:      {}",
        style("•").cyan(),
        style(stats.connected_edges).green().bold()
    );
    println!(
        "  {} Visible nodes:        {}",
        style("•").cyan(),
        style(stats.visible_nodes).green().bold()
    );
    println!(
        "  {} Visible edges:        {}",
        style("•").cyan(),
        style(stats.visible_edges).green().bold()
    );
    println!(
        "  {} Components:           {}",
        style("•").cyan(),
        style(stats.components).green().bold()
    );
    println!(
        "  {} Density:              {}",
        style("•").cyan(),
        style(format!("{:.4}", stats.density)).green()
    );
    println!(
        "  {} Avg degree:           {}",
        style("•").cyan(),
        style(format!("{:.1}", stats.avg_degree)).green()
    );
    println!(
        "  {} Max degree:           {}",
        style("•").cyan(),
        style(stats.max_degree).green().bold()
    );

    println!();
    if subgraph.anchored {
        println!(
            "{}Kind {}: pruned to nodes reachable from anchors",
            ANCHOR,
            style(view.kind()).cyan()
        );
    } else {
        println!("{}Kind {}: no anchor pruning", ANCHOR, style(view.kind()).cyan());
    }
    if subgraph.dangling_edges > 0 {
        println!(
            "  {} {} edges dropped (endpoint not in graph)",
            style("•").cyan(),
            style(subgraph.dangling_edges).yellow()
        );
    }

    if !stats.top_degree.is_empty() {
        println!();
        println!("{}Most Connected Nodes", GRAPH);
        println!();
        for (i, (key, label, degree)) in stats.top_degree.iter().enumerate() {
            let bar_len = (*degree).min(30);
            let bar = "█".repeat(bar_len);
            println!(
                "  {:>2}. {:<30} {} ({}) {}",
                i + 1,
                style(label).cyan().bold(),
                style(&bar).blue(),
                style(degree).dim(),
                style(key).dim(),
            );
        }
    }

    if !stats.type_counts.is_empty() {
        println!();
        println!("{}Node Types", CHART);
        println!();
        for (t, count) in &stats.type_counts {
            let bar_len = (*count).min(30);
            let bar = "█".repeat(bar_len);
            println!(
                "  {:<25} {} ({})",
                style(t).yellow(),
                style(&bar).green(),
                style(count).dim(),
            );
        }
    }

    println!();
    view.dispose();

    Ok(())
}
