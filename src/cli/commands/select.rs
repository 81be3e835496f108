use anyhow::{Context, Result};
use console::{Emoji, style};

use crate::cli::SourceArgs;
use crate::config::Config;
use crate::tasks::{DashboardParams, FlowType, HttpTaskClient, StructuredTaskBuilder, submit_flows};

use super::Replay;

static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[X] ");

pub async fn run(
    config: &Config,
    source: SourceArgs,
    replay: Replay,
    submit: bool,
    flows: Vec<FlowType>,
    llm_assist: Option<bool>,
    endpoint: Option<String>,
) -> Result<()> {
    println!();
    println!("{}", style(" kgscope - Selection ").bold().reverse());
    println!();

    let (mut view, params) = super::open_view(config, &source).await?;
    replay.apply(&mut view);
    let subgraph = view.resolve();
    let selected = view.selection().selected().clone();

    println!();
    println!("{}Selected {} nodes", TARGET, style(selected.len()).green().bold());
    for key in &selected {
        let label = view
            .store()
            .get(key)
            .map(|n| n.label())
            .unwrap_or_else(|| key.id.clone());
        println!("  {} {:<30} {}", style("•").cyan(), style(label).cyan().bold(), style(key).dim());
    }

    let builder = StructuredTaskBuilder::new(
        DashboardParams::from_fetch(&params, view.hidden_types()),
        llm_assist.unwrap_or(config.tasks.llm_assist),
    );

    if !submit {
        let flow = flows.first().copied().unwrap_or(FlowType::Collect);
        let payload = builder.build(&subgraph, &selected, flow);
        println!();
        println!("{}", serde_json::to_string_pretty(&payload)?);
        println!();
        view.dispose();
        return Ok(());
    }

    if selected.is_empty() {
        anyhow::bail!("Nothing selected; refusing to submit an empty task");
    }

    let endpoint = endpoint
        .or_else(|| config.tasks.endpoint.clone())
        .context("No task endpoint. Pass --endpoint or set [tasks].endpoint in the config.")?;
    let client = HttpTaskClient::new(&endpoint, Some(&config.tasks.api_key));

    println!();
    println!("{}Submitting to {}", ROCKET, style(&endpoint).cyan());
    let report = submit_flows(&client, &builder, &subgraph, &selected, &flows).await;

    println!();
    for flow in &report.flows {
        match &flow.error {
            None => println!(
                "  {}{:<16} accepted {}, queued {}, failed {} {}",
                CHECK,
                style(flow.flow_type).cyan(),
                style(flow.summary.accepted).green(),
                style(flow.summary.queued).green(),
                style(flow.summary.failed).red(),
                style(flow.batches.join(", ")).dim()
            ),
            Some(error) => println!(
                "  {}{:<16} failed {}: {}",
                CROSS,
                style(flow.flow_type).cyan(),
                style(flow.summary.failed).red(),
                style(error).red()
            ),
        }
    }
    let totals = report.totals();
    println!();
    println!(
        "  Total: {} accepted, {} queued, {} failed",
        style(totals.accepted).green().bold(),
        style(totals.queued).green().bold(),
        style(totals.failed).red().bold()
    );
    println!();

    view.dispose();
    if report.has_errors() {
        anyhow::bail!("One or more task flows failed");
    }
    Ok(())
}
