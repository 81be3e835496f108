use anyhow::Result;
use console::{Emoji, style};
use std::path::Path;

use crate::config::Config;

static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");
static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");

pub async fn run(config_path: Option<&Path>, force: bool) -> Result<()> {
    println!();
    println!("{}", style(" kgscope - Initialization ").bold().reverse());
    println!();

    let config_path = match config_path {
        Some(p) => p.to_path_buf(),
        None => Config::config_path()?,
    };

    // Check if config already exists
    if config_path.exists() && !force {
        println!(
            "{}Configuration already exists at {}",
            WARN,
            style(config_path.display()).cyan()
        );
        println!("  Use {} to overwrite", style("--force").yellow());
        return Ok(());
    }

    Config::starter().save_to(&config_path)?;

    println!(
        "{}Created configuration at {}",
        CHECK,
        style(config_path.display()).cyan()
    );

    println!();
    println!("{}", style("━".repeat(50)).dim());
    println!();
    println!("{}Next steps:", ROCKET);
    println!();
    println!("  {}Set the task API key (or edit [tasks] in the config):", KEY);
    println!("    {} export KGSCOPE_TASK_API_KEY=...", style("$").dim());
    println!();
    println!("  {}Explore a graph:", ROCKET);
    println!("    {} kgscope stats --input graph.json --kind company", style("$").dim());
    println!(
        "    {} kgscope render --input graph.json --mode 3d --format svg -o graph.svg",
        style("$").dim()
    );
    println!();

    Ok(())
}
