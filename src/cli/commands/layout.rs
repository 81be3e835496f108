use anyhow::Result;
use console::{Emoji, style};
use std::path::PathBuf;

use crate::cli::{LayoutArgs, SourceArgs};
use crate::config::Config;
use crate::export;

static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");

pub async fn run(config: &Config, source: SourceArgs, layout: LayoutArgs, output: PathBuf) -> Result<()> {
    println!();
    println!("{}", style(" kgscope - Layout ").bold().reverse());
    println!();

    let (mut view, _) = super::open_view(config, &source).await?;
    super::apply_layout_args(&mut view, &layout);

    let progress = super::spinner(&GEAR, "Running layout...");
    let frame = view.run(layout.frames.max(1), 0);
    progress.finish_and_clear();

    println!(
        "{}{} layout of {} nodes {}",
        CHECK,
        style(frame.mode).cyan(),
        style(frame.nodes.len()).green().bold(),
        if frame.settled {
            style("settled").green()
        } else {
            style("still moving").yellow()
        }
    );

    export::export_positions(&frame, &output)?;
    println!("  {} {}", style("→").dim(), style(output.display()).cyan().underlined());
    println!();

    view.dispose();
    Ok(())
}
