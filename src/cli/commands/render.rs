use anyhow::Result;
use console::{Emoji, style};
use std::path::PathBuf;

use crate::cli::{ExportFormat, LayoutArgs, SourceArgs};
use crate::graph::NodeKey;
use crate::config::Config;
use crate::export;
use crate::view::Palette;

use super::Replay;

static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static FILE: Emoji<'_, '_> = Emoji("📁 ", "");
static PIN: Emoji<'_, '_> = Emoji("📌 ", "");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &Config,
    source: SourceArgs,
    layout: LayoutArgs,
    replay: Replay,
    hover: Option<NodeKey>,
    pin: bool,
    palette: Option<Palette>,
    size: Option<f32>,
    format: ExportFormat,
    output: PathBuf,
) -> Result<()> {
    println!();
    println!("{}", style(" kgscope - Render ").bold().reverse());
    println!();

    let (mut view, _) = super::open_view(config, &source).await?;
    super::apply_layout_args(&mut view, &layout);

    let mut settings = view.render().settings().clone();
    if let Some(palette) = palette {
        settings.palette = palette;
    }
    if let Some(size) = size {
        settings.size_pct = size;
    }
    view.render_mut().set_settings(settings);

    let now = replay.apply(&mut view);
    if let Some(key) = &hover {
        if !view.set_hover(Some(key)) {
            println!("{}{} is not visible; --hover ignored", WARN, style(key).yellow());
        }
    }
    if pin && !view.toggle_pin() {
        println!("{}Nothing selected; --pin ignored", PIN);
    }

    let progress = super::spinner(&GEAR, "Running layout...");
    let frame = view.run(layout.frames.max(1), now);
    progress.finish_and_clear();

    println!(
        "{}Rendered {} nodes, {} edges ({} selected{})",
        CHECK,
        style(frame.nodes.len()).green().bold(),
        style(frame.edges.len()).green().bold(),
        style(view.selection().selected().len()).green(),
        if frame.pinned { ", pinned" } else { "" }
    );

    print!("{}Exporting to {}... ", FILE, style(format).cyan());
    match format {
        ExportFormat::Json => {
            export::export_json(&frame, &output)?;
            println!("{}", style("done").green());
            println!();
            println!("  {} {}", style("→").dim(), style(output.display()).cyan().underlined());
        }
        ExportFormat::Csv => {
            let (nodes_path, edges_path) = export::csv_paths(&output);
            export::export_csv(&frame, &nodes_path, &edges_path)?;
            println!("{}", style("done").green());
            println!();
            println!("  {} {}", style("→").dim(), style(nodes_path.display()).cyan().underlined());
            println!("  {} {}", style("→").dim(), style(edges_path.display()).cyan().underlined());
        }
        ExportFormat::Svg => {
            export::export_svg(&frame, &output)?;
            println!("{}", style("done").green());
            println!();
            println!("  {} {}", style("→").dim(), style(output.display()).cyan().underlined());
        }
    }
    println!();

    view.dispose();
    Ok(())
}
