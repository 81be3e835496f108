use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::graph::NodeKey;
use crate::view::RenderFrame;

/// Padding around the frame bounds in SVG output
const SVG_MARGIN: f32 = 20.0;

#[derive(Serialize)]
struct PositionRecord<'a> {
    #[serde(flatten)]
    key: &'a NodeKey,
    x: f32,
    y: f32,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Export a rendered frame to a JSON file
pub fn export_json(frame: &RenderFrame, path: &Path) -> Result<()> {
    let writer = create(path)?;
    serde_json::to_writer_pretty(writer, frame).context("Failed to write JSON")?;
    Ok(())
}

/// Export node positions only, as `[{type, id, x, y}]`
pub fn export_positions(frame: &RenderFrame, path: &Path) -> Result<()> {
    let records: Vec<PositionRecord> = frame
        .nodes
        .iter()
        .map(|n| PositionRecord {
            key: &n.key,
            x: n.x,
            y: n.y,
        })
        .collect();
    let writer = create(path)?;
    serde_json::to_writer_pretty(writer, &records).context("Failed to write JSON")?;
    Ok(())
}

/// `out.csv` becomes `out.nodes.csv` and `out.edges.csv`
pub fn csv_paths(path: &Path) -> (PathBuf, PathBuf) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "graph".to_string());
    (
        path.with_file_name(format!("{}.nodes.csv", stem)),
        path.with_file_name(format!("{}.edges.csv", stem)),
    )
}

/// Export a rendered frame to node and edge CSV files
pub fn export_csv(frame: &RenderFrame, nodes_path: &Path, edges_path: &Path) -> Result<()> {
    let mut writer = create(nodes_path)?;
    writeln!(writer, "type,id,label,x,y,radius,color,opacity,selected")?;
    for node in &frame.nodes {
        writeln!(
            writer,
            "\"{}\",\"{}\",\"{}\",{:.3},{:.3},{:.3},{},{:.3},{}",
            escape_csv(&node.key.node_type),
            escape_csv(&node.key.id),
            escape_csv(&node.label),
            node.x,
            node.y,
            node.radius,
            node.color,
            node.opacity,
            node.selected
        )?;
    }
    writer.flush()?;

    let mut writer = create(edges_path)?;
    writeln!(writer, "source,target,relation,label,opacity")?;
    for edge in &frame.edges {
        writeln!(
            writer,
            "\"{}\",\"{}\",\"{}\",\"{}\",{:.3}",
            escape_csv(&edge.from.to_string()),
            escape_csv(&edge.to.to_string()),
            escape_csv(&edge.relation),
            escape_csv(&edge.label),
            edge.opacity
        )?;
    }
    writer.flush()?;

    Ok(())
}

/// Export a rendered frame as a standalone SVG drawing
pub fn export_svg(frame: &RenderFrame, path: &Path) -> Result<()> {
    let mut writer = create(path)?;

    let (min_x, min_y, width, height) = match frame.bounds() {
        Some((min, max)) => (
            min.x - SVG_MARGIN,
            min.y - SVG_MARGIN,
            (max.x - min.x) + 2.0 * SVG_MARGIN,
            (max.y - min.y) + 2.0 * SVG_MARGIN,
        ),
        None => (0.0, 0.0, 2.0 * SVG_MARGIN, 2.0 * SVG_MARGIN),
    };

    writeln!(
        writer,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{:.2} {:.2} {:.2} {:.2}">"#,
        min_x, min_y, width, height
    )?;

    let positions: HashMap<&NodeKey, (f32, f32)> =
        frame.nodes.iter().map(|n| (&n.key, (n.x, n.y))).collect();

    writeln!(writer, r##"  <g stroke="#999999" stroke-width="1">"##)?;
    for edge in &frame.edges {
        let (Some(&(x1, y1)), Some(&(x2, y2))) = (positions.get(&edge.from), positions.get(&edge.to))
        else {
            continue;
        };
        writeln!(
            writer,
            r#"    <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke-opacity="{:.3}"><title>{}</title></line>"#,
            x1,
            y1,
            x2,
            y2,
            edge.opacity,
            escape_xml(&edge.label)
        )?;
    }
    writeln!(writer, "  </g>")?;

    writeln!(writer, "  <g>")?;
    for node in &frame.nodes {
        let stroke = if node.selected {
            r##" stroke="#222222" stroke-width="2""##
        } else {
            ""
        };
        writeln!(
            writer,
            r#"    <circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" fill-opacity="{:.3}"{}><title>{}</title></circle>"#,
            node.x,
            node.y,
            node.radius,
            node.color,
            node.opacity,
            stroke,
            escape_xml(&node.key.to_string())
        )?;
    }
    writeln!(writer, "  </g>")?;

    writeln!(writer, r##"  <g font-family="sans-serif" font-size="10" fill="#333333">"##)?;
    for node in frame.nodes.iter().filter(|n| n.show_label) {
        writeln!(
            writer,
            r#"    <text x="{:.2}" y="{:.2}" fill-opacity="{:.3}">{}</text>"#,
            node.x + node.radius + 2.0,
            node.y + 3.0,
            node.opacity,
            escape_xml(&node.label)
        )?;
    }
    writeln!(writer, "  </g>")?;
    writeln!(writer, "</svg>")?;
    writer.flush()?;

    Ok(())
}

/// Escape special characters for CSV
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"")
}

/// Escape special characters for XML
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
