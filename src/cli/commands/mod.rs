pub mod init;
pub mod layout;
pub mod render;
pub mod select;
pub mod stats;

use anyhow::{Context, Result};
use console::{Emoji, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;

use crate::cli::{ClickEvent, InteractionArgs, LayoutArgs, SourceArgs};
use crate::config::Config;
use crate::layout::Rotation;
use crate::source::{FetchParams, FileSource, GraphSource, HttpSource};
use crate::view::{ClickAction, ExplorerView};

static DATABASE: Emoji<'_, '_> = Emoji("💾 ", "");
static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK] ");
static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!] ");

pub(crate) fn spinner(emoji: &Emoji<'_, '_>, message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(&format!("{}{{spinner:.green}} {{msg}}", emoji))
            .expect("static spinner template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message);
    spinner
}

/// Fetch parameters from CLI arguments with config fallbacks.
pub(crate) fn fetch_params(config: &Config, args: &SourceArgs) -> FetchParams {
    FetchParams {
        kind: args.kind.unwrap_or(config.source.kind),
        start_date: args.from.clone(),
        end_date: args.to.clone(),
        entities: args.entities.clone(),
        limit: args
            .limit
            .as_deref()
            .map(FetchParams::parse_limit)
            .unwrap_or_else(|| config.source.limit.clamp(1, crate::source::MAX_LIMIT)),
    }
}

/// Build a view session from the configured or requested graph source.
pub(crate) async fn open_view(config: &Config, args: &SourceArgs) -> Result<(ExplorerView, FetchParams)> {
    let params = fetch_params(config, args);

    let source: Box<dyn GraphSource> = match (&args.input, args.url.as_ref().or(config.source.base_url.as_ref())) {
        (Some(path), _) => Box::new(FileSource::new(path)),
        (None, Some(url)) => Box::new(HttpSource::new(url)),
        (None, None) => anyhow::bail!("No graph source. Pass --input <file> or --url <base url>."),
    };

    let progress = spinner(&DATABASE, "Loading graph...");
    let data = source
        .fetch(&params)
        .await
        .with_context(|| format!("Failed to load graph from {} source", source.name()))?;

    let mut view = ExplorerView::new(config.variant_registry(), params.kind)
        .with_settings(config.view.clone())
        .with_force_params(config.force2d.clone())
        .with_nbody_params(config.physics.clone());
    view.ingest(data, false);

    for path in &args.merge {
        let extra = FileSource::new(path)
            .fetch(&params)
            .await
            .with_context(|| format!("Failed to load graph from {}", path.display()))?;
        view.ingest(extra, true);
    }
    progress.finish_and_clear();

    view.set_types_hidden(args.hide.iter().cloned(), true);
    let subgraph = view.resolve();

    println!(
        "{}Loaded {} nodes, {} edges ({} view: {} connected, {} visible)",
        CHECK,
        style(view.store().node_count()).green().bold(),
        style(view.store().edge_count()).green().bold(),
        style(params.kind).cyan(),
        style(subgraph.connected_nodes.len()).green(),
        style(subgraph.visible_nodes.len()).green()
    );
    if subgraph.mask_recovered {
        println!(
            "{}Hiding {} would leave nothing visible; showing all types",
            WARN,
            style(args.hide.join(", ")).yellow()
        );
    }

    Ok((view, params))
}

/// Apply layout arguments to a view session.
pub(crate) fn apply_layout_args(view: &mut ExplorerView, args: &LayoutArgs) {
    if let Some(mode) = args.mode {
        view.set_mode(mode);
    }
    if let Some(pct) = args.repulsion {
        view.nbody_mut().set_repulsion_pct(pct);
    }
    let rotation = view.rotation_mut();
    *rotation = Rotation::from_degrees(args.pitch, args.yaw, args.roll);
    if let Some(&[x, y, z, w]) = args.drag_quat.as_deref() {
        rotation.set_drag([x, y, z, w]);
    }
    if let Some(&[dx, dy]) = args.drag.as_deref() {
        rotation.apply_drag(dx, dy);
    }
}

/// Clicks and selection controls to replay against a view session.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    pub clicks: Vec<ClickEvent>,
    pub interaction: InteractionArgs,
}

enum ReplayStep<'a> {
    Clear(u64),
    Click(&'a ClickEvent),
}

impl ReplayStep<'_> {
    fn at(&self) -> u64 {
        match self {
            ReplayStep::Clear(at) => *at,
            ReplayStep::Click(click) => click.at_ms,
        }
    }
}

impl Replay {
    /// Replay clears and clicks in time order, then let the last pending
    /// click fire. Returns the time at which the replay settled.
    pub fn apply(&self, view: &mut ExplorerView) -> u64 {
        view.set_selection_enabled(!self.interaction.no_select_mode);

        // Stable sort: a clear runs before clicks at the same millisecond
        let mut steps: Vec<ReplayStep> = self
            .interaction
            .clear_at
            .iter()
            .map(|&at| ReplayStep::Clear(at))
            .chain(self.clicks.iter().map(ReplayStep::Click))
            .collect();
        steps.sort_by_key(ReplayStep::at);

        let mut now = 0;
        let mut ignored = 0usize;
        for step in &steps {
            match step {
                ReplayStep::Clear(at) => {
                    view.poll(*at);
                    view.clear_selection();
                }
                ReplayStep::Click(click) => {
                    let outcome = view.click(&click.key, click.at_ms);
                    debug!(
                        node = %click.key,
                        at_ms = click.at_ms,
                        fired = ?outcome.fired,
                        action = ?outcome.action,
                        "click replayed"
                    );
                    if outcome.action == ClickAction::Ignored {
                        ignored += 1;
                    }
                }
            }
            now = step.at();
        }
        now += view.selection().window_ms();
        view.poll(now);

        if ignored > 0 {
            let reason = if view.selection().is_enabled() {
                "not in the current view"
            } else {
                "selection mode is off"
            };
            println!("{}{} clicks ignored ({})", WARN, style(ignored).yellow(), reason);
        }
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, GraphData, Node, NodeKey, VariantKind, VariantRegistry};
    use crate::layout::LayoutMode;
    use glam::Quat;

    fn args() -> SourceArgs {
        SourceArgs {
            input: None,
            url: None,
            merge: vec![],
            kind: None,
            from: None,
            to: None,
            entities: vec![],
            limit: None,
            hide: vec![],
        }
    }

    #[test]
    fn test_fetch_params_fallbacks() {
        let config = Config::default();
        let params = fetch_params(&config, &args());
        assert_eq!(params.kind, VariantKind::Policy);
        assert_eq!(params.limit, 500);

        let params = fetch_params(
            &config,
            &SourceArgs {
                kind: Some(VariantKind::Social),
                limit: Some("abc".to_string()),
                from: Some("2024-01-01".to_string()),
                ..args()
            },
        );
        assert_eq!(params.kind, VariantKind::Social);
        assert_eq!(params.limit, 500);
        assert_eq!(params.start_date.as_deref(), Some("2024-01-01"));
    }

    fn key(s: &str) -> NodeKey {
        s.parse().unwrap()
    }

    fn click(s: &str) -> ClickEvent {
        s.parse().unwrap()
    }

    fn small_view() -> ExplorerView {
        let mut view = ExplorerView::new(VariantRegistry::new(), VariantKind::Policy);
        view.ingest(
            GraphData {
                nodes: vec![Node::new("Policy", "1"), Node::new("State", "CA")],
                edges: vec![Edge::new(key("Policy:1"), key("State:CA"), "applies_to")],
            },
            false,
        );
        view
    }

    fn selected(view: &ExplorerView) -> Vec<String> {
        view.selection().selected().iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_replay_double_click() {
        let mut view = small_view();

        let clicks = vec![
            ClickEvent {
                key: key("Policy:1"),
                at_ms: 150,
            },
            ClickEvent {
                key: key("Policy:1"),
                at_ms: 0,
            },
        ];
        let replay = Replay {
            clicks,
            ..Replay::default()
        };
        let settled = replay.apply(&mut view);
        assert_eq!(settled, 450);
        assert_eq!(selected(&view), vec!["State:CA"]);
    }

    #[test]
    fn test_replay_clear_at_runs_in_time_order() {
        let mut view = small_view();
        let replay = Replay {
            clicks: vec![click("Policy:1@0"), click("State:CA@800")],
            interaction: InteractionArgs {
                clear_at: vec![500],
                no_select_mode: false,
            },
        };
        assert_eq!(replay.apply(&mut view), 1100);
        // Policy:1 fired at 300 and was cleared at 500
        assert_eq!(selected(&view), vec!["State:CA"]);

        // A clear landing inside a double-click window cancels the pending click
        let mut view = small_view();
        let replay = Replay {
            clicks: vec![click("Policy:1@0"), click("Policy:1@200")],
            interaction: InteractionArgs {
                clear_at: vec![100],
                no_select_mode: false,
            },
        };
        replay.apply(&mut view);
        assert_eq!(selected(&view), vec!["Policy:1"]);
    }

    #[test]
    fn test_replay_with_selection_mode_off() {
        let mut view = small_view();
        let replay = Replay {
            clicks: vec![click("Policy:1@0"), click("State:CA@400")],
            interaction: InteractionArgs {
                clear_at: vec![],
                no_select_mode: true,
            },
        };
        replay.apply(&mut view);
        assert!(!view.selection().is_enabled());
        assert!(view.selection().selected().is_empty());
    }

    #[test]
    fn test_apply_layout_args_builds_rotation() {
        let mut view = small_view();
        view.rotation_mut().apply_drag(50.0, 0.0);
        let args = LayoutArgs {
            mode: Some(LayoutMode::ThreeD),
            frames: 10,
            pitch: 10.0,
            yaw: 20.0,
            roll: 0.0,
            drag_quat: Some(vec![0.0, 0.0, 0.0, 3.0]),
            drag: None,
            repulsion: None,
        };
        apply_layout_args(&mut view, &args);
        let rotation = *view.rotation_mut();
        assert_eq!(rotation.pitch, 10.0);
        assert_eq!(rotation.yaw, 20.0);
        // Raw quaternion replaces the earlier drag and is normalized
        assert_eq!(rotation.drag, Some(Quat::IDENTITY));

        let args = LayoutArgs {
            drag_quat: None,
            ..args
        };
        apply_layout_args(&mut view, &args);
        assert_eq!(view.rotation_mut().drag, None);
    }
}
