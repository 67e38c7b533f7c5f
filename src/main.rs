//! # flip
//!
//! Plays a scripted layout change through the flip engine and prints the
//! sampled frames as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -- demos/reorder.json
//! cargo run -- demos/reorder.json --step 100 --pretty
//! RUST_LOG=flip_scene=trace cargo run -- demos/reorder.json --config flip.toml
//! ```
//!
//! A script declares the nodes of a scene, which of them to capture, the
//! layout change to apply afterwards and the flip vars:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "name": "list", "box": [0, 0, 400, 300] },
//!     { "name": "a", "parent": "list", "box": [0, 0, 100, 40], "classes": ["item"] }
//!   ],
//!   "targets": ".item",
//!   "changes": [{ "node": "a", "box": [0, 200, 100, 40] }],
//!   "vars": { "duration_ms": 300, "fade": true }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use flip_config::FlipConfig;
use flip_scene::{
    CaptureVars, Display, ElementId, ElementTree, ElementTreeExt, Flip, FlipEvent, FlipVars,
    LinearEngine, Position, Rect, SceneGraph, Targets, TransformParts,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flip")]
#[command(about = "Play a scripted layout change through the flip engine")]
#[command(version)]
struct Cli {
    /// Scene script (JSON)
    script: PathBuf,

    /// Config file (default: flip.toml in the working directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Milliseconds between sampled frames
    #[arg(short, long, default_value = "50")]
    step: f64,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct Script {
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    targets: Option<TargetSpec>,
    /// Comma-delimited style properties to capture and tween.
    #[serde(default)]
    props: Option<String>,
    #[serde(default)]
    changes: Vec<Change>,
    /// Play back toward the capture instead of away from it.
    #[serde(default)]
    reverse: bool,
    #[serde(default)]
    vars: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetSpec {
    Selector(String),
    Names(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct NodeSpec {
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(rename = "box")]
    flow: [f64; 4],
    #[serde(default)]
    flip_id: Option<String>,
    #[serde(default)]
    classes: Vec<String>,
    #[serde(default)]
    display: Option<Display>,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    opacity: Option<f64>,
    #[serde(default)]
    transform: Option<TransformParts>,
    #[serde(default)]
    style: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Change {
    node: String,
    #[serde(default, rename = "box")]
    flow: Option<[f64; 4]>,
    #[serde(default)]
    display: Option<Display>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    opacity: Option<f64>,
    #[serde(default)]
    style: BTreeMap<String, String>,
    #[serde(default)]
    remove: bool,
}

#[derive(Debug, Serialize)]
struct Frame {
    t_ms: f64,
    elements: BTreeMap<String, Sample>,
}

#[derive(Debug, Serialize)]
struct Sample {
    bounds: Rect,
    opacity: f64,
    visible: bool,
}

#[derive(Debug, Serialize)]
struct Output {
    frames: Vec<Frame>,
    events: Vec<FlipEvent>,
}

/// A parsed scene with names resolved to element handles.
struct Stage {
    scene: SceneGraph,
    names: BTreeMap<String, ElementId>,
}

impl Stage {
    fn build(nodes: &[NodeSpec]) -> Result<Self> {
        let mut stage = Self {
            scene: SceneGraph::new(),
            names: BTreeMap::new(),
        };
        for node in nodes {
            let [x, y, w, h] = node.flow;
            let flow = Rect::new(x, y, w, h);
            let el = match node.parent.as_deref() {
                Some(parent) => {
                    let parent = stage.lookup(parent)?;
                    stage.scene.add_child(parent, flow)
                }
                None => stage.scene.add_root(flow),
            };
            if stage.names.insert(node.name.clone(), el).is_some() {
                bail!("duplicate node name `{}`", node.name);
            }
            let scene = &mut stage.scene;
            scene.set_dom_id(el, &node.name);
            if let Some(id) = &node.flip_id {
                scene.set_flip_id(el, id);
            }
            for class in &node.classes {
                scene.add_class(el, class);
            }
            if let Some(display) = node.display {
                scene.set_display(el, display);
            }
            if let Some(position) = node.position {
                scene.set_position(el, position);
            }
            if let Some(opacity) = node.opacity {
                scene.set_opacity(el, opacity);
            }
            if let Some(parts) = node.transform {
                scene.set_base_transform(el, parts);
            }
            for (name, value) in &node.style {
                scene.set_style(el, name, value);
            }
        }
        debug!(nodes = stage.names.len(), "scene built");
        Ok(stage)
    }

    fn lookup(&self, name: &str) -> Result<ElementId> {
        self.names
            .get(name)
            .copied()
            .with_context(|| format!("unknown node `{name}`"))
    }

    fn targets(&self, wanted: Option<&TargetSpec>) -> Result<Targets> {
        Ok(match wanted {
            None => Targets::Selector("*".to_string()),
            Some(TargetSpec::Selector(selector)) => Targets::Selector(selector.clone()),
            Some(TargetSpec::Names(names)) => Targets::Many(
                names
                    .iter()
                    .map(|name| self.lookup(name).map(Targets::Element))
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn apply(&mut self, change: &Change) -> Result<()> {
        let el = self.lookup(&change.node)?;
        if change.remove {
            self.scene.remove(el);
            return Ok(());
        }
        if let Some(parent) = change.parent.as_deref() {
            let parent = self.lookup(parent)?;
            self.scene.reparent(el, parent);
        }
        let scene = &mut self.scene;
        if let Some([x, y, w, h]) = change.flow {
            scene.set_flow_box(el, Rect::new(x, y, w, h));
        }
        if let Some(display) = change.display {
            scene.set_display(el, display);
        }
        if let Some(opacity) = change.opacity {
            scene.set_opacity(el, opacity);
        }
        for (name, value) in &change.style {
            scene.set_style(el, name, value);
        }
        Ok(())
    }

    fn sample(&self, t_ms: f64) -> Frame {
        let elements = self
            .names
            .iter()
            .filter(|(_, el)| self.scene.contains(**el))
            .map(|(name, &el)| {
                let sample = Sample {
                    bounds: self.scene.bounding_rect(el),
                    opacity: self.scene.computed_style(el).opacity,
                    visible: self.scene.is_rendered(el),
                };
                (name.clone(), sample)
            })
            .collect();
        Frame { t_ms, elements }
    }
}

fn load_config(path: Option<&Path>) -> Result<FlipConfig> {
    let mut config = match path {
        Some(path) => FlipConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => FlipConfig::load_or_default(),
    };
    config.merge_with_env();
    Ok(config)
}

fn run(cli: &Cli, config: &FlipConfig) -> Result<Output> {
    if cli.step.is_nan() || cli.step <= 0.0 {
        bail!("--step must be positive, got {}", cli.step);
    }
    let text = std::fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read script {}", cli.script.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse script {}", cli.script.display()))?;

    let mut stage = Stage::build(&script.nodes)?;
    let mut flip = Flip::with_config(config);
    flip.register(Box::new(LinearEngine {
        duration_ms: config.animation.duration_ms,
    }));

    let targets = stage.targets(script.targets.as_ref())?;
    let capture = CaptureVars {
        props: script.props.clone(),
        simple: config.geometry.simple,
    };
    let state = flip.get_state(&stage.scene, targets, &capture);
    info!(captured = state.len(), "captured state");

    for change in &script.changes {
        stage.apply(change)?;
    }

    let defaults = flip.default_vars();
    let vars = match &script.vars {
        Some(value) => {
            let mut vars: FlipVars =
                serde_json::from_value(value.clone()).context("invalid flip vars")?;
            vars.timeline.duration_ms = vars.timeline.duration_ms.or(defaults.timeline.duration_ms);
            vars.timeline.ease = vars.timeline.ease.or(defaults.timeline.ease);
            vars.scale |= defaults.scale;
            vars.nested |= defaults.nested;
            vars.simple |= defaults.simple;
            vars
        }
        None => defaults,
    };

    let id = if script.reverse {
        flip.to(&mut stage.scene, &state, vars)?
    } else {
        flip.from(&mut stage.scene, &state, vars)?
    };
    let total = flip.timeline(id).map_or(0.0, |t| t.duration_ms());
    info!(%id, total_ms = total, "flip started");

    let mut frames = vec![stage.sample(0.0)];
    let mut t = 0.0;
    while flip.active_count() > 0 {
        flip.update(&mut stage.scene, cli.step);
        t += cli.step;
        frames.push(stage.sample(t.min(total)));
    }
    let events = flip.drain_events().collect();
    Ok(Output { frames, events })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = run(&cli, &config)?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{json}");
    Ok(())
}
