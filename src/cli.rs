use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glam::Vec3;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::config::BehaviorConfig;
use crate::events::{ScriptedEvent, SensorEvent};
use crate::manager::{open_scene, InteractivityManager};
use crate::math::AxisAngle;
use crate::scene_graph::MediaState;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene headless and print the resulting state
    Simulate {
        /// Scene declarations (JSON)
        #[arg(long)]
        scene: PathBuf,

        /// Sensor events to replay (JSON array of {frame, sensor, isOver, isActive})
        #[arg(long)]
        events: Option<PathBuf>,

        /// Number of frames to run
        #[arg(long, default_value_t = 60)]
        frames: u32,

        /// Frames per second; overrides the config file
        #[arg(long)]
        fps: Option<f32>,

        /// Behavior configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the resolved interactive objects and how each was classified
    Inspect {
        /// Scene declarations (JSON)
        #[arg(long)]
        scene: PathBuf,

        /// Behavior configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            scene,
            events,
            frames,
            fps,
            config,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(fps) = fps {
                config.frames_per_second = fps;
            }
            let manager = simulate(&scene, events.as_deref(), frames, config)?;
            println!("{}", serde_json::to_string_pretty(&snapshot(&manager))?);
        }
        Commands::Inspect { scene, config } => {
            let config = load_config(config.as_deref())?;
            let manager = open_scene(&scene, config)?;
            println!("{}", serde_json::to_string_pretty(&inspect(&manager))?);
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BehaviorConfig> {
    match path {
        Some(path) => BehaviorConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(BehaviorConfig::default()),
    }
}

fn load_events(path: &Path) -> Result<Vec<ScriptedEvent>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;
    let mut events: Vec<ScriptedEvent> = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse events file: {}", path.display()))?;
    events.sort_by_key(|e| e.frame);
    Ok(events)
}

fn simulate(
    scene: &Path,
    events: Option<&Path>,
    frames: u32,
    config: BehaviorConfig,
) -> Result<InteractivityManager> {
    let dt = 1.0 / config.frames_per_second;
    let mut manager = open_scene(scene, config)?;
    let events = match events {
        Some(path) => load_events(path)?,
        None => Vec::new(),
    };

    let mut pending = events.iter().peekable();
    for frame in 0..frames {
        while let Some(event) = pending.next_if(|e| e.frame <= frame) {
            let Some(sensor) = manager.find_sensor(&event.sensor) else {
                log::warn!("Frame {}: no sensor named '{}'", frame, event.sensor);
                continue;
            };
            let mut sensor_event = SensorEvent::new(sensor, event.is_over, event.is_active);
            if let Some(hit) = event.hit_point {
                sensor_event = sensor_event.with_hit_point(Vec3::from(hit));
            }
            manager.push_event(sensor_event);
        }
        manager.frame(dt);
    }
    if pending.peek().is_some() {
        log::warn!("{} events scheduled after the last frame were not delivered", pending.count());
    }
    Ok(manager)
}

fn inspect(manager: &InteractivityManager) -> Value {
    let behaviors: Vec<Value> = manager
        .behaviors()
        .iter()
        .map(|b| {
            json!({
                "pattern": b.pattern(),
                "object": manager.objects().get(b.object),
            })
        })
        .collect();
    json!({
        "routes": manager.routes(),
        "behaviors": behaviors,
    })
}

fn snapshot(manager: &InteractivityManager) -> Value {
    let rt = manager.runtime();
    let nodes: Vec<Value> = rt
        .scene
        .nodes()
        .map(|(_, node)| {
            let rotation = AxisAngle::from_quat(node.transform.rotation);
            let mut entry = json!({
                "name": node.name,
                "translation": node.transform.translation.to_array(),
                "rotation": [rotation.axis.x, rotation.axis.y, rotation.axis.z, rotation.angle],
                "scale": node.transform.scale.to_array(),
                "visible": node.visible,
            });
            if let Some(light) = &node.light {
                entry["light"] = json!({
                    "on": light.on,
                    "color": light.color.to_array(),
                    "intensity": light.intensity,
                });
            }
            if let Some(switch) = node.switch {
                entry["whichChoice"] = json!(switch.which_choice);
            }
            if let Some(material) = node.material.and_then(|m| rt.scene.material(m)) {
                entry["material"] = json!({
                    "diffuseColor": material.diffuse_color.to_array(),
                    "transparency": material.transparency,
                });
            }
            if let Some(media) = node.media.and_then(|m| rt.scene.media(m)) {
                entry["media"] = json!({
                    "playing": media.state == MediaState::Playing,
                    "positionMs": media.position_ms,
                });
            }
            if let Some(text) = node.text.and_then(|t| rt.scene.text(t)) {
                entry["text"] = json!(text.lines);
            }
            entry
        })
        .collect();

    let toggles: Value = rt
        .registries
        .event_utilities
        .iter()
        .map(|(_, eu)| (eu.name.clone(), json!(eu.toggle)))
        .collect::<serde_json::Map<_, _>>()
        .into();

    let scripts: Value = rt
        .registries
        .scripts
        .iter()
        .map(|(_, script)| {
            let bindings = rt
                .host
                .bindings(&script.name)
                .map(|b| json!(b))
                .unwrap_or(Value::Null);
            (script.name.clone(), bindings)
        })
        .collect::<serde_json::Map<_, _>>()
        .into();

    let animations: Vec<Value> = manager
        .animator()
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "state": format!("{:?}", a.state),
                "repeat": format!("{:?}", a.repeat),
                "elapsedTicks": a.elapsed_ticks(),
            })
        })
        .collect();

    json!({
        "frames": manager.frame_count(),
        "clock": rt.clock,
        "nodes": nodes,
        "toggles": toggles,
        "scripts": scripts,
        "animations": animations,
        "diagnostics": manager.diagnostics(),
    })
}
