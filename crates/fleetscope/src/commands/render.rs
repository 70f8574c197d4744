use std::path::Path;

use anyhow::bail;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{info, warn};

use fleetscope_core::DisplayMode;
use fleetscope_scene::{OverlayComposer, Scene};

use crate::setup::{self, SceneArgs};

/// Compose one scene and print it.
pub async fn render(config: &Path, args: &SceneArgs, format: &str) -> anyhow::Result<()> {
    let mut composer = setup::composer(config, args).await?;
    let live = setup::load_states(&args.states)?;

    if args.trajectories.is_some() && composer.options().mode == DisplayMode::Normal {
        composer.start();
        await_first_poll(&composer).await;
    }

    let Some(scene) = composer.compose(&live).await else {
        bail!("level {} has no image bounds", composer.current_level());
    };
    composer.shutdown();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&scene)?),
        _ => print!("{}", format_scene(&scene)),
    }
    Ok(())
}

/// Re-compose every poll interval until Ctrl-C.
pub async fn watch(config: &Path, args: &SceneArgs) -> anyhow::Result<()> {
    let mut composer = setup::composer(config, args).await?;
    composer.start();

    let mut ticker = tokio::time::interval(composer.options().update_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut live = setup::load_states(&args.states)?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(level = %composer.current_level(), "watching {}", args.states.display());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match setup::load_states(&args.states) {
                    Ok(next) => live = next,
                    Err(e) => warn!(error = %e, "failed to reload states, keeping previous"),
                }
                match composer.compose(&live).await {
                    Some(scene) => println!("{}", summary_line(&scene)),
                    None => warn!(level = %composer.current_level(), "level not ready"),
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    composer.shutdown();
    Ok(())
}

async fn await_first_poll(composer: &OverlayComposer) {
    let mut rx = composer.poller().subscribe();
    let wait = composer.options().update_interval;
    if timeout(wait, rx.wait_for(|set| set.seq > 0)).await.is_err() {
        warn!(?wait, "no trajectories within one poll interval");
    }
}

fn summary_line(scene: &Scene) -> String {
    scene
        .summary()
        .into_iter()
        .map(|(layer, visible, count)| {
            if visible {
                format!("{layer}={count}")
            } else {
                format!("{layer}=({count})")
            }
        })
        .fold(format!("[{}]", scene.level), |acc, part| acc + " " + &part)
}

fn format_scene(scene: &Scene) -> String {
    let mut out = String::new();
    let [[south, west], [north, east]] = scene.bounds;
    out.push_str(&format!(
        "Level {} of {:?}\n  bounds: south {south:.2} west {west:.2} north {north:.2} east {east:.2}\n",
        scene.level, scene.levels
    ));
    for (layer, visible, count) in scene.summary() {
        let mark = if visible { "✓" } else { "✗" };
        out.push_str(&format!("  {mark} {:<13} {count}\n", layer.name()));
    }
    for robot in scene.robots.drawn() {
        out.push_str(&format!(
            "    robot {}/{} ({}) at ({:.2}, {:.2}) battery {:.0}% {}\n",
            robot.record.fleet,
            robot.record.name,
            robot.record.color,
            robot.x,
            robot.y,
            robot.battery_percent,
            robot.mode
        ));
    }
    for traj in scene.trajectories.drawn() {
        let conflict = if traj.conflict { " CONFLICT" } else { "" };
        out.push_str(&format!(
            "    trajectory {} {}/{} [{}]{conflict}\n",
            traj.trajectory.id, traj.trajectory.fleet_name, traj.trajectory.robot_name, traj.color
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscope_scene::{Layer, SceneLayer};

    fn scene() -> Scene {
        Scene {
            level: "L1".to_string(),
            levels: vec!["L1".to_string()],
            bounds: [[-20.0, 0.0], [0.0, 50.0]],
            waypoints: SceneLayer::new(Layer::Waypoints, false, vec![]),
            dispensers: SceneLayer::new(Layer::Dispensers, true, vec![]),
            ingestors: SceneLayer::new(Layer::Ingestors, true, vec![]),
            lifts: SceneLayer::new(Layer::Lifts, true, vec![]),
            doors: SceneLayer::new(Layer::Doors, true, vec![]),
            trajectories: SceneLayer::new(Layer::Trajectories, true, vec![]),
            robots: SceneLayer::new(Layer::Robots, true, vec![]),
        }
    }

    #[test]
    fn summary_marks_hidden_layers() {
        let line = summary_line(&scene());
        assert!(line.starts_with("[L1] waypoints=(0) dispensers=0"));
        assert!(line.ends_with("robots=0"));
    }

    #[test]
    fn text_output_lists_layers() {
        let text = format_scene(&scene());
        assert!(text.contains("bounds: south -20.00 west 0.00 north 0.00 east 50.00"));
        assert!(text.contains("✗ waypoints"));
        assert!(text.contains("✓ robots"));
    }
}
