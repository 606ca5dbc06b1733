mod game;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use ember2d::ui::StaticResources;
use ember2d::{DrawCommand, DrawList, FontHandle, Runtime, RuntimeConfig, TextureHandle, Vec2};

const FRAME: Duration = Duration::from_millis(16);
const FRAMES: u32 = 1200;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => RuntimeConfig::load_from_file(&path)?,
        None => RuntimeConfig::default(),
    };
    let mut runtime = Runtime::new(config);
    runtime.ui_mut().set_resources(StaticResources {
        pixel: TextureHandle(0),
        font: FontHandle(0),
    });
    game::register_scenes(&mut runtime)?;
    runtime.context().load_scene_with(game::MENU, 0.0, false)?;

    let mut draw = DrawList::new();
    let mut stats = FrameStats::default();
    for frame in 0..FRAMES {
        autopilot(&mut runtime, frame);
        runtime.update(FRAME);
        runtime.draw(&mut draw);
        stats.record(&mut draw);
    }

    log::info!(
        "{FRAMES} frames: {} commands, {} cached UI redraws, {} objects alive, scene {:?}",
        stats.commands,
        stats.target_passes,
        runtime.objects().len(),
        runtime.scenes().active_scene_name()
    );
    runtime.shutdown();
    Ok(())
}

/// Stands in for a player: clicks Play on the menu, then wiggles the pointer.
fn autopilot(runtime: &mut Runtime, frame: u32) {
    let play = runtime
        .ui()
        .find_by_name(game::PLAY_BUTTON)
        .and_then(|id| runtime.ui().bounds(id));
    let pointer = runtime.pointer_mut();
    match play {
        Some(bounds) => {
            pointer.position = bounds.center();
            // Hold for a few frames so the press animation runs.
            pointer.primary_down = frame % 30 >= 20 && frame % 30 < 24;
        }
        None => {
            let t = frame as f32 * 0.05;
            pointer.position = Vec2::new(640.0 + t.cos() * 200.0, 360.0 + t.sin() * 120.0);
            pointer.primary_down = false;
        }
    }
}

/// Counts what a real backend would have replayed.
#[derive(Default)]
struct FrameStats {
    commands: usize,
    target_passes: usize,
}

impl FrameStats {
    fn record(&mut self, draw: &mut DrawList) {
        for command in draw.drain() {
            self.commands += 1;
            if matches!(command, DrawCommand::BeginTarget { .. }) {
                self.target_passes += 1;
            }
        }
    }
}
