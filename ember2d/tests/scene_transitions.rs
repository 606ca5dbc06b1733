use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use ember2d::{
    GameObject, GameObjectId, Runtime, RuntimeConfig, Scene, SceneEvent, SceneLoader, SceneManager, SceneScript,
};

/// Spawns one object per name.
struct Spawner {
    names: Vec<&'static str>,
}

impl SceneScript for Spawner {
    fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
        for name in &self.names {
            loader.spawn(GameObject::new(*name));
        }
        Ok(())
    }
}

/// Blocks `prepare` until the test releases it.
struct Gated {
    gate: Receiver<()>,
}

impl SceneScript for Gated {
    fn prepare(&mut self) -> Result<()> {
        self.gate.recv()?;
        Ok(())
    }

    fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
        loader.spawn(GameObject::new("level"));
        Ok(())
    }
}

fn gated_scene(name: &str) -> (Scene, Sender<()>) {
    let (sender, gate) = crossbeam_channel::bounded(1);
    (Scene::with_script(name, Gated { gate }), sender)
}

fn menu_and_game() -> Runtime {
    let mut runtime = Runtime::new(RuntimeConfig::default());
    let scenes = runtime.scenes_mut();
    scenes
        .register_scene(Scene::with_script("Menu", Spawner { names: vec!["title", "cursor"] }))
        .unwrap();
    scenes
        .register_scene(Scene::with_script("Game", Spawner { names: vec!["player"] }))
        .unwrap();
    runtime
}

fn scene_objects(runtime: &Runtime, name: &str) -> Vec<GameObjectId> {
    runtime.scenes().get_scene(name).map(|s| s.objects().collect()).unwrap_or_default()
}

/// Step frames with zero delta until the background load resolves.
fn wait_for_load(runtime: &mut Runtime) {
    for _ in 0..500 {
        runtime.update(Duration::ZERO);
        if !runtime.scenes().is_waiting_for_load() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("scene worker never reported back");
}

#[test]
fn test_zero_duration_transition_finishes_synchronously() {
    let mut runtime = menu_and_game();
    runtime.context().load_scene_with("Menu", 0.0, false).unwrap();
    let menu_objects = scene_objects(&runtime, "Menu");
    assert_eq!(menu_objects.len(), 2);

    runtime.context().load_scene_with("Game", 0.0, false).unwrap();

    let scenes = runtime.scenes();
    assert_eq!(scenes.active_scene_name(), Some("Game"));
    assert!(!scenes.is_transitioning());
    assert!(!scenes.get_scene("Menu").unwrap().is_loaded());
    assert!(scenes.get_scene("Game").unwrap().is_active());
    for id in menu_objects {
        assert!(!runtime.objects().contains(id));
    }
    assert!(runtime.objects().find_by_name("player").is_some());
}

#[test]
fn test_reloading_active_scene_keeps_its_objects() {
    let mut runtime = menu_and_game();
    runtime.context().load_scene_with("Game", 0.0, false).unwrap();
    let before = scene_objects(&runtime, "Game");

    runtime.context().load_scene_with("Game", 0.5, false).unwrap();
    runtime.update(Duration::from_millis(600));

    assert_eq!(runtime.scenes().active_scene_name(), Some("Game"));
    assert_eq!(scene_objects(&runtime, "Game"), before);
    for id in &before {
        assert!(runtime.objects().get(*id).map(GameObject::is_active).unwrap_or(false));
    }
    let events = runtime.scenes_mut().drain_events();
    assert!(!events.iter().any(|e| matches!(e, SceneEvent::SceneUnloaded(_))));
}

#[test]
fn test_interrupted_transition_never_applies() {
    let mut runtime = menu_and_game();
    runtime.context().load_scene_with("Menu", 1.0, false).unwrap();
    runtime.update(Duration::from_millis(500));
    assert!(runtime.scenes().transition_progress() > 0.4);

    runtime.context().load_scene_with("Game", 1.0, false).unwrap();
    assert_eq!(runtime.scenes().transition_progress(), 0.0);
    runtime.update(Duration::from_millis(600));
    assert_eq!(runtime.scenes().active_scene_name(), None);
    runtime.update(Duration::from_millis(500));

    let scenes = runtime.scenes();
    assert_eq!(scenes.active_scene_name(), Some("Game"));
    assert!(!scenes.get_scene("Menu").unwrap().is_loaded());
    assert!(runtime.objects().find_by_name("title").is_none());
    let events = runtime.scenes_mut().drain_events();
    assert_eq!(
        events,
        vec![
            SceneEvent::TransitionStarted { from: None, to: "Menu".into() },
            SceneEvent::TransitionCancelled { to: "Menu".into() },
            SceneEvent::TransitionStarted { from: None, to: "Game".into() },
            SceneEvent::SceneLoaded("Game".into()),
            SceneEvent::TransitionFinished { to: "Game".into() },
        ]
    );
}

#[test]
fn test_stalled_async_load_holds_the_transition() {
    let mut runtime = Runtime::new(RuntimeConfig::default());
    let (scene, release) = gated_scene("Level");
    runtime.scenes_mut().register_scene(scene).unwrap();

    runtime.context().load_scene_with("Level", 0.25, true).unwrap();
    for _ in 0..20 {
        runtime.update(Duration::from_millis(100));
    }
    let scenes = runtime.scenes();
    assert!(scenes.is_transitioning());
    assert!(scenes.is_waiting_for_load());
    assert_eq!(scenes.transition_progress(), 0.0);
    assert_eq!(scenes.active_scene_name(), None);

    release.send(()).unwrap();
    wait_for_load(&mut runtime);
    assert!(runtime.scenes().is_transitioning());
    runtime.update(Duration::from_millis(300));

    assert_eq!(runtime.scenes().active_scene_name(), Some("Level"));
    assert!(runtime.objects().find_by_name("level").is_some());
}

#[test]
fn test_direct_load_waits_for_the_transition_worker() {
    let mut runtime = Runtime::new(RuntimeConfig::default());
    let (scene, release) = gated_scene("Level");
    runtime.scenes_mut().register_scene(scene).unwrap();

    runtime.context().load_scene_with("Level", 0.1, true).unwrap();
    assert!(runtime.scenes().is_waiting_for_load());
    release.send(()).unwrap();
    SceneManager::load(&mut runtime.context(), "Level").unwrap();

    assert!(!runtime.scenes().is_waiting_for_load());
    assert_eq!(scene_objects(&runtime, "Level").len(), 1);

    runtime.update(Duration::from_millis(200));
    assert_eq!(runtime.scenes().active_scene_name(), Some("Level"));
    assert_eq!(scene_objects(&runtime, "Level").len(), 1);
    assert_eq!(
        runtime.objects().find_by_name("level").map(GameObject::is_active),
        Some(true)
    );
}

#[test]
fn test_zero_duration_async_load_finishes_when_ready() {
    let mut runtime = Runtime::new(RuntimeConfig::default());
    let (scene, release) = gated_scene("Level");
    runtime.scenes_mut().register_scene(scene).unwrap();

    runtime.context().load_scene_with("Level", 0.0, true).unwrap();
    assert!(runtime.scenes().is_transitioning());
    release.send(()).unwrap();
    wait_for_load(&mut runtime);

    assert!(!runtime.scenes().is_transitioning());
    assert_eq!(runtime.scenes().active_scene_name(), Some("Level"));
}

#[test]
fn test_cancelled_async_load_is_reclaimed_and_reused() {
    let mut runtime = menu_and_game();
    let (scene, release) = gated_scene("Level");
    runtime.scenes_mut().register_scene(scene).unwrap();

    runtime.context().load_scene_with("Level", 0.5, true).unwrap();
    runtime.context().load_scene_with("Game", 0.0, false).unwrap();
    assert_eq!(runtime.scenes().active_scene_name(), Some("Game"));
    assert_eq!(runtime.scenes().orphaned_loads(), 1);

    // Requesting the scene again adopts the worker instead of starting another.
    runtime.context().load_scene_with("Level", 0.0, true).unwrap();
    assert_eq!(runtime.scenes().orphaned_loads(), 0);
    assert!(runtime.scenes().is_waiting_for_load());

    release.send(()).unwrap();
    wait_for_load(&mut runtime);
    assert_eq!(runtime.scenes().active_scene_name(), Some("Level"));
    assert!(!runtime.scenes().get_scene("Game").unwrap().is_loaded());
}

#[test]
fn test_orphan_finishing_in_background_leaves_active_scene_alone() {
    let mut runtime = menu_and_game();
    let (scene, release) = gated_scene("Level");
    runtime.scenes_mut().register_scene(scene).unwrap();

    runtime.context().load_scene_with("Level", 0.5, true).unwrap();
    runtime.context().load_scene_with("Menu", 0.0, false).unwrap();
    release.send(()).unwrap();

    for _ in 0..500 {
        runtime.update(Duration::from_millis(1));
        if runtime.scenes().orphaned_loads() == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(runtime.scenes().orphaned_loads(), 0);
    assert_eq!(runtime.scenes().active_scene_name(), Some("Menu"));
    assert!(!runtime.scenes().get_scene("Level").unwrap().is_loaded());

    // Already prepared, so the next load does not wait.
    runtime.context().load_scene_with("Level", 0.0, true).unwrap();
    assert_eq!(runtime.scenes().active_scene_name(), Some("Level"));
}
