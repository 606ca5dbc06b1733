use anyhow::{anyhow, Result};
use ember2d::ui::{ElementKind, UiCanvas, UiElement, UiId};
use ember2d::{
    Behaviour, BehaviourId, Component, Context, DrawList, GameObject, GameObjectId, Runtime, Scene,
    SceneLoader, SceneScript, TextureHandle, Vec2,
};

pub const MENU: &str = "Menu";
pub const ARENA: &str = "Arena";
pub const PLAY_BUTTON: &str = "play";

const HEALTH_BAR: &str = "health";
const WAVE_LABEL: &str = "wave";
const ENEMY_TEXTURE: TextureHandle = TextureHandle(1);
const PLAYER_TEXTURE: TextureHandle = TextureHandle(2);

pub fn register_scenes(runtime: &mut Runtime) -> Result<()> {
    let scenes = runtime.scenes_mut();
    scenes.register_scene(Scene::with_script(MENU, MenuScene::default()))?;
    scenes.register_scene(Scene::with_script(ARENA, ArenaScene::default()))?;
    Ok(())
}

#[derive(Default)]
struct MenuScene {
    canvas: Option<BehaviourId>,
}

impl SceneScript for MenuScene {
    fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
        let size = Vec2::new(loader.config().screen_width as f32, loader.config().screen_height as f32);
        let canvas = UiCanvas::new("menu").with_builder(move |ui, canvas| {
            let panel = ui.canvas_add(
                canvas,
                UiElement::panel(size * 0.5 - Vec2::new(160.0, 110.0), Vec2::new(320.0, 220.0))
                    .with_title("Wave Arena", 32.0)
                    .with_padding(16.0)
                    .with_background([0.08, 0.09, 0.12, 0.95])
                    .with_corner_radius(10.0)
                    .with_shadow([0.0, 0.0, 0.0, 0.5], Vec2::splat(6.0)),
            )?;
            ui.spawn_child(
                panel,
                UiElement::button("Play", Vec2::new(64.0, 60.0), Vec2::new(160.0, 44.0))
                    .with_name(PLAY_BUTTON)
                    .on_action(|ctx, id| {
                        if let Some(button) = ctx.ui.element_mut(id) {
                            button.enabled = false;
                        }
                        ctx.load_scene(ARENA)?;
                        Ok(())
                    }),
            )?;
            Ok(())
        });
        self.canvas = Some(loader.context().add_behaviour(canvas));
        Ok(())
    }

    fn on_unload(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        if let Some(canvas) = self.canvas.take() {
            ctx.remove_behaviour(canvas);
        }
        Ok(())
    }
}

#[derive(Default)]
struct ArenaScene {
    behaviours: Vec<BehaviourId>,
}

impl SceneScript for ArenaScene {
    fn load(&mut self, loader: &mut SceneLoader<'_, '_>) -> Result<()> {
        let center = Vec2::new(loader.config().screen_width as f32, loader.config().screen_height as f32) * 0.5;
        let player = loader.spawn(
            GameObject::new("player")
                .with_tag("player")
                .with_position(center)
                .with_component(Health::new(100.0))
                .with_component(Sprite::new(PLAYER_TEXTURE, 24.0)),
        );

        let hud = UiCanvas::new("hud").with_builder(|ui, canvas| {
            let panel = ui.canvas_add(
                canvas,
                UiElement::panel(Vec2::new(16.0, 16.0), Vec2::new(220.0, 64.0))
                    .with_padding(8.0)
                    .with_background([0.0, 0.0, 0.0, 0.4])
                    .with_cached_rendering(true),
            )?;
            ui.spawn_child(panel, UiElement::label("Wave 1", Vec2::ZERO, 18.0).with_name(WAVE_LABEL))?;
            ui.spawn_child(
                panel,
                UiElement::progress_bar(Vec2::new(0.0, 28.0), Vec2::new(200.0, 12.0), 1.0).with_name(HEALTH_BAR),
            )?;
            Ok(())
        });
        let ctx = loader.context();
        self.behaviours.push(ctx.add_behaviour(hud));
        self.behaviours.push(ctx.add_behaviour(WaveSpawner::new(player)));
        Ok(())
    }

    fn on_unload(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        for id in self.behaviours.drain(..) {
            ctx.remove_behaviour(id);
        }
        // Chasers are spawned at runtime, outside the scene's ownership.
        let enemies: Vec<GameObjectId> = ctx.objects.find_all_by_tag("enemy").iter().map(|e| e.id()).collect();
        for id in enemies {
            ctx.destroy(id);
        }
        Ok(())
    }
}

struct Health {
    current: f32,
    max: f32,
}

impl Health {
    fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    fn fraction(&self) -> f32 {
        (self.current / self.max).clamp(0.0, 1.0)
    }
}

impl Component for Health {}

struct Sprite {
    texture: TextureHandle,
    size: f32,
}

impl Sprite {
    fn new(texture: TextureHandle, size: f32) -> Self {
        Self { texture, size }
    }
}

impl Component for Sprite {
    fn draw(&self, object: &GameObject, draw: &mut DrawList) -> Result<()> {
        let transform = object.transform();
        let size = Vec2::splat(self.size) * transform.world_scale();
        draw.sprite(
            self.texture,
            transform.world_position() - size * 0.5,
            size,
            transform.world_rotation(),
            [1.0; 4],
        );
        Ok(())
    }
}

/// Walks towards the player and bites once on contact.
struct Chaser {
    target: GameObjectId,
    speed: f32,
    damage: f32,
}

impl Component for Chaser {
    fn update(&mut self, object: &mut GameObject, ctx: &mut Context<'_>) -> Result<()> {
        let Some(target) = ctx.objects.get_mut(self.target) else {
            return Ok(());
        };
        let goal = target.transform().world_position();
        let here = object.transform().world_position();
        let offset = goal - here;
        if offset.length() < 20.0 {
            if let Some(health) = target.get_component_mut::<Health>() {
                health.current -= self.damage;
            }
            ctx.destroy(object.id());
            return Ok(());
        }
        let step = offset.normalize_or_zero() * self.speed * ctx.delta_seconds();
        object.transform().translate(step);
        object.transform().set_local_rotation(offset.y.atan2(offset.x));
        Ok(())
    }
}

/// Spawns waves of chasers around the arena edge and keeps the HUD current.
struct WaveSpawner {
    player: GameObjectId,
    wave: u32,
    cooldown: f32,
    game_over: bool,
    shown: (u32, f32),
}

impl WaveSpawner {
    fn new(player: GameObjectId) -> Self {
        Self {
            player,
            wave: 0,
            cooldown: 1.0,
            game_over: false,
            shown: (0, 1.0),
        }
    }

    fn spawn_wave(&mut self, ctx: &mut Context<'_>) {
        self.wave += 1;
        let width = ctx.config.screen_width as f32;
        let height = ctx.config.screen_height as f32;
        for _ in 0..(3 + self.wave * 2) {
            let position = match fastrand::u8(0..4) {
                0 => Vec2::new(0.0, fastrand::f32() * height),
                1 => Vec2::new(width, fastrand::f32() * height),
                2 => Vec2::new(fastrand::f32() * width, 0.0),
                _ => Vec2::new(fastrand::f32() * width, height),
            };
            ctx.spawn(
                GameObject::new("chaser")
                    .with_tag("enemy")
                    .with_position(position)
                    .with_component(Chaser {
                        target: self.player,
                        speed: 90.0 + fastrand::f32() * 40.0 + self.wave as f32 * 10.0,
                        damage: 5.0,
                    })
                    .with_component(Sprite::new(ENEMY_TEXTURE, 16.0)),
            );
        }
        log::info!("wave {} incoming", self.wave);
    }

    /// Touch the HUD only when something changed so its cached layer stays valid.
    fn refresh_hud(&mut self, ctx: &mut Context<'_>, health: f32) -> Result<()> {
        if self.shown == (self.wave, health) {
            return Ok(());
        }
        self.shown = (self.wave, health);

        let bar = find(ctx, HEALTH_BAR)?;
        if let Some(ElementKind::ProgressBar { value, .. }) = ctx.ui.element_mut(bar).map(|e| &mut e.kind) {
            *value = health;
        }
        let label = find(ctx, WAVE_LABEL)?;
        if let Some(ElementKind::Label { text, .. }) = ctx.ui.element_mut(label).map(|e| &mut e.kind) {
            *text = format!("Wave {}", self.wave.max(1));
        }
        Ok(())
    }
}

fn find(ctx: &Context<'_>, name: &str) -> Result<UiId> {
    ctx.ui
        .find_by_name(name)
        .ok_or_else(|| anyhow!("HUD element `{name}` is missing"))
}

impl Behaviour for WaveSpawner {
    fn update(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let health = ctx
            .objects
            .get(self.player)
            .and_then(|player| player.get_component::<Health>())
            .map(Health::fraction)
            .unwrap_or(0.0);
        if self.game_over {
            return Ok(());
        }
        if health <= 0.0 {
            log::info!("player down on wave {}", self.wave);
            self.game_over = true;
            ctx.load_scene(MENU)?;
            return Ok(());
        }

        let enemies = ctx.objects.find_all_by_tag("enemy").len();
        self.cooldown -= ctx.delta_seconds();
        if enemies == 0 && self.cooldown <= 0.0 {
            self.spawn_wave(ctx);
            self.cooldown = 2.0;
        }
        self.refresh_hud(ctx, health)
    }
}
