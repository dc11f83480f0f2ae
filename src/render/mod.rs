//! Draw pass over the scene graph
//!
//! The core does not own a real drawing context. It renders against the
//! `DrawSurface` trait: the binary wires up whatever backend it has, and
//! tests use `RecordingSurface` to assert on emitted draw calls.

use crate::game::world::SessionState;
use crate::geom::Vector2;
use crate::scene::character::{Animation, Character};
use crate::scene::{DrawLayer, EffectKind, NodeKind, Scene};

/// Visible area, in world units
pub const VIEWPORT_W: i32 = 640;
pub const VIEWPORT_H: i32 = 480;
/// Omittable nodes farther than this from the camera are skipped
pub const CULL_RADIUS: f64 = 520.0;

const WALK_FRAME_MS: u64 = 150;
const WALK_FRAMES: u64 = 4;
const EFFECT_FRAME_MS: u64 = 400;
const EFFECT_FRAMES: u64 = 3;

/// Abstract 2D drawing target
pub trait DrawSurface {
    fn draw_sprite(&mut self, name: &str, frame: u32, x: i32, y: i32);
    fn draw_text(&mut self, text: &str, x: i32, y: i32);
    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32);
}

/// Surface that discards everything. Used when running headless.
#[derive(Debug, Default)]
pub struct NullSurface;

impl DrawSurface for NullSurface {
    fn draw_sprite(&mut self, _name: &str, _frame: u32, _x: i32, _y: i32) {}
    fn draw_text(&mut self, _text: &str, _x: i32, _y: i32) {}
    fn fill_rect(&mut self, _x: i32, _y: i32, _w: i32, _h: i32) {}
}

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Sprite {
        name: String,
        frame: u32,
        x: i32,
        y: i32,
    },
    Text {
        text: String,
        x: i32,
        y: i32,
    },
    Rect {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    },
}

/// Surface that records draw calls for assertions
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sprites(&self) -> Vec<&DrawOp> {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Sprite { .. }))
            .collect()
    }
}

impl DrawSurface for RecordingSurface {
    fn draw_sprite(&mut self, name: &str, frame: u32, x: i32, y: i32) {
        self.ops.push(DrawOp::Sprite {
            name: name.to_string(),
            frame,
            x,
            y,
        });
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.ops.push(DrawOp::Rect { x, y, w, h });
    }
}

/// Draw the whole scene back-to-front, camera-translated except for the HUD
/// layer, then the session HUD overlay on top.
pub fn draw_frame(
    scene: &Scene,
    session: &SessionState,
    camera: Vector2,
    now: u64,
    surface: &mut dyn DrawSurface,
) {
    let offset = Vector2::new(camera.x - VIEWPORT_W / 2, camera.y - VIEWPORT_H / 2);

    for id in scene.draw_order() {
        let Some(node) = scene.get(id) else { continue };
        if node.omittable && node.position.distance_to(camera) > CULL_RADIUS {
            continue;
        }
        let (x, y) = if node.layer == DrawLayer::Hud {
            (node.position.x, node.position.y)
        } else {
            (node.position.x - offset.x, node.position.y - offset.y)
        };

        match &node.kind {
            NodeKind::Character(character) => draw_character(character, x, y, now, surface),
            NodeKind::TrailWall(_) => surface.draw_sprite("bike_wall", 0, x, y),
            NodeKind::Effect(effect) => {
                let elapsed = now.saturating_sub(effect.started_ms);
                let frame = (elapsed / EFFECT_FRAME_MS).min(EFFECT_FRAMES - 1) as u32;
                let name = match effect.kind {
                    EffectKind::Explosion => "explosion",
                    EffectKind::WallBreak => "wall_break",
                };
                surface.draw_sprite(name, frame, x, y);
            }
        }
    }

    draw_hud(session, surface);
}

fn draw_character(character: &Character, x: i32, y: i32, now: u64, surface: &mut dyn DrawSurface) {
    let elapsed = now.saturating_sub(character.animation_started_ms);
    let (name, frame) = match character.animation {
        Animation::Stand => (format!("hero_stand_{}", character.facing.as_str()), 0),
        Animation::Walk => (
            format!("hero_walk_{}", character.facing.as_str()),
            ((elapsed / WALK_FRAME_MS) % WALK_FRAMES) as u32,
        ),
        Animation::PickUp => (
            "hero_pickup_down".to_string(),
            ((elapsed / WALK_FRAME_MS).min(2)) as u32,
        ),
        Animation::Attack => (
            format!("hero_attack_{}", character.facing.as_str()),
            ((elapsed / WALK_FRAME_MS).min(2)) as u32,
        ),
    };
    surface.draw_sprite(&name, frame, x, y);

    if let Some(bubble) = &character.bubble {
        surface.draw_text(&bubble.text, x, y - 12);
    }
}

fn draw_hud(session: &SessionState, surface: &mut dyn DrawSurface) {
    surface.draw_text(&format!("score {}", session.score), 8, 8);
    surface.draw_text(&format!("time {}s", session.time_on_level_secs), 8, 20);
    surface.draw_text(&format!("walls {}", session.walls_placed), 8, 32);
    surface.draw_text(&format!("kills {}", session.kills), 8, 44);
    surface.draw_text(&session.level, VIEWPORT_W - 96, 8);
    if session.server_down {
        surface.draw_text("CONNECTION LOST", VIEWPORT_W / 2 - 56, 8);
    }
}
