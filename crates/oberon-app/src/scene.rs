// SPDX-License-Identifier: CEPL-1.0
use clap::Subcommand;
use oberon_core::Extent2d;
use oberon_math::{rotate, Mat4, Vec3};
use oberon_platform::{DisplayStyle, Key, ModifierKey};
use oberon_render::{PositionColor, PresentationMode};
use oberon_render_vk::RenderWindow;

#[derive(Subcommand, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SceneKind {
    /// Full-screen triangle from the built-in test pipeline
    #[default]
    TestImage,
    /// Rotating colored cube
    Cube,
    /// The cube in two windows with separate cameras (WASD moves the first)
    Multiwindow,
}

/// Degrees per second about each axis.
pub const SPIN_DEGREES: f32 = 30.0;
pub const FOV_DEGREES: f32 = 106.0;
pub const ASPECT: f32 = 16.0 / 9.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 100.0;
pub const CAMERA_SPEED: f32 = 5.0;

/// One frame's rotation: about +Y, then about +X.
pub fn spin(model: Mat4, dt: f32) -> Mat4 {
    let step = SPIN_DEGREES.to_radians() * dt;
    rotate(rotate(model, step, Vec3::Y), step, Vec3::X)
}

/// Attachment extent to switch to once the primary window's client area
/// has settled on a different, drawable size.
pub fn frame_resize(current: Extent2d, drawable: Extent2d) -> Option<Extent2d> {
    (!drawable.is_empty() && drawable != current).then_some(drawable)
}

/// (outward normal, u, v) with u × v = normal, and the face color.
const FACES: [([f32; 3], [f32; 3], [f32; 3], [f32; 4]); 6] = [
    ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 0.0, 1.0]),
    ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0, 1.0]),
    ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0, 1.0]),
    ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 1.0, 1.0]),
    ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0, 1.0]),
    ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0, 1.0]),
];

/// Unit cube centered on the origin, two counter-clockwise triangles per face.
pub fn cube_vertices() -> Vec<PositionColor> {
    const CORNERS: [(f32, f32); 6] = [
        (-1.0, -1.0),
        (1.0, -1.0),
        (1.0, 1.0),
        (1.0, 1.0),
        (-1.0, 1.0),
        (-1.0, -1.0),
    ];
    FACES
        .iter()
        .flat_map(|&(n, u, v, color)| {
            let (n, u, v) = (Vec3::from(n), Vec3::from(u), Vec3::from(v));
            CORNERS.iter().map(move |&(s, t)| {
                let p = 0.5 * (n + s * u + t * v);
                PositionColor {
                    position: [p.x, p.y, p.z, 1.0],
                    color,
                }
            })
        })
        .collect()
}

pub fn next_display_style(style: DisplayStyle) -> DisplayStyle {
    match style {
        DisplayStyle::Windowed => DisplayStyle::FullscreenComposited,
        DisplayStyle::FullscreenComposited => DisplayStyle::Windowed,
        other => other,
    }
}

pub fn next_present_mode(mode: PresentationMode) -> PresentationMode {
    match mode {
        PresentationMode::Fifo => PresentationMode::Immediate,
        _ => PresentationMode::Fifo,
    }
}

/// Escape hides the window and asks to quit; Alt+Enter toggles fullscreen;
/// Insert toggles immediate presentation.
pub fn on_key_press(win: &mut RenderWindow) -> bool {
    let events = win.events();
    if events.is_key_just_pressed(Key::Escape) {
        win.hide();
        return true;
    }
    let fullscreen = events.is_key_just_pressed(Key::Enter)
        && events.is_modifier_pressed(ModifierKey::Alt);
    let present = events.is_key_just_pressed(Key::Insert);
    if fullscreen {
        win.change_display_style(next_display_style(win.current_display_style()));
    }
    if present {
        win.request_presentation_mode(next_present_mode(win.current_presentation_mode()));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use oberon_math::approx_eq;

    #[test]
    fn cube_has_36_outward_facing_vertices() {
        let v = cube_vertices();
        assert_eq!(v.len(), 36);
        for tri in v.chunks(3) {
            let p = |i: usize| Vec3::from_slice(&tri[i].position[..3]);
            let normal = (p(1) - p(0)).cross(p(2) - p(0));
            let centroid = (p(0) + p(1) + p(2)) / 3.0;
            assert!(normal.dot(centroid) > 0.0, "inward triangle {tri:?}");
            assert!(tri.iter().all(|q| q.position.iter().take(3).all(|c| c.abs() == 0.5)));
        }
    }

    #[test]
    fn frames_follow_the_drawable_size() {
        let now = Extent2d::new(1280, 720);
        assert_eq!(frame_resize(now, now), None);
        assert_eq!(frame_resize(now, Extent2d::new(640, 360)), Some(Extent2d::new(640, 360)));
        assert_eq!(frame_resize(now, Extent2d::new(0, 360)), None);
        assert_eq!(frame_resize(now, Extent2d::default()), None);
    }

    #[test]
    fn each_face_has_one_color() {
        for face in cube_vertices().chunks(6) {
            assert!(face.iter().all(|q| q.color == face[0].color));
        }
    }

    #[test]
    fn twelve_seconds_of_spin() {
        let dt = 1.0 / 60.0;
        let mut model = Mat4::IDENTITY;
        for _ in 0..720 {
            model = spin(model, dt);
        }
        let step = SPIN_DEGREES.to_radians() * dt;
        let mut expected = Mat4::IDENTITY;
        for _ in 0..720 {
            expected = expected * Mat4::from_rotation_y(step) * Mat4::from_rotation_x(step);
        }
        assert!(approx_eq(&model, &expected, 1e-3));
    }

    #[test]
    fn fullscreen_toggle_round_trips() {
        let s = next_display_style(DisplayStyle::Windowed);
        assert_eq!(s, DisplayStyle::FullscreenComposited);
        assert_eq!(next_display_style(s), DisplayStyle::Windowed);
        assert_eq!(
            next_display_style(DisplayStyle::FullscreenBypassCompositor),
            DisplayStyle::FullscreenBypassCompositor
        );
    }

    #[test]
    fn present_toggle() {
        assert_eq!(next_present_mode(PresentationMode::Fifo), PresentationMode::Immediate);
        assert_eq!(next_present_mode(PresentationMode::Immediate), PresentationMode::Fifo);
        assert_eq!(next_present_mode(PresentationMode::Mailbox), PresentationMode::Fifo);
    }
}
