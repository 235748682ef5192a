use std::time::Instant;

use core_types::GestureTuning;

/// Resting rotation of a card face, in degrees.
pub fn resting_rotation(is_flipped: bool) -> f32 {
    if is_flipped { 180.0 } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragUpdate {
    /// Not a flip gesture; the caller should let default scrolling happen.
    Ignored,
    Horizontal {
        progress: f32,
        /// Live rotation: resting rotation plus `progress * ±180°`.
        rotation_deg: f32,
        /// Rotation the card would settle on if the flip commits.
        target_deg: f32,
    },
}

#[derive(Debug, Clone, Copy)]
struct GestureSample {
    origin: Point,
    started_at: Instant,
    moved: bool,
}

/// Classifies one touch interaction at a time as a flip or a no-op.
#[derive(Debug, Clone)]
pub struct GestureRecognizer {
    tuning: GestureTuning,
    card_width: f32,
    active: Option<GestureSample>,
}

impl GestureRecognizer {
    pub fn new(tuning: GestureTuning, card_width: f32) -> Self {
        Self {
            tuning,
            card_width,
            active: None,
        }
    }

    pub fn set_card_width(&mut self, card_width: f32) {
        self.card_width = card_width;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Returns `false` when a touch is already being tracked; the first
    /// gesture wins.
    pub fn start(&mut self, position: Point, at: Instant) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(GestureSample {
            origin: position,
            started_at: at,
            moved: false,
        });
        true
    }

    pub fn update(&mut self, position: Point, resting_deg: f32) -> DragUpdate {
        let Some(sample) = self.active.as_mut() else {
            return DragUpdate::Ignored;
        };
        sample.moved = true;

        let delta_x = position.x - sample.origin.x;
        let delta_y = position.y - sample.origin.y;
        if delta_x.abs() <= delta_y.abs() || delta_x.abs() <= self.tuning.horizontal_slop_px {
            return DragUpdate::Ignored;
        }

        let progress = self.progress(delta_x);
        let direction = if delta_x > 0.0 { 1.0 } else { -1.0 };
        DragUpdate::Horizontal {
            progress,
            rotation_deg: resting_deg + direction * 180.0 * progress,
            target_deg: resting_deg + direction * 180.0,
        }
    }

    /// Decides whether the released drag commits a flip. Tracking state is
    /// cleared whatever the outcome.
    pub fn end(&mut self, position: Point, at: Instant) -> bool {
        let Some(sample) = self.active.take() else {
            return false;
        };
        if !sample.moved {
            return false;
        }

        let delta_x = (position.x - sample.origin.x).abs();
        let elapsed_ms = (at.saturating_duration_since(sample.started_at).as_secs_f32() * 1000.0)
            .max(1.0);
        let velocity = delta_x / elapsed_ms;

        self.progress(delta_x) > self.tuning.progress_threshold
            || velocity >= self.tuning.velocity_threshold
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    fn progress(&self, delta_x: f32) -> f32 {
        let span = self.card_width * self.tuning.half_width_factor;
        if span <= 0.0 {
            return 0.0;
        }
        (delta_x.abs() / span).clamp(0.0, 1.0)
    }
}
