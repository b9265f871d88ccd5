//! On-screen item notifications.
//!
//! Icons spawn above the screen, fall under gravity onto a stack that grows
//! upwards from the bottom edge, bounce until they settle, sit there for a
//! while and then slide off to the left. The scheduler only owns positions;
//! drawing is left to the host using [`NotificationIcon::screen_pos`].

/// Side length of an icon.
pub const NOTIF_SIZE: f32 = 30.0;
/// Vertical gap between stacked icons.
pub const NOTIF_PADDING: f32 = 2.0;
/// Ticks an icon stays settled before it starts hiding.
pub const HOLD_TICKS: u32 = 350;

const GRAVITY: f32 = 0.15;
const MAX_FALL_SPEED: f32 = 8.0;
const BOUNCE: f32 = -0.3;
const HIDE_ACCEL: f32 = 0.14;
const SPAWN_Y: f32 = -200.0 + NOTIF_SIZE / 2.0;
const STACK_BOTTOM: f32 = 2.0;
/// The icon above may only start falling once the one below has passed this height.
const DROP_CLEARANCE: f32 = -160.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconState {
    Pending,
    Dropping,
    Hiding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationIcon {
    pub sprite: String,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Ticks spent resting on the stack.
    pub age: u32,
    pub state: IconState,
}

impl NotificationIcon {
    fn new(sprite: String, text: String) -> Self {
        Self {
            sprite,
            text,
            x: NOTIF_SIZE / 2.0 + 2.0,
            y: SPAWN_Y,
            vel_x: 0.0,
            vel_y: 0.0,
            age: 0,
            state: IconState::Pending,
        }
    }

    /// Position relative to the bottom-left corner of a 320x200 screen, y down.
    pub fn screen_pos(&self) -> (i32, i32) {
        (self.x.round() as i32, (200.0 + self.y).round() as i32)
    }
}

#[derive(Debug, Default)]
pub struct NotificationScheduler {
    icons: Vec<NotificationIcon>,
}

impl NotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an icon at the top of the stack.
    pub fn push(&mut self, sprite: impl Into<String>, text: impl Into<String>) {
        self.icons.push(NotificationIcon::new(sprite.into(), text.into()));
    }

    /// Live icons, bottom of the stack first.
    pub fn icons(&self) -> &[NotificationIcon] {
        &self.icons
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    /// Advances every icon by one game tick.
    pub fn tick(&mut self) {
        let mut previous_y = STACK_BOTTOM;

        self.icons.retain_mut(|icon| {
            if icon.state == IconState::Pending {
                if previous_y > DROP_CLEARANCE {
                    icon.state = IconState::Dropping;
                } else {
                    return true;
                }
            }

            if icon.state == IconState::Dropping {
                icon.vel_y = (icon.vel_y + GRAVITY).min(MAX_FALL_SPEED);
                icon.y += icon.vel_y;

                let rest_y = previous_y - NOTIF_SIZE - NOTIF_PADDING;
                if icon.y >= rest_y {
                    icon.y = rest_y;
                    icon.vel_y *= BOUNCE;
                    icon.age += 1;
                    if icon.age > HOLD_TICKS {
                        icon.state = IconState::Hiding;
                    }
                }
            }

            if icon.state == IconState::Hiding {
                icon.vel_x -= HIDE_ACCEL;
                icon.x += icon.vel_x;
                if icon.x < -NOTIF_SIZE / 2.0 {
                    return false;
                }
            }

            previous_y = icon.y;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_first_tick_starts_dropping() {
        let mut scheduler = NotificationScheduler::new();
        scheduler.push("BKEYA0", "MAP01");
        scheduler.tick();

        let icon = &scheduler.icons()[0];
        assert_eq!(icon.state, IconState::Dropping);
        assert_approx_eq!(icon.vel_y, GRAVITY);
        assert_approx_eq!(icon.y, SPAWN_Y + GRAVITY);
    }

    #[test]
    fn test_fall_speed_is_capped() {
        let mut scheduler = NotificationScheduler::new();
        scheduler.push("BKEYA0", "");
        for _ in 0..60 {
            scheduler.tick();
            assert!(scheduler.icons()[0].vel_y <= MAX_FALL_SPEED);
        }
    }

    #[test]
    fn test_second_icon_waits_for_clearance() {
        let mut scheduler = NotificationScheduler::new();
        scheduler.push("BKEYA0", "");
        scheduler.push("YKEYA0", "");

        scheduler.tick();
        assert_eq!(scheduler.icons()[1].state, IconState::Pending);

        for _ in 0..200 {
            scheduler.tick();
        }
        assert_eq!(scheduler.icons()[1].state, IconState::Dropping);
    }

    #[test]
    fn test_icons_stack_without_overlap() {
        let mut scheduler = NotificationScheduler::new();
        scheduler.push("BKEYA0", "");
        scheduler.push("YKEYA0", "");
        for _ in 0..300 {
            scheduler.tick();
        }

        let icons = scheduler.icons();
        assert_approx_eq!(icons[0].y, STACK_BOTTOM - NOTIF_SIZE - NOTIF_PADDING, 0.5);
        assert_approx_eq!(icons[1].y, icons[0].y - NOTIF_SIZE - NOTIF_PADDING, 0.5);
    }

    #[test]
    fn test_icon_lifecycle() {
        let mut scheduler = NotificationScheduler::new();
        scheduler.push("PMAPA0", "E1M1");

        for _ in 0..=HOLD_TICKS {
            scheduler.tick();
            assert_ne!(scheduler.icons()[0].state, IconState::Hiding);
        }

        let mut hid = false;
        for _ in 0..2000 {
            scheduler.tick();
            match scheduler.icons().first() {
                Some(icon) if icon.state == IconState::Hiding => hid = true,
                Some(_) => {}
                None => break,
            }
        }
        assert!(hid);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_screen_pos() {
        let mut icon = NotificationIcon::new("BKEYA0".into(), String::new());
        icon.y = -30.0;
        assert_eq!(icon.screen_pos(), (17, 170));
    }
}
