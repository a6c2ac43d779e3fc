// input.rs
//
// Key bindings. Mapping a key to a command is pure; the scene renderer
// applies commands.

use winit::keyboard::KeyCode;

use crate::renderer::filter::FilterMode;

/// Distance the light moves per key press.
pub const LIGHT_STEP: f32 = 0.03;
/// Angle models turn per key press.
pub const MODEL_ROTATION_STEP: f32 = std::f32::consts::PI / 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Quit,
    CameraUp,
    CameraDown,
    CameraNearer,
    CameraFarther,
    CameraClockwise,
    CameraCounterclockwise,
    /// Offset added to the point light position.
    MoveLight([f32; 3]),
    SelectFilter(FilterMode),
    ToggleWireframe,
    RotateModels(f32),
    TogglePointLight,
    ToggleAmbientLight,
}

pub fn command_for_key(key: KeyCode) -> Option<Command> {
    let command = match key {
        KeyCode::Escape => Command::Quit,
        KeyCode::ArrowUp => Command::CameraUp,
        KeyCode::ArrowDown => Command::CameraDown,
        KeyCode::PageUp | KeyCode::NumpadAdd | KeyCode::Equal => Command::CameraNearer,
        KeyCode::PageDown | KeyCode::NumpadSubtract | KeyCode::Minus => Command::CameraFarther,
        KeyCode::ArrowLeft => Command::CameraClockwise,
        KeyCode::ArrowRight => Command::CameraCounterclockwise,

        KeyCode::KeyA => Command::MoveLight([0.0, LIGHT_STEP, 0.0]),
        KeyCode::KeyD => Command::MoveLight([0.0, -LIGHT_STEP, 0.0]),
        KeyCode::KeyW => Command::MoveLight([-LIGHT_STEP, 0.0, 0.0]),
        KeyCode::KeyS => Command::MoveLight([LIGHT_STEP, 0.0, 0.0]),
        KeyCode::KeyR => Command::MoveLight([0.0, 0.0, LIGHT_STEP]),
        KeyCode::KeyF => Command::MoveLight([0.0, 0.0, -LIGHT_STEP]),

        KeyCode::Backquote => Command::SelectFilter(FilterMode::Off),
        KeyCode::Digit0 => return filter_key(0),
        KeyCode::Digit1 => return filter_key(1),
        KeyCode::Digit2 => return filter_key(2),
        KeyCode::Digit3 => return filter_key(3),
        KeyCode::Digit4 => return filter_key(4),
        KeyCode::Digit5 => return filter_key(5),
        KeyCode::Digit6 => return filter_key(6),

        KeyCode::KeyX => Command::ToggleWireframe,
        KeyCode::KeyQ => Command::RotateModels(-MODEL_ROTATION_STEP),
        KeyCode::KeyE => Command::RotateModels(MODEL_ROTATION_STEP),
        KeyCode::KeyL => Command::TogglePointLight,
        KeyCode::KeyK => Command::ToggleAmbientLight,
        _ => return None,
    };
    Some(command)
}

fn filter_key(digit: u8) -> Option<Command> {
    FilterMode::from_digit(digit).map(Command::SelectFilter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_six_selects_sixteen_blur_iterations() {
        assert_eq!(
            command_for_key(KeyCode::Digit6),
            Some(Command::SelectFilter(FilterMode::Filtered {
                blur_iterations: 16
            }))
        );
    }

    #[test]
    fn zero_and_backquote_both_disable_filtering() {
        let off = Some(Command::SelectFilter(FilterMode::Off));
        assert_eq!(command_for_key(KeyCode::Digit0), off);
        assert_eq!(command_for_key(KeyCode::Backquote), off);
    }

    #[test]
    fn light_keys_come_in_opposing_pairs() {
        for (plus, minus) in [
            (KeyCode::KeyA, KeyCode::KeyD),
            (KeyCode::KeyS, KeyCode::KeyW),
            (KeyCode::KeyR, KeyCode::KeyF),
        ] {
            let (Some(Command::MoveLight(a)), Some(Command::MoveLight(b))) =
                (command_for_key(plus), command_for_key(minus))
            else {
                panic!("{plus:?}/{minus:?} should move the light");
            };
            for k in 0..3 {
                assert_eq!(a[k], -b[k]);
            }
        }
    }

    #[test]
    fn unbound_keys_do_nothing() {
        assert_eq!(command_for_key(KeyCode::KeyZ), None);
        assert_eq!(command_for_key(KeyCode::Digit7), None);
    }
}
