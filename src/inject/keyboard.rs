//! Paste-shortcut simulation backed by the `enigo` crate.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};

use super::InjectError;

fn sim_err(e: impl ToString) -> InjectError {
    InjectError::KeySimulation(e.to_string())
}

/// Send the platform paste shortcut to the focused window: Cmd+V on macOS,
/// Ctrl+V everywhere else.
///
/// A new [`Enigo`] handle is built per call; the handle is not `Send` and
/// costs little to construct.
///
/// # Errors
///
/// [`InjectError::KeySimulation`] when the backend cannot be initialised or
/// a key event is not delivered.
pub(super) fn simulate_paste() -> Result<(), InjectError> {
    let mut enigo = Enigo::new(&Settings::default()).map_err(sim_err)?;

    let modifier = if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    };

    enigo.key(modifier, Direction::Press).map_err(sim_err)?;
    enigo.key(Key::Unicode('v'), Direction::Click).map_err(sim_err)?;
    enigo.key(modifier, Direction::Release).map_err(sim_err)?;
    Ok(())
}
