pub mod events;
pub mod handler;

pub use events::{EventHandled, InputEvent, KeyCode, KeyModifiers};
pub use handler::InputHandler;
