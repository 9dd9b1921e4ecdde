pub mod display;
pub mod input;

pub use input::{is_affirmative, prompt, spawn_stdin_reader, InputEvent, PasteCollector};
