//! Playback session and resume-progress engine.

mod index;
mod keys;
mod machine;
mod ports;
mod resume;
mod route;
mod writer;


pub use index::EpisodeRef;
pub use keys::{FocusTarget, Key, KeyOutcome, KeyPress, KeyboardController, SHORTCUTS};
pub use machine::{InitialSelection, PlaybackMachine};
pub use ports::{
    DisplayMode, PersistencePort, PreferenceStore, Preferences, ProgressStore, WatchPosition,
};
pub use resume::{ResumeDescriptor, continue_watching};
pub use route::{RouteSelection, parse_route, route_path};
pub use writer::ProgressWriter;
