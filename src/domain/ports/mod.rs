pub mod process_terminator;
pub mod subprocess_launcher;

pub use process_terminator::ProcessTerminator;
pub use subprocess_launcher::{LaunchRequest, LaunchedProcess, NullLauncher, SubprocessLauncher};
