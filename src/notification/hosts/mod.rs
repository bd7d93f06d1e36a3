//! 宿主实现

pub mod desktop;
pub mod log;
pub mod recording;

pub use desktop::DesktopHost;
pub use log::LogHost;
pub use recording::RecordingHost;
