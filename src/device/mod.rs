//! Device access: selection, coordinates, screen size and state collection.

pub mod adb;
pub mod coords;
pub mod screen;
pub mod selector;
pub mod state;

pub use adb::AdbCollector;
pub use coords::{CoordSpace, CoordinateResolution, resolve};
pub use selector::{ensure_connected, select_device};
pub use state::{DetailLevel, DeviceState, Notification, RawOutput, Screenshot};

/// Source of device lists, device state and raw device commands.
///
/// Implementations spawn their helpers through the subprocess registry so
/// timeouts and interrupts can reclaim them.
pub trait DeviceCollector: Send + Sync {
    /// Connected, authorized device ids in the order the platform reports them.
    fn list_devices(&self) -> anyhow::Result<Vec<String>>;

    fn get_state(&self, device_id: &str, detail: DetailLevel) -> anyhow::Result<DeviceState>;

    /// Run a raw device command such as `shell wm size`.
    fn run_raw_command(&self, args: &[&str], device_id: &str) -> anyhow::Result<RawOutput>;
}
