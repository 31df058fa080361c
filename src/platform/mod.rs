//! Platform-specific helpers.
//! This module hides OS differences (Unix/Windows) behind a uniform API so
//! the rest of the codebase can remain platform-agnostic.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::{
    NoDevice, UnsupportedDevices as SystemDevices, open_log_file_secure_append, set_dir_mode_0700,
    write_config_secure_new_0600,
};

#[cfg(windows)]
pub use windows::{
    RawDevice, WindowsDevices as SystemDevices, open_log_file_secure_append,
    set_dir_mode_0700, write_config_secure_new_0600,
};
