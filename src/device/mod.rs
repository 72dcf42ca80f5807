//! Device control
//!
//! - `DeviceTransport` - primitive screen/input operations on one device
//! - `adb` - transport backed by the `adb` and `maestro` command line tools
//! - `executor` - maps model actions onto transport calls
//! - `doctor` - host setup checks

pub mod adb;
pub mod doctor;
pub mod executor;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;

pub use adb::AdbDriver;
pub use executor::ActionExecutor;

/// Primitive operations on a connected device.
///
/// Expected operational failures (missing binary, non-zero exit, timeout)
/// are reported as `false` / `None` with the reason kept in [`last_error`].
///
/// [`last_error`]: DeviceTransport::last_error
#[async_trait]
pub trait DeviceTransport: Send {
    /// Save a screenshot to `path`
    async fn capture(&mut self, path: &Path) -> bool;

    /// Dump the current UI hierarchy
    async fn hierarchy(&mut self) -> Option<String>;

    /// Tap an element by its visible text
    async fn tap(&mut self, text: &str) -> bool;

    async fn tap_point(&mut self, x: i64, y: i64) -> bool;

    /// Type into the focused field
    async fn input(&mut self, text: &str) -> bool;

    async fn back(&mut self) -> bool;

    async fn swipe(&mut self, direction: SwipeDirection) -> bool;

    /// Start an app by package name
    async fn launch(&mut self, package: &str) -> bool;

    /// Reason for the most recent failure, cleared on success
    fn last_error(&self) -> Option<&str>;
}

/// Screen-space start and end points of a swipe gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwipePath {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub const ALL: [SwipeDirection; 4] = [
        SwipeDirection::Up,
        SwipeDirection::Down,
        SwipeDirection::Left,
        SwipeDirection::Right,
    ];

    /// Fixed gesture for each direction
    pub fn path(&self) -> SwipePath {
        let (x1, y1, x2, y2) = match self {
            SwipeDirection::Up => (500, 1500, 500, 500),
            SwipeDirection::Down => (500, 500, 500, 1500),
            SwipeDirection::Left => (800, 1000, 200, 1000),
            SwipeDirection::Right => (200, 1000, 800, 1000),
        };
        SwipePath { x1, y1, x2, y2 }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

impl FromStr for SwipeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            other => Err(format!("Invalid swipe direction: {}", other)),
        }
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
