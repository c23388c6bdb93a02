mod cache;
mod client;
mod commands;
mod config;
mod error;
mod model;
mod subscriber;
mod translate;
mod transport;

#[cfg(unix)]
pub mod mock_worker;

#[cfg(test)]
mod test_support;

pub use crate::cache::{Snapshot, StateCache};
pub use crate::client::DesktopCoreClient;
pub use crate::config::{ChannelAddress, ClientConfig, ADDR_ENV, SHUTDOWN_GRACE_ENV};
pub use crate::error::{ClientError, MalformedRecordError, TransportError};
pub use crate::model::{
    DisplayDescriptor, LibraryReference, MonitorHandle, Rect, WallpaperRecord, WallpaperType,
};
pub use crate::subscriber::{StopReason, SubscriberState, WallpaperChanged};
pub use crate::translate::{
    category_to_wire, display_from_wire, display_to_wire, wallpaper_from_wire, wallpaper_to_wire,
    wallpapers_from_wire,
};
pub use crate::transport::{LocalTransport, ReplyStream, Transport};

pub use desktop_protocol as protocol;
