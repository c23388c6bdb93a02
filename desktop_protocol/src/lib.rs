use serde::{Deserialize, Serialize};

/// Well-known channel name shared by the worker and its clients.
pub const DEFAULT_CHANNEL_NAME: &str = "desktop-core";

/// Request URI used for the websocket handshake over the local stream.
/// The host part is ignored; the channel itself is already local.
pub const HANDSHAKE_URI: &str = "ws://localhost/desktop-core";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WallpaperCategory {
    App,
    Web,
    WebAudio,
    Url,
    Bizhawk,
    Unity,
    Godot,
    Video,
    Gif,
    UnityAudio,
    VideoStream,
    Picture,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidCommand,
    NotFound,
    InvalidValue,
    ShuttingDown,
    InternalError,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rectangle {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScreenData {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub device_name: String,
    /// Native monitor handle, widened to 64 bits.
    #[serde(default)]
    pub h_monitor: i64,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub index: i32,
    #[serde(default)]
    pub bounds: Option<Rectangle>,
    #[serde(default)]
    pub working_area: Option<Rectangle>,
}

/// One item of the `get_wallpapers` stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct WallpaperEntry {
    #[serde(default)]
    pub lively_info_path: String,
    #[serde(default)]
    pub property_copy_path: String,
    #[serde(default)]
    pub preview_path: String,
    #[serde(default)]
    pub thumbnail_path: String,
    #[serde(default)]
    pub screen: Option<ScreenData>,
}

/// First (and only) frame a client sends on a session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientRequest {
    SetWallpaper {
        lively_info_path: String,
        monitor_id: String,
    },
    GetWallpapers,
    CloseAllWallpapers {
        terminate: bool,
    },
    CloseWallpaperCategory {
        category: WallpaperCategory,
        terminate: bool,
    },
    CloseWallpaperLibrary {
        lively_info_path: String,
        terminate: bool,
    },
    CloseWallpaperMonitor {
        monitor_id: String,
        terminate: bool,
    },
    SendMessageWallpaper {
        /// Empty targets every monitor running the library entry.
        monitor_id: String,
        lively_info_path: String,
        msg: String,
    },
    SubscribeWallpaperChanged,
    ShutDown,
}

impl ClientRequest {
    /// Whether the worker answers with a stream of items rather than a single ack.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            ClientRequest::GetWallpapers | ClientRequest::SubscribeWallpaperChanged
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::SetWallpaper { .. } => "set_wallpaper",
            ClientRequest::GetWallpapers => "get_wallpapers",
            ClientRequest::CloseAllWallpapers { .. } => "close_all_wallpapers",
            ClientRequest::CloseWallpaperCategory { .. } => "close_wallpaper_category",
            ClientRequest::CloseWallpaperLibrary { .. } => "close_wallpaper_library",
            ClientRequest::CloseWallpaperMonitor { .. } => "close_wallpaper_monitor",
            ClientRequest::SendMessageWallpaper { .. } => "send_message_wallpaper",
            ClientRequest::SubscribeWallpaperChanged => "subscribe_wallpaper_changed",
            ClientRequest::ShutDown => "shut_down",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    Ack,
    Wallpaper(WallpaperEntry),
    /// Carries nothing beyond the fact that active wallpapers changed.
    WallpaperChanged,
    Error { msg: String, code: ErrorCode },
}
