//! Domain view of the worker's active wallpapers.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Opaque platform monitor handle (`HMONITOR` on Windows).
///
/// Carried through untouched; this crate never dereferences it.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(transparent)]
pub struct MonitorHandle(isize);

impl MonitorHandle {
    pub fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    pub fn as_raw(self) -> isize {
        self.0
    }

    pub fn as_ptr(self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DisplayDescriptor {
    pub device_id: String,
    pub display_name: String,
    pub device_name: String,
    pub monitor_handle: MonitorHandle,
    pub is_primary: bool,
    pub index: i32,
    pub bounds: Rect,
    pub working_area: Rect,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WallpaperRecord {
    pub info_folder_path: String,
    pub property_copy_path: String,
    pub preview_path: String,
    pub thumbnail_path: String,
    pub display: DisplayDescriptor,
}

/// Anything that identifies a wallpaper definition by its source folder.
pub trait LibraryReference {
    fn info_folder_path(&self) -> &str;
}

impl LibraryReference for WallpaperRecord {
    fn info_folder_path(&self) -> &str {
        &self.info_folder_path
    }
}

impl LibraryReference for str {
    fn info_folder_path(&self) -> &str {
        self
    }
}

impl LibraryReference for String {
    fn info_folder_path(&self) -> &str {
        self
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WallpaperType {
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

impl WallpaperType {
    pub const ALL: [WallpaperType; 12] = [
        Self::App,
        Self::Web,
        Self::WebAudio,
        Self::Url,
        Self::Bizhawk,
        Self::Unity,
        Self::Godot,
        Self::Video,
        Self::Gif,
        Self::UnityAudio,
        Self::VideoStream,
        Self::Picture,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Web => "web",
            Self::WebAudio => "web_audio",
            Self::Url => "url",
            Self::Bizhawk => "bizhawk",
            Self::Unity => "unity",
            Self::Godot => "godot",
            Self::Video => "video",
            Self::Gif => "gif",
            Self::UnityAudio => "unity_audio",
            Self::VideoStream => "video_stream",
            Self::Picture => "picture",
        }
    }
}

impl FromStr for WallpaperType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| format!("unknown wallpaper type '{s}'"))
    }
}

impl fmt::Display for WallpaperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
