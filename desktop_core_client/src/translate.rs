//! Wire records <-> domain records.

use crate::error::MalformedRecordError;
use crate::model::{DisplayDescriptor, MonitorHandle, Rect, WallpaperRecord, WallpaperType};
use desktop_protocol::{Rectangle, ScreenData, WallpaperCategory, WallpaperEntry};

/// Translates a whole refresh batch. One bad record rejects the batch.
pub fn wallpapers_from_wire(
    entries: Vec<WallpaperEntry>,
) -> Result<Vec<WallpaperRecord>, MalformedRecordError> {
    entries.into_iter().map(wallpaper_from_wire).collect()
}

pub fn wallpaper_from_wire(entry: WallpaperEntry) -> Result<WallpaperRecord, MalformedRecordError> {
    if entry.lively_info_path.is_empty() {
        return Err(MalformedRecordError::Empty("lively_info_path"));
    }
    let screen = entry.screen.ok_or(MalformedRecordError::Missing("screen"))?;

    Ok(WallpaperRecord {
        info_folder_path: entry.lively_info_path,
        property_copy_path: entry.property_copy_path,
        preview_path: entry.preview_path,
        thumbnail_path: entry.thumbnail_path,
        display: display_from_wire(screen)?,
    })
}

pub fn display_from_wire(screen: ScreenData) -> Result<DisplayDescriptor, MalformedRecordError> {
    if screen.device_id.is_empty() {
        return Err(MalformedRecordError::Empty("device_id"));
    }
    let raw_handle = isize::try_from(screen.h_monitor)
        .map_err(|_| MalformedRecordError::HandleOutOfRange(screen.h_monitor))?;

    Ok(DisplayDescriptor {
        device_id: screen.device_id,
        display_name: screen.display_name,
        device_name: screen.device_name,
        monitor_handle: MonitorHandle::from_raw(raw_handle),
        is_primary: screen.is_primary,
        index: screen.index,
        bounds: rect_from_wire("bounds", screen.bounds)?,
        working_area: rect_from_wire("working_area", screen.working_area)?,
    })
}

fn rect_from_wire(
    field: &'static str,
    rect: Option<Rectangle>,
) -> Result<Rect, MalformedRecordError> {
    let r = rect.ok_or(MalformedRecordError::Missing(field))?;
    if r.width < 0 || r.height < 0 {
        return Err(MalformedRecordError::NegativeSize {
            field,
            width: r.width,
            height: r.height,
        });
    }
    Ok(Rect::new(r.x, r.y, r.width, r.height))
}

pub fn wallpaper_to_wire(record: &WallpaperRecord) -> WallpaperEntry {
    WallpaperEntry {
        lively_info_path: record.info_folder_path.clone(),
        property_copy_path: record.property_copy_path.clone(),
        preview_path: record.preview_path.clone(),
        thumbnail_path: record.thumbnail_path.clone(),
        screen: Some(display_to_wire(&record.display)),
    }
}

pub fn display_to_wire(display: &DisplayDescriptor) -> ScreenData {
    ScreenData {
        device_id: display.device_id.clone(),
        display_name: display.display_name.clone(),
        device_name: display.device_name.clone(),
        h_monitor: display.monitor_handle.as_raw() as i64,
        is_primary: display.is_primary,
        index: display.index,
        bounds: Some(rect_to_wire(display.bounds)),
        working_area: Some(rect_to_wire(display.working_area)),
    }
}

fn rect_to_wire(r: Rect) -> Rectangle {
    Rectangle {
        x: r.x,
        y: r.y,
        width: r.width,
        height: r.height,
    }
}

pub fn category_to_wire(kind: WallpaperType) -> WallpaperCategory {
    match kind {
        WallpaperType::App => WallpaperCategory::App,
        WallpaperType::Web => WallpaperCategory::Web,
        WallpaperType::WebAudio => WallpaperCategory::WebAudio,
        WallpaperType::Url => WallpaperCategory::Url,
        WallpaperType::Bizhawk => WallpaperCategory::Bizhawk,
        WallpaperType::Unity => WallpaperCategory::Unity,
        WallpaperType::Godot => WallpaperCategory::Godot,
        WallpaperType::Video => WallpaperCategory::Video,
        WallpaperType::Gif => WallpaperCategory::Gif,
        WallpaperType::UnityAudio => WallpaperCategory::UnityAudio,
        WallpaperType::VideoStream => WallpaperCategory::VideoStream,
        WallpaperType::Picture => WallpaperCategory::Picture,
    }
}
