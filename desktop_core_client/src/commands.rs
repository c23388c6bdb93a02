//! Commands forwarded to the worker.
//!
//! Each one is a single acknowledged call. None of them touch the cache: their
//! effect shows up later, through the change subscriber.

use crate::client::DesktopCoreClient;
use crate::error::{ClientError, TransportError};
use crate::model::{DisplayDescriptor, LibraryReference, WallpaperType};
use crate::translate::category_to_wire;
use crate::transport::Transport;
use desktop_protocol::ClientRequest;
use serde::Serialize;

impl<T: Transport> DesktopCoreClient<T> {
    pub async fn set_wallpaper(
        &self,
        info_folder_path: &str,
        monitor_device_id: &str,
    ) -> Result<(), TransportError> {
        self.transport
            .call(ClientRequest::SetWallpaper {
                lively_info_path: info_folder_path.to_string(),
                monitor_id: monitor_device_id.to_string(),
            })
            .await
    }

    pub async fn set_wallpaper_on(
        &self,
        library: &(impl LibraryReference + ?Sized),
        display: &DisplayDescriptor,
    ) -> Result<(), TransportError> {
        self.set_wallpaper(library.info_folder_path(), &display.device_id)
            .await
    }

    /// `terminate` kills the rendering process instead of asking it to stop.
    pub async fn close_all(&self, terminate: bool) -> Result<(), TransportError> {
        self.transport
            .call(ClientRequest::CloseAllWallpapers { terminate })
            .await
    }

    pub async fn close_by_category(
        &self,
        category: WallpaperType,
        terminate: bool,
    ) -> Result<(), TransportError> {
        self.transport
            .call(ClientRequest::CloseWallpaperCategory {
                category: category_to_wire(category),
                terminate,
            })
            .await
    }

    pub async fn close_by_library_entry(
        &self,
        info_folder_path: &str,
        terminate: bool,
    ) -> Result<(), TransportError> {
        self.transport
            .call(ClientRequest::CloseWallpaperLibrary {
                lively_info_path: info_folder_path.to_string(),
                terminate,
            })
            .await
    }

    pub async fn close_library(
        &self,
        library: &(impl LibraryReference + ?Sized),
        terminate: bool,
    ) -> Result<(), TransportError> {
        self.close_by_library_entry(library.info_folder_path(), terminate)
            .await
    }

    pub async fn close_by_monitor(
        &self,
        monitor_device_id: &str,
        terminate: bool,
    ) -> Result<(), TransportError> {
        self.transport
            .call(ClientRequest::CloseWallpaperMonitor {
                monitor_id: monitor_device_id.to_string(),
                terminate,
            })
            .await
    }

    pub async fn close_display(
        &self,
        display: &DisplayDescriptor,
        terminate: bool,
    ) -> Result<(), TransportError> {
        self.close_by_monitor(&display.device_id, terminate).await
    }

    /// Forwards `message` as JSON to a running wallpaper. Without a monitor it
    /// reaches every monitor that runs `info_folder_path`.
    pub async fn send_message<M: Serialize + ?Sized>(
        &self,
        info_folder_path: &str,
        monitor_device_id: Option<&str>,
        message: &M,
    ) -> Result<(), ClientError> {
        let msg = serde_json::to_string(message).map_err(ClientError::Message)?;
        self.transport
            .call(ClientRequest::SendMessageWallpaper {
                monitor_id: monitor_device_id.unwrap_or_default().to_string(),
                lively_info_path: info_folder_path.to_string(),
                msg,
            })
            .await?;
        Ok(())
    }

    pub async fn send_message_to<M: Serialize + ?Sized>(
        &self,
        library: &(impl LibraryReference + ?Sized),
        display: Option<&DisplayDescriptor>,
        message: &M,
    ) -> Result<(), ClientError> {
        self.send_message(
            library.info_folder_path(),
            display.map(|d| d.device_id.as_str()),
            message,
        )
        .await
    }

    /// Asks the worker process to exit.
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.transport.call(ClientRequest::ShutDown).await
    }
}
