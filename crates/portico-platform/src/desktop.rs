// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory platform for desktop/CI builds where native mobile APIs are
// unavailable.
//
// State changes are recorded instead of reaching hardware.  Capture devices
// have no pipeline of their own; whoever drives the desktop shell feeds
// frames and audio in through `push_camera_frame` / `push_microphone_chunk`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use portico_core::error::{BridgeError, Result};
use tracing::{debug, info};

use crate::traits::*;

#[derive(Default)]
struct CaptureState {
    permission: PermissionStatus,
    /// Permission a `request_*_permission` call resolves to.
    grant: Option<PermissionStatus>,
    sink: Option<Arc<dyn CaptureSink>>,
}

impl CaptureState {
    fn status(&self) -> CaptureStatus {
        CaptureStatus {
            active: self.sink.is_some(),
            permission: self.permission,
        }
    }

    fn request(&mut self) -> PermissionStatus {
        if self.permission == PermissionStatus::Undetermined {
            self.permission = self.grant.unwrap_or(PermissionStatus::Granted);
        }
        self.permission
    }
}

#[derive(Default)]
struct DesktopState {
    clipboard: String,
    orientation: Option<OrientationState>,
    status_bar: StatusBarState,
    navigation_bar: NavigationBarState,
    pinned: bool,
    keep_awake: BTreeSet<String>,
    camera: CaptureState,
    camera_options: Option<CameraOptions>,
    microphone: CaptureState,
    microphone_options: Option<MicrophoneOptions>,
    vibrations: Vec<Duration>,
    toasts: Vec<String>,
    alerts: Vec<(String, String)>,
    opened_urls: Vec<String>,
}

/// Desktop stand-in for every native capability.
#[derive(Default)]
pub struct DesktopPlatform {
    state: Mutex<DesktopState>,
}

const INITIAL_ORIENTATION: OrientationState = OrientationState {
    orientation: Orientation::Portrait,
    locked: false,
};

impl DesktopPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DesktopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make future permission requests for `device` resolve to `status`.
    pub fn set_permission_response(&self, device: CaptureDevice, status: PermissionStatus) {
        let mut state = self.state();
        let capture = match device {
            CaptureDevice::Camera => &mut state.camera,
            CaptureDevice::Microphone => &mut state.microphone,
        };
        capture.grant = Some(status);
    }

    /// Feed one frame to the active camera consumer. Returns `false` when
    /// the camera is not running.
    pub fn push_camera_frame(&self, frame: &[u8], mime_type: &str, width: u32, height: u32) -> bool {
        let sink = self.state().camera.sink.clone();
        match sink {
            Some(sink) => {
                sink.camera_frame(frame, mime_type, width, height);
                true
            }
            None => false,
        }
    }

    /// Feed one PCM chunk to the active microphone consumer.
    pub fn push_microphone_chunk(&self, chunk: &[u8]) -> bool {
        let (sink, options) = {
            let state = self.state();
            (state.microphone.sink.clone(), state.microphone_options)
        };
        match sink {
            Some(sink) => {
                let sample_rate = options.unwrap_or_default().sample_rate;
                sink.microphone_chunk(chunk, sample_rate);
                true
            }
            None => false,
        }
    }

    pub fn camera_options(&self) -> Option<CameraOptions> {
        self.state().camera_options
    }

    pub fn vibrations(&self) -> Vec<Duration> {
        self.state().vibrations.clone()
    }

    pub fn toasts(&self) -> Vec<String> {
        self.state().toasts.clone()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.state().alerts.clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state().opened_urls.clone()
    }

    pub fn is_pinned(&self) -> bool {
        self.state().pinned
    }

    pub fn keep_awake_tags(&self) -> Vec<String> {
        self.state().keep_awake.iter().cloned().collect()
    }
}

impl PlatformBridge for DesktopPlatform {
    fn platform_name(&self) -> &str {
        "Desktop"
    }
}

impl NativeDeviceInfo for DesktopPlatform {
    fn device_info(&self) -> Result<DeviceInfo> {
        let locale = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(|l| l.replace('_', "-")))
            .filter(|l| !l.is_empty() && l != "C" && l != "POSIX")
            .unwrap_or_else(|| "en-US".into());
        Ok(DeviceInfo {
            platform: std::env::consts::OS.into(),
            model: format!("Desktop ({})", std::env::consts::ARCH),
            os_version: "unknown".into(),
            app_version: env!("CARGO_PKG_VERSION").into(),
            locale,
            screen_width: 1280,
            screen_height: 800,
            pixel_ratio: 1.0,
        })
    }
}

impl NativeClipboard for DesktopPlatform {
    fn read_clipboard(&self) -> Result<String> {
        Ok(self.state().clipboard.clone())
    }

    fn write_clipboard(&self, text: &str) -> Result<()> {
        self.state().clipboard = text.to_owned();
        Ok(())
    }
}

impl NativeHaptics for DesktopPlatform {
    fn vibrate(&self, duration: Duration) -> Result<()> {
        debug!(duration_ms = duration.as_millis() as u64, "vibrate (desktop no-op)");
        self.state().vibrations.push(duration);
        Ok(())
    }
}

impl NativeNotices for DesktopPlatform {
    fn show_toast(&self, message: &str, duration: ToastDuration) -> Result<()> {
        info!(?duration, "toast: {message}");
        self.state().toasts.push(message.to_owned());
        Ok(())
    }

    fn show_alert(&self, title: &str, message: &str) -> Result<()> {
        info!("alert: {title}: {message}");
        self.state()
            .alerts
            .push((title.to_owned(), message.to_owned()));
        Ok(())
    }
}

impl NativeLinking for DesktopPlatform {
    fn open_url(&self, url: &str) -> Result<()> {
        info!(url, "open url");
        self.state().opened_urls.push(url.to_owned());
        Ok(())
    }
}

impl NativeOrientation for DesktopPlatform {
    fn orientation(&self) -> Result<OrientationState> {
        Ok(self.state().orientation.unwrap_or(INITIAL_ORIENTATION))
    }

    fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        let mut state = self.state();
        let current = state.orientation.unwrap_or(INITIAL_ORIENTATION);
        if current.locked && current.orientation != orientation {
            return Err(BridgeError::Platform("Orientation is locked".into()));
        }
        state.orientation = Some(OrientationState {
            orientation,
            locked: current.locked,
        });
        Ok(())
    }

    fn lock_orientation(&self, orientation: Orientation) -> Result<()> {
        self.state().orientation = Some(OrientationState {
            orientation,
            locked: true,
        });
        Ok(())
    }

    fn unlock_orientation(&self) -> Result<()> {
        let mut state = self.state();
        let current = state.orientation.unwrap_or(INITIAL_ORIENTATION);
        state.orientation = Some(OrientationState {
            locked: false,
            ..current
        });
        Ok(())
    }
}

impl NativeSystemBars for DesktopPlatform {
    fn status_bar(&self) -> Result<StatusBarState> {
        Ok(self.state().status_bar.clone())
    }

    fn set_status_bar(&self, update: &StatusBarUpdate) -> Result<StatusBarState> {
        let mut state = self.state();
        let bar = &mut state.status_bar;
        if let Some(hidden) = update.hidden {
            bar.hidden = hidden;
        }
        if let Some(style) = update.style {
            bar.style = style;
        }
        if let Some(color) = &update.background_color {
            bar.background_color = Some(color.clone());
        }
        Ok(bar.clone())
    }

    fn navigation_bar(&self) -> Result<NavigationBarState> {
        Ok(self.state().navigation_bar.clone())
    }

    fn set_navigation_bar(&self, update: &NavigationBarUpdate) -> Result<NavigationBarState> {
        let mut state = self.state();
        let bar = &mut state.navigation_bar;
        if let Some(hidden) = update.hidden {
            bar.hidden = hidden;
        }
        if let Some(color) = &update.background_color {
            bar.background_color = Some(color.clone());
        }
        Ok(bar.clone())
    }

    fn restore_system_bars(&self) -> Result<()> {
        let mut state = self.state();
        state.status_bar = StatusBarState::default();
        state.navigation_bar = NavigationBarState::default();
        Ok(())
    }
}

impl NativeScreenPinning for DesktopPlatform {
    fn start_screen_pinning(&self) -> Result<()> {
        self.state().pinned = true;
        Ok(())
    }

    fn stop_screen_pinning(&self) -> Result<()> {
        self.state().pinned = false;
        Ok(())
    }
}

impl NativeKeepAwake for DesktopPlatform {
    fn activate_keep_awake(&self, tag: &str) -> Result<()> {
        self.state().keep_awake.insert(tag.to_owned());
        Ok(())
    }

    fn deactivate_keep_awake(&self, tag: &str) -> Result<()> {
        self.state().keep_awake.remove(tag);
        Ok(())
    }
}

impl NativeCamera for DesktopPlatform {
    fn request_camera_permission(&self) -> Result<PermissionStatus> {
        Ok(self.state().camera.request())
    }

    fn start_camera(&self, options: &CameraOptions, sink: Arc<dyn CaptureSink>) -> Result<()> {
        let status = {
            let mut state = self.state();
            if state.camera.permission != PermissionStatus::Granted {
                return Err(BridgeError::Platform("Camera permission not granted".into()));
            }
            state.camera.sink = Some(Arc::clone(&sink));
            state.camera_options = Some(*options);
            state.camera.status()
        };
        sink.status_changed(CaptureDevice::Camera, &status);
        Ok(())
    }

    fn stop_camera(&self) -> Result<()> {
        let (sink, status) = {
            let mut state = self.state();
            let sink = state.camera.sink.take();
            state.camera_options = None;
            (sink, state.camera.status())
        };
        if let Some(sink) = sink {
            sink.status_changed(CaptureDevice::Camera, &status);
        }
        Ok(())
    }

    fn camera_status(&self) -> Result<CaptureStatus> {
        Ok(self.state().camera.status())
    }
}

impl NativeMicrophone for DesktopPlatform {
    fn request_microphone_permission(&self) -> Result<PermissionStatus> {
        Ok(self.state().microphone.request())
    }

    fn start_microphone(
        &self,
        options: &MicrophoneOptions,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<()> {
        let status = {
            let mut state = self.state();
            if state.microphone.permission != PermissionStatus::Granted {
                return Err(BridgeError::Platform(
                    "Microphone permission not granted".into(),
                ));
            }
            state.microphone.sink = Some(Arc::clone(&sink));
            state.microphone_options = Some(*options);
            state.microphone.status()
        };
        sink.status_changed(CaptureDevice::Microphone, &status);
        Ok(())
    }

    fn stop_microphone(&self) -> Result<()> {
        let (sink, status) = {
            let mut state = self.state();
            let sink = state.microphone.sink.take();
            state.microphone_options = None;
            (sink, state.microphone.status())
        };
        if let Some(sink) = sink {
            sink.status_changed(CaptureDevice::Microphone, &status);
        }
        Ok(())
    }

    fn microphone_status(&self) -> Result<CaptureStatus> {
        Ok(self.state().microphone.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        frames: Mutex<usize>,
        statuses: Mutex<Vec<(CaptureDevice, CaptureStatus)>>,
    }

    impl CaptureSink for CountingSink {
        fn camera_frame(&self, _frame: &[u8], _mime_type: &str, _width: u32, _height: u32) {
            *self.frames.lock().expect("lock") += 1;
        }

        fn microphone_chunk(&self, _chunk: &[u8], _sample_rate: u32) {}

        fn status_changed(&self, device: CaptureDevice, status: &CaptureStatus) {
            self.statuses.lock().expect("lock").push((device, *status));
        }
    }

    #[test]
    fn orientation_lock_blocks_set() {
        let platform = DesktopPlatform::new();
        platform.lock_orientation(Orientation::LandscapeLeft).expect("lock");
        assert!(platform.set_orientation(Orientation::Portrait).is_err());

        platform.unlock_orientation().expect("unlock");
        platform.set_orientation(Orientation::Portrait).expect("set");
        assert_eq!(platform.orientation().expect("get"), INITIAL_ORIENTATION);
    }

    #[test]
    fn status_bar_partial_update() {
        let platform = DesktopPlatform::new();
        let state = platform
            .set_status_bar(&StatusBarUpdate {
                style: Some(BarStyle::Dark),
                ..Default::default()
            })
            .expect("set");
        assert!(!state.hidden);
        assert_eq!(state.style, BarStyle::Dark);

        platform.restore_system_bars().expect("restore");
        assert_eq!(platform.status_bar().expect("get"), StatusBarState::default());
    }

    #[test]
    fn camera_requires_permission_and_relays_frames() {
        let platform = DesktopPlatform::new();
        let sink = Arc::new(CountingSink::default());

        assert!(platform.start_camera(&CameraOptions::default(), sink.clone()).is_err());
        assert_eq!(platform.request_camera_permission().expect("perm"), PermissionStatus::Granted);

        platform.start_camera(&CameraOptions::default(), sink.clone()).expect("start");
        assert!(platform.push_camera_frame(&[0xFF, 0xD8], "image/jpeg", 2, 1));
        platform.stop_camera().expect("stop");
        assert!(!platform.push_camera_frame(&[0xFF, 0xD8], "image/jpeg", 2, 1));

        assert_eq!(*sink.frames.lock().expect("lock"), 1);
        let statuses = sink.statuses.lock().expect("lock");
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].1.active);
        assert!(!statuses[1].1.active);
    }

    #[test]
    fn denied_permission_sticks() {
        let platform = DesktopPlatform::new();
        platform.set_permission_response(CaptureDevice::Microphone, PermissionStatus::Denied);
        assert_eq!(
            platform.request_microphone_permission().expect("perm"),
            PermissionStatus::Denied
        );
        assert_eq!(
            platform.microphone_status().expect("status"),
            CaptureStatus {
                active: false,
                permission: PermissionStatus::Denied
            }
        );
    }
}
