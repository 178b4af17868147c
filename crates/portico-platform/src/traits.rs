// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// The shell exposes a small, fixed set of device capabilities to the page.
// Each trait is one capability; a platform backend implements all of them
// and returns `BridgeError::PlatformUnavailable` for what it cannot do.

use std::sync::Arc;
use std::time::Duration;

use portico_core::error::Result;
use serde::{Deserialize, Serialize};

/// Unified bridge that groups all native capabilities.
pub trait PlatformBridge:
    NativeDeviceInfo
    + NativeClipboard
    + NativeHaptics
    + NativeNotices
    + NativeLinking
    + NativeOrientation
    + NativeSystemBars
    + NativeScreenPinning
    + NativeKeepAwake
    + NativeCamera
    + NativeMicrophone
    + Send
    + Sync
{
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Static facts about the device and the shell build.
pub trait NativeDeviceInfo {
    fn device_info(&self) -> Result<DeviceInfo>;
}

/// System clipboard (plain text only).
pub trait NativeClipboard {
    fn read_clipboard(&self) -> Result<String>;
    fn write_clipboard(&self, text: &str) -> Result<()>;
}

/// Vibration motor.
pub trait NativeHaptics {
    fn vibrate(&self, duration: Duration) -> Result<()>;
}

/// Transient and modal user notices.
pub trait NativeNotices {
    fn show_toast(&self, message: &str, duration: ToastDuration) -> Result<()>;

    /// Present a modal alert with a single dismiss button. Returns once the
    /// alert is shown, not when it is dismissed.
    fn show_alert(&self, title: &str, message: &str) -> Result<()>;
}

/// Hand a URL to the OS (browser, mail client, dialer, SMS).
pub trait NativeLinking {
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Screen orientation control.
pub trait NativeOrientation {
    fn orientation(&self) -> Result<OrientationState>;

    /// Rotate to `orientation` without preventing later rotation.
    fn set_orientation(&self, orientation: Orientation) -> Result<()>;

    /// Rotate to `orientation` and keep it there.
    fn lock_orientation(&self, orientation: Orientation) -> Result<()>;

    fn unlock_orientation(&self) -> Result<()>;
}

/// Status bar and navigation bar appearance.
pub trait NativeSystemBars {
    fn status_bar(&self) -> Result<StatusBarState>;
    fn set_status_bar(&self, update: &StatusBarUpdate) -> Result<StatusBarState>;
    fn navigation_bar(&self) -> Result<NavigationBarState>;
    fn set_navigation_bar(&self, update: &NavigationBarUpdate) -> Result<NavigationBarState>;

    /// Return both bars to the shell's launch appearance.
    fn restore_system_bars(&self) -> Result<()>;
}

/// Kiosk-style screen pinning (Android lock task, iOS guided access).
pub trait NativeScreenPinning {
    fn start_screen_pinning(&self) -> Result<()>;
    fn stop_screen_pinning(&self) -> Result<()>;
}

/// Keep the display on while at least one tag is active.
pub trait NativeKeepAwake {
    fn activate_keep_awake(&self, tag: &str) -> Result<()>;
    fn deactivate_keep_awake(&self, tag: &str) -> Result<()>;
}

/// Live camera capture.
///
/// Frames are pushed into the [`CaptureSink`] handed to `start_camera` until
/// `stop_camera` is called.
pub trait NativeCamera {
    fn request_camera_permission(&self) -> Result<PermissionStatus>;
    fn start_camera(&self, options: &CameraOptions, sink: Arc<dyn CaptureSink>) -> Result<()>;
    fn stop_camera(&self) -> Result<()>;
    fn camera_status(&self) -> Result<CaptureStatus>;
}

/// Live microphone capture.
pub trait NativeMicrophone {
    fn request_microphone_permission(&self) -> Result<PermissionStatus>;
    fn start_microphone(
        &self,
        options: &MicrophoneOptions,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<()>;
    fn stop_microphone(&self) -> Result<()>;
    fn microphone_status(&self) -> Result<CaptureStatus>;
}

/// Receiver for output of the native capture pipelines.
pub trait CaptureSink: Send + Sync {
    /// One encoded camera frame.
    fn camera_frame(&self, frame: &[u8], mime_type: &str, width: u32, height: u32);

    /// One chunk of 16-bit little-endian mono PCM.
    fn microphone_chunk(&self, chunk: &[u8], sample_rate: u32);

    /// A capture device started, stopped, or changed permission.
    fn status_changed(&self, device: CaptureDevice, status: &CaptureStatus);
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub model: String,
    pub os_version: String,
    pub app_version: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub pixel_ratio: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastDuration {
    #[default]
    Short,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    Portrait,
    PortraitUpsideDown,
    #[serde(alias = "landscape")]
    LandscapeLeft,
    LandscapeRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationState {
    pub orientation: Orientation,
    pub locked: bool,
}

/// Foreground colour of status bar content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarStyle {
    #[default]
    Default,
    Light,
    Dark,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBarState {
    pub hidden: bool,
    pub style: BarStyle,
    pub background_color: Option<String>,
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusBarUpdate {
    pub hidden: Option<bool>,
    pub style: Option<BarStyle>,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationBarState {
    pub hidden: bool,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationBarUpdate {
    pub hidden: Option<bool>,
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureDevice {
    Camera,
    Microphone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub active: bool,
    pub permission: PermissionStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraOptions {
    pub facing: CameraFacing,
    /// Minimum spacing between delivered frames.
    pub frame_interval_ms: u64,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            frame_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MicrophoneOptions {
    pub sample_rate: u32,
}

impl Default for MicrophoneOptions {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
        }
    }
}
