// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in handler set.
//
// Every built-in is a thin adapter: parse typed arguments, call exactly one
// platform capability, answer `{ success, ...data }` or `{ success: false,
// error }`.  Platform failures are part of the answer, not a failed reply,
// so the page always gets a well-formed result object.

use std::sync::Arc;
use std::time::Duration;

use portico_bridge::{BridgeSession, HandlerOptions, Responder};
use portico_core::Payload;
use portico_core::error::{BridgeError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::capture::CaptureRelay;
use crate::traits::*;

/// Default `vibrate` duration.
pub const DEFAULT_VIBRATION_MS: u64 = 400;
/// Longest vibration a page may request.
pub const MAX_VIBRATION_MS: u64 = 5_000;
/// Keep-awake tag used when the page does not name one.
pub const DEFAULT_KEEP_AWAKE_TAG: &str = "portico";

const URL_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "sms"];

macro_rules! builtin_actions {
    ($($variant:ident => $name:literal,)+) => {
        /// The fixed catalog of built-in actions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum BuiltinAction {
            $($variant,)+
        }

        impl BuiltinAction {
            pub const ALL: &'static [BuiltinAction] = &[$(BuiltinAction::$variant,)+];

            /// Wire name of the action.
            pub fn name(self) -> &'static str {
                match self {
                    $(BuiltinAction::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(BuiltinAction::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

builtin_actions! {
    GetDeviceInfo => "getDeviceInfo",
    GetClipboard => "getClipboard",
    SetClipboard => "setClipboard",
    Vibrate => "vibrate",
    ShowToast => "showToast",
    ShowAlert => "showAlert",
    OpenUrl => "openUrl",
    GetOrientation => "getOrientation",
    SetOrientation => "setOrientation",
    LockOrientation => "lockOrientation",
    UnlockOrientation => "unlockOrientation",
    GetStatusBar => "getStatusBar",
    SetStatusBar => "setStatusBar",
    GetNavigationBar => "getNavigationBar",
    SetNavigationBar => "setNavigationBar",
    RestoreSystemBars => "restoreSystemBars",
    StartScreenPinning => "startScreenPinning",
    StopScreenPinning => "stopScreenPinning",
    ActivateKeepAwake => "activateKeepAwake",
    DeactivateKeepAwake => "deactivateKeepAwake",
    RequestCameraPermission => "requestCameraPermission",
    RequestMicrophonePermission => "requestMicrophonePermission",
    StartCamera => "startCamera",
    StopCamera => "stopCamera",
    GetCameraStatus => "getCameraStatus",
    GetMicrophoneStatus => "getMicrophoneStatus",
    StartMicrophone => "startMicrophone",
    StopMicrophone => "stopMicrophone",
}

/// A built-in action with its parsed arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinRequest {
    GetDeviceInfo,
    GetClipboard,
    SetClipboard { text: String },
    Vibrate { duration: Duration },
    ShowToast { message: String, duration: ToastDuration },
    ShowAlert { title: String, message: String },
    OpenUrl { url: String },
    GetOrientation,
    SetOrientation(Orientation),
    LockOrientation(Orientation),
    UnlockOrientation,
    GetStatusBar,
    SetStatusBar(StatusBarUpdate),
    GetNavigationBar,
    SetNavigationBar(NavigationBarUpdate),
    RestoreSystemBars,
    StartScreenPinning,
    StopScreenPinning,
    ActivateKeepAwake { tag: String },
    DeactivateKeepAwake { tag: String },
    RequestCameraPermission,
    RequestMicrophonePermission,
    StartCamera(CameraOptions),
    StopCamera,
    GetCameraStatus,
    GetMicrophoneStatus,
    StartMicrophone(MicrophoneOptions),
    StopMicrophone,
}

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VibrateArgs {
    duration_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ToastArgs {
    message: String,
    #[serde(default)]
    duration: ToastDuration,
}

#[derive(Deserialize)]
struct AlertArgs {
    #[serde(default)]
    title: String,
    message: String,
}

#[derive(Deserialize)]
struct UrlArgs {
    url: String,
}

#[derive(Deserialize)]
struct OrientationArgs {
    orientation: Orientation,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct KeepAwakeArgs {
    tag: Option<String>,
}

/// Parse an argument struct, treating an absent or `null` payload as `{}`.
fn args<T: DeserializeOwned>(action: BuiltinAction, payload: &Payload) -> Result<T> {
    let value = match payload.value() {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| BridgeError::InvalidArguments {
        action: action.name().to_owned(),
        detail: e.to_string(),
    })
}

fn invalid(action: BuiltinAction, detail: impl Into<String>) -> BridgeError {
    BridgeError::InvalidArguments {
        action: action.name().to_owned(),
        detail: detail.into(),
    }
}

fn check_url(action: BuiltinAction, url: &str) -> Result<()> {
    let Some((scheme, rest)) = url.split_once(':') else {
        return Err(invalid(action, "url has no scheme"));
    };
    let scheme = scheme.to_ascii_lowercase();
    if !URL_SCHEMES.contains(&scheme.as_str()) {
        return Err(invalid(action, format!("unsupported url scheme {scheme:?}")));
    }
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        return Err(invalid(action, "url has no target"));
    }
    Ok(())
}

impl BuiltinRequest {
    /// Parse the typed request for `action` from an inbound payload.
    pub fn parse(action: BuiltinAction, payload: &Payload) -> Result<Self> {
        use BuiltinAction as A;
        Ok(match action {
            A::GetDeviceInfo => Self::GetDeviceInfo,
            A::GetClipboard => Self::GetClipboard,
            A::SetClipboard => {
                let TextArgs { text } = args(action, payload)?;
                Self::SetClipboard { text }
            }
            A::Vibrate => {
                let VibrateArgs { duration_ms } = args(action, payload)?;
                let ms = duration_ms
                    .unwrap_or(DEFAULT_VIBRATION_MS)
                    .min(MAX_VIBRATION_MS);
                Self::Vibrate {
                    duration: Duration::from_millis(ms),
                }
            }
            A::ShowToast => {
                let ToastArgs { message, duration } = args(action, payload)?;
                Self::ShowToast { message, duration }
            }
            A::ShowAlert => {
                let AlertArgs { title, message } = args(action, payload)?;
                Self::ShowAlert { title, message }
            }
            A::OpenUrl => {
                let UrlArgs { url } = args(action, payload)?;
                check_url(action, &url)?;
                Self::OpenUrl { url }
            }
            A::GetOrientation => Self::GetOrientation,
            A::SetOrientation => {
                let OrientationArgs { orientation } = args(action, payload)?;
                Self::SetOrientation(orientation)
            }
            A::LockOrientation => {
                let OrientationArgs { orientation } = args(action, payload)?;
                Self::LockOrientation(orientation)
            }
            A::UnlockOrientation => Self::UnlockOrientation,
            A::GetStatusBar => Self::GetStatusBar,
            A::SetStatusBar => Self::SetStatusBar(args(action, payload)?),
            A::GetNavigationBar => Self::GetNavigationBar,
            A::SetNavigationBar => Self::SetNavigationBar(args(action, payload)?),
            A::RestoreSystemBars => Self::RestoreSystemBars,
            A::StartScreenPinning => Self::StartScreenPinning,
            A::StopScreenPinning => Self::StopScreenPinning,
            A::ActivateKeepAwake | A::DeactivateKeepAwake => {
                let KeepAwakeArgs { tag } = args(action, payload)?;
                let tag = tag.unwrap_or_else(|| DEFAULT_KEEP_AWAKE_TAG.to_owned());
                if action == A::ActivateKeepAwake {
                    Self::ActivateKeepAwake { tag }
                } else {
                    Self::DeactivateKeepAwake { tag }
                }
            }
            A::RequestCameraPermission => Self::RequestCameraPermission,
            A::RequestMicrophonePermission => Self::RequestMicrophonePermission,
            A::StartCamera => Self::StartCamera(args(action, payload)?),
            A::StopCamera => Self::StopCamera,
            A::GetCameraStatus => Self::GetCameraStatus,
            A::GetMicrophoneStatus => Self::GetMicrophoneStatus,
            A::StartMicrophone => Self::StartMicrophone(args(action, payload)?),
            A::StopMicrophone => Self::StopMicrophone,
        })
    }

    /// Call the platform. `Ok(Value::Null)` means success with no data.
    pub fn execute(
        self,
        platform: &dyn PlatformBridge,
        sink: &Arc<dyn CaptureSink>,
    ) -> Result<Value> {
        let none = |r: Result<()>| r.map(|()| Value::Null);
        match self {
            Self::GetDeviceInfo => Ok(serde_json::to_value(platform.device_info()?)?),
            Self::GetClipboard => Ok(json!({ "text": platform.read_clipboard()? })),
            Self::SetClipboard { text } => none(platform.write_clipboard(&text)),
            Self::Vibrate { duration } => none(platform.vibrate(duration)),
            Self::ShowToast { message, duration } => none(platform.show_toast(&message, duration)),
            Self::ShowAlert { title, message } => none(platform.show_alert(&title, &message)),
            Self::OpenUrl { url } => none(platform.open_url(&url)),
            Self::GetOrientation => Ok(serde_json::to_value(platform.orientation()?)?),
            Self::SetOrientation(o) => none(platform.set_orientation(o)),
            Self::LockOrientation(o) => none(platform.lock_orientation(o)),
            Self::UnlockOrientation => none(platform.unlock_orientation()),
            Self::GetStatusBar => Ok(serde_json::to_value(platform.status_bar()?)?),
            Self::SetStatusBar(update) => Ok(serde_json::to_value(platform.set_status_bar(&update)?)?),
            Self::GetNavigationBar => Ok(serde_json::to_value(platform.navigation_bar()?)?),
            Self::SetNavigationBar(update) => {
                Ok(serde_json::to_value(platform.set_navigation_bar(&update)?)?)
            }
            Self::RestoreSystemBars => none(platform.restore_system_bars()),
            Self::StartScreenPinning => none(platform.start_screen_pinning()),
            Self::StopScreenPinning => none(platform.stop_screen_pinning()),
            Self::ActivateKeepAwake { tag } => none(platform.activate_keep_awake(&tag)),
            Self::DeactivateKeepAwake { tag } => none(platform.deactivate_keep_awake(&tag)),
            Self::RequestCameraPermission => {
                Ok(json!({ "status": platform.request_camera_permission()? }))
            }
            Self::RequestMicrophonePermission => {
                Ok(json!({ "status": platform.request_microphone_permission()? }))
            }
            Self::StartCamera(options) => none(platform.start_camera(&options, Arc::clone(sink))),
            Self::StopCamera => none(platform.stop_camera()),
            Self::GetCameraStatus => Ok(serde_json::to_value(platform.camera_status()?)?),
            Self::GetMicrophoneStatus => Ok(serde_json::to_value(platform.microphone_status()?)?),
            Self::StartMicrophone(options) => {
                none(platform.start_microphone(&options, Arc::clone(sink)))
            }
            Self::StopMicrophone => none(platform.stop_microphone()),
        }
    }
}

/// Shape a built-in outcome as the `{ success, ... }` object the page
/// expects. Object results are flattened next to `success`.
pub fn result_body(outcome: Result<Value>) -> Value {
    match outcome {
        Ok(Value::Object(mut fields)) => {
            fields.insert("success".into(), Value::Bool(true));
            Value::Object(fields)
        }
        Ok(Value::Null) => json!({ "success": true }),
        Ok(data) => json!({ "success": true, "data": data }),
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

/// Run one built-in end to end.
pub fn run(
    action: BuiltinAction,
    payload: &Payload,
    platform: &dyn PlatformBridge,
    sink: &Arc<dyn CaptureSink>,
) -> Value {
    let outcome = BuiltinRequest::parse(action, payload).and_then(|req| req.execute(platform, sink));
    if let Err(e) = &outcome {
        debug!(action = action.name(), error = %e, "built-in failed");
    }
    result_body(outcome)
}

/// Register every built-in on `session`, backed by `platform`.
///
/// Capture output is relayed over the same session.
pub fn register_builtins(session: &BridgeSession, platform: Arc<dyn PlatformBridge>) {
    let sink: Arc<dyn CaptureSink> = Arc::new(CaptureRelay::new(session));
    for &action in BuiltinAction::ALL {
        let platform = Arc::clone(&platform);
        let sink = Arc::clone(&sink);
        session.register_handler(
            action.name(),
            move |payload: Payload, responder: Responder| {
                let platform = Arc::clone(&platform);
                let sink = Arc::clone(&sink);
                async move {
                    responder.respond(Ok(run(action, &payload, platform.as_ref(), &sink)));
                    Ok::<(), BridgeError>(())
                }
            },
            HandlerOptions::new(),
        );
    }
    debug!(
        platform = platform.platform_name(),
        count = BuiltinAction::ALL.len(),
        "built-in handlers registered"
    );
}
