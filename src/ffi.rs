//! FFI bindings for the posture core
//!
//! This module provides C-compatible functions for embedding the core in a
//! host application (the host runs the pose/face models and pushes keypoint
//! frames in as JSON). All functions use C strings (null-terminated) and
//! return allocated memory that must be freed by the caller using
//! `uprite_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::rc::Rc;
use std::sync::Arc;

use crate::clock::SystemClock;
use crate::config::{AlertConfig, EngineConfig};
use crate::scheduler::{AlertSink, NotificationState};
use crate::session::MonitorSession;
use crate::types::{AlertEvent, FaceFrame, Keypoint, PoseFrame};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

#[derive(Clone, Default)]
struct CollectedAlerts(Rc<RefCell<Vec<AlertEvent>>>);

impl AlertSink for CollectedAlerts {
    fn deliver(&mut self, alert: &AlertEvent) {
        self.0.borrow_mut().push(alert.clone());
    }
}

/// Opaque session handle handed across the FFI boundary. Alerts emitted by
/// the scheduler are buffered here and drained by each tick call.
pub struct FfiSession {
    session: MonitorSession,
    alerts: CollectedAlerts,
}

/// Outcome of one tick, serialized back to the host
#[derive(serde::Serialize)]
struct TickOutcome {
    score: Option<f64>,
    state: NotificationState,
    calibrated: bool,
    alerts: Vec<AlertEvent>,
}

unsafe fn parse_frames(
    pose_json: *const c_char,
    face_json: *const c_char,
) -> Option<(PoseFrame, FaceFrame)> {
    let pose_str = cstr_to_string(pose_json)?;
    let face_str = cstr_to_string(face_json)?;
    let pose: Vec<Keypoint> = serde_json::from_str(&pose_str).ok()?;
    let face: Vec<Keypoint> = serde_json::from_str(&face_str).ok()?;
    Some((
        PoseFrame::from_keypoints(pose),
        FaceFrame::from_landmarks(face),
    ))
}

/// Create a new monitoring session.
///
/// # Safety
/// - `engine_config_json` and `alert_config_json` must be valid
///   null-terminated C strings, or NULL for defaults.
/// - The returned handle must be freed with `uprite_session_free`.
/// - Returns NULL on error; call `uprite_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_new(
    engine_config_json: *const c_char,
    alert_config_json: *const c_char,
) -> *mut FfiSession {
    clear_last_error();

    let engine_config = if engine_config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(engine_config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid engine config string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&format!("Failed to parse engine config: {}", e));
                return ptr::null_mut();
            }
        }
    };

    let alert_config = if alert_config_json.is_null() {
        AlertConfig::default()
    } else {
        let json = match cstr_to_string(alert_config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid alert config string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&format!("Failed to parse alert config: {}", e));
                return ptr::null_mut();
            }
        }
    };

    let alerts = CollectedAlerts::default();
    let session = match MonitorSession::new(
        engine_config,
        alert_config,
        Box::new(alerts.clone()),
        Arc::new(SystemClock::new()),
    ) {
        Ok(session) => session,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    Box::into_raw(Box::new(FfiSession { session, alerts }))
}

/// Free a session handle.
///
/// # Safety
/// - `handle` must be a pointer returned by `uprite_session_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_free(handle: *mut FfiSession) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Enable detection. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid session pointer.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_enable(handle: *mut FfiSession) -> c_int {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return -1;
    };
    match ffi.session.enable() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Disable detection, clearing calibration and cancelling alerts.
/// Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid session pointer.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_disable(handle: *mut FfiSession) -> c_int {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return -1;
    };
    ffi.session.disable();
    0
}

/// Pause (1) or resume (0) alerting. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid session pointer.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_pause(handle: *mut FfiSession, paused: c_int) -> c_int {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return -1;
    };
    ffi.session.set_paused(paused != 0);
    0
}

/// Capture a calibration baseline from JSON keypoint arrays.
/// Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid session pointer.
/// - `pose_json` and `face_json` must be valid null-terminated C strings
///   holding JSON arrays of keypoints.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_calibrate(
    handle: *mut FfiSession,
    pose_json: *const c_char,
    face_json: *const c_char,
) -> c_int {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return -1;
    };
    let Some((pose, face)) = parse_frames(pose_json, face_json) else {
        set_last_error("Invalid keypoint JSON");
        return -1;
    };
    match ffi.session.calibrate_with(&pose, &face) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Run one analysis tick on JSON keypoint arrays and return a JSON outcome
/// `{score, state, calibrated, alerts}`. The alert buffer is drained into
/// the outcome, so each alert is reported exactly once.
///
/// # Safety
/// - `handle` must be a valid session pointer.
/// - `pose_json` and `face_json` must be valid null-terminated C strings.
/// - The returned string must be freed with `uprite_free_string`.
/// - Returns NULL on error; call `uprite_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_tick(
    handle: *mut FfiSession,
    pose_json: *const c_char,
    face_json: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return ptr::null_mut();
    };
    let Some((pose, face)) = parse_frames(pose_json, face_json) else {
        set_last_error("Invalid keypoint JSON");
        return ptr::null_mut();
    };

    let sample = ffi.session.ingest(&pose, &face);
    let outcome = TickOutcome {
        score: sample.map(|s| s.score),
        state: ffi.session.notification_state(),
        calibrated: ffi.session.is_calibrated(),
        alerts: ffi.alerts.0.borrow_mut().drain(..).collect(),
    };

    match serde_json::to_string(&outcome) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&format!("Failed to encode tick outcome: {}", e));
            ptr::null_mut()
        }
    }
}

/// Replace the alert configuration. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `handle` must be a valid session pointer.
/// - `config_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn uprite_session_set_alert_config(
    handle: *mut FfiSession,
    config_json: *const c_char,
) -> c_int {
    clear_last_error();
    let Some(ffi) = handle.as_mut() else {
        set_last_error("Null session handle");
        return -1;
    };
    let Some(json) = cstr_to_string(config_json) else {
        set_last_error("Invalid config string pointer");
        return -1;
    };
    let config: AlertConfig = match serde_json::from_str(&json) {
        Ok(config) => config,
        Err(e) => {
            set_last_error(&format!("Failed to parse alert config: {}", e));
            return -1;
        }
    };
    match ffi.session.set_alert_config(config) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Get the last error message, or NULL if none.
///
/// # Safety
/// - The returned pointer is valid until the next FFI call on this thread;
///   do not free it.
#[no_mangle]
pub unsafe extern "C" fn uprite_last_error() -> *const c_char {
    LAST_ERROR.with(|e| {
        e.borrow()
            .as_ref()
            .map(|s| s.as_ptr())
            .unwrap_or(ptr::null())
    })
}

/// Free a string returned by this API.
///
/// # Safety
/// - `ptr` must be a pointer returned by a function in this module, or NULL.
#[no_mangle]
pub unsafe extern "C" fn uprite_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn pose_json(ear_y: f64, eye_y: f64, shoulder_y: f64) -> String {
        serde_json::to_string(&vec![
            Keypoint::new("left_ear", 90.0, ear_y, 0.9),
            Keypoint::new("right_ear", 150.0, ear_y, 0.9),
            Keypoint::new("left_eye", 100.0, eye_y, 0.9),
            Keypoint::new("right_eye", 140.0, eye_y, 0.9),
            Keypoint::new("left_shoulder", 60.0, shoulder_y, 0.9),
            Keypoint::new("right_shoulder", 180.0, shoulder_y, 0.9),
        ])
        .unwrap()
    }

    fn face_json() -> String {
        serde_json::to_string(&vec![
            Keypoint::new("left_eye", 100.0, 190.0, 1.0),
            Keypoint::new("right_eye", 140.0, 190.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_session_lifecycle_over_ffi() {
        unsafe {
            let handle = uprite_session_new(ptr::null(), ptr::null());
            assert!(!handle.is_null());
            assert_eq!(uprite_session_enable(handle), 0);

            let pose = cstr(&pose_json(200.0, 190.0, 320.0));
            let face = cstr(&face_json());
            assert_eq!(uprite_session_calibrate(handle, pose.as_ptr(), face.as_ptr()), 0);

            let slouched = cstr(&pose_json(230.0, 220.0, 320.0));
            let out = uprite_session_tick(handle, slouched.as_ptr(), face.as_ptr());
            assert!(!out.is_null());
            let json = CStr::from_ptr(out).to_str().unwrap();
            let outcome: serde_json::Value = serde_json::from_str(json).unwrap();
            assert!(outcome["score"].as_f64().unwrap() > 50.0);
            assert_eq!(outcome["calibrated"], true);

            uprite_free_string(out);
            uprite_session_free(handle);
        }
    }

    #[test]
    fn test_invalid_json_sets_last_error() {
        unsafe {
            let handle = uprite_session_new(ptr::null(), ptr::null());
            uprite_session_enable(handle);

            let bad = cstr("not json");
            let face = cstr(&face_json());
            let result = uprite_session_calibrate(handle, bad.as_ptr(), face.as_ptr());
            assert_eq!(result, -1);
            assert!(!uprite_last_error().is_null());

            uprite_session_free(handle);
        }
    }

    #[test]
    fn test_bad_config_rejected() {
        unsafe {
            let config = cstr(r#"{"threshold": 150.0}"#);
            let handle = uprite_session_new(ptr::null(), config.as_ptr());
            // Missing fields fail deserialization before validation
            assert!(handle.is_null());
            assert!(!uprite_last_error().is_null());
        }
    }
}
