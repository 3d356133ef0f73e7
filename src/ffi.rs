//! FFI bindings for Synheart Stride
//!
//! C-compatible entry points for the stateless parts of Stride. All string
//! functions take null-terminated C strings and return allocated memory that
//! must be freed by the caller using `stride_free_string`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::Utc;

use crate::achievements::{evaluate, BadgeId};
use crate::clock::SystemClock;
use crate::config::TrackerConfig;
use crate::geo::distance_km;
use crate::types::{CompletedActivity, FinishedSession};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Convert a Rust string to a C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Geo
// ============================================================================

/// Great-circle distance in kilometers between two coordinates.
#[no_mangle]
pub extern "C" fn stride_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_km(lat1, lon1, lat2, lon2)
}

// ============================================================================
// Activities
// ============================================================================

/// Finalize a stopped session into an activity record.
///
/// `finished_json` is a serialized `FinishedSession`; `config_json` is an
/// optional `TrackerConfig` (NULL for defaults). The start time is rendered
/// in the device's local offset.
///
/// # Safety
/// - `finished_json` must be a valid null-terminated C string.
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stride_free_string`.
/// - Returns NULL on error; call `stride_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stride_finalize_activity(
    finished_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(finished_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid session string pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let config_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&config_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let finished: FinishedSession = match serde_json::from_str(&json_str) {
        Ok(finished) => finished,
        Err(e) => {
            set_last_error(&format!("Invalid session JSON: {}", e));
            return ptr::null_mut();
        }
    };

    let activity = finished.into_activity(&SystemClock, &config);
    match serde_json::to_string(&activity) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Evaluate the badges a completed activity unlocks.
///
/// `unlocked_json` is an optional JSON array of badge ids already held
/// (e.g. `["first_run"]`); NULL means none. Returns a JSON array of the
/// newly unlocked badges.
///
/// # Safety
/// - `activity_json` must be a valid null-terminated C string.
/// - `unlocked_json` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `stride_free_string`.
/// - Returns NULL on error; call `stride_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn stride_evaluate_badges(
    activity_json: *const c_char,
    unlocked_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(activity_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid activity string pointer");
            return ptr::null_mut();
        }
    };

    let unlocked: HashSet<BadgeId> = if unlocked_json.is_null() {
        HashSet::new()
    } else {
        let unlocked_str = match cstr_to_string(unlocked_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid unlocked badges string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&unlocked_str) {
            Ok(ids) => ids,
            Err(e) => {
                set_last_error(&format!("Invalid unlocked badges JSON: {}", e));
                return ptr::null_mut();
            }
        }
    };

    let activity: CompletedActivity = match serde_json::from_str(&json_str) {
        Ok(activity) => activity,
        Err(e) => {
            set_last_error(&format!("Invalid activity JSON: {}", e));
            return ptr::null_mut();
        }
    };

    let badges = evaluate(&activity, &unlocked, Utc::now());
    match serde_json::to_string(&badges) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Stride functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Stride function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn stride_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Stride function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn stride_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Stride library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn stride_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
