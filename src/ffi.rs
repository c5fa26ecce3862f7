//! FFI bindings for Leadscope
//!
//! This module provides C-compatible functions for embedding Leadscope in a
//! host application. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using
//! `leadscope_free_string`. Structured results are returned as JSON.

use serde::Serialize;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::attribution::{EventKind, NavigationContext};
use crate::behavior::RecommendationKind;
use crate::clock::SystemClock;
use crate::config::IntelConfig;
use crate::error::IntelError;
use crate::intelligence::Intelligence;
use crate::storage::{FileStore, KeyValueStore};
use crate::types::EventData;

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

/// Serialize `value` into a newly allocated C string, or NULL with the error recorded
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Configuration from an optional JSON string; NULL means defaults
unsafe fn config_from_ptr(config_json: *const c_char) -> Result<IntelConfig, IntelError> {
    if config_json.is_null() {
        return Ok(IntelConfig::default());
    }
    let json = cstr_to_string(config_json)
        .ok_or_else(|| IntelError::InvalidInput("Invalid config string pointer".to_string()))?;
    IntelConfig::from_json(&json)
}

/// Event data from an optional JSON object string; NULL means no data
unsafe fn data_from_ptr(
    data_json: *const c_char,
    max_fields: usize,
) -> Result<Option<EventData>, IntelError> {
    if data_json.is_null() {
        return Ok(None);
    }
    let json = cstr_to_string(data_json)
        .ok_or_else(|| IntelError::InvalidInput("Invalid data string pointer".to_string()))?;
    EventData::from_json_str(&json, max_fields).map(Some)
}

/// Borrow the service behind a handle, recording an error for NULL
unsafe fn handle_mut<'a>(handle: *mut LeadscopeHandle) -> Option<&'a mut LeadscopeHandle> {
    if handle.is_null() {
        set_last_error("Null handle pointer");
        return None;
    }
    Some(&mut *handle)
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Opaque handle to an Intelligence service
pub struct LeadscopeHandle {
    intel: Intelligence,
}

fn into_handle(result: Result<Intelligence, IntelError>) -> *mut LeadscopeHandle {
    match result {
        Ok(intel) => Box::into_raw(Box::new(LeadscopeHandle { intel })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Create a memory-only service.
///
/// # Safety
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string.
/// - Must be freed with `leadscope_free`.
/// - Returns NULL on error; call `leadscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn leadscope_new(config_json: *const c_char) -> *mut LeadscopeHandle {
    clear_last_error();
    into_handle(config_from_ptr(config_json).and_then(Intelligence::new))
}

/// Create a service persisting its snapshots as JSON files under `state_dir`.
///
/// # Safety
/// - `state_dir` must be a valid null-terminated C string.
/// - `config_json` must be NULL (defaults) or a valid null-terminated C string.
/// - Must be freed with `leadscope_free`.
/// - Returns NULL on error; call `leadscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn leadscope_open(
    state_dir: *const c_char,
    config_json: *const c_char,
) -> *mut LeadscopeHandle {
    clear_last_error();

    let dir = match cstr_to_string(state_dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid state_dir string pointer");
            return ptr::null_mut();
        }
    };

    let result = config_from_ptr(config_json).and_then(|config| {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&dir)?);
        Intelligence::with_parts(config, Some(store), Arc::new(SystemClock))
    });
    into_handle(result)
}

/// Free a service.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn leadscope_free(handle: *mut LeadscopeHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

// ============================================================================
// Capture
// ============================================================================

/// Track a user action.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `action` and `page` must be valid null-terminated C strings.
/// - `data_json` must be NULL or a valid null-terminated JSON object string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_track_action(
    handle: *mut LeadscopeHandle,
    action: *const c_char,
    page: *const c_char,
    data_json: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };

    let (Some(action), Some(page)) = (cstr_to_string(action), cstr_to_string(page)) else {
        set_last_error("Invalid action or page string pointer");
        return -1;
    };

    match data_from_ptr(data_json, handle.intel.config().max_extension_fields) {
        Ok(data) => {
            handle.intel.track_user_action(&action, &page, data);
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Track a raw attribution event and return it as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `event_type` must be a valid null-terminated C string.
/// - `data_json` must be NULL or a valid null-terminated JSON object string.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
/// - Returns NULL on error; call `leadscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn leadscope_track_event(
    handle: *mut LeadscopeHandle,
    event_type: *const c_char,
    data_json: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };

    let Some(event_type) = cstr_to_string(event_type) else {
        set_last_error("Invalid event_type string pointer");
        return ptr::null_mut();
    };

    match data_from_ptr(data_json, handle.intel.config().max_extension_fields) {
        Ok(data) => {
            let event = handle
                .intel
                .track_event(EventKind::parse(&event_type), data.unwrap_or_default());
            json_to_cstr(&event)
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Track a conversion.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `value` is ignored when NaN.
/// - `currency` must be NULL or a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_track_conversion(
    handle: *mut LeadscopeHandle,
    value: f64,
    currency: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let value = if value.is_nan() { None } else { Some(value) };
    handle.intel.track_conversion(value, cstr_to_string(currency));
    0
}

/// Attach an external user id to the session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `user_id` must be a valid null-terminated C string.
/// - Returns 1 if accepted, 0 if a different id is already set, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_set_user_id(
    handle: *mut LeadscopeHandle,
    user_id: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let Some(user_id) = cstr_to_string(user_id) else {
        set_last_error("Invalid user_id string pointer");
        return -1;
    };
    i32::from(handle.intel.set_user_id(&user_id))
}

/// Replace the navigation context from JSON
/// (`{"url": ..., "referrer": ..., "viewportWidth": ..., "userAgent": ...}`).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `context_json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_set_navigation(
    handle: *mut LeadscopeHandle,
    context_json: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let Some(json) = cstr_to_string(context_json) else {
        set_last_error("Invalid context string pointer");
        return -1;
    };
    match serde_json::from_str::<NavigationContext>(&json) {
        Ok(context) => {
            handle.intel.set_navigation(context);
            0
        }
        Err(e) => {
            set_last_error(&IntelError::from(e).to_string());
            -1
        }
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Current recommendations as a JSON array.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `kind` must be NULL (all kinds) or one of "content", "feature", "navigation", "timing".
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
/// - Returns NULL on error; call `leadscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn leadscope_recommendations(
    handle: *mut LeadscopeHandle,
    kind: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let kind = match cstr_to_string(kind) {
        None => None,
        Some(name) => match RecommendationKind::parse(&name) {
            Some(kind) => Some(kind),
            None => {
                set_last_error(&format!("Unknown recommendation kind: {}", name));
                return ptr::null_mut();
            }
        },
    };
    json_to_cstr(&handle.intel.personalized_recommendations(kind))
}

/// Predicted next actions as a JSON array of strings.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `page` and `action` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
/// - Returns NULL on error; call `leadscope_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn leadscope_predict(
    handle: *mut LeadscopeHandle,
    page: *const c_char,
    action: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let (Some(page), Some(action)) = (cstr_to_string(page), cstr_to_string(action)) else {
        set_last_error("Invalid page or action string pointer");
        return ptr::null_mut();
    };
    json_to_cstr(&handle.intel.predict_user_behavior(&page, &action))
}

/// User insights as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
#[no_mangle]
pub unsafe extern "C" fn leadscope_insights(handle: *mut LeadscopeHandle) -> *mut c_char {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => json_to_cstr(&handle.intel.user_insights()),
        None => ptr::null_mut(),
    }
}

/// Analytics report as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
#[no_mangle]
pub unsafe extern "C" fn leadscope_report(handle: *mut LeadscopeHandle) -> *mut c_char {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => json_to_cstr(&handle.intel.analytics_report()),
        None => ptr::null_mut(),
    }
}

/// Events of one session as a JSON array, oldest first.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - `session_id` must be NULL (current session) or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
#[no_mangle]
pub unsafe extern "C" fn leadscope_journey(
    handle: *mut LeadscopeHandle,
    session_id: *const c_char,
) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    let session_id =
        cstr_to_string(session_id).unwrap_or_else(|| handle.intel.session_id().to_string());
    json_to_cstr(&handle.intel.user_journey(&session_id))
}

/// Absorbed storage and sink failures as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - Returns a newly allocated string that must be freed with `leadscope_free_string`.
#[no_mangle]
pub unsafe extern "C" fn leadscope_diagnostics(handle: *mut LeadscopeHandle) -> *mut c_char {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => json_to_cstr(&handle.intel.diagnostics()),
        None => ptr::null_mut(),
    }
}

/// Write both snapshots now.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_save(handle: *mut LeadscopeHandle) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    match handle.intel.save() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Drop all state and start a new session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `leadscope_new`/`leadscope_open`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn leadscope_reset(handle: *mut LeadscopeHandle) -> i32 {
    clear_last_error();
    match handle_mut(handle) {
        Some(handle) => {
            handle.intel.reset();
            0
        }
        None => -1,
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Leadscope functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Leadscope function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn leadscope_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Leadscope function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn leadscope_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Leadscope library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn leadscope_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
