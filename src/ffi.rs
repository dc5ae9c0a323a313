//! FFI bindings for FESK sleep decoding
//!
//! This module provides C-compatible functions for calling the decoder from the
//! companion app. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `fesk_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::config::{OnsetClock, ScoringConfig};
use crate::export::ExportFormat;
use crate::pipeline::{decode_and_score, frame_to_export, FrameProcessor};

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

/// Resolve a clock policy; NULL means UTC
unsafe fn config_from_clock(clock: *const c_char) -> Option<ScoringConfig> {
    if clock.is_null() {
        return Some(ScoringConfig::default());
    }
    let clock_str = match cstr_to_string(clock) {
        Some(s) => s,
        None => {
            set_last_error("Invalid clock string pointer");
            return None;
        }
    };
    let config = clock_str
        .parse::<OnsetClock>()
        .map(ScoringConfig::with_clock)
        .and_then(|config| config.validate().map(|()| config));
    match config {
        Ok(config) => Some(config),
        Err(e) => {
            set_last_error(&e.to_string());
            None
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Decode and score a hex frame, returning the scored frame as JSON.
///
/// # Safety
/// - `hex` must be a valid null-terminated C string.
/// - `clock` must be NULL (UTC) or a valid null-terminated C string such as
///   `"utc"`, `"local"` or `"+02:00"`.
/// - Returns a newly allocated string that must be freed with `fesk_free_string`.
/// - Returns NULL on error; call `fesk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fesk_decode_frame(
    hex: *const c_char,
    clock: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let hex_str = match cstr_to_string(hex) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let Some(config) = config_from_clock(clock) else {
        return ptr::null_mut();
    };

    let scored = match decode_and_score(&hex_str, &config) {
        Ok(scored) => scored,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&scored) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Decode and score a hex frame, returning the CSV export.
///
/// # Safety
/// - Same contract as `fesk_decode_frame`.
#[no_mangle]
pub unsafe extern "C" fn fesk_frame_to_csv(
    hex: *const c_char,
    clock: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let hex_str = match cstr_to_string(hex) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let Some(config) = config_from_clock(clock) else {
        return ptr::null_mut();
    };

    match frame_to_export(&hex_str, ExportFormat::Csv, &config) {
        Ok(csv) => string_to_cstr(&csv),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful API
// ============================================================================

/// Opaque handle to a FrameProcessor
pub struct FeskProcessorHandle {
    processor: FrameProcessor,
}

/// Create a new FrameProcessor.
///
/// # Safety
/// - `clock` must be NULL (UTC) or a valid null-terminated C string.
/// - Returns NULL if the clock policy is invalid.
/// - The returned pointer must be freed with `fesk_processor_free`.
#[no_mangle]
pub unsafe extern "C" fn fesk_processor_new(clock: *const c_char) -> *mut FeskProcessorHandle {
    clear_last_error();

    let Some(config) = config_from_clock(clock) else {
        return ptr::null_mut();
    };

    let handle = Box::new(FeskProcessorHandle {
        processor: FrameProcessor::with_config(config),
    });
    Box::into_raw(handle)
}

/// Free a FrameProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `fesk_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fesk_processor_free(processor: *mut FeskProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Decode, score and store a frame; returns the stored record as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `fesk_processor_new`.
/// - `hex` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `fesk_free_string`.
/// - Returns NULL on error; call `fesk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fesk_processor_process(
    processor: *mut FeskProcessorHandle,
    hex: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let hex_str = match cstr_to_string(hex) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    let json = handle
        .processor
        .process(&hex_str)
        .and_then(|record| serde_json::to_string(record).map_err(Into::into));

    match json {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save the processor's store to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `fesk_processor_new`.
/// - Returns a newly allocated string that must be freed with `fesk_free_string`.
/// - Returns NULL on error; call `fesk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fesk_processor_save_store(
    processor: *mut FeskProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_store() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load the processor's store from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `fesk_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `fesk_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn fesk_processor_load_store(
    processor: *mut FeskProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_store(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by FESK functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a FESK function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn fesk_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next FESK function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn fesk_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn fesk_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::to_hex;
    use crate::types::{Night, NIGHTS_PER_FRAME};
    use std::ffi::CString;

    fn sample_frame() -> CString {
        let nights: [Night; NIGHTS_PER_FRAME] = std::array::from_fn(|i| Night {
            onset: 1_705_359_600 + i as u32 * 86_400,
            offset: 1_705_388_400 + i as u32 * 86_400,
            duration: 480,
            efficiency: 90,
            waso: 20,
            awakenings: 1,
            light: 128,
            valid: 1,
        });
        CString::new(to_hex(&nights)).unwrap()
    }

    #[test]
    fn test_ffi_decode_frame() {
        let frame = sample_frame();
        let clock = CString::new("utc").unwrap();

        unsafe {
            let result = fesk_decode_frame(frame.as_ptr(), clock.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let value: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(value["nights"].as_array().unwrap().len(), 7);
            assert_eq!(value["circadianScore"]["compliance"], 100);

            fesk_free_string(result);
        }
    }

    #[test]
    fn test_ffi_frame_to_csv_null_clock() {
        let frame = sample_frame();

        unsafe {
            let result = fesk_frame_to_csv(frame.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let csv = CStr::from_ptr(result).to_str().unwrap();
            assert!(csv.starts_with("Date,"));
            assert!(csv.contains("2024-01-15,23:00,07:00"));

            fesk_free_string(result);
        }
    }

    #[test]
    fn test_ffi_processor_lifecycle() {
        unsafe {
            let processor = fesk_processor_new(ptr::null());
            assert!(!processor.is_null());

            let frame = sample_frame();
            let record = fesk_processor_process(processor, frame.as_ptr());
            assert!(!record.is_null());
            fesk_free_string(record);

            let saved = fesk_processor_save_store(processor);
            assert!(!saved.is_null());

            let processor2 = fesk_processor_new(ptr::null());
            let load_result = fesk_processor_load_store(processor2, saved);
            assert_eq!(load_result, 0);

            fesk_free_string(saved);
            fesk_processor_free(processor);
            fesk_processor_free(processor2);
        }
    }

    #[test]
    fn test_ffi_malformed_frame() {
        unsafe {
            let frame = CString::new("deadbeef").unwrap();
            let result = fesk_decode_frame(frame.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error = fesk_last_error();
            assert!(!error.is_null());

            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("8 hex digits"));
        }
    }

    #[test]
    fn test_ffi_invalid_clock() {
        unsafe {
            let clock = CString::new("mars").unwrap();
            let processor = fesk_processor_new(clock.as_ptr());
            assert!(processor.is_null());
            assert!(!fesk_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_rejects_out_of_range_offset() {
        let frame = sample_frame();
        let clock = CString::new("+20:00").unwrap();

        unsafe {
            let processor = fesk_processor_new(clock.as_ptr());
            assert!(processor.is_null());
            let error_str = CStr::from_ptr(fesk_last_error()).to_str().unwrap();
            assert!(error_str.contains("+/-14:00"));

            assert!(fesk_decode_frame(frame.as_ptr(), clock.as_ptr()).is_null());
            assert!(fesk_frame_to_csv(frame.as_ptr(), clock.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = fesk_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
