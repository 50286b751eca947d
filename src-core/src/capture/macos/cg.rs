//! Core Graphics window list access.
//!
//! `CGWindowListCopyWindowInfo` returns an array of dictionaries; the
//! screencapturekit crate exposes neither window position nor owner PID, so
//! both come from here.

use core_foundation::array::{CFArray, CFArrayRef};
use core_foundation::base::TCFType;
use core_foundation::dictionary::CFDictionaryRef;
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use core_graphics::display::{
    kCGWindowListExcludeDesktopElements, kCGWindowListOptionIncludingWindow,
    kCGWindowListOptionOnScreenOnly, CGDisplay, CGWindowID,
};
use glance_types::Rect;
use std::ffi::c_void;

// External function for raw array access
extern "C" {
    fn CFArrayGetValueAtIndex(theArray: CFArrayRef, idx: isize) -> *const c_void;
    fn CFArrayGetCount(theArray: CFArrayRef) -> isize;
}

/// One entry of the window list.
#[derive(Debug, Clone, PartialEq)]
pub struct CgWindow {
    pub window_id: u32,
    pub owner_pid: i32,
    pub layer: i32,
    pub title: Option<String>,
    pub bounds: Rect,
}

/// Look up a raw dictionary value.
pub(crate) fn dict_value(dict: CFDictionaryRef, key: &str) -> Option<*const c_void> {
    let cf_key = CFString::new(key);
    unsafe {
        let mut value: *const c_void = std::ptr::null();
        if core_foundation::dictionary::CFDictionaryGetValueIfPresent(
            dict,
            cf_key.as_concrete_TypeRef() as *const _,
            &mut value,
        ) == 0
            || value.is_null()
        {
            return None;
        }
        Some(value)
    }
}

/// Helper to extract a number from a CFDictionary
pub(crate) fn number_value(dict: CFDictionaryRef, key: &str) -> Option<f64> {
    let value = dict_value(dict, key)?;
    let cf_number = unsafe { CFNumber::wrap_under_get_rule(value as _) };
    cf_number.to_f64()
}

fn string_value(dict: CFDictionaryRef, key: &str) -> Option<String> {
    let value = dict_value(dict, key)?;
    let cf_string = unsafe { CFString::wrap_under_get_rule(value as CFStringRef) };
    Some(cf_string.to_string())
}

/// Read a CGRect dictionary representation (`X`, `Y`, `Width`, `Height`).
pub(crate) fn rect_value(dict: CFDictionaryRef) -> Option<Rect> {
    Some(Rect::new(
        number_value(dict, "X")?,
        number_value(dict, "Y")?,
        number_value(dict, "Width")?,
        number_value(dict, "Height")?,
    ))
}

fn parse_window(dict: CFDictionaryRef) -> Option<CgWindow> {
    let window_id = number_value(dict, "kCGWindowNumber")? as u32;
    let owner_pid = number_value(dict, "kCGWindowOwnerPID")? as i32;
    let layer = number_value(dict, "kCGWindowLayer").unwrap_or(0.0) as i32;
    let title = string_value(dict, "kCGWindowName").filter(|t| !t.is_empty());
    let bounds = dict_value(dict, "kCGWindowBounds")
        .and_then(|b| rect_value(b as CFDictionaryRef))
        .unwrap_or_default();
    Some(CgWindow {
        window_id,
        owner_pid,
        layer,
        title,
        bounds,
    })
}

fn parse_list(info_array: &CFArray) -> Vec<CgWindow> {
    let array_ref = info_array.as_concrete_TypeRef();
    let count = unsafe { CFArrayGetCount(array_ref) };
    (0..count)
        .filter_map(|i| {
            let ptr = unsafe { CFArrayGetValueAtIndex(array_ref, i) };
            if ptr.is_null() {
                None
            } else {
                parse_window(ptr as CFDictionaryRef)
            }
        })
        .collect()
}

/// Window list entry for a single window, if it exists.
pub fn window(window_id: CGWindowID) -> Option<CgWindow> {
    let info_array =
        CGDisplay::window_list_info(kCGWindowListOptionIncludingWindow, Some(window_id))?;
    parse_list(&info_array)
        .into_iter()
        .find(|w| w.window_id == window_id)
}

/// On-screen windows, front to back.
pub fn on_screen_windows() -> Vec<CgWindow> {
    CGDisplay::window_list_info(
        kCGWindowListOptionOnScreenOnly | kCGWindowListExcludeDesktopElements,
        None,
    )
    .map(|info| parse_list(&info))
    .unwrap_or_default()
}
