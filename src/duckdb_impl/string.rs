use libduckdb_sys::duckdb_string_t;

const INLINE_CAPACITY: u32 = 12;

/// Copies a DuckDB `VARCHAR` row into an owned `String`, replacing invalid UTF-8.
///
/// # Safety
///
/// `s` must be a non-NULL row of a `VARCHAR` vector that DuckDB handed to the running scalar
/// invocation; the caller checks row validity first.
pub unsafe fn decode_duckdb_string(s: &duckdb_string_t) -> String {
    // SAFETY: both union variants start with the length field.
    let len = unsafe { s.value.inlined.length };
    if len == 0 {
        return String::new();
    }

    let bytes = if len <= INLINE_CAPACITY {
        // SAFETY: short strings keep `len` initialized bytes inline.
        let inlined = unsafe { &s.value.inlined.inlined };
        // SAFETY: `len <= 12` bytes of `inlined` are initialized.
        unsafe { std::slice::from_raw_parts(inlined.as_ptr() as *const u8, len as usize) }
    } else {
        // SAFETY: long strings point at DuckDB-owned storage of `len` bytes.
        let ptr = unsafe { s.value.pointer.ptr };
        // SAFETY: the storage outlives this call.
        unsafe { std::slice::from_raw_parts(ptr as *const u8, len as usize) }
    };

    String::from_utf8_lossy(bytes).into_owned()
}
