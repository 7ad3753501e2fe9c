//! Wire format of the live-transaction stream.
//!
//! Each frame is UTF-8 JSON text shaped like `{"update": [<row patch>, ...]}`.
//! Producers commonly emit bare `NaN` for missing numbers, which is not JSON,
//! so those tokens are rewritten to `null` before parsing. No other repair is
//! attempted.

use std::borrow::Cow;

use serde_json::Value;

use gridsync_core::prelude::*;
use gridsync_core::RowTransaction;

const NAN_TOKEN: &str = "NaN";

/// Rewrite unquoted `NaN` tokens to `null`.
///
/// Occurrences inside string literals, and identifiers that merely contain
/// `NaN` (`NaNa`, `isNaN`), are left alone. Borrows when nothing changes.
pub fn sanitize_nan(text: &str) -> Cow<'_, str> {
    if !text.contains(NAN_TOKEN) {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut changed = false;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if b == b'"' {
            in_string = true;
            i += 1;
            continue;
        }

        if text[i..].starts_with(NAN_TOKEN)
            && !is_ident_byte(bytes.get(i.wrapping_sub(1)).copied())
            && !is_ident_byte(bytes.get(i + NAN_TOKEN.len()).copied())
        {
            out.push_str(&text[last..i]);
            out.push_str("null");
            i += NAN_TOKEN.len();
            last = i;
            changed = true;
            continue;
        }

        i += 1;
    }

    if !changed {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[last..]);
    Cow::Owned(out)
}

fn is_ident_byte(b: Option<u8>) -> bool {
    matches!(b, Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
}

/// Parse one frame into a row transaction.
///
/// # Errors
///
/// [`Error::LiveProtocol`] if the frame is not JSON after repair, is not an
/// object, or carries none of `update`, `add` or `remove`.
pub fn parse_live_message(text: &str) -> Result<RowTransaction> {
    let sanitized = sanitize_nan(text);
    let value: Value = serde_json::from_str(&sanitized)
        .map_err(|e| Error::live_protocol(format!("invalid JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(Error::live_protocol("expected a JSON object"));
    };
    if !["update", "add", "remove"]
        .iter()
        .any(|key| object.contains_key(*key))
    {
        return Err(Error::live_protocol("message carries no update field"));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::live_protocol(format!("malformed row patches: {e}")))
}
