//! Incremental time filter over the `_id` field.
//!
//! MongoDB ObjectIds lead with a big-endian 32-bit creation timestamp, so the
//! smallest id that could exist at instant `t` is `t`'s seconds in the first
//! 8 hex digits followed by zeroes. Comparing against that value gives an
//! inclusive lower bound: no document created at or after `t` sorts below it.

use chrono::{DateTime, Utc};

/// The minimal 24-hex-digit ObjectId for documents created at or after `at`.
///
/// Timestamps outside the 32-bit ObjectId epoch range are clamped, which
/// keeps the bound sound (pre-1970 selects everything).
pub fn min_object_id(at: DateTime<Utc>) -> String {
    let seconds = at.timestamp().clamp(0, u32::MAX as i64) as u32;
    format!("{seconds:08x}{:016x}", 0u64)
}

/// Extended-JSON `$gte` filter on `_id`, in the form the dump tool's
/// `--query` flag accepts.
pub fn id_lower_bound_query(at: DateTime<Utc>) -> String {
    serde_json::json!({ "_id": { "$gte": { "$oid": min_object_id(at) } } }).to_string()
}
