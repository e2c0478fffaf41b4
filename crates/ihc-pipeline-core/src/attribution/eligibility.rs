use chrono::NaiveDateTime;

/// A session can be credited toward a conversion only if it happened strictly
/// before it. Same-instant sessions are not eligible.
///
/// Every scoring path goes through this function.
#[inline]
pub fn is_eligible(session_ts: NaiveDateTime, conversion_ts: NaiveDateTime) -> bool {
    session_ts < conversion_ts
}
