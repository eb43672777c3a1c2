//! Shared numeric constants.

// ── Geometry ────────────────────────────────────────────────────

/// Smallest width or height, in pixels, for a box to be kept.
pub const MIN_BOX_SIZE: f64 = 5.0;

/// Handle index for the body of a label (drag to move).
pub const BODY_HANDLE: usize = 0;

/// Minimum vertices for a closed polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// Minimum vertices for an open polyline.
pub const MIN_POLYLINE_POINTS: usize = 2;

// ── Tracking ────────────────────────────────────────────────────

/// Default spacing of auto-label keyframes.
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 5;
