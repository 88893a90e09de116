//! # Snapshot Persistence Format
//!
//! ```text
//! +--------+---------+------------------------------+
//! | "RGMS" | version | postcard(TrackerSnapshot)    |
//! | 4 B    | 1 B     | rest                         |
//! +--------+---------+------------------------------+
//! ```

use crate::error::{Result, RgmsError};
use crate::tracker::{Tracker, TrackerSnapshot};

/// File magic.
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"RGMS";

/// Current format version.
pub const SNAPSHOT_VERSION: u8 = 1;

const HEADER_LEN: usize = 5;

/// Encode a snapshot with its header.
pub fn encode_snapshot(snapshot: &TrackerSnapshot) -> Result<Vec<u8>> {
    let payload = postcard::to_allocvec(snapshot)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(SNAPSHOT_MAGIC);
    out.push(SNAPSHOT_VERSION);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot, checking magic and version first.
pub fn decode_snapshot(bytes: &[u8]) -> Result<TrackerSnapshot> {
    let Some((header, payload)) = bytes.split_at_checked(HEADER_LEN) else {
        return Err(RgmsError::persistence("snapshot truncated before header end"));
    };
    if &header[..4] != SNAPSHOT_MAGIC {
        return Err(RgmsError::persistence("not an rgms snapshot (bad magic)"));
    }
    if header[4] != SNAPSHOT_VERSION {
        return Err(RgmsError::persistence(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            header[4]
        )));
    }
    Ok(postcard::from_bytes(payload)?)
}

/// Serialize a whole tracker.
pub fn save_tracker(tracker: &Tracker) -> Result<Vec<u8>> {
    encode_snapshot(&tracker.snapshot())
}

/// Rebuild a tracker from snapshot bytes.
pub fn load_tracker(bytes: &[u8]) -> Result<Tracker> {
    Tracker::from_snapshot(decode_snapshot(bytes)?)
}
