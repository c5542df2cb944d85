//! Best-effort file extension guessing from leading magic bytes.
//!
//! Used only to name resources whose hash has no known path.  The table is
//! checked in order and the first match wins.

/// Bytes of decoded payload the sniffer looks at.
pub const BEST_GUESS_LENGTH: usize = 16;

pub const EMPTY_EXTENSION: &str = ".null";
pub const UNKNOWN_EXTENSION: &str = ".unknown";

/// `(offset, magic, extension)`
const SIGNATURES: &[(usize, &[u8; 4], &str)] = &[
    (0, b"FBFO",   ".fbfo"),
    (0, b"FXCT",   ".fxct"),
    (0, b"GNPT",   ".gnpt"),
    (0, b"MDF\0",  ".mdf"),
    (0, b"MESH",   ".mesh"),
    (0, b"PFB\0",  ".pfb"),
    (0, b"SCN\0",  ".scn"),
    (0, b"SDF\0",  ".sdf"),
    (0, b"SDFT",   ".sdft"),
    (0, b"RTEX",   ".rtex"),
    (0, b"TEX\0",  ".tex"),
    (0, b"USR\0",  ".usr"),
    (0, b"efxr",   ".efx"),
    (0, b".SVU",   ".svu"),
    (4, b"IFNT",   ".ifnt"),
];

/// Guess an extension (with leading dot) for a decoded payload prefix.
pub fn guess_extension(data: &[u8]) -> &'static str {
    if data.is_empty() {
        return EMPTY_EXTENSION;
    }
    let data = &data[..data.len().min(BEST_GUESS_LENGTH)];
    SIGNATURES
        .iter()
        .find(|(offset, magic, _)| data.get(*offset..*offset + 4) == Some(&magic[..]))
        .map_or(UNKNOWN_EXTENSION, |(_, _, ext)| *ext)
}
