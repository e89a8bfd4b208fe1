//! Binary save/load of [`BspTree`]s.
//!
//! Every blob starts with a little-endian `u32` holding the 3-byte magic
//! `"BSP"` (`0x505342`) in its low bytes and the format version in the top
//! byte. Version 2 is the current format and the only one written; version
//! 0 is the legacy format, which can still be read and is converted on load.
//!
//! Current format layout:
//!
//! ```text
//! header:     magic+version u32, plane size u32, triangle size u32, node size u32
//! counts:     triangles u32, nodes u32, shared entries u32
//! bbox:       min 3×f32, max 3×f32
//! triangles:  3 vertices (3×f32 each) + flags u32
//! shared:     triangle index i32
//! nodes:      front i32, back i32, plane (normal 3×f32, d f32),
//!             first triangle i32, triangle count u32,
//!             first shared i32, shared count u32
//! user data:  { key u32, length i32, bytes } until the end of the buffer
//! ```
//!
//! References are element indices into their array; `-1` means none.

mod current;
mod io;
mod legacy;

use log::error;

use crate::{BspTree, LoadError};

pub use current::{load_current, save};
pub use legacy::load_legacy;

/// "BSP" in the low three bytes of the header word.
pub const MAGIC: u32 = 0x0050_5342;
/// The node-list format, readable but never written.
pub const LEGACY_VERSION: u8 = 0;
/// The format [`save`] writes.
pub const CURRENT_VERSION: u8 = 2;

/// Returns the header word for `version`.
#[inline]
pub(crate) fn token(version: u8) -> u32 {
    MAGIC | (u32::from(version) << 24)
}

/// Returns the format version of a blob, or `None` if it does not start
/// with the BSP magic.
pub fn bsp_version(data: &[u8]) -> Option<u8> {
    let header: [u8; 4] = data.get(..4)?.try_into().ok()?;
    let word = u32::from_le_bytes(header);
    if word & 0x00ff_ffff != MAGIC {
        return None;
    }
    Some((word >> 24) as u8)
}

/// Loads a tree saved in any supported format version.
pub fn load(data: &[u8]) -> Result<BspTree, LoadError> {
    match bsp_version(data) {
        Some(CURRENT_VERSION) => load_current(data),
        Some(LEGACY_VERSION) => load_legacy(data),
        Some(found) => {
            error!(
                "unsupported bsp version, expected {LEGACY_VERSION} or {CURRENT_VERSION}, got {found}"
            );
            Err(LoadError::UnsupportedVersion { found })
        }
        None => {
            error!("bad bsp magic");
            Err(LoadError::BadMagic)
        }
    }
}

/// Reads the user data trailer shared by both formats.
fn read_user_data(reader: &mut io::Reader<'_>, tree: &mut BspTree) -> Result<(), LoadError> {
    while !reader.is_empty() {
        let key = reader.read_u32()?;
        let len = reader.read_i32()?;
        let len = usize::try_from(len)
            .map_err(|_| LoadError::Corrupt(format!("user data {key} has negative length {len}")))?;
        let bytes = reader.take(len)?;
        tree.set_user_data(crate::UserDataKey(key), bytes.to_vec());
    }
    Ok(())
}

/// Rejects decoded trees that break the tree invariants.
fn check_loaded(tree: &BspTree) -> Result<(), LoadError> {
    tree.check_structure()
        .and_then(|()| tree.check_split_planes())
        .map_err(LoadError::Corrupt)?;
    tree.validate();
    Ok(())
}

/// Logs a load failure before handing it to the caller.
fn logged<T>(result: Result<T, LoadError>) -> Result<T, LoadError> {
    result.inspect_err(|err| error!("failed to load bsp: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_from_header() {
        assert_eq!(bsp_version(&token(CURRENT_VERSION).to_le_bytes()), Some(2));
        assert_eq!(bsp_version(&[0x42, 0x53, 0x50, 0x00, 0xaa]), Some(0));
        assert_eq!(bsp_version(&token(1).to_le_bytes()), Some(1));
        assert_eq!(bsp_version(b"BSQ\x02"), None);
        assert_eq!(bsp_version(&[0x42, 0x53]), None);
    }

    #[test]
    fn load_rejects_unknown_headers() {
        assert_eq!(load(b"nope").unwrap_err(), LoadError::BadMagic);
        assert_eq!(load(&[]).unwrap_err(), LoadError::BadMagic);
        assert_eq!(
            load(&token(1).to_le_bytes()).unwrap_err(),
            LoadError::UnsupportedVersion { found: 1 }
        );
    }
}
