use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Mounting direction of a camera in the multi-camera rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CameraPosition {
    Nadir,
    Back,
    Forward,
    Left,
    Right,
}

impl CameraPosition {
    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'N' => Some(Self::Nadir),
            'B' => Some(Self::Back),
            'F' => Some(Self::Forward),
            'L' => Some(Self::Left),
            'R' => Some(Self::Right),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Nadir => 'N',
            Self::Back => 'B',
            Self::Forward => 'F',
            Self::Left => 'L',
            Self::Right => 'R',
        }
    }
}

/// Typed key of a physical camera, e.g. `Cam0N` or `Cam3L`.
///
/// Parsed once from configuration; image names are resolved to a camera by
/// locating the `cam<digit><letter>` token (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CameraId {
    index: u8,
    position: CameraPosition,
}

impl CameraId {
    pub const fn new(index: u8, position: CameraPosition) -> Self {
        Self { index, position }
    }

    pub fn index(self) -> u8 {
        self.index
    }

    pub fn position(self) -> CameraPosition {
        self.position
    }

    pub fn is_nadir(self) -> bool {
        self.position == CameraPosition::Nadir
    }

    /// Find the first `cam<digit><letter>` token in an image name.
    pub fn find_in(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        bytes.windows(5).find_map(|w| {
            if !w[..3].eq_ignore_ascii_case(b"cam") || !w[3].is_ascii_digit() {
                return None;
            }
            let position = CameraPosition::from_letter(w[4] as char)?;
            Some(Self::new(w[3] - b'0', position))
        })
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cam{}{}", self.index, self.position.letter())
    }
}

impl FromStr for CameraId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match CameraId::find_in(trimmed) {
            Some(id) if trimmed.len() == 5 => Ok(id),
            _ => Err(Error::UnresolvedCamera(s.to_string())),
        }
    }
}

impl TryFrom<String> for CameraId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CameraId> for String {
    fn from(id: CameraId) -> Self {
        id.to_string()
    }
}
