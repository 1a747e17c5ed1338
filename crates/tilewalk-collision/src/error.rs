use std::fmt;
use std::io;

use tilewalk_core::RegionId;

/// Failure reported by a [`RegionSource`](crate::RegionSource).
#[derive(Debug)]
pub enum FetchError {
    /// The archive has no entry for the region.
    NotFound,
    /// Reading the entry failed; the read may succeed if retried.
    Io(io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("region not present in archive"),
            Self::Io(e) => write!(f, "region read failed: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotFound => None,
            Self::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for FetchError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Errors from loading a [`CollisionRegion`](crate::CollisionRegion).
///
/// All of them are degradable: queries over an affected region answer
/// `Unknown` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionError {
    /// The archive has no entry for the region (unmapped or new content).
    DataUnavailable(RegionId),
    /// The source kept failing after the configured number of attempts.
    Fetch {
        region: RegionId,
        attempts: u32,
        message: String,
    },
    /// The blob is larger than a region can be.
    Malformed { region: RegionId, len: usize },
}

impl CollisionError {
    /// Region the error refers to.
    pub fn region(&self) -> RegionId {
        match self {
            Self::DataUnavailable(region)
            | Self::Fetch { region, .. }
            | Self::Malformed { region, .. } => *region,
        }
    }

    /// Whether the failure is a permanent property of the archive and may be
    /// remembered by the cache.
    pub fn is_permanent(&self) -> bool {
        !matches!(self, Self::Fetch { .. })
    }
}

impl fmt::Display for CollisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataUnavailable(region) => write!(f, "no collision data for {region}"),
            Self::Fetch {
                region,
                attempts,
                message,
            } => write!(
                f,
                "loading {region} failed after {attempts} attempt(s): {message}"
            ),
            Self::Malformed { region, len } => {
                write!(f, "collision data for {region} is malformed ({len} bytes)")
            }
        }
    }
}

impl std::error::Error for CollisionError {}
