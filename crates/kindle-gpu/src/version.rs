//! Packed API version numbers.

use std::fmt;

const VARIANT_SHIFT: u32 = 29;
const MAJOR_SHIFT: u32 = 22;
const MINOR_SHIFT: u32 = 12;

const VARIANT_MASK: u32 = 0x7;
const MAJOR_MASK: u32 = 0x7F;
const MINOR_MASK: u32 = 0x3FF;
const PATCH_MASK: u32 = 0xFFF;

/// A `{variant, major, minor, patch}` version.
///
/// Fields are compared lexicographically, which is the same order the
/// packed ordinal produces as long as each field fits its bit width
/// (variant 3 bits, major 7, minor 10, patch 12).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionInfo {
    pub variant: u32,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl VersionInfo {
    /// Vulkan 1.0.
    pub const V1_0: Self = Self::new(0, 1, 0, 0);
    /// Vulkan 1.2.
    pub const V1_2: Self = Self::new(0, 1, 2, 0);
    /// Vulkan 1.3.
    pub const V1_3: Self = Self::new(0, 1, 3, 0);

    /// Create a version with an explicit variant.
    #[must_use]
    pub const fn new(variant: u32, major: u32, minor: u32, patch: u32) -> Self {
        Self {
            variant,
            major,
            minor,
            patch,
        }
    }

    /// Create a variant-0 version.
    #[must_use]
    pub const fn from_semver(major: u32, minor: u32, patch: u32) -> Self {
        Self::new(0, major, minor, patch)
    }

    /// Pack into the API's 32-bit ordinal.
    #[must_use]
    pub const fn to_packed(self) -> u32 {
        (self.variant << VARIANT_SHIFT)
            | (self.major << MAJOR_SHIFT)
            | (self.minor << MINOR_SHIFT)
            | self.patch
    }

    /// Unpack a 32-bit ordinal.
    #[must_use]
    pub const fn from_packed(packed: u32) -> Self {
        Self {
            variant: (packed >> VARIANT_SHIFT) & VARIANT_MASK,
            major: (packed >> MAJOR_SHIFT) & MAJOR_MASK,
            minor: (packed >> MINOR_SHIFT) & MINOR_MASK,
            patch: packed & PATCH_MASK,
        }
    }
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self::V1_0
    }
}

impl From<VersionInfo> for u32 {
    fn from(version: VersionInfo) -> Self {
        version.to_packed()
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.variant != 0 {
            write!(f, " (variant {})", self.variant)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn matches_ash_packing() {
        let version = VersionInfo::new(0, 1, 3, 275);
        assert_eq!(version.to_packed(), vk::make_api_version(0, 1, 3, 275));
        assert_eq!(VersionInfo::V1_2.to_packed(), vk::API_VERSION_1_2);
    }

    #[test]
    fn unpack_inverts_pack_at_field_limits() {
        for version in [
            VersionInfo::new(0, 0, 0, 0),
            VersionInfo::new(7, 127, 1023, 4095),
            VersionInfo::new(1, 1, 2, 3),
            VersionInfo::new(0, 64, 512, 2048),
        ] {
            assert_eq!(VersionInfo::from_packed(version.to_packed()), version);
        }
    }

    #[test]
    fn packed_order_follows_version_order() {
        let ordered = [
            VersionInfo::new(0, 1, 0, 0),
            VersionInfo::new(0, 1, 0, 4095),
            VersionInfo::new(0, 1, 1, 0),
            VersionInfo::new(0, 1, 1023, 4095),
            VersionInfo::new(0, 2, 0, 0),
            VersionInfo::new(0, 127, 1023, 4095),
            VersionInfo::new(1, 0, 0, 0),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_packed() < pair[1].to_packed());
        }
    }

    #[test]
    fn display() {
        assert_eq!(VersionInfo::from_semver(1, 3, 2).to_string(), "1.3.2");
        assert_eq!(VersionInfo::new(2, 1, 0, 0).to_string(), "1.0.0 (variant 2)");
    }
}
