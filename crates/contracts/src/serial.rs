//! DeviceSerial - Cheap-to-clone device serial number
//!
//! Serial numbers are opaque strings handed out by device enumeration.
//! Uses Arc<str> internally so clones only bump a reference count.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Device serial number with cheap cloning.
///
/// # Examples
/// ```
/// use contracts::DeviceSerial;
///
/// let serial: DeviceSerial = "841512070234".into();
/// assert_eq!(serial, "841512070234");
/// assert_eq!(serial.as_str(), "841512070234");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceSerial(Arc<str>);

impl DeviceSerial {
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for DeviceSerial {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for DeviceSerial {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for DeviceSerial {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceSerial {
    #[inline]
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for DeviceSerial {
    #[inline]
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceSerial({:?})", self.0)
    }
}

impl PartialEq<str> for DeviceSerial {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for DeviceSerial {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for DeviceSerial {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

impl Serialize for DeviceSerial {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceSerial {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_clone_shares_storage() {
        let a: DeviceSerial = "841512070234".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut set: HashSet<DeviceSerial> = HashSet::new();
        set.insert("A100".into());
        assert!(set.contains("A100"));
        assert!(!set.contains("B200"));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let serial: DeviceSerial = "A100".into();
        let json = serde_json::to_string(&serial).unwrap();
        assert_eq!(json, "\"A100\"");
        let parsed: DeviceSerial = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, serial);
    }
}
