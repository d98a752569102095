//! Security token classifier

use crate::types::DeviceRecord;
use serde::{Deserialize, Serialize};

/// Default vendor-id prefixes (Yubico)
pub const DEFAULT_VIDPID_PREFIXES: &[&str] = &["1050:"];

/// Default descriptor keywords
pub const DEFAULT_KEYWORDS: &[&str] = &["yubico", "yubikey", "security key", "fido"];

/// Allowlist deciding which devices count as security tokens
///
/// A device is eligible when its VID:PID starts with any prefix, or its
/// descriptor contains any keyword. Both comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allowlist {
    /// VID:PID prefixes (e.g. "1050:")
    pub vidpid_prefixes: Vec<String>,
    /// Descriptor substrings (e.g. "yubikey")
    pub keywords: Vec<String>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self {
            vidpid_prefixes: DEFAULT_VIDPID_PREFIXES.iter().map(|s| s.to_string()).collect(),
            keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Allowlist {
    /// Create an allowlist from prefixes and keywords
    pub fn new(vidpid_prefixes: Vec<String>, keywords: Vec<String>) -> Self {
        Self {
            vidpid_prefixes,
            keywords,
        }
    }

    /// Whether the record is a security token
    pub fn is_eligible(&self, record: &DeviceRecord) -> bool {
        let vidpid = record.vidpid.trim().to_lowercase();
        let descriptor = record.descriptor.trim().to_lowercase();

        let prefix_match = self
            .vidpid_prefixes
            .iter()
            .map(|prefix| prefix.trim().to_lowercase())
            .filter(|prefix| !prefix.is_empty())
            .any(|prefix| vidpid.starts_with(&prefix));

        prefix_match
            || self
                .keywords
                .iter()
                .filter(|kw| !kw.is_empty())
                .any(|kw| descriptor.contains(&kw.to_lowercase()))
    }

    /// Whether at least one entry can ever match
    pub fn is_usable(&self) -> bool {
        self.vidpid_prefixes.iter().any(|p| !p.trim().is_empty())
            || self.keywords.iter().any(|k| !k.trim().is_empty())
    }

    /// Eligible records in snapshot order
    pub fn eligible<'a>(
        &'a self,
        snapshot: &'a [DeviceRecord],
    ) -> impl Iterator<Item = &'a DeviceRecord> + 'a {
        snapshot.iter().filter(|record| self.is_eligible(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(vidpid: &str, descriptor: &str) -> DeviceRecord {
        DeviceRecord::new("1-1", vidpid, descriptor, "Not shared")
    }

    #[test]
    fn test_vendor_prefix_match() {
        let allow = Allowlist::default();
        assert!(allow.is_eligible(&record("1050:0407", "USB Input Device")));
    }

    #[test]
    fn test_vendor_prefix_case_insensitive() {
        let allow = Allowlist::new(vec!["ABCD:".to_string()], vec![]);
        assert!(allow.is_eligible(&record("abcd:0001", "Thing")));
        assert!(allow.is_eligible(&record("AbCd:0001", "Thing")));
    }

    #[test]
    fn test_keyword_match() {
        let allow = Allowlist::default();
        assert!(allow.is_eligible(&record("096e:0858", "FIDO U2F Security Key")));
        assert!(allow.is_eligible(&record("20a0:4287", "Nitrokey FIDO2")));
        assert!(allow.is_eligible(&record("0000:0000", "YubiKey OTP+FIDO+CCID")));
    }

    #[test]
    fn test_no_match() {
        let allow = Allowlist::default();
        assert!(!allow.is_eligible(&record("046d:c52b", "USB Receiver")));
        assert!(!allow.is_eligible(&record("8087:0026", "Intel(R) Wireless Bluetooth(R)")));
        // Prefix must match from the start
        assert!(!allow.is_eligible(&record("0001:1050", "Hub")));
    }

    #[test]
    fn test_empty_keyword_ignored() {
        let allow = Allowlist::new(vec![], vec![String::new()]);
        assert!(!allow.is_eligible(&record("046d:c52b", "USB Receiver")));
        assert!(!allow.is_usable());
    }

    #[test]
    fn test_empty_prefix_ignored() {
        let allow = Allowlist::new(vec![String::new(), " ".to_string()], vec![]);
        assert!(!allow.is_eligible(&record("046d:c52b", "USB Receiver")));

        let allow = Allowlist::new(vec![String::new(), "1050:".to_string()], vec![]);
        assert!(allow.is_eligible(&record("1050:0407", "Composite")));
        assert!(!allow.is_eligible(&record("046d:c52b", "USB Receiver")));
    }

    #[test]
    fn test_is_usable() {
        assert!(Allowlist::default().is_usable());
        assert!(!Allowlist::new(vec![" ".to_string()], vec![]).is_usable());
    }

    #[test]
    fn test_eligible_preserves_order() {
        let allow = Allowlist::default();
        let snapshot = vec![
            DeviceRecord::new("1-1", "1050:0407", "YubiKey", "Shared"),
            DeviceRecord::new("1-2", "046d:c52b", "USB Receiver", "Not shared"),
            DeviceRecord::new("1-3", "1050:0120", "Security Key by Yubico", "Attached"),
        ];
        let busids: Vec<_> = allow.eligible(&snapshot).map(|r| r.busid.as_str()).collect();
        assert_eq!(busids, vec!["1-1", "1-3"]);
    }
}
