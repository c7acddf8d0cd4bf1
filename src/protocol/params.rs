use std::collections::BTreeMap;
use std::fmt;

/// Separator between `key=value` pairs.
const PAIR_SEPARATOR: char = ';';

/// Separator between a key and its value.
const KEY_VALUE_SEPARATOR: char = '=';

/// Decoded request parameters.
///
/// Keys are kept sorted so `encode` produces stable output. Values are opaque
/// strings; only the geo cache looks inside `lat`, `lon` and `pacc`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a `key1=value1;key2=value2` string.
    ///
    /// Decoding never fails. A segment without `=` maps its key to an empty
    /// value, empty segments are skipped, and a repeated key keeps the last
    /// value seen. Only the first `=` splits a segment, so values may contain
    /// `=` themselves.
    pub fn decode(raw: &str) -> Self {
        let mut params = Self::new();
        for segment in raw.split(PAIR_SEPARATOR) {
            if segment.is_empty() {
                continue;
            }
            let (key, value) = segment
                .split_once(KEY_VALUE_SEPARATOR)
                .unwrap_or((segment, ""));
            params.insert(key, value);
        }
        params
    }

    /// Encodes the parameters as `key1=value1;key2=value2`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parses the value for `key` as a float.
    ///
    /// Surrounding whitespace is ignored, so a trailing newline from a device
    /// does not invalidate an otherwise good coordinate.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", PAIR_SEPARATOR)?;
            }
            write!(f, "{}{}{}", key, KEY_VALUE_SEPARATOR, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic() {
        let params = Params::decode("lat=30.45;lon=114.17;pacc=1500000");
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("lat"), Some("30.45"));
        assert_eq!(params.get("lon"), Some("114.17"));
        assert_eq!(params.get("pacc"), Some("1500000"));
    }

    #[test]
    fn test_decode_segment_without_separator() {
        let params = Params::decode("cmd;lat=1");
        assert_eq!(params.get("cmd"), Some(""));
        assert_eq!(params.get("lat"), Some("1"));
    }

    #[test]
    fn test_decode_splits_on_first_equals() {
        let params = Params::decode("token=abc=def");
        assert_eq!(params.get("token"), Some("abc=def"));
    }

    #[test]
    fn test_decode_duplicate_key_last_wins() {
        let params = Params::decode("lat=1;lat=2");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("lat"), Some("2"));
    }

    #[test]
    fn test_decode_skips_empty_segments() {
        let params = Params::decode(";lat=1;;lon=2;");
        assert_eq!(params.len(), 2);
        assert!(Params::decode("").is_empty());
    }

    #[test]
    fn test_encode_sorted() {
        let params: Params = [("lon", "114.17"), ("lat", "30.45"), ("cmd", "full")]
            .into_iter()
            .collect();
        assert_eq!(params.encode(), "cmd=full;lat=30.45;lon=114.17");
    }

    #[test]
    fn test_encode_decode_preserves_mapping() {
        let params: Params = [
            ("cmd", "aid"),
            ("user", "someone@example.com"),
            ("pwd", "secret"),
            ("lat", "30.45"),
            ("lon", "114.17"),
            ("pacc", "1500000"),
        ]
        .into_iter()
        .collect();
        assert_eq!(Params::decode(&params.encode()), params);
    }

    #[test]
    fn test_get_f64() {
        let params = Params::decode("lat=30.46\r\n;lon=abc;alt=NaN");
        assert_eq!(params.get_f64("lat"), Some(30.46));
        assert_eq!(params.get_f64("lon"), None);
        assert_eq!(params.get_f64("alt"), None);
        assert_eq!(params.get_f64("missing"), None);
    }
}
