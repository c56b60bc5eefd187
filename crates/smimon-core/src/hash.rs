//! djb2 reduction of vendor strings to event values.

const SEED: u64 = 5381;

/// `hash = hash * 33 + byte`, wrapping, starting from 5381.
pub fn djb2(text: &str) -> u64 {
    djb2_bytes(text.as_bytes())
}

pub fn djb2_bytes(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(SEED, |hash, &byte| hash.wrapping_mul(33).wrapping_add(u64::from(byte)))
}

/// The hash as an event value (bit-preserving).
pub fn djb2_value(text: &str) -> i64 {
    djb2(text) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_values() {
        assert_eq!(djb2(""), 5381);
        assert_eq!(djb2("a"), 177_670);
        assert_eq!(djb2("abc"), 193_485_963);
    }

    #[test]
    fn order_matters() {
        assert_ne!(djb2("SPX"), djb2("XPS"));
    }

    #[test]
    fn long_input_wraps_without_panicking() {
        let long = "x".repeat(4096);
        let _ = djb2(&long);
    }

    proptest! {
        #[test]
        fn prefix_extension_follows_recurrence(prefix in "[ -~]{0,32}", byte in 0x20u8..0x7f) {
            let mut extended = prefix.clone();
            extended.push(byte as char);
            let expected = djb2(&prefix).wrapping_mul(33).wrapping_add(u64::from(byte));
            prop_assert_eq!(djb2(&extended), expected);
        }
    }
}
