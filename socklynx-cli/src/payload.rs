//! The deterministic datagram contents shared by the server and the load generator.

/// Byte `index` of the test pattern.
pub(crate) fn byte(index: usize) -> u8 {
    (index ^ (0xb7 * (index >> 8))) as u8
}

/// A pattern-filled datagram of `len` bytes.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(byte).collect()
}

/// Returns `true` if `data` is a prefix of the test pattern.
pub(crate) fn verify(data: &[u8]) -> bool {
    data.iter()
        .enumerate()
        .all(|(index, &value)| value == byte(index))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{byte, pattern, verify};

    #[test]
    fn first_block_counts_up() {
        assert!((0..256).all(|index| byte(index) == index as u8));
    }

    #[test]
    fn later_blocks_are_scrambled() {
        assert_eq!(byte(256), 0xb7);
        assert_eq!(byte(257), 0xb6);
        assert_eq!(byte(512), 0x6e);
    }

    #[test]
    fn corruption_is_detected() {
        let mut data = pattern(1235);
        assert!(verify(&data));
        assert!(verify(&data[..17]));
        assert!(verify(&[]));

        data[1000] ^= 1;
        assert!(!verify(&data));
    }
}
