//! Pack/unpack primitives shared by the dump codecs.
//!
//! All operations are total: out-of-range inputs are masked, never
//! rejected. Semantic range validation belongs to the callers.

/// Combines boolean flags into an unsigned integer, most significant
/// bit first.
pub fn pack_bits(bits: &[bool]) -> u32 {
    let mut value = 0u32;
    for bit in bits {
        value = (value << 1) | (*bit as u32);
    }
    return value;
}

/// Exact inverse of [`pack_bits`] for the given bit count.
pub fn unpack_bits(value: u32, count: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(count);
    for i in (0..count).rev() {
        bits.push((value >> i) & 1 != 0);
    }
    return bits;
}

/// Combines a 4-bit high nibble and an 8-bit low byte into a 12-bit
/// quantity.
pub fn pack_12bit(hi: u8, lo: u8) -> u16 {
    return (((hi & 0x0F) as u16) << 8) | lo as u16;
}

/// Splits a 12-bit quantity into its high nibble and low byte.
pub fn unpack_12bit(value: u16) -> [u8; 2] {
    return [((value >> 8) & 0x0F) as u8, (value & 0xFF) as u8];
}

/// Combines two nibbles into one byte, masking any high bits.
pub fn pack_8bit(hi: u8, lo: u8) -> u8 {
    return ((hi & 0x0F) << 4) | (lo & 0x0F);
}

/// Splits a byte into its two nibbles.
pub fn unpack_8bit(value: u8) -> [u8; 2] {
    return [(value >> 4) & 0x0F, value & 0x0F];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_bits() {
        assert_eq!(pack_bits(&[true, false, true, true]), 0b1011);
        assert_eq!(pack_bits(&[]), 0);
        assert_eq!(pack_bits(&[false, false, true]), 1);
    }

    #[test]
    fn test_unpack_bits_inverse() {
        for value in 0..16u32 {
            let bits = unpack_bits(value, 4);
            assert_eq!(bits.len(), 4);
            assert_eq!(pack_bits(&bits), value);
        }
    }

    #[test]
    fn test_12bit_round_trip() {
        for hi in 0..=15u8 {
            for lo in 0..=255u8 {
                let packed = pack_12bit(hi, lo);
                assert_eq!(packed, ((hi as u16) << 8) | lo as u16);
                assert_eq!(unpack_12bit(packed), [hi, lo]);
            }
        }
    }

    #[test]
    fn test_8bit_round_trip() {
        for hi in 0..=15u8 {
            for lo in 0..=15u8 {
                assert_eq!(unpack_8bit(pack_8bit(hi, lo)), [hi, lo]);
            }
        }
    }

    #[test]
    fn test_out_of_range_inputs_are_masked() {
        // high bits above the nibble are dropped, not rejected
        assert_eq!(pack_12bit(0xFF, 0x34), 0x0F34);
        assert_eq!(pack_8bit(0xAB, 0xCD), 0xBD);
        assert_eq!(unpack_12bit(0xFFFF), [0x0F, 0xFF]);
    }
}
