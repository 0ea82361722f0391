//! Bit-order adaptation
//!
//! The PIO programs can only shift most-significant-bit first. Callers that
//! want LSB-first frames get their data bit-reversed here on the way out and
//! again on the way back in, so the dispatcher only ever decides *whether*
//! to adapt, never *how*.

use piospi_hal::BitOrder;

/// Reverse the bits of a byte
pub const fn reverse_bits8(b: u8) -> u8 {
    let b = (b & 0xF0) >> 4 | (b & 0x0F) << 4;
    let b = (b & 0xCC) >> 2 | (b & 0x33) << 2;
    (b & 0xAA) >> 1 | (b & 0x55) << 1
}

/// Reverse the bits of a 16-bit value
///
/// A 16-bit transfer is two independently clocked 8-bit frames, so each byte
/// is reversed on its own and the two bytes trade places.
pub const fn reverse_bits16(w: u16) -> u16 {
    ((reverse_bits8(w as u8) as u16) << 8) | reverse_bits8((w >> 8) as u8) as u16
}

/// Element that can be bit-reversed for the wire
pub trait BitReverse: Copy {
    /// Reverse the bit order of the element
    fn reverse(self) -> Self;
}

impl BitReverse for u8 {
    fn reverse(self) -> Self {
        reverse_bits8(self)
    }
}

impl BitReverse for u16 {
    fn reverse(self) -> Self {
        reverse_bits16(self)
    }
}

/// Convert one element between caller order and wire order
///
/// The conversion is its own inverse, so the same call serves both
/// directions.
#[inline]
pub fn adapt<T: BitReverse>(order: BitOrder, value: T) -> T {
    match order {
        BitOrder::MsbFirst => value,
        BitOrder::LsbFirst => value.reverse(),
    }
}

/// Copy `source` into `destination`, converting each element for `order`
///
/// Processes `min(source.len(), destination.len())` elements and returns
/// that count.
pub fn adapt_buffer<T: BitReverse>(order: BitOrder, source: &[T], destination: &mut [T]) -> usize {
    let count = source.len().min(destination.len());
    match order {
        BitOrder::MsbFirst => destination[..count].copy_from_slice(&source[..count]),
        BitOrder::LsbFirst => {
            for (dst, src) in destination.iter_mut().zip(source) {
                *dst = src.reverse();
            }
        }
    }
    count
}

/// Convert every element of `buffer` for `order` in place
pub fn adapt_in_place<T: BitReverse>(order: BitOrder, buffer: &mut [T]) {
    if order == BitOrder::LsbFirst {
        for element in buffer.iter_mut() {
            *element = element.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reverse_bits8_known_values() {
        assert_eq!(reverse_bits8(0x00), 0x00);
        assert_eq!(reverse_bits8(0x01), 0x80);
        assert_eq!(reverse_bits8(0x80), 0x01);
        assert_eq!(reverse_bits8(0x0F), 0xF0);
        assert_eq!(reverse_bits8(0x34), 0x2C);
        assert_eq!(reverse_bits8(0xAA), 0x55);
    }

    #[test]
    fn test_reverse_bits16_table() {
        // Byte swap plus per-byte reversal, worked by hand
        let table: [(u16, u16); 6] = [
            (0x0000, 0x0000),
            (0x00FF, 0xFF00),
            (0xFF00, 0x00FF),
            (0x1234, 0x2C48),
            (0xAAAA, 0x5555),
            (0x5555, 0xAAAA),
        ];
        for (input, expected) in table {
            assert_eq!(reverse_bits16(input), expected, "input {:#06x}", input);
        }
    }

    #[test]
    fn test_msb_first_is_identity_copy() {
        let src = [0x01u8, 0x80, 0x34, 0xFF];
        let mut dst = [0u8; 4];
        assert_eq!(adapt_buffer(BitOrder::MsbFirst, &src, &mut dst), 4);
        assert_eq!(dst, src);

        let src16 = [0x1234u16, 0x00FF];
        let mut dst16 = [0u16; 2];
        adapt_buffer(BitOrder::MsbFirst, &src16, &mut dst16);
        assert_eq!(dst16, src16);
    }

    #[test]
    fn test_lsb_first_reverses_each_element() {
        let src = [0x01u8, 0x80, 0x34];
        let mut dst = [0u8; 3];
        adapt_buffer(BitOrder::LsbFirst, &src, &mut dst);
        assert_eq!(dst, [0x80, 0x01, 0x2C]);

        let mut words = [0x1234u16, 0x00FF];
        adapt_in_place(BitOrder::LsbFirst, &mut words);
        assert_eq!(words, [0x2C48, 0xFF00]);
    }

    #[test]
    fn test_count_is_shorter_buffer() {
        let src = [0x01u8, 0x02, 0x03];
        let mut dst = [0xEEu8; 2];
        assert_eq!(adapt_buffer(BitOrder::LsbFirst, &src, &mut dst), 2);
        assert_eq!(dst, [0x80, 0x40]);
    }

    proptest! {
        #[test]
        fn prop_reverse_bits8_involution(v in any::<u8>()) {
            prop_assert_eq!(reverse_bits8(reverse_bits8(v)), v);
            prop_assert_eq!(reverse_bits8(v), v.reverse_bits());
        }

        #[test]
        fn prop_reverse_bits16_involution(v in any::<u16>()) {
            prop_assert_eq!(reverse_bits16(reverse_bits16(v)), v);
            prop_assert_eq!(
                reverse_bits16(v),
                u16::from_be_bytes([reverse_bits8(v as u8), reverse_bits8((v >> 8) as u8)])
            );
        }

        #[test]
        fn prop_msb_adapt_in_place_is_identity(mut data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let original = data.clone();
            adapt_in_place(BitOrder::MsbFirst, &mut data);
            prop_assert_eq!(data, original);
        }

        #[test]
        fn prop_lsb_adapt_twice_restores(data in proptest::collection::vec(any::<u16>(), 0..64)) {
            let mut once = data.clone();
            adapt_in_place(BitOrder::LsbFirst, &mut once);
            let mut twice = once.clone();
            adapt_in_place(BitOrder::LsbFirst, &mut twice);
            prop_assert_eq!(twice, data);
        }
    }
}
