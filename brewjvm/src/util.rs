/// Apply a signed offset to an instruction index, returning `None` if it would
/// go outside the range of a `u16`
pub(crate) const fn signed_offset_16(lhs: u16, rhs: i16) -> Option<u16> {
    if rhs.is_negative() {
        lhs.checked_sub(rhs.unsigned_abs())
    } else {
        // It was not negative so it fits inside a u16
        #[allow(clippy::cast_sign_loss)]
        lhs.checked_add(rhs as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::signed_offset_16;

    #[test]
    fn test_signed_offset() {
        assert_eq!(signed_offset_16(10, 5), Some(15));
        assert_eq!(signed_offset_16(10, -10), Some(0));
        assert_eq!(signed_offset_16(10, -11), None);
        assert_eq!(signed_offset_16(u16::MAX, 1), None);
        assert_eq!(signed_offset_16(u16::MAX, i16::MIN), Some(u16::MAX - 32768));
        assert_eq!(signed_offset_16(0, i16::MIN), None);
    }
}
