//! Software binary16 and bfloat16 conversions.
//!
//! Both half formats are stored and manipulated as raw `u16` bits; arithmetic
//! always happens after widening to f32. Narrowing rounds to nearest, ties to
//! even, and quiet-forces NaNs so a NaN payload never narrows to infinity.

/// Widens an IEEE-754 binary16 value to f32.
pub fn f16_to_f32(bits: u16) -> f32 {
    let sign = (bits as u32 & 0x8000) << 16;
    let exp = (bits >> 10) & 0x1f;
    let frac = (bits & 0x03ff) as u32;

    let out = match exp {
        0 => {
            if frac == 0 {
                sign
            } else {
                // Subnormal half: renormalize into the f32 exponent range.
                let mut exp32 = 127 - 15 + 1;
                let mut frac = frac;
                while frac & 0x0400 == 0 {
                    frac <<= 1;
                    exp32 -= 1;
                }
                sign | ((exp32 as u32) << 23) | ((frac & 0x03ff) << 13)
            }
        }
        31 => sign | 0x7f80_0000 | (frac << 13),
        _ => sign | ((exp as u32 + 127 - 15) << 23) | (frac << 13),
    };
    f32::from_bits(out)
}

/// Narrows an f32 to IEEE-754 binary16 with round-to-nearest-even.
pub fn f16_from_f32(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let frac = bits & 0x007f_ffff;

    if exp == 0xff {
        if frac == 0 {
            return sign | 0x7c00;
        }
        // Keep NaN quiet and non-infinite regardless of payload truncation.
        return sign | 0x7e00 | ((frac >> 13) as u16 & 0x01ff);
    }

    let unbiased = exp - 127;
    if unbiased >= 16 {
        return sign | 0x7c00;
    }
    if unbiased >= -14 {
        let mut mant = frac >> 13;
        let rest = frac & 0x1fff;
        if rest > 0x1000 || (rest == 0x1000 && mant & 1 == 1) {
            mant += 1;
        }
        let mut hexp = (unbiased + 15) as u32;
        if mant == 0x0400 {
            mant = 0;
            hexp += 1;
            if hexp >= 31 {
                return sign | 0x7c00;
            }
        }
        return sign | ((hexp as u16) << 10) | mant as u16;
    }
    if unbiased >= -25 {
        // Subnormal half: shift out low bits with the same RNE rule. A carry
        // out of the mantissa lands on the smallest normal, which is correct.
        let mant = frac | 0x0080_0000;
        let shift = (126 - exp) as u32;
        let kept = mant >> shift;
        let rest = mant & ((1 << shift) - 1);
        let half = 1 << (shift - 1);
        let mut out = kept;
        if rest > half || (rest == half && kept & 1 == 1) {
            out += 1;
        }
        return sign | out as u16;
    }
    sign
}

/// Widens a bfloat16 value to f32. Exact: bfloat16 is the top half of f32.
pub fn bf16_to_f32(bits: u16) -> f32 {
    f32::from_bits((bits as u32) << 16)
}

/// Narrows an f32 to bfloat16 with round-to-nearest-even.
pub fn bf16_from_f32(value: f32) -> u16 {
    let bits = value.to_bits();
    if value.is_nan() {
        // Quiet-force so a payload of all-zero truncated bits stays NaN.
        return ((bits >> 16) as u16) | 0x0040;
    }
    let round = ((bits >> 16) & 1) + 0x7fff;
    ((bits.wrapping_add(round)) >> 16) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f16_exact_values() {
        assert_eq!(f16_to_f32(0x3c00), 1.0);
        assert_eq!(f16_to_f32(0xbc00), -1.0);
        assert_eq!(f16_to_f32(0x4000), 2.0);
        assert_eq!(f16_to_f32(0x3555), 0.333251953125);
        assert_eq!(f16_from_f32(1.0), 0x3c00);
        assert_eq!(f16_from_f32(-2.0), 0xc000);
        assert_eq!(f16_from_f32(0.0), 0x0000);
        assert_eq!(f16_from_f32(-0.0), 0x8000);
    }

    #[test]
    fn test_f16_round_to_nearest_even() {
        // 1 + 2^-11 is exactly halfway between 1.0 and the next half; ties
        // go to the even mantissa (1.0).
        assert_eq!(f16_from_f32(1.0 + 2f32.powi(-11)), 0x3c00);
        // Three quarters of the way rounds up.
        assert_eq!(f16_from_f32(1.0 + 3.0 * 2f32.powi(-12)), 0x3c01);
    }

    #[test]
    fn test_f16_subnormals() {
        // Smallest positive subnormal half is 2^-24.
        assert_eq!(f16_from_f32(2f32.powi(-24)), 0x0001);
        assert_eq!(f16_to_f32(0x0001), 2f32.powi(-24));
        // Largest subnormal.
        assert_eq!(f16_to_f32(0x03ff), 1023.0 * 2f32.powi(-24));
        // Below half of the smallest subnormal flushes to zero.
        assert_eq!(f16_from_f32(2f32.powi(-26)), 0x0000);
    }

    #[test]
    fn test_f16_overflow_and_nan() {
        assert_eq!(f16_from_f32(65536.0), 0x7c00);
        assert_eq!(f16_from_f32(f32::INFINITY), 0x7c00);
        assert_eq!(f16_from_f32(f32::NEG_INFINITY), 0xfc00);
        let nan = f16_from_f32(f32::NAN);
        assert_eq!(nan & 0x7c00, 0x7c00);
        assert_ne!(nan & 0x03ff, 0);
        assert!(f16_to_f32(nan).is_nan());
    }

    #[test]
    fn test_f16_round_trip_is_identity() {
        // Every finite half value must survive widening and narrowing.
        for bits in 0u16..=0xffff {
            let exp = (bits >> 10) & 0x1f;
            if exp == 31 {
                continue;
            }
            assert_eq!(f16_from_f32(f16_to_f32(bits)), bits, "bits={bits:#06x}");
        }
    }

    #[test]
    fn test_bf16_basics() {
        assert_eq!(bf16_to_f32(0x3f80), 1.0);
        assert_eq!(bf16_from_f32(1.0), 0x3f80);
        assert_eq!(bf16_from_f32(f32::INFINITY), 0x7f80);
        let nan = bf16_from_f32(f32::NAN);
        assert!(bf16_to_f32(nan).is_nan());
    }

    #[test]
    fn test_bf16_round_to_nearest_even() {
        // 1.0 + 2^-8 is halfway between 1.0 and the next bfloat16; the tie
        // goes to even (1.0). Slightly above rounds up.
        assert_eq!(bf16_from_f32(f32::from_bits(0x3f80_8000)), 0x3f80);
        assert_eq!(bf16_from_f32(f32::from_bits(0x3f80_8001)), 0x3f81);
        assert_eq!(bf16_from_f32(f32::from_bits(0x3f81_8000)), 0x3f82);
    }
}
