//! Sample record layout.
//!
//! One sample is a fixed 19-byte ASCII record, `#NNNNN,SSP,±CCCCmA`
//! padded with `'0'`: a running sample counter, the state-of-charge in
//! percent (the `P` stands in for `%`), and the signed battery current in
//! milliamperes. Digit fields are zero-filled and right-aligned; values
//! too wide for their field keep only the low digits.
//!
//! Keeping the record ASCII lets the uplink side forward batches without
//! any per-sample parsing, and makes the raw log legible in a device
//! dump.

use core::fmt;

use crate::config::SAMPLE_SIZE;

/// One reading from the battery-management box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatterySample {
    /// Running sample counter, wrapping at the field width.
    pub index: u16,
    /// Relative state of charge, 0..=100.
    pub soc_percent: u8,
    /// Battery current in mA; negative while discharging.
    pub current_ma: i16,
}

impl BatterySample {
    /// Encode to the fixed record layout.
    pub fn encode(&self) -> [u8; SAMPLE_SIZE] {
        let mut rec = [b'0'; SAMPLE_SIZE];
        rec[0] = b'#';
        fill_decimal(&mut rec[1..6], self.index as u32);
        rec[6] = b',';
        fill_decimal(&mut rec[7..9], self.soc_percent as u32);
        rec[9] = b'P';
        rec[10] = b',';
        rec[11] = if self.current_ma < 0 { b'-' } else { b'+' };
        fill_decimal(&mut rec[12..16], self.current_ma.unsigned_abs() as u32);
        rec[16] = b'm';
        rec[17] = b'A';
        rec
    }
}

impl fmt::Display for BatterySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} soc {}% current {}mA",
            self.index, self.soc_percent, self.current_ma
        )
    }
}

/// Right-aligned decimal digits over a zero-filled field; high digits
/// beyond the field width are dropped.
fn fill_decimal(field: &mut [u8], mut val: u32) {
    let mut i = field.len();
    while val != 0 && i > 0 {
        i -= 1;
        field[i] = b'0' + (val % 10) as u8;
        val /= 10;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_fixed_ascii_layout() {
        let sample = BatterySample {
            index: 42,
            soc_percent: 87,
            current_ma: -1234,
        };
        assert_eq!(&sample.encode(), b"#00042,87P,-1234mA0");
    }

    #[test]
    fn zero_values_stay_zero_filled() {
        let sample = BatterySample {
            index: 0,
            soc_percent: 0,
            current_ma: 0,
        };
        assert_eq!(&sample.encode(), b"#00000,00P,+0000mA0");
    }

    #[test]
    fn charging_current_gets_a_plus_sign() {
        let sample = BatterySample {
            index: 7,
            soc_percent: 100,
            current_ma: 250,
        };
        // a three-digit SoC keeps only its low two digits
        assert_eq!(&sample.encode(), b"#00007,00P,+0250mA0");
    }
}
