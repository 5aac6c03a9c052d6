// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire temperature codec.
//!
//! The vendor encodes every temperature as tenths of a Fahrenheit degree:
//! `round((°C × 1.8) × 10 + 320)`. Decoding is the exact inverse, rounded to
//! one decimal place.

/// Encode a Celsius temperature into the vendor's raw tenths-of-Fahrenheit wire value.
pub fn encode_celsius(celsius: f64) -> i64 {
    ((celsius * 1.8) * 10.0 + 320.0).round() as i64
}

/// Decode a raw tenths-of-Fahrenheit wire value into Celsius, rounded to one decimal.
pub fn decode_raw(raw: i64) -> f64 {
    let celsius = (raw as f64 / 10.0 - 32.0) / 1.8;
    (celsius * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heat_comfort_setpoint_matches_scenario_s1() {
        // 22.5°C -> round(22.5*1.8*10)+320 = 725
        assert_eq!(encode_celsius(22.5), 725);
    }

    #[test]
    fn round_trip_within_one_decimal() {
        for raw in -400..=1200i64 {
            let celsius = decode_raw(raw);
            let back = encode_celsius(celsius);
            assert!(
                (back - raw).abs() <= 1,
                "raw={raw} celsius={celsius} back={back}"
            );
        }
    }

    #[test]
    fn zero_celsius_encodes_to_320() {
        assert_eq!(encode_celsius(0.0), 320);
        assert_eq!(decode_raw(320), 0.0);
    }

    #[test]
    fn twenty_celsius_round_trips() {
        let raw = encode_celsius(20.0);
        assert_eq!(raw, 680);
        assert_eq!(decode_raw(raw), 20.0);
    }
}
