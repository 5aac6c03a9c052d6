// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Symbolic <-> numeric key dictionary (the "referential"), plus the
//! documented fallback keys used before it has loaded, plus a self-contained
//! decoder for the vendor's proprietary LZ-UTF16 compression scheme.

use std::collections::HashMap;

use serde::Deserialize;

/// One `{index, value}` pair as decoded from the vendor's referential blob.
#[derive(Debug, Clone, Deserialize)]
struct ReferentialEntry {
    index: String,
    value: String,
}

/// Bijection between symbolic field names (`setpoint_h_normal`, `ring_function`, ...)
/// and the vendor's numeric wire keys (`"16"`, `"34"`, ...).
///
/// Built from the vendor's `referential` message; until that message arrives
/// every lookup falls back to [`fallback_key`].
#[derive(Debug, Clone, Default)]
pub struct Referential {
    symbol_to_numeric: HashMap<String, String>,
    numeric_to_symbol: HashMap<String, String>,
}

impl Referential {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a decompressed referential JSON array of `{index, value}` pairs.
    /// `index` is the numeric wire key, `value` is the symbolic name.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<ReferentialEntry> = serde_json::from_str(json)?;
        let mut table = Self::default();
        for entry in entries {
            table
                .symbol_to_numeric
                .insert(entry.value.clone(), entry.index.clone());
            table.numeric_to_symbol.insert(entry.index, entry.value);
        }
        Ok(table)
    }

    /// Look up the numeric key for a symbolic field name, if loaded.
    pub fn numeric_key(&self, symbol: &str) -> Option<&str> {
        self.symbol_to_numeric.get(symbol).map(String::as_str)
    }

    /// Look up the symbolic field name for a numeric key, if loaded.
    pub fn symbol(&self, numeric: &str) -> Option<&str> {
        self.numeric_to_symbol.get(numeric).map(String::as_str)
    }

    pub fn is_loaded(&self) -> bool {
        !self.symbol_to_numeric.is_empty()
    }

    /// Resolve a symbolic name to its wire key, preferring the loaded
    /// referential and falling back to the documented constant otherwise.
    pub fn resolve(&self, symbol: &str) -> &str {
        self.numeric_key(symbol)
            .unwrap_or_else(|| fallback_key(symbol))
    }
}

/// The documented fallback numeric keys, used before the referential has
/// loaded (or for a symbol the vendor never defined). Per the wire-format
/// table: mode_used -> "15", setpoint_h_normal -> "16", setpoint_h_reduced ->
/// "17", setpoint_c_normal -> "19", setpoint_c_reduced -> "20",
/// ring_function -> "34", loc_activation -> "31".
pub fn fallback_key(symbol: &str) -> &'static str {
    match symbol {
        "mode_used" => "15",
        "setpoint_h_normal" => "16",
        "setpoint_h_reduced" => "17",
        "setpoint_c_normal" => "19",
        "setpoint_c_reduced" => "20",
        "ring_function" => "34",
        "loc_activation" => "31",
        other => panic!("no documented fallback key for symbol {other:?}"),
    }
}

/// Decoder for the vendor's proprietary LZ-based UTF-16 string compression
/// (the `compressToUTF16`/`decompressFromUTF16` scheme). No registry crate
/// implements this exact variant, so it is hand-rolled here, mirroring the
/// reference algorithm's bit-packed dictionary format.
pub mod lz {
    /// Decompress a `decompressFromUTF16`-encoded string into UTF-8.
    ///
    /// Returns `None` on malformed input (truncated bit stream, dictionary
    /// index out of range) rather than panicking — callers treat this as a
    /// parse error to be logged and the message dropped.
    pub fn decompress(compressed: &str) -> Option<String> {
        if compressed.is_empty() {
            return Some(String::new());
        }

        let units: Vec<u16> = compressed.encode_utf16().collect();
        let mut state = DecodeState::new(&units);

        let mut bits = state.read_bits(2)?;
        let mut enlarge_in: u32 = 4;
        let mut num_bits: u32 = 3;
        let mut dictionary: Vec<Vec<u16>> = vec![vec![0], vec![1], vec![2]];
        let mut result: Vec<u16> = Vec::new();
        let mut data_val;
        let mut w: Vec<u16>;

        match bits {
            0 => {
                let c = state.read_bits(8)?;
                data_val = vec![c as u16];
            }
            1 => {
                let c = state.read_bits(16)?;
                data_val = vec![c as u16];
            }
            _ => return None,
        }
        dictionary.push(data_val.clone());
        w = data_val.clone();
        result.extend_from_slice(&w);

        loop {
            if state.exhausted() {
                return Some(String::from_utf16_lossy(&result));
            }

            bits = state.read_bits(num_bits)?;

            let c: u32 = bits;
            let entry: Vec<u16>;
            if c == 2 {
                return Some(String::from_utf16_lossy(&result));
            } else if c == 0 || c == 1 {
                let width = if c == 0 { 8 } else { 16 };
                let ch = state.read_bits(width)?;
                dictionary.push(vec![ch as u16]);
                entry = dictionary[dictionary.len() - 1].clone();
            } else if (c as usize) < dictionary.len() {
                entry = dictionary[c as usize].clone();
            } else if c as usize == dictionary.len() {
                let mut e = w.clone();
                e.push(w[0]);
                entry = e;
            } else {
                return None;
            }

            result.extend_from_slice(&entry);

            let mut combined = w.clone();
            combined.push(entry[0]);
            dictionary.push(combined);
            enlarge_in -= 1;
            if enlarge_in == 0 {
                enlarge_in = 1 << num_bits;
                num_bits += 1;
            }

            w = entry;
        }
    }

    struct DecodeState<'a> {
        units: &'a [u16],
        pos: usize,
        bit_pos: u32,
        current: u16,
    }

    impl<'a> DecodeState<'a> {
        fn new(units: &'a [u16]) -> Self {
            Self {
                units,
                pos: 0,
                bit_pos: 0,
                current: units.first().copied().unwrap_or(0),
            }
        }

        fn exhausted(&self) -> bool {
            self.pos >= self.units.len()
        }

        fn read_bit(&mut self) -> Option<u32> {
            if self.pos >= self.units.len() {
                return None;
            }
            let power = 1u16 << (15 - self.bit_pos);
            let bit = if self.current & power != 0 { 1 } else { 0 };
            self.bit_pos += 1;
            if self.bit_pos == 16 {
                self.bit_pos = 0;
                self.pos += 1;
                if self.pos < self.units.len() {
                    self.current = self.units[self.pos];
                }
            }
            Some(bit)
        }

        fn read_bits(&mut self, count: u32) -> Option<u32> {
            let mut result = 0u32;
            let mut power = 1u32;
            for _ in 0..count {
                let bit = self.read_bit()?;
                result |= bit * power;
                power <<= 1;
            }
            Some(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_keys_match_documented_table() {
        assert_eq!(fallback_key("mode_used"), "15");
        assert_eq!(fallback_key("setpoint_h_normal"), "16");
        assert_eq!(fallback_key("setpoint_h_reduced"), "17");
        assert_eq!(fallback_key("setpoint_c_normal"), "19");
        assert_eq!(fallback_key("setpoint_c_reduced"), "20");
        assert_eq!(fallback_key("ring_function"), "34");
        assert_eq!(fallback_key("loc_activation"), "31");
    }

    #[test]
    fn resolve_falls_back_before_load() {
        let table = Referential::empty();
        assert!(!table.is_loaded());
        assert_eq!(table.resolve("setpoint_h_normal"), "16");
    }

    #[test]
    fn resolve_prefers_loaded_mapping() {
        let json = r#"[{"index":"99","value":"setpoint_h_normal"}]"#;
        let table = Referential::from_json(json).unwrap();
        assert!(table.is_loaded());
        assert_eq!(table.resolve("setpoint_h_normal"), "99");
        assert_eq!(table.symbol("99"), Some("setpoint_h_normal"));
    }

    #[test]
    fn empty_compressed_string_decompresses_to_empty() {
        assert_eq!(lz::decompress("").as_deref(), Some(""));
    }
}
