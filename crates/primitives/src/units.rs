//! Conversion between ledger base units and human-readable decimal amounts.
//!
//! The ledger accounts in an unsigned integer base unit (wei for ether
//! ledgers). Users type and read decimal strings scaled by a fixed number of
//! decimals. Both directions are exact: no floating point is involved.

use alloy_primitives::U256;
use thiserror::Error;

/// Decimals used by ether-denominated ledgers (1 ether = 10^18 wei).
pub const ETHER_DECIMALS: u8 = 18;

/// Largest number of decimals whose scale factor still fits in a [`U256`].
pub const MAX_DECIMALS: u8 = 77;

/// Why a decimal string could not be turned into base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountDefect {
    #[error("empty input")]
    Empty,

    #[error("unexpected character {0:?}")]
    InvalidChar(char),

    #[error("more than one decimal point")]
    MultiplePoints,

    #[error("no digits")]
    NoDigits,

    #[error("more than {0} fractional digits")]
    TooPrecise(u8),

    #[error("value does not fit in 256 bits")]
    Overflow,
}

/// Input is not a non-negative finite decimal representable in base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed amount {input:?}: {defect}")]
pub struct MalformedAmount {
    input: String,
    defect: AmountDefect,
}

impl MalformedAmount {
    fn new(input: &str, defect: AmountDefect) -> Self {
        Self {
            input: input.to_owned(),
            defect,
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn defect(&self) -> AmountDefect {
        self.defect
    }
}

/// Requested more decimals than a [`U256`] scale factor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported decimals {0} (max {MAX_DECIMALS})")]
pub struct InvalidDecimals(pub u8);

/// Scale and display symbol of the ledger's currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denomination {
    decimals: u8,
    symbol: String,
    scale: U256,
}

impl Denomination {
    pub fn new(decimals: u8, symbol: impl Into<String>) -> Result<Self, InvalidDecimals> {
        if decimals > MAX_DECIMALS {
            return Err(InvalidDecimals(decimals));
        }

        Ok(Self {
            decimals,
            symbol: symbol.into(),
            scale: scale_for(decimals),
        })
    }

    /// Ether with 18 decimals.
    pub fn ether() -> Self {
        Self {
            decimals: ETHER_DECIMALS,
            symbol: "ETH".to_owned(),
            scale: scale_for(ETHER_DECIMALS),
        }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Renders base units as a decimal string.
    ///
    /// Trailing fractional zeros are dropped but at least one fractional digit
    /// is kept, so one ether renders as `"1.0"` and zero as `"0.0"`.
    pub fn to_display(&self, amount: U256) -> String {
        let whole = amount / self.scale;
        let frac = amount % self.scale;

        if frac.is_zero() {
            return format!("{whole}.0");
        }

        let frac = frac.to_string();
        let pad = (self.decimals as usize).saturating_sub(frac.len());
        let frac = format!("{}{frac}", "0".repeat(pad));

        format!("{whole}.{}", frac.trim_end_matches('0'))
    }

    /// Parses a decimal string into base units.
    ///
    /// Accepts `1`, `1.`, `.5` and `1.5`. Fractional digits beyond the
    /// denomination's precision are only tolerated when they are zeros.
    pub fn to_base_units(&self, input: &str) -> Result<U256, MalformedAmount> {
        let malformed = |defect| MalformedAmount::new(input, defect);

        if input.is_empty() {
            return Err(malformed(AmountDefect::Empty));
        }

        if let Some(c) = input.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
            return Err(malformed(AmountDefect::InvalidChar(c)));
        }

        let (whole, frac) = match input.split_once('.') {
            Some((_, frac)) if frac.contains('.') => {
                return Err(malformed(AmountDefect::MultiplePoints));
            }
            Some((whole, frac)) => (whole, frac),
            None => (input, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(malformed(AmountDefect::NoDigits));
        }

        let frac = frac.trim_end_matches('0');
        if frac.len() > self.decimals as usize {
            return Err(malformed(AmountDefect::TooPrecise(self.decimals)));
        }

        let whole_units = parse_digits(whole).ok_or_else(|| malformed(AmountDefect::Overflow))?;

        let pad = self.decimals as usize - frac.len();
        let frac_units = parse_digits(&format!("{frac}{}", "0".repeat(pad)))
            .ok_or_else(|| malformed(AmountDefect::Overflow))?;

        whole_units
            .checked_mul(self.scale)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(|| malformed(AmountDefect::Overflow))
    }
}

impl Default for Denomination {
    fn default() -> Self {
        Self::ether()
    }
}

fn scale_for(decimals: u8) -> U256 {
    U256::from(10u8).pow(U256::from(decimals))
}

/// Parses a run of ASCII digits, treating the empty string as zero.
fn parse_digits(digits: &str) -> Option<U256> {
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).ok()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn wei(v: u128) -> U256 {
        U256::from(v)
    }

    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_display_whole_amounts() {
        let eth = Denomination::ether();
        assert_eq!(eth.to_display(U256::ZERO), "0.0");
        assert_eq!(eth.to_display(wei(ONE_ETHER)), "1.0");
        assert_eq!(eth.to_display(wei(25 * ONE_ETHER)), "25.0");
    }

    #[test]
    fn test_display_fractional_amounts() {
        let eth = Denomination::ether();
        assert_eq!(eth.to_display(wei(ONE_ETHER / 2)), "0.5");
        assert_eq!(eth.to_display(wei(1)), "0.000000000000000001");
        assert_eq!(eth.to_display(wei(ONE_ETHER + 500)), "1.0000000000000005");
    }

    #[test]
    fn test_display_zero_decimals() {
        let units = Denomination::new(0, "PTS").unwrap();
        assert_eq!(units.to_display(wei(42)), "42.0");
        assert_eq!(units.to_base_units("42").unwrap(), wei(42));
    }

    #[test]
    fn test_parse_accepted_forms() {
        let eth = Denomination::ether();
        assert_eq!(eth.to_base_units("1").unwrap(), wei(ONE_ETHER));
        assert_eq!(eth.to_base_units("1.").unwrap(), wei(ONE_ETHER));
        assert_eq!(eth.to_base_units(".5").unwrap(), wei(ONE_ETHER / 2));
        assert_eq!(eth.to_base_units("0.000000000000000001").unwrap(), wei(1));
        assert_eq!(eth.to_base_units("007").unwrap(), wei(7 * ONE_ETHER));
    }

    #[test]
    fn test_parse_tolerates_trailing_zeros_past_precision() {
        let eth = Denomination::ether();
        assert_eq!(
            eth.to_base_units("1.0000000000000000000000").unwrap(),
            wei(ONE_ETHER)
        );
    }

    #[test]
    fn test_parse_rejections() {
        let eth = Denomination::ether();
        let cases = [
            ("", AmountDefect::Empty),
            (".", AmountDefect::NoDigits),
            ("-1", AmountDefect::InvalidChar('-')),
            ("+1", AmountDefect::InvalidChar('+')),
            ("1e18", AmountDefect::InvalidChar('e')),
            (" 1", AmountDefect::InvalidChar(' ')),
            ("1.2.3", AmountDefect::MultiplePoints),
            ("0.0000000000000000001", AmountDefect::TooPrecise(18)),
            ("NaN", AmountDefect::InvalidChar('N')),
        ];

        for (input, defect) in cases {
            let err = eth.to_base_units(input).unwrap_err();
            assert_eq!(err.defect(), defect, "input {input:?}");
            assert_eq!(err.input(), input);
        }
    }

    #[test]
    fn test_parse_overflow() {
        let eth = Denomination::ether();
        let huge = "1".repeat(80);
        let err = eth.to_base_units(&huge).unwrap_err();
        assert_eq!(err.defect(), AmountDefect::Overflow);
    }

    #[test]
    fn test_invalid_decimals() {
        assert_eq!(Denomination::new(78, "X"), Err(InvalidDecimals(78)));
        assert!(Denomination::new(MAX_DECIMALS, "X").is_ok());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(v in any::<u128>()) {
            let eth = Denomination::ether();
            let shown = eth.to_display(wei(v));
            prop_assert_eq!(eth.to_base_units(&shown).unwrap(), wei(v));
        }

        #[test]
        fn prop_parse_preserves_order(a in any::<u64>(), b in any::<u64>(), scale in 0u8..=18) {
            let units = Denomination::new(scale, "X").unwrap();
            let fmt = |v: u64| {
                let s = format!("{v:0>width$}", width = scale as usize + 1);
                let split = s.len() - scale as usize;
                let (whole, frac) = s.split_at(split);
                format!("{whole}.{frac}")
            };
            let pa = units.to_base_units(&fmt(a)).unwrap();
            let pb = units.to_base_units(&fmt(b)).unwrap();
            prop_assert_eq!(a.cmp(&b), pa.cmp(&pb));
        }
    }
}
