//! Fixed-point amounts
//!
//! Token balances move in whole units ([`TokenAmount`]). Reward accounting
//! runs on [`Dec`], an unsigned fixed-point decimal with 18 fractional digits
//! stored as `u128` atoms. Every operation is checked and truncates toward
//! zero; nothing rounds and nothing touches floating point.

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whole token units.
pub type TokenAmount = u128;

/// Number of fractional digits carried by [`Dec`].
pub const DEC_PRECISION: u32 = 18;

/// Atoms in one whole unit: `1.0 == 10^18` atoms.
pub const ATOMS_PER_UNIT: u128 = 10u128.pow(DEC_PRECISION);

/// Errors produced by checked decimal arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("decimal overflow")]
    Overflow,
    #[error("decimal underflow: result would be negative")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid decimal string '{0}'")]
    Parse(String),
}

/// Unsigned fixed-point decimal with 18 fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec {
    atoms: u128,
}

impl Dec {
    pub const ZERO: Dec = Dec { atoms: 0 };
    pub const ONE: Dec = Dec {
        atoms: ATOMS_PER_UNIT,
    };

    /// Build a decimal directly from its atom count.
    pub const fn from_atoms(atoms: u128) -> Self {
        Self { atoms }
    }

    /// Raw atom count (`value * 10^18`).
    pub const fn atoms(&self) -> u128 {
        self.atoms
    }

    /// Lift a whole token amount into decimal form.
    pub fn try_from_int(units: TokenAmount) -> Result<Self, AmountError> {
        units
            .checked_mul(ATOMS_PER_UNIT)
            .map(Self::from_atoms)
            .ok_or(AmountError::Overflow)
    }

    /// `num / den`, truncated to 18 fractional digits.
    pub fn ratio(num: u128, den: u128) -> Result<Self, AmountError> {
        Self::ONE.checked_mul_ratio(num, den)
    }

    pub fn is_zero(&self) -> bool {
        self.atoms == 0
    }

    pub fn checked_add(self, rhs: Dec) -> Result<Dec, AmountError> {
        self.atoms
            .checked_add(rhs.atoms)
            .map(Dec::from_atoms)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(self, rhs: Dec) -> Result<Dec, AmountError> {
        self.atoms
            .checked_sub(rhs.atoms)
            .map(Dec::from_atoms)
            .ok_or(AmountError::Underflow)
    }

    /// Multiply by an integer (e.g. a stake). Exact, no truncation involved.
    pub fn checked_mul_int(self, rhs: u128) -> Result<Dec, AmountError> {
        self.atoms
            .checked_mul(rhs)
            .map(Dec::from_atoms)
            .ok_or(AmountError::Overflow)
    }

    /// Divide by an integer, truncating at the atom level.
    pub fn checked_div_int(self, rhs: u128) -> Result<Dec, AmountError> {
        if rhs == 0 {
            return Err(AmountError::DivisionByZero);
        }
        Ok(Dec::from_atoms(self.atoms / rhs))
    }

    /// `self * num / den`, truncated. The product is formed in a wide
    /// integer so `num` may be as large as a total voting power.
    pub fn checked_mul_ratio(self, num: u128, den: u128) -> Result<Dec, AmountError> {
        if den == 0 {
            return Err(AmountError::DivisionByZero);
        }
        let wide = BigUint::from(self.atoms) * BigUint::from(num) / BigUint::from(den);
        wide.to_u128()
            .map(Dec::from_atoms)
            .ok_or(AmountError::Overflow)
    }

    /// Whole-unit part, truncated toward zero.
    pub fn trunc(&self) -> TokenAmount {
        self.atoms / ATOMS_PER_UNIT
    }

    /// Fractional part, always in `[0, 1)`.
    pub fn fract(&self) -> Dec {
        Dec::from_atoms(self.atoms % ATOMS_PER_UNIT)
    }

    /// `(trunc, fract)` in one call; `trunc + fract == self` exactly.
    pub fn split(&self) -> (TokenAmount, Dec) {
        (self.trunc(), self.fract())
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:018}",
            self.atoms / ATOMS_PER_UNIT,
            self.atoms % ATOMS_PER_UNIT
        )
    }
}

impl FromStr for Dec {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || AmountError::Parse(s.to_string());
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(parse_err());
        }
        if frac_part.len() > DEC_PRECISION as usize || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(parse_err());
        }

        let units: u128 = int_part.parse().map_err(|_| parse_err())?;
        let mut frac_atoms: u128 = 0;
        if !frac_part.is_empty() {
            let scale = 10u128.pow(DEC_PRECISION - frac_part.len() as u32);
            frac_atoms = frac_part.parse::<u128>().map_err(|_| parse_err())? * scale;
        }

        Dec::try_from_int(units)?.checked_add(Dec::from_atoms(frac_atoms))
    }
}

impl From<Dec> for String {
    fn from(value: Dec) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Dec {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Sum a sequence of decimals, failing on overflow.
pub fn checked_sum<I>(values: I) -> Result<Dec, AmountError>
where
    I: IntoIterator<Item = Dec>,
{
    values
        .into_iter()
        .try_fold(Dec::ZERO, |acc, value| acc.checked_add(value))
}
