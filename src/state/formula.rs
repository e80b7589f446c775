// src/state/formula.rs

//! Bonding-curve pricing.
//!
//! All powers are evaluated as `exp(ln(x) * p / q)` in 10^40 fixed point on
//! 512-bit integers. Amounts a caller receives are rounded down and amounts a
//! caller pays are rounded up, with a small safety margin on top of the
//! integer rounding so that approximation error can never favour the caller.
//! `None` means the result does not fit the working range.

use primitive_types::U512;

use crate::types::Amount;

const PRECISION: usize = 40;

// widest power of two we are willing to shift a result by
const MAX_EXP_SHIFT: u64 = 200;

fn one() -> U512 {
    U512::exp10(PRECISION)
}

// ln(2) * 10^40
fn ln2() -> U512 {
    U512::from(69_314_718_055_994_530_941u128) * U512::exp10(20) + U512::from(72_321_214_581_765_680_755u128)
}

/// Rounding margin: 1/100 of a unit plus 10^-30 of the value.
fn margin(x: U512) -> U512 {
    x / U512::exp10(30) + one() / U512::from(100u8)
}

fn to_amount(x: U512) -> Option<Amount> {
    if x.bits() > 128 {
        None
    } else {
        Some(x.low_u128())
    }
}

/// Scaled value the caller receives, rounded down.
fn received(scaled: U512) -> Option<Amount> {
    let m = margin(scaled);
    if scaled <= m {
        return Some(0);
    }
    to_amount((scaled - m) / one())
}

/// Scaled value the caller pays, rounded up.
fn paid(scaled: U512) -> Option<Amount> {
    let s = one();
    let x = scaled + margin(scaled);
    to_amount((x + s - U512::one()) / s)
}

/// `ln(num / den) * 10^40` for `num >= den > 0`.
fn ln_ratio(num: U512, den: U512) -> U512 {
    let s = one();
    let mut k = num.bits().saturating_sub(den.bits());
    if (den << k) > num {
        k -= 1;
    }
    // m = num / (den * 2^k), m in [1, 2)
    let m = num * s / (den << k);

    // ln(m) = 2 * atanh((m - 1) / (m + 1))
    let z = (m - s) * s / (m + s);
    let z2 = z * z / s;
    let mut term = z;
    let mut sum = U512::zero();
    let mut n = 1u64;
    while !term.is_zero() {
        sum += term / U512::from(n);
        term = term * z2 / s;
        n += 2;
    }
    ln2() * U512::from(k) + sum * U512::from(2u8)
}

/// `e^(t / 10^40) * 10^40` for `t >= 0`.
fn exp_fixed(t: U512) -> Option<U512> {
    let s = one();
    let l2 = ln2();
    let k = t / l2;
    if k > U512::from(MAX_EXP_SHIFT) {
        return None;
    }
    let r = t - k * l2;

    let mut sum = s;
    let mut term = s;
    let mut n = 1u64;
    loop {
        term = term * r / (s * U512::from(n));
        if term.is_zero() {
            break;
        }
        sum += term;
        n += 1;
    }
    Some(sum << (k.low_u64() as usize))
}

/// `(num / den)^(p / q) * 10^40` for `num >= den > 0`.
fn pow_ratio(num: U512, den: U512, p: u32, q: u32) -> Option<U512> {
    if num == den {
        return Some(one());
    }
    let t = ln_ratio(num, den) * U512::from(p) / U512::from(q);
    exp_fixed(t)
}

/// `(den / num)^(p / q) * 10^40` for `num >= den > 0`; underflows to zero.
fn pow_inverse_ratio(num: U512, den: U512, p: u32, q: u32) -> U512 {
    let s = one();
    match pow_ratio(num, den, p, q) {
        Some(v) if !v.is_zero() => s * s / v,
        _ => U512::zero(),
    }
}

fn valid_crr(crr: u32) -> bool {
    (1..=100).contains(&crr)
}

/// Coins minted for depositing `deposit` of base into the reserve.
///
/// `supply * ((1 + deposit / reserve)^(crr / 100) - 1)`
pub fn purchase_return(supply: Amount, reserve: Amount, crr: u32, deposit: Amount) -> Option<Amount> {
    if deposit == 0 || supply == 0 || reserve == 0 {
        return Some(0);
    }
    if !valid_crr(crr) {
        return None;
    }
    let (v, r, d) = (U512::from(supply), U512::from(reserve), U512::from(deposit));
    if crr == 100 {
        return to_amount(v * d / r);
    }
    let p = pow_ratio(r + d, r, crr, 100)?;
    received(v * (p - one()))
}

/// Base needed in the reserve to mint exactly `want` coins.
///
/// `reserve * ((1 + want / supply)^(100 / crr) - 1)`
pub fn purchase_amount(supply: Amount, reserve: Amount, crr: u32, want: Amount) -> Option<Amount> {
    if want == 0 {
        return Some(0);
    }
    if supply == 0 || reserve == 0 || !valid_crr(crr) {
        return None;
    }
    let (v, r, w) = (U512::from(supply), U512::from(reserve), U512::from(want));
    if crr == 100 {
        return to_amount((r * w + v - U512::one()) / v);
    }
    let p = pow_ratio(v + w, v, 100, crr)?;
    paid(r * (p - one()))
}

/// Base released from the reserve when `sell` coins are burned.
///
/// `reserve * (1 - (1 - sell / supply)^(100 / crr))`
pub fn sale_return(supply: Amount, reserve: Amount, crr: u32, sell: Amount) -> Option<Amount> {
    if sell == 0 {
        return Some(0);
    }
    if sell > supply || !valid_crr(crr) {
        return None;
    }
    if sell == supply {
        return Some(reserve);
    }
    let (v, r, x) = (U512::from(supply), U512::from(reserve), U512::from(sell));
    if crr == 100 {
        return to_amount(r * x / v);
    }
    let factor = pow_inverse_ratio(v, v - x, 100, crr);
    let out = received(r * (one() - factor))?;
    Some(out.min(reserve))
}

/// Coins that must be burned to release exactly `want` base from the reserve.
///
/// `supply * (1 - (1 - want / reserve)^(crr / 100))`
pub fn sale_amount(supply: Amount, reserve: Amount, crr: u32, want: Amount) -> Option<Amount> {
    if want == 0 {
        return Some(0);
    }
    if want > reserve || !valid_crr(crr) {
        return None;
    }
    if want == reserve {
        return Some(supply);
    }
    let (v, r, w) = (U512::from(supply), U512::from(reserve), U512::from(want));
    if crr == 100 {
        return to_amount((v * w + r - U512::one()) / r);
    }
    let factor = pow_inverse_ratio(r, r - w, crr, 100);
    let need = paid(v * (one() - factor))?;
    Some(need.min(supply))
}
