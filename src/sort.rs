//! Numeric-aware, case-insensitive ordering for row keys.
//!
//! Top-level snapshots are kept sorted by key so that cache-served ranges and
//! server-served ranges agree on ordering. Keys like `ord9` / `ord10` must
//! order numerically, not lexicographically, and case differences are ignored.

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Digit runs up to 16 digits stay on the stack.
type DigitRun = SmallVec<[u8; 16]>;

/// Compare two keys, treating runs of ASCII digits as numbers and folding
/// letter case.
///
/// Embedded numbers compare by value regardless of leading zeros, so
/// `"ord007"` and `"ord7"` are equal under this ordering. Ties between
/// distinct keys are left to the (stable) caller.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    let mut ca = a.chars().peekable();
    let mut cb = b.chars().peekable();

    loop {
        match (ca.peek().copied(), cb.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let run_a = digit_run(&mut ca);
                let run_b = digit_run(&mut cb);
                let ord = compare_digit_runs(&run_a, &run_b);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ca.next();
                cb.next();
            }
        }
    }
}

/// Consume a maximal run of ASCII digits.
fn digit_run(chars: &mut Peekable<Chars<'_>>) -> DigitRun {
    let mut digits = DigitRun::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c as u8);
        chars.next();
    }
    digits
}

/// Compare digit runs by numeric value: strip leading zeros, then a longer
/// run is larger, then compare digit-wise.
fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_zeros(a);
    let b = strip_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_zeros(digits: &[u8]) -> &[u8] {
    let lead = digits.iter().take_while(|&&d| d == b'0').count();
    &digits[lead..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_order_lexicographically() {
        assert_eq!(compare_keys("alpha", "beta"), Ordering::Less);
        assert_eq!(compare_keys("beta", "alpha"), Ordering::Greater);
        assert_eq!(compare_keys("alpha", "alpha"), Ordering::Equal);
    }

    #[test]
    fn embedded_numbers_compare_by_value() {
        assert_eq!(compare_keys("ord9", "ord10"), Ordering::Less);
        assert_eq!(compare_keys("ord100", "ord20"), Ordering::Greater);
        assert_eq!(compare_keys("ord2a", "ord2b"), Ordering::Less);
    }

    #[test]
    fn leading_zeros_do_not_matter() {
        assert_eq!(compare_keys("ord007", "ord7"), Ordering::Equal);
        assert_eq!(compare_keys("ord007x", "ord7y"), Ordering::Less);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(compare_keys("ORD5", "ord5"), Ordering::Equal);
        assert_eq!(compare_keys("Ord5", "ord6"), Ordering::Less);
    }

    #[test]
    fn number_orders_before_longer_prefix() {
        assert_eq!(compare_keys("ord1", "ord1_3"), Ordering::Less);
        assert_eq!(compare_keys("ord10", "ord9_1"), Ordering::Greater);
    }
}
