//! Russian tax identifier (INN) check-digit validation (spec §6.5).

const WEIGHTS_10: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_11: [u32; 10] = [7, 2, 4, 10, 3, 5, 9, 4, 6, 8];
const WEIGHTS_12: [u32; 11] = [3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8];

fn digits(inn: &str) -> Option<Vec<u32>> {
    if !inn.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(inn.bytes().map(|b| (b - b'0') as u32).collect())
}

fn check_digit(body: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = body
        .iter()
        .zip(weights.iter())
        .map(|(d, w)| d * w)
        .sum();
    (sum % 11) % 10
}

/// Validates a 10- or 12-digit INN per spec §6.5. Any other length, or any
/// non-digit byte, is invalid.
pub fn is_valid_inn(inn: &str) -> bool {
    let Some(d) = digits(inn) else {
        return false;
    };
    match d.len() {
        10 => check_digit(&d[0..9], &WEIGHTS_10) == d[9],
        12 => {
            check_digit(&d[0..10], &WEIGHTS_11) == d[10]
                && check_digit(&d[0..11], &WEIGHTS_12) == d[11]
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_valid_10_digit() {
        assert!(is_valid_inn("7736050003"));
    }

    #[test]
    fn known_invalid_check_digit() {
        assert!(!is_valid_inn("7736050004"));
    }

    #[test]
    fn wrong_length_is_invalid() {
        assert!(!is_valid_inn("123"));
        assert!(!is_valid_inn("12345678901"));
    }

    #[test]
    fn non_digit_is_invalid() {
        assert!(!is_valid_inn("77360500a3"));
    }

    #[test]
    fn every_single_digit_perturbation_of_valid_example_flips_validity() {
        let base = "7736050003";
        assert!(is_valid_inn(base));
        let d = digits(base).unwrap();
        for pos in 0..9 {
            for delta in 1..10u32 {
                let mut perturbed = d.clone();
                perturbed[pos] = (perturbed[pos] + delta) % 10;
                let s: String = perturbed
                    .iter()
                    .map(|x| std::char::from_digit(*x, 10).unwrap())
                    .collect();
                assert!(
                    !is_valid_inn(&s),
                    "perturbing digit {pos} by {delta} should invalidate {base} -> {s}"
                );
            }
        }
    }
}
