use rand::Rng;
use rand::distr::Alphanumeric;

pub const COOKIE_LEN: usize = 20;

/// Random alphanumeric token that callers must echo in every request.
pub fn generate_cookie() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(COOKIE_LEN)
        .map(char::from)
        .collect()
}

/// Compare without short-circuiting on the first differing byte.
pub fn cookie_matches(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
