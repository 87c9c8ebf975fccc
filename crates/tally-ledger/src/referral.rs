use rand::distributions::Alphanumeric;
use rand::Rng;

/// A random alphanumeric referral code of `len` characters.
pub fn generate_referral_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
