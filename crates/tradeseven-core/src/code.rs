//! Challenge code generation.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::battle::Battle;
use crate::status::derive_status;
use crate::BattleStatus;

/// Uppercase letters and digits without the lookalikes `0 O 1 I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;
pub const MAX_CODE_ATTEMPTS: usize = 100;

fn random_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a code not used by any battle that is currently waiting.
///
/// After [`MAX_CODE_ATTEMPTS`] collisions the last candidate gets the final
/// two digits of the millisecond clock appended.
pub fn generate_challenge_code<R: Rng + ?Sized>(
    rng: &mut R,
    battles: &[Battle],
    now: DateTime<Utc>,
) -> String {
    let taken = |code: &str| {
        battles.iter().any(|b| {
            b.challenge_code == code && derive_status(b, now) == BattleStatus::Waiting
        })
    };

    let mut code = String::new();
    for attempt in 0..MAX_CODE_ATTEMPTS {
        code = random_code(rng);
        if !taken(&code) {
            return code;
        }
        tracing::debug!(attempt, code = %code, "challenge code collision");
    }

    let suffix = now.timestamp_millis().rem_euclid(100);
    let code = format!("{}{:02}", code, suffix);
    tracing::warn!(code = %code, "using timestamped challenge code after max attempts");
    code
}

/// Normalise user input for lookup.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}
