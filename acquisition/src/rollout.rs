//! Deterministic rollout cohort membership: a pure function of the client
//! id and the release identifier, stable across processes and restarts.

const DELIMITER: char = '-';

/// 32-bit string hash over UTF-16 code units (`h = h * 31 + unit`,
/// wrapping). Kept bit-compatible with the historical implementation so
/// cohort membership is stable across server versions.
fn hash_code(input: &str) -> i32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash
}

/// Whether this client is inside the rollout cohort for the given release.
///
/// `None` or anything >= 100 means the release is unconditionally eligible.
/// `release_identifier` should be the rollout package's label, falling back
/// to its hash.
pub fn is_selected_for_rollout(
    client_unique_id: &str,
    rollout_percentage: Option<u32>,
    release_identifier: &str,
) -> bool {
    let percentage = match rollout_percentage {
        None => return true,
        Some(p) if p >= 100 => return true,
        Some(p) => p,
    };

    let identifier = format!("{client_unique_id}{DELIMITER}{release_identifier}");
    hash_code(&identifier).unsigned_abs() % 100 < percentage
}
