use sha2::{Digest, Sha256};
use uuid::Uuid;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Largest multiple of 62 that fits in a byte; bytes at or above it are skipped
/// so every character is equally likely.
const UNBIASED_LIMIT: u8 = 248;

/// Share id for an ownership row, drawn from `[0-9A-Za-z]`.
///
/// The id is a pure function of its inputs, so a file that goes private and
/// public again is handed back the link it had before. `attempt` selects the
/// next candidate when an earlier one is already taken by another file.
pub fn derive(ownership_id: Uuid, attempt: u32, len: usize) -> String {
    let mut id = String::with_capacity(len);
    let mut block: u32 = 0;

    while id.len() < len {
        let digest = Sha256::new()
            .chain_update(ownership_id.as_bytes())
            .chain_update(attempt.to_be_bytes())
            .chain_update(block.to_be_bytes())
            .finalize();

        for byte in digest.iter().filter(|b| **b < UNBIASED_LIMIT) {
            if id.len() == len {
                break;
            }
            id.push(ALPHABET[(byte % 62) as usize] as char);
        }
        block += 1;
    }
    id
}

/// Whether `id` could have been produced by [`derive`] with the given length.
pub fn is_well_formed(id: &str, len: usize) -> bool {
    id.len() == len && id.bytes().all(|b| b.is_ascii_alphanumeric())
}
