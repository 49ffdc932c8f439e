//! Small helpers shared by the hashing schemes.

use rand::rngs::OsRng;
use rand::RngCore;

/// Returns the bytes of `b` rearranged according to `table`; entry `i` of
/// the output is `b[table[i]]`. The output length is the table length.
pub(crate) fn permute(b: &[u8], table: &[u8]) -> Vec<u8> {
    table.iter().map(|&i| b[i as usize]).collect()
}

/// Returns `n` cryptographically secure random bytes.
pub(crate) fn rand_bytes(n: usize) -> Vec<u8> {
    let mut b = vec![0u8; n];
    OsRng.fill_bytes(&mut b);
    b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permute_reorders() {
        assert_eq!(permute(b"abcd", &[3, 1, 0, 0, 2]), b"dbaac");
    }
}
