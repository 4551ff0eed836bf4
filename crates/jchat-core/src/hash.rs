//! Hostname masking: a stable-within-process, non-cryptographic hash used
//! to replace a raw remote address with an opaque token once a user
//! identifies (§4.6, §9). Quality is irrelevant to correctness; the only
//! requirement is that the same input bytes always produce the same
//! output within a run.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hashes `raw_hostname` into a lowercase hex token suitable for display in
/// place of the original address.
pub fn hash_hostname(raw_hostname: &str) -> String {
    format!("{:016x}", fnv1a(raw_hostname.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_hashes_the_same_way() {
        assert_eq!(hash_hostname("127.0.0.1:4000"), hash_hostname("127.0.0.1:4000"));
    }

    #[test]
    fn different_inputs_usually_differ() {
        assert_ne!(hash_hostname("127.0.0.1:4000"), hash_hostname("127.0.0.1:4001"));
    }

    #[test]
    fn output_is_lowercase_hex_of_fixed_width() {
        let token = hash_hostname("example");
        assert_eq!(token.len(), 16);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
