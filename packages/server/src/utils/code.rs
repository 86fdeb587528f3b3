//! Room codes: short, uppercase, without look-alike characters.

use rand::Rng;

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

pub fn new_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Trims and uppercases a human-entered code. `None` if nothing is left.
pub fn normalize_code(input: &str) -> Option<String> {
    let code = input.trim().to_uppercase();
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_avoid_ambiguous_characters() {
        for _ in 0..500 {
            let code = new_room_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(!code.contains(&['0', '1', 'O', 'I'][..]), "{}", code);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" abc2de "), Some("ABC2DE".to_string()));
        assert_eq!(normalize_code("   "), None);
    }
}
