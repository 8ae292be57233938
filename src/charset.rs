//! Identifier character sets: Swift's punycode variant and operator letters.
//!
//! Swift punycode differs from RFC 3492 in two places: the delimiter is `_`
//! instead of `-`, and digit values 26-35 are written `A`-`J` instead of `0`-`9`.
//! We map between the two and let `unic-idna-punycode` do the actual coding.

use unic_idna_punycode as punycode;

pub fn encode_punycode_ident(ident: &str) -> Option<String> {
    let mut encoded = punycode::encode_str(ident)?.into_bytes();

    if let Some(index) = encoded.iter().rposition(|&c| c == b'-') {
        encoded[index] = b'_';
        remap_punycode_charset_09_to_AJ(&mut encoded[index..]);
    } else {
        // The ident consisted entirely of non-ascii characters.
        remap_punycode_charset_09_to_AJ(&mut encoded[..]);
    }

    String::from_utf8(encoded).ok()
}

pub fn decode_punycode_ident(ident_bytes: &[u8]) -> Option<String> {
    if ident_bytes.iter().any(|b| !b.is_ascii()) {
        return None;
    }

    let mut ident_bytes = ident_bytes.to_owned();

    if let Some(index) = ident_bytes.iter().rposition(|&c| c == b'_') {
        ident_bytes[index] = b'-';
        remap_punycode_charset_AJ_to_09(&mut ident_bytes[index..]);
    } else {
        remap_punycode_charset_AJ_to_09(&mut ident_bytes[..]);
    }

    let ident_str = String::from_utf8(ident_bytes).ok()?;
    punycode::decode_to_string(&ident_str)
}

#[allow(non_snake_case)]
fn remap_punycode_charset_09_to_AJ(digits: &mut [u8]) {
    for c in digits.iter_mut() {
        if let b'0'..=b'9' = *c {
            *c = *c - b'0' + b'A';
        }
    }
}

#[allow(non_snake_case)]
fn remap_punycode_charset_AJ_to_09(digits: &mut [u8]) {
    for c in digits.iter_mut() {
        if let b'A'..=b'J' = *c {
            *c = *c - b'A' + b'0';
        }
    }
}

// Indexed by `letter - b'a'`; a space marks a letter with no operator meaning.
const OPERATOR_CHARS: &[u8; 26] = b"& @/= >    <*!|+?%-~   ^ .";

/// Maps an encoded operator letter to the operator character it stands for.
/// Non-ASCII characters pass through unchanged.
pub fn decode_operator_char(c: char) -> Option<char> {
    if !c.is_ascii() {
        return Some(c);
    }

    if !c.is_ascii_lowercase() {
        return None;
    }

    match OPERATOR_CHARS[(c as u8 - b'a') as usize] {
        b' ' => None,
        op => Some(op as char),
    }
}

pub fn encode_operator_char(c: char) -> Option<char> {
    if !c.is_ascii() {
        return Some(c);
    }

    OPERATOR_CHARS
        .iter()
        .position(|&op| op != b' ' && op as char == c)
        .map(|index| (b'a' + index as u8) as char)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arabic_sample() {
        // RFC 3492 sample (A), with 6 and 4 written as G and E.
        assert_eq!(
            decode_punycode_ident(b"egbpdajGbuEbxfgehfvwxn").unwrap(),
            "ليهمابتكلموشعربي؟"
        );
        assert_eq!(
            encode_punycode_ident("ليهمابتكلموشعربي؟").unwrap(),
            "egbpdajGbuEbxfgehfvwxn"
        );
    }

    #[test]
    fn mixed_ident_roundtrip() {
        for ident in &["Schrödinger", "ρυστ", "铁锈", "a😊b", "_ρ_"] {
            let encoded = encode_punycode_ident(ident).unwrap();
            assert!(encoded.is_ascii());
            assert_eq!(&decode_punycode_ident(encoded.as_bytes()).unwrap(), ident);
        }
    }

    #[test]
    fn operator_letters() {
        let decoded: String = "qq".chars().map(|c| decode_operator_char(c).unwrap()).collect();
        assert_eq!(decoded, "??");
        assert_eq!(decode_operator_char('b'), None);
        assert_eq!(decode_operator_char('A'), None);
        assert_eq!(decode_operator_char('∀'), Some('∀'));

        for c in "&@/=><*!|+?%-~^.".chars() {
            let letter = encode_operator_char(c).unwrap();
            assert_eq!(decode_operator_char(letter), Some(c));
        }
        assert_eq!(encode_operator_char('a'), None);
    }
}
