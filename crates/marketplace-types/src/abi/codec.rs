//! Head/tail ABI encoding of flat parameter lists.

use super::{ParamType, Token};
use crate::AbiError;

const WORD: usize = 32;

/// Encode `tokens` as the parameter block for `types` (no selector).
pub fn encode(types: &[ParamType], tokens: &[Token]) -> Result<Vec<u8>, AbiError> {
    if types.len() != tokens.len() {
        return Err(AbiError::ArityMismatch {
            function: "<encode>".into(),
            expected: types.len(),
            got: tokens.len(),
        });
    }

    let head_len = types.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, token) in types.iter().zip(tokens) {
        if !token.matches(*ty) {
            return Err(AbiError::TypeMismatch {
                expected: ty.canonical(),
                got: token.kind().into(),
            });
        }
        match token {
            Token::Uint(v) => {
                check_uint_width(*v, *ty)?;
                head.extend_from_slice(&uint_word(*v));
            }
            Token::Bool(b) => head.extend_from_slice(&uint_word(u128::from(*b))),
            Token::Address(a) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(a);
                head.extend_from_slice(&word);
            }
            Token::String(s) => {
                let offset = (head_len + tail.len()) as u128;
                head.extend_from_slice(&uint_word(offset));
                let bytes = s.as_bytes();
                tail.extend_from_slice(&uint_word(bytes.len() as u128));
                tail.extend_from_slice(bytes);
                let pad = (WORD - bytes.len() % WORD) % WORD;
                tail.resize(tail.len() + pad, 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

/// Decode a parameter block laid out for `types`.
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let word = read_word(data, i * WORD)?;
            match ty {
                ParamType::Uint(_) => word_to_u128(word).map(Token::Uint),
                ParamType::Bool => match word_to_u128(word)? {
                    0 => Ok(Token::Bool(false)),
                    1 => Ok(Token::Bool(true)),
                    other => Err(AbiError::TypeMismatch {
                        expected: "bool".into(),
                        got: format!("word value {other}"),
                    }),
                },
                ParamType::Address => {
                    let mut addr = [0u8; 20];
                    addr.copy_from_slice(&word[12..]);
                    Ok(Token::Address(addr))
                }
                ParamType::String => {
                    let offset = to_usize(word_to_u128(word)?)?;
                    let len = to_usize(word_to_u128(read_word(data, offset)?)?)?;
                    let start = offset + WORD;
                    let end = start.checked_add(len).ok_or_else(|| {
                        AbiError::Overflow(format!("string length {len}"))
                    })?;
                    let bytes = data.get(start..end).ok_or(AbiError::Truncated {
                        needed: end,
                        available: data.len(),
                    })?;
                    String::from_utf8(bytes.to_vec())
                        .map(Token::String)
                        .map_err(|_| AbiError::InvalidUtf8)
                }
            }
        })
        .collect()
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}

fn check_uint_width(v: u128, ty: ParamType) -> Result<(), AbiError> {
    if let ParamType::Uint(bits) = ty {
        if bits < 128 && v >> bits != 0 {
            return Err(AbiError::Overflow(format!("{v} does not fit uint{bits}")));
        }
    }
    Ok(())
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    let end = at.checked_add(WORD).ok_or_else(|| AbiError::Overflow(format!("offset {at}")))?;
    data.get(at..end).ok_or(AbiError::Truncated {
        needed: end,
        available: data.len(),
    })
}

fn word_to_u128(word: &[u8]) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow(format!(
            "0x{} exceeds 128 bits",
            hex::encode(word)
        )));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn to_usize(v: u128) -> Result<usize, AbiError> {
    usize::try_from(v).map_err(|_| AbiError::Overflow(format!("{v} exceeds usize")))
}
