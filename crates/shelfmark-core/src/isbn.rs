use crate::error::{Result, ShelfmarkError};

/// A checksum-verified ISBN, normalised to its 13-digit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Isbn {
    pub isbn13: String,
    pub isbn10: Option<String>,
}

fn strip_isbn(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

fn isbn13_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 } else { d as u32 * 3 })
        .sum()
}

fn to_digit_string(digits: &[u8]) -> String {
    digits.iter().map(|d| char::from(b'0' + d)).collect()
}

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ShelfmarkError::Validation(format!("Invalid ISBN: {input}"));
        let stripped = strip_isbn(input);

        match stripped.len() {
            13 => {
                let digits = stripped
                    .bytes()
                    .map(|b| b.is_ascii_digit().then(|| b - b'0'))
                    .collect::<Option<Vec<u8>>>()
                    .ok_or_else(invalid)?;
                if isbn13_sum(&digits) % 10 != 0 {
                    return Err(invalid());
                }
                // Only the 978 prefix has an ISBN-10 equivalent.
                let isbn10 = stripped.starts_with("978").then(|| {
                    let body = &digits[3..12];
                    let sum: u32 = body
                        .iter()
                        .enumerate()
                        .map(|(i, &d)| (10 - i as u32) * d as u32)
                        .sum();
                    let check = (11 - sum % 11) % 11;
                    let mut s = to_digit_string(body);
                    s.push(if check == 10 { 'X' } else { char::from(b'0' + check as u8) });
                    s
                });
                Ok(Self { isbn13: stripped, isbn10 })
            }
            10 => {
                let mut digits = Vec::with_capacity(10);
                for (i, c) in stripped.chars().enumerate() {
                    match c {
                        'X' if i == 9 => digits.push(10u8),
                        c if c.is_ascii_digit() => digits.push(c as u8 - b'0'),
                        _ => return Err(invalid()),
                    }
                }
                let sum: u32 = digits
                    .iter()
                    .enumerate()
                    .map(|(i, &d)| (10 - i as u32) * d as u32)
                    .sum();
                if sum % 11 != 0 {
                    return Err(invalid());
                }
                let mut d13 = vec![9u8, 7, 8];
                d13.extend_from_slice(&digits[..9]);
                let check = (10 - isbn13_sum(&d13) % 10) % 10;
                d13.push(check as u8);
                Ok(Self {
                    isbn13: to_digit_string(&d13),
                    isbn10: Some(stripped),
                })
            }
            _ => Err(invalid()),
        }
    }
}
