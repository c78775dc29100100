//! ISBN cleanup and checksum validation for callers.
//!
//! The resolver does not require a valid checksum: regional catalogs carry
//! misprinted ISBNs that storefront search still finds.

use thiserror::Error;

/// ISBN validation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IsbnError {
    #[error("Empty ISBN")]
    Empty,

    #[error("Invalid character in ISBN: {0}")]
    InvalidCharacter(char),

    #[error("ISBN must have 10 or 13 digits, got {0}")]
    InvalidLength(usize),

    #[error("ISBN checksum mismatch")]
    Checksum,
}

/// Strip hyphens and whitespace; upper-case a trailing check digit `x`
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| if c == 'x' { 'X' } else { c })
        .collect()
}

/// Clean and fully validate an ISBN-10 or ISBN-13
pub fn parse(raw: &str) -> Result<String, IsbnError> {
    let isbn = clean(raw);
    if isbn.is_empty() {
        return Err(IsbnError::Empty);
    }

    for (i, c) in isbn.chars().enumerate() {
        let check_x = c == 'X' && i == 9 && isbn.len() == 10;
        if !c.is_ascii_digit() && !check_x {
            return Err(IsbnError::InvalidCharacter(c));
        }
    }

    let ok = match isbn.len() {
        10 => isbn10_checksum_ok(&isbn),
        13 => isbn13_checksum_ok(&isbn),
        n => return Err(IsbnError::InvalidLength(n)),
    };

    if ok {
        Ok(isbn)
    } else {
        Err(IsbnError::Checksum)
    }
}

/// Whether an already cleaned ISBN passes its checksum
pub fn is_valid(isbn: &str) -> bool {
    parse(isbn).is_ok()
}

/// Convert a valid ISBN-10 to ISBN-13; a valid ISBN-13 is returned as is
pub fn to_isbn13(raw: &str) -> Result<String, IsbnError> {
    let isbn = parse(raw)?;
    if isbn.len() == 13 {
        return Ok(isbn);
    }
    let body = format!("978{}", &isbn[..9]);
    let check = isbn13_check_digit(&body);
    Ok(format!("{}{}", body, check))
}

fn isbn10_checksum_ok(isbn: &str) -> bool {
    let sum: u32 = isbn
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let value = if c == 'X' { 10 } else { c.to_digit(10).unwrap_or(0) };
            value * (10 - i as u32)
        })
        .sum();
    sum % 11 == 0
}

fn isbn13_check_digit(first12: &str) -> u32 {
    let sum: u32 = first12
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

fn isbn13_checksum_ok(isbn: &str) -> bool {
    let check = isbn[12..].chars().next().and_then(|c| c.to_digit(10));
    check == Some(isbn13_check_digit(&isbn[..12]))
}
