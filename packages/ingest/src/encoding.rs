//! Repair of mis-decoded Persian/Arabic attribute text.
//!
//! Attribute tables exported from legacy GIS tools often carry Persian
//! names whose bytes were decoded with the wrong code page, yielding Latin
//! mojibake such as `ØªÙ‡Ø±Ø§Ù†` for `تهران`. [`repair_text`] recovers the
//! bytes by re-encoding as Windows-1252 and tries two interpretations:
//!
//! 1. UTF-8 (a UTF-8 file read as Windows-1252), then
//! 2. Windows-1256 (an Arabic code page file read as Windows-1252).
//!
//! A candidate is accepted only if Arabic script makes up most of its
//! letters, so Latin text with the odd accented letter is left alone.

use encoding_rs::{WINDOWS_1252, WINDOWS_1256};

/// Outcome of [`repair_text`]. The input is never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRepair {
    /// The input is fine as is, or no repair produced Arabic script.
    Unchanged,
    /// The recovered text.
    Corrected(String),
}

impl TextRepair {
    /// Returns the corrected text, or `original` if nothing changed.
    #[must_use]
    pub fn into_text(self, original: &str) -> String {
        match self {
            Self::Unchanged => original.to_string(),
            Self::Corrected(text) => text,
        }
    }

    /// Whether a correction was made.
    #[must_use]
    pub const fn is_corrected(&self) -> bool {
        matches!(self, Self::Corrected(_))
    }
}

/// Whether `c` is in the Arabic, Arabic Supplement, or Arabic Presentation
/// Forms blocks.
#[must_use]
pub const fn is_arabic_script(c: char) -> bool {
    matches!(
        c,
        '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}'
    )
}

fn has_arabic_script(text: &str) -> bool {
    text.chars().any(is_arabic_script)
}

/// Whether more than half of the letters in `text` are Arabic script.
fn is_mostly_arabic_script(text: &str) -> bool {
    let (arabic, letters) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0_usize, 0_usize), |(arabic, letters), c| {
            (arabic + usize::from(is_arabic_script(c)), letters + 1)
        });
    arabic > 0 && arabic * 2 > letters
}

/// Attempts to undo code-page mojibake in `input`.
///
/// Pure and infallible: any input that can't be confidently repaired comes
/// back as [`TextRepair::Unchanged`]. Every correction is logged at debug
/// level.
#[must_use]
pub fn repair_text(input: &str) -> TextRepair {
    if input.is_ascii() || has_arabic_script(input) {
        return TextRepair::Unchanged;
    }

    let (bytes, _, unmappable) = WINDOWS_1252.encode(input);
    if unmappable {
        return TextRepair::Unchanged;
    }

    let candidate = match std::str::from_utf8(&bytes) {
        Ok(utf8) if is_mostly_arabic_script(utf8) => Some(utf8.to_string()),
        _ => {
            let (decoded, malformed) = WINDOWS_1256.decode_without_bom_handling(&bytes);
            (!malformed && is_mostly_arabic_script(&decoded)).then(|| decoded.into_owned())
        }
    };

    match candidate {
        Some(corrected) if corrected != input => {
            log::debug!("Repaired text encoding: {input:?} -> {corrected:?}");
            TextRepair::Corrected(corrected)
        }
        _ => TextRepair::Unchanged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_mojibake(text: &str) -> String {
        WINDOWS_1252.decode_without_bom_handling(text.as_bytes()).0.into_owned()
    }

    fn cp1256_mojibake(text: &str) -> String {
        let (bytes, _, unmappable) = WINDOWS_1256.encode(text);
        assert!(!unmappable);
        WINDOWS_1252.decode_without_bom_handling(&bytes).0.into_owned()
    }

    #[test]
    fn repairs_utf8_read_as_latin() {
        let garbled = utf8_mojibake("تهران");
        assert_ne!(garbled, "تهران");
        assert_eq!(repair_text(&garbled), TextRepair::Corrected("تهران".to_string()));
    }

    #[test]
    fn repairs_persian_letters_from_utf8() {
        let garbled = utf8_mojibake("گیلان");
        assert_eq!(repair_text(&garbled).into_text(&garbled), "گیلان");
    }

    #[test]
    fn repairs_arabic_code_page_read_as_latin() {
        for word in ["رشت", "قم", "تهران"] {
            let garbled = cp1256_mojibake(word);
            assert_eq!(
                repair_text(&garbled),
                TextRepair::Corrected(word.to_string()),
                "{garbled}"
            );
        }
    }

    #[test]
    fn leaves_clean_text_alone() {
        assert_eq!(repair_text("Tehran"), TextRepair::Unchanged);
        assert_eq!(repair_text("تهران"), TextRepair::Unchanged);
        assert_eq!(repair_text(""), TextRepair::Unchanged);
    }

    #[test]
    fn leaves_legitimate_accents_alone() {
        // Valid Latin-1 text that doesn't decode to Arabic script.
        assert_eq!(repair_text("Café Zürich"), TextRepair::Unchanged);
        assert!(!repair_text("Gödöllő").is_corrected());
    }

    #[test]
    fn stray_latin_letters_are_not_arabic() {
        // Ä and Ö are single Windows-1256 Arabic letters, but the rest of
        // each word is Latin.
        assert_eq!(repair_text("Äpfel"), TextRepair::Unchanged);
        assert_eq!(repair_text("Österreich"), TextRepair::Unchanged);
        assert_eq!(repair_text("Zürich Straße"), TextRepair::Unchanged);
    }

    #[test]
    fn mixed_script_names_still_repair() {
        let garbled = cp1256_mojibake("منطقه 2 تهران");
        assert_eq!(
            repair_text(&garbled),
            TextRepair::Corrected("منطقه 2 تهران".to_string())
        );
    }

    #[test]
    fn unmappable_input_is_unchanged() {
        // Cyrillic has no Windows-1252 representation.
        assert_eq!(repair_text("Москва"), TextRepair::Unchanged);
    }
}
