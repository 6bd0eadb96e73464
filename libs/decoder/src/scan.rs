//! Поиск сигнатур в сыром буфере.
//!
//! Начало payload заранее неизвестно: перед ним может быть произвольный
//! префикс, поэтому ищем по всему буферу, а не только на нулевом смещении.

/// Смещение первого вхождения `needle` в `haystack`.
///
/// Пустой `needle` не совпадает ни с чем.
pub fn find_magic(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Смещение первого байта `byte` в `haystack`.
pub fn find_byte(haystack: &[u8], byte: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZSTD: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

    #[test]
    fn finds_magic_at_start() {
        assert_eq!(find_magic(&[0x28, 0xB5, 0x2F, 0xFD, 0x00], ZSTD), Some(0));
    }

    #[test]
    fn finds_first_occurrence() {
        let buf = [0x01, 0x28, 0xB5, 0x2F, 0xFD, 0x28, 0xB5, 0x2F, 0xFD];
        assert_eq!(find_magic(&buf, ZSTD), Some(1));
    }

    #[test]
    fn partial_magic_is_not_a_match() {
        let buf = [0x28, 0xB5, 0x2F, 0x00, 0x28, 0xB5];
        assert_eq!(find_magic(&buf, ZSTD), None);
    }

    #[test]
    fn magic_at_very_end() {
        let buf = [0xAA, 0xBB, 0x28, 0xB5, 0x2F, 0xFD];
        assert_eq!(find_magic(&buf, ZSTD), Some(2));
    }

    #[test]
    fn short_or_empty_inputs() {
        assert_eq!(find_magic(&[], ZSTD), None);
        assert_eq!(find_magic(&[0x28, 0xB5], ZSTD), None);
        assert_eq!(find_magic(&[0x28], &[]), None);
        assert_eq!(find_byte(&[], b'{'), None);
    }

    #[test]
    fn finds_first_brace() {
        assert_eq!(find_byte(b"\x00\x01{\"a\":{}}", b'{'), Some(2));
    }
}
