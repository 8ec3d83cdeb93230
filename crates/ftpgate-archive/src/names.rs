use encoding_rs::GB18030;

/// Decodes a raw entry name. UTF-8 is kept, then GB18030 is tried. Names that are neither fall
/// back to `fallback`, the CP437 reading the zip reader already produced.
pub(crate) fn decode_name(raw: &[u8], fallback: &str) -> String {
    if let Ok(name) = std::str::from_utf8(raw) {
        return name.to_string();
    }
    match GB18030.decode_without_bom_handling_and_without_replacement(raw) {
        Some(name) => name.into_owned(),
        None => fallback.to_string(),
    }
}
