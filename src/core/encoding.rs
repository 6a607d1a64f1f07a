use crate::domain::settings::InputEncoding;
use crate::utils::error::{Ged2DotError, Result};

/// Reads the charset declared by the `1 CHAR` line of the header, if any.
pub fn declared_charset(bytes: &[u8]) -> Option<String> {
    bytes
        .split(|b| *b == b'\n')
        .take_while(|line| !line.starts_with(b"0 @"))
        .filter_map(|line| {
            let line = line.strip_prefix(b"\xef\xbb\xbf").unwrap_or(line);
            let text = std::str::from_utf8(line).ok()?.trim();
            text.strip_prefix("1 CHAR ").map(|value| value.trim().to_ascii_uppercase())
        })
        .next()
}

fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn decode_utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Ged2DotError::EncodingError {
        message: format!(
            "input is not valid UTF-8 (first invalid byte at offset {})",
            e.utf8_error().valid_up_to()
        ),
    })
}

/// 依設定或檔頭 CHAR 宣告把位元組解成文字
pub fn decode_input(bytes: Vec<u8>, encoding: InputEncoding) -> Result<String> {
    match encoding {
        InputEncoding::Utf8 => decode_utf8(bytes),
        InputEncoding::Latin1 => Ok(decode_latin1(&bytes)),
        InputEncoding::Auto => {
            if std::str::from_utf8(&bytes).is_ok() {
                return decode_utf8(bytes);
            }
            match declared_charset(&bytes).as_deref() {
                Some("UTF-8") | Some("UTF8") | Some("UNICODE") => decode_utf8(bytes),
                declared => {
                    tracing::debug!(
                        "Input is not UTF-8 (declared charset: {}), decoding as latin-1",
                        declared.unwrap_or("none")
                    );
                    Ok(decode_latin1(&bytes))
                }
            }
        }
    }
}
