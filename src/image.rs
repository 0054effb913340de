//! Data-URL plumbing for the opaque image payloads passed to and from Gemini.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const DATA_URL_PREFIXES: [(&str, &str); 4] = [
    ("data:image/png;base64,", "image/png"),
    ("data:image/jpeg;base64,", "image/jpeg"),
    ("data:image/jpg;base64,", "image/jpeg"),
    ("data:image/webp;base64,", "image/webp"),
];

/// Mime type assumed for uploads that carry no prefix and cannot be sniffed.
pub const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";
/// Mime type used for generated images when the service reports none.
pub const DEFAULT_GENERATED_MIME: &str = "image/png";

/// Splits a `data:image/...;base64,` URL into its mime type and payload.
/// Bare base64 comes back unchanged with no mime type.
pub fn split_data_url(image: &str) -> (Option<&'static str>, &str) {
    for (prefix, mime) in DATA_URL_PREFIXES {
        if let Some(rest) = image.strip_prefix(prefix) {
            return (Some(mime), rest);
        }
    }
    (None, image)
}

pub fn to_data_url(mime: &str, payload: &str) -> String {
    format!("data:{mime};base64,{payload}")
}

/// Returns the inline-data pair Gemini expects for an image.
pub fn inline_parts(image: &str) -> (&'static str, &str) {
    let (mime, payload) = split_data_url(image);
    (mime.unwrap_or_else(|| sniff_mime(payload)), payload)
}

/// Guesses the mime type from the first decoded bytes.
pub fn sniff_mime(payload: &str) -> &'static str {
    let Some(head) = decode_head(payload) else { return DEFAULT_UPLOAD_MIME };
    match ::image::guess_format(&head) {
        Ok(::image::ImageFormat::Png) => "image/png",
        Ok(::image::ImageFormat::WebP) => "image/webp",
        _ => DEFAULT_UPLOAD_MIME,
    }
}

pub fn is_base64_image(image: &str) -> bool {
    let (_, payload) = split_data_url(image);
    !payload.trim().is_empty() && decode_head(payload).is_some()
}

fn decode_head(payload: &str) -> Option<Vec<u8>> {
    // 64 chars is a whole number of base64 quanta and covers every magic number we check.
    let end = payload.len().min(64) / 4 * 4;
    if end == 0 {
        return None;
    }
    STANDARD.decode(payload.get(..end)?).ok()
}

/// Shortens base64 for log lines.
pub fn preview(data: &str) -> String {
    if data.chars().count() > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), data.len())
    } else {
        data.to_string()
    }
}
