// Content sniffing for uploaded files.
// Classifies a leading byte sample into a MIME type, following the WHATWG
// sniffing algorithm as implemented by standard HTTP libraries: markup,
// then a fixed table of binary signatures, then a text-or-binary decision.
// Formats outside that table are `application/octet-stream`.

use image::ImageFormat;
use mime::Mime;

/// Number of leading bytes considered when sniffing.
pub const SNIFF_LEN: usize = 512;

/// A byte signature. `mask` bytes are ANDed with the sample before comparing.
struct Signature {
    pattern: &'static [u8],
    mask: Option<&'static [u8]>,
    mime: &'static str,
}

// RIFF/FORM containers: ignore the chunk size.
const CHUNK_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF";
const EOT_MASK: &[u8] = &[
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0xFF, 0xFF,
];
const EOT_PATTERN: &[u8] = &[
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, b'L', b'P',
];

// Images the sniffing table knows. Other formats `image` detects (TIFF,
// QOI, AVIF, ...) are left to the generic binary fallback.
const SNIFFABLE_IMAGES: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Ico,
];

const SIGNATURES: &[Signature] = &[
    Signature { pattern: b"%PDF-", mask: None, mime: "application/pdf" },
    Signature { pattern: b"%!PS-Adobe-", mask: None, mime: "application/postscript" },
    Signature { pattern: b"\xFE\xFF", mask: None, mime: "text/plain; charset=utf-16be" },
    Signature { pattern: b"\xFF\xFE", mask: None, mime: "text/plain; charset=utf-16le" },
    Signature { pattern: b"\xEF\xBB\xBF", mask: None, mime: "text/plain; charset=utf-8" },
    // Cursor files share the icon type.
    Signature { pattern: b"\x00\x00\x02\x00", mask: None, mime: "image/x-icon" },
    Signature { pattern: b"FORM\x00\x00\x00\x00AIFF", mask: Some(CHUNK_MASK), mime: "audio/aiff" },
    Signature { pattern: b"ID3", mask: None, mime: "audio/mpeg" },
    Signature { pattern: b"OggS\x00", mask: None, mime: "application/ogg" },
    Signature { pattern: b"MThd\x00\x00\x00\x06", mask: None, mime: "audio/midi" },
    Signature { pattern: b"RIFF\x00\x00\x00\x00AVI ", mask: Some(CHUNK_MASK), mime: "video/avi" },
    Signature { pattern: b"RIFF\x00\x00\x00\x00WAVE", mask: Some(CHUNK_MASK), mime: "audio/wave" },
    Signature { pattern: b"\x1A\x45\xDF\xA3", mask: None, mime: "video/webm" },
    Signature { pattern: EOT_PATTERN, mask: Some(EOT_MASK), mime: "application/vnd.ms-fontobject" },
    Signature { pattern: b"\x00\x01\x00\x00", mask: None, mime: "font/ttf" },
    Signature { pattern: b"OTTO", mask: None, mime: "font/otf" },
    Signature { pattern: b"ttcf", mask: None, mime: "font/collection" },
    Signature { pattern: b"wOFF", mask: None, mime: "font/woff" },
    Signature { pattern: b"wOF2", mask: None, mime: "font/woff2" },
    Signature { pattern: b"\x1F\x8B\x08", mask: None, mime: "application/x-gzip" },
    Signature { pattern: b"PK\x03\x04", mask: None, mime: "application/zip" },
    Signature { pattern: b"Rar!\x1A\x07\x00", mask: None, mime: "application/x-rar-compressed" },
    Signature { pattern: b"Rar!\x1A\x07\x01\x00", mask: None, mime: "application/x-rar-compressed" },
    Signature { pattern: b"\x00asm", mask: None, mime: "application/wasm" },
];

// Matched case-insensitively and must be followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

impl Signature {
    fn matches(&self, sample: &[u8]) -> bool {
        if sample.len() < self.pattern.len() {
            return false;
        }
        match self.mask {
            None => sample.starts_with(self.pattern),
            Some(mask) => self
                .pattern
                .iter()
                .zip(mask)
                .zip(sample)
                .all(|((p, m), s)| s & m == *p),
        }
    }
}

/// Classifies `sample` (normally the first [`SNIFF_LEN`] bytes of a file).
/// Never fails: unknown binary content is `application/octet-stream`.
pub fn sniff(sample: &[u8]) -> Mime {
    let sample = &sample[..sample.len().min(SNIFF_LEN)];

    let markup = skip_leading_whitespace(sample);
    if HTML_TAGS.iter().any(|tag| is_html_tag(markup, tag)) {
        return mime::TEXT_HTML_UTF_8;
    }
    if markup.starts_with(b"<?xml") {
        return parse_static("text/xml; charset=utf-8");
    }

    if let Ok(format) = image::guess_format(sample) {
        if SNIFFABLE_IMAGES.contains(&format) {
            return parse_static(format.to_mime_type());
        }
    }

    if let Some(signature) = SIGNATURES.iter().find(|signature| signature.matches(sample)) {
        return parse_static(signature.mime);
    }

    if is_mp4(sample) {
        return parse_static("video/mp4");
    }

    if sample.iter().copied().any(is_binary_byte) {
        mime::APPLICATION_OCTET_STREAM
    } else {
        mime::TEXT_PLAIN_UTF_8
    }
}

// An ISO-BMFF `ftyp` box whose major or a compatible brand starts with "mp4".
// Other brands (HEIC, AVIF, QuickTime) are not MP4.
fn is_mp4(sample: &[u8]) -> bool {
    if sample.len() < 12 || &sample[4..8] != b"ftyp" {
        return false;
    }
    let box_size = u32::from_be_bytes([sample[0], sample[1], sample[2], sample[3]]) as usize;
    if sample.len() < box_size || box_size % 4 != 0 {
        return false;
    }

    // Offset 12 holds the minor version, not a brand.
    (8..box_size)
        .step_by(4)
        .filter(|&offset| offset != 12)
        .any(|offset| &sample[offset..offset + 3] == b"mp4")
}

fn parse_static(value: &'static str) -> Mime {
    value.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

fn skip_leading_whitespace(sample: &[u8]) -> &[u8] {
    let start = sample
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(sample.len());
    &sample[start..]
}

fn is_html_tag(sample: &[u8], tag: &[u8]) -> bool {
    if sample.len() <= tag.len() || !sample[..tag.len()].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(sample[tag.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0DIHDR";
    const JPEG_HEADER: &[u8] = b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00";

    fn essence(sample: &[u8]) -> String {
        sniff(sample).essence_str().to_string()
    }

    #[test]
    fn test_sniff_images() {
        assert_eq!(essence(PNG_HEADER), "image/png");
        assert_eq!(essence(JPEG_HEADER), "image/jpeg");
        assert_eq!(essence(b"GIF89a\x01\x00\x01\x00"), "image/gif");
        assert_eq!(essence(b"GIF87a\x01\x00\x01\x00"), "image/gif");
        assert_eq!(essence(b"RIFF\x24\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(essence(b"BM\x36\x00\x00\x00\x00\x00\x00\x00\x36\x00"), "image/bmp");
        assert_eq!(essence(b"\x00\x00\x01\x00\x01\x00\x10\x10"), "image/x-icon");
    }

    #[test]
    fn test_sniff_cursor_is_icon() {
        assert_eq!(essence(b"\x00\x00\x02\x00\x01\x00\x20\x20"), "image/x-icon");
    }

    #[test]
    fn test_sniff_tiff_is_octet_stream() {
        assert_eq!(
            sniff(b"II*\x00\x08\x00\x00\x00\x0E\x00"),
            mime::APPLICATION_OCTET_STREAM
        );
        assert_eq!(
            sniff(b"MM\x00*\x00\x00\x00\x08\x00\x0E"),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn test_sniff_qoi_is_octet_stream() {
        assert_eq!(
            sniff(b"qoif\x00\x00\x00\x10\x00\x00\x00\x10\x04\x00"),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn test_sniff_avif_is_octet_stream() {
        let avif = b"\x00\x00\x00\x1CftypavifX\x00\x00\x00avifmif1miaf\x00\x00\x00\x00";
        assert_eq!(sniff(avif), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_sniff_heic_is_octet_stream() {
        let heic = b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00mif1heic\x00\x00\x00\x00";
        assert_eq!(sniff(heic), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_sniff_mp4_requires_mp4_brand() {
        let major = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00isommp42";
        assert_eq!(essence(major), "video/mp4");

        let compatible = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isommp41";
        assert_eq!(essence(compatible), "video/mp4");

        // Truncated box
        let short = b"\x00\x00\x00\x40ftypmp42\x00\x00\x00\x00";
        assert_eq!(sniff(short), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_sniff_media_formats() {
        assert_eq!(essence(b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81"), "video/webm");
        assert_eq!(essence(b"MThd\x00\x00\x00\x06\x00\x01"), "audio/midi");
        assert_eq!(essence(b"FORM\x00\x00\x10\x00AIFFCOMM"), "audio/aiff");
        assert_eq!(essence(b"RIFF\x24\x00\x00\x00WAVEfmt "), "audio/wave");
        assert_eq!(essence(b"RIFF\x24\x00\x00\x00AVI LIST"), "video/avi");
        assert_eq!(essence(b"ID3\x04\x00\x00\x00"), "audio/mpeg");
    }

    #[test]
    fn test_sniff_font_formats() {
        assert_eq!(essence(b"\x00\x01\x00\x00\x00\x10\x01\x00"), "font/ttf");
        assert_eq!(essence(b"OTTO\x00\x0A\x00\x80"), "font/otf");
        assert_eq!(essence(b"ttcf\x00\x01\x00\x00"), "font/collection");
        assert_eq!(essence(b"wOFF\x00\x01\x00\x00"), "font/woff");

        let mut eot = vec![0x11u8; 34];
        eot.extend_from_slice(b"LP\x00\x00");
        assert_eq!(essence(&eot), "application/vnd.ms-fontobject");
    }

    #[test]
    fn test_sniff_archives() {
        assert_eq!(essence(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(essence(b"PK\x03\x04\x14\x00"), "application/zip");
        assert_eq!(essence(b"\x1F\x8B\x08\x00"), "application/x-gzip");
        assert_eq!(essence(b"Rar!\x1A\x07\x01\x00"), "application/x-rar-compressed");
        assert_eq!(essence(b"\x00asm\x01\x00\x00\x00"), "application/wasm");
        // Not in the sniffing table
        assert_eq!(
            sniff(b"7z\xBC\xAF\x27\x1C\x00\x04"),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn test_sniff_pe_executable_is_octet_stream() {
        let mut exe = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xFF\xFF".to_vec();
        exe.resize(256, 0);
        assert_eq!(sniff(&exe), mime::APPLICATION_OCTET_STREAM);
    }

    #[test]
    fn test_sniff_plain_text() {
        let mime = sniff(b"hello, this is just some text\n");
        assert_eq!(mime, mime::TEXT_PLAIN_UTF_8);
        assert_eq!(mime.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_sniff_empty_sample_is_text() {
        assert_eq!(sniff(b""), mime::TEXT_PLAIN_UTF_8);
    }

    #[test]
    fn test_sniff_html_and_xml() {
        assert_eq!(sniff(b"  \n<!doctype html><html>"), mime::TEXT_HTML_UTF_8);
        assert_eq!(sniff(b"<p>paragraph</p>"), mime::TEXT_HTML_UTF_8);
        assert_eq!(essence(b"<?xml version=\"1.0\"?>"), "text/xml");
        // No terminator after the tag name, so not treated as HTML.
        assert_eq!(sniff(b"<paragraph"), mime::TEXT_PLAIN_UTF_8);
    }

    #[test]
    fn test_sniff_byte_order_marks() {
        assert_eq!(
            sniff(b"\xFE\xFF\x00h\x00i").to_string(),
            "text/plain; charset=utf-16be"
        );
        assert_eq!(
            sniff(b"\xEF\xBB\xBFhello").to_string(),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_sniff_only_considers_leading_bytes() {
        let mut sample = vec![b'a'; SNIFF_LEN];
        sample.push(0x00);
        assert_eq!(sniff(&sample), mime::TEXT_PLAIN_UTF_8);
    }
}
