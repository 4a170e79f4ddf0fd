use bytes::Bytes;
use serde::Serialize;

/// Literal terminator frame closing every emulated stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Serializes one payload as a `data: <json>\n\n` frame.
pub fn data_frame<T: Serialize>(payload: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(payload)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME.as_bytes())
}

/// Payloads of the `data:` frames in a raw event-stream body, in order.
/// Emitted streams only ever carry data frames, so this is the whole decode
/// surface; comment lines and blank separators are skipped.
pub fn decode_data_frames(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|payload| payload.trim_start().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_has_terminating_blank_line() {
        let frame = data_frame(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(frame, Bytes::from_static(b"data: {\"ok\":true}\n\n"));
    }

    #[test]
    fn decode_recovers_payloads_in_order() {
        let mut raw = String::new();
        raw.push_str(std::str::from_utf8(&data_frame(&serde_json::json!({"n": 1})).unwrap()).unwrap());
        raw.push_str(DONE_FRAME);
        let payloads = decode_data_frames(&raw);
        assert_eq!(payloads, vec!["{\"n\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[test]
    fn decode_skips_comments_and_blank_lines() {
        let payloads = decode_data_frames(": keep-alive\n\ndata: {\"a\":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}".to_string()]);
    }
}
