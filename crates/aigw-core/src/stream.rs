use std::time::Duration;

use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use aigw_protocol::chat::stream::ChatCompletionChunk;
use aigw_protocol::sse::{data_frame, done_frame};

/// Inter-token delay simulating incremental generation.
const INTER_TOKEN_DELAY: Duration = Duration::from_millis(50);

/// Emits an OpenAI-shaped chunk stream from an already-completed answer.
///
/// The sequence is fixed: one opening chunk announcing the assistant role,
/// one content chunk per whitespace-delimited token (trailing space on every
/// token but the last), one closing chunk with `finish_reason: "stop"`, then
/// the `[DONE]` terminator. Ledger accounting happens before emission starts;
/// the emulator itself never touches the provider or the ledger.
#[derive(Debug, Clone)]
pub struct StreamEmulator {
    delay: Duration,
}

impl Default for StreamEmulator {
    fn default() -> Self {
        Self {
            delay: INTER_TOKEN_DELAY,
        }
    }
}

impl StreamEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-delay variant for tests.
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }

    /// The full chunk sequence as a pure function of (id, model, text).
    pub fn chunks(generation_id: &str, model: &str, text: &str) -> Vec<ChatCompletionChunk> {
        let created = OffsetDateTime::now_utc().unix_timestamp();
        let tokens: Vec<&str> = text.split_whitespace().collect();

        let mut chunks = Vec::with_capacity(tokens.len() + 2);
        chunks.push(ChatCompletionChunk::open(generation_id, created, model));
        for (index, token) in tokens.iter().enumerate() {
            let fragment = if index + 1 == tokens.len() {
                (*token).to_string()
            } else {
                format!("{token} ")
            };
            chunks.push(ChatCompletionChunk::content(
                generation_id,
                created,
                model,
                fragment,
            ));
        }
        chunks.push(ChatCompletionChunk::close(generation_id, created, model));
        chunks
    }

    /// Drives the sequence into `tx`. The channel closing (caller
    /// disconnected) stops emission before the next frame; nothing is emitted
    /// past the point of cancellation and nothing is re-logged.
    pub async fn emit(
        &self,
        generation_id: &str,
        model: &str,
        text: &str,
        tx: mpsc::Sender<Bytes>,
    ) -> Result<(), serde_json::Error> {
        let chunks = Self::chunks(generation_id, model, text);
        let content_events = chunks.len() - 2;

        for (index, chunk) in chunks.iter().enumerate() {
            if tx.is_closed() {
                return Ok(());
            }
            let frame = data_frame(chunk)?;
            if tx.send(frame).await.is_err() {
                return Ok(());
            }
            // Delay after each content chunk only.
            let is_content = index >= 1 && index <= content_events;
            if is_content && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        if tx.is_closed() {
            return Ok(());
        }
        let _ = tx.send(done_frame()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aigw_protocol::sse::decode_data_frames;

    fn collect_frames(text: &str) -> Vec<String> {
        let emulator = StreamEmulator::immediate();
        let (tx, mut rx) = mpsc::channel::<Bytes>(64);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        runtime.block_on(async {
            emulator
                .emit("gen_0123", "anthropic/claude-3-sonnet", text, tx)
                .await
                .unwrap();
        });

        let mut raw = String::new();
        while let Ok(frame) = rx.try_recv() {
            raw.push_str(std::str::from_utf8(&frame).unwrap());
        }
        decode_data_frames(&raw)
    }

    #[test]
    fn emits_open_content_close_done_in_order() {
        let events = collect_frames("the quick brown fox");
        // 1 open + 4 content + 1 close + [DONE]
        assert_eq!(events.len(), 7);

        let open: ChatCompletionChunk = serde_json::from_str(&events[0]).unwrap();
        assert!(open.choices[0].delta.content.is_none());
        assert_eq!(
            open.choices[0].delta.role,
            Some(aigw_protocol::chat::types::ChatMessageRole::Assistant)
        );
        assert_eq!(open.choices[0].finish_reason, None);

        let close: ChatCompletionChunk = serde_json::from_str(&events[5]).unwrap();
        assert_eq!(close.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(close.choices[0].delta, Default::default());

        assert_eq!(events[6], "[DONE]");
    }

    #[test]
    fn concatenated_fragments_reproduce_the_answer_exactly() {
        let text = "the quick brown fox";
        let events = collect_frames(text);
        let mut reassembled = String::new();
        for data in &events[1..events.len() - 2] {
            let chunk: ChatCompletionChunk = serde_json::from_str(data).unwrap();
            reassembled.push_str(chunk.choices[0].delta.content.as_deref().unwrap());
        }
        assert_eq!(reassembled, text);
    }

    #[test]
    fn empty_answer_still_frames_the_stream() {
        let events = collect_frames("");
        // open + close + [DONE], no content events
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], "[DONE]");
    }

    #[test]
    fn chunk_sequence_is_stable_for_equal_inputs() {
        let a = StreamEmulator::chunks("gen_1", "m", "one two");
        let b = StreamEmulator::chunks("gen_1", "m", "one two");
        assert_eq!(a.len(), b.len());
        for (left, right) in a.iter().zip(&b) {
            assert_eq!(left.choices[0].delta.content, right.choices[0].delta.content);
        }
    }

    #[tokio::test]
    async fn closed_channel_stops_emission_early() {
        let emulator = StreamEmulator::immediate();
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        drop(rx);
        // Must return cleanly without emitting or erroring.
        emulator
            .emit("gen_1", "m", "one two three", tx)
            .await
            .unwrap();
    }
}
