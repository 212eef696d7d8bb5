//! Greedy longest-match tokenizer over an embedded vocabulary.
//!
//! Token counting for chunk sizing. The vocabulary ships in the tiktoken
//! line format (`<base64-token> <decimal-id>`); the bundled asset is a
//! trimmed vocabulary whose ids 0-255 are reserved for the 256 raw bytes,
//! and a full-size cl100k_base file can be dropped in as a replacement.
//!
//! This is not a true BPE implementation: encoding is a deterministic
//! greedy longest-prefix match, which tracks reference tiktoken counts
//! within a few percent. That is sufficient for sizing chunks against a
//! model context window; it is not suitable where exact token-for-token
//! parity with the reference tokenizer matters.
//!
//! Operations never fail: unmatched bytes encode to their raw byte value
//! (ids 0-255) and unknown ids are skipped on decode.

use std::collections::HashMap;
use std::sync::OnceLock;

const VOCAB_DATA: &str = include_str!("../assets/cl100k_trimmed.tiktoken");

/// Longest vocabulary entry considered during matching, in bytes.
const MAX_PIECE_BYTES: usize = 20;

struct Vocabulary {
    encoder: HashMap<Vec<u8>, u32>,
    decoder: HashMap<u32, Vec<u8>>,
    longest: usize,
}

static VOCAB: OnceLock<Vocabulary> = OnceLock::new();

fn vocabulary() -> &'static Vocabulary {
    VOCAB.get_or_init(parse_vocabulary)
}

fn parse_vocabulary() -> Vocabulary {
    let mut encoder = HashMap::new();
    let mut decoder = HashMap::new();
    let mut longest = 1usize;

    for line in VOCAB_DATA.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((b64, id)) = line.split_once(' ') else {
            continue;
        };
        let Ok(id) = id.trim().parse::<u32>() else {
            continue;
        };
        let bytes = base64_decode(b64);
        if bytes.is_empty() {
            continue;
        }
        longest = longest.max(bytes.len());
        decoder.insert(id, bytes.clone());
        encoder.insert(bytes, id);
    }

    Vocabulary {
        encoder,
        decoder,
        longest: longest.min(MAX_PIECE_BYTES),
    }
}

// Standard-alphabet base64; non-alphabet bytes are skipped, '=' terminates.
fn base64_decode(encoded: &str) -> Vec<u8> {
    const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut decoded = Vec::with_capacity(encoded.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits: i32 = -8;

    for &c in encoded.as_bytes() {
        if c == b'=' {
            break;
        }
        let Some(pos) = ALPHABET.iter().position(|&a| a == c) else {
            continue;
        };
        acc = (acc << 6) | pos as u32;
        bits += 6;
        if bits >= 0 {
            decoded.push(((acc >> bits) & 0xFF) as u8);
            bits -= 8;
        }
    }

    decoded
}

/// Token counter / encoder over the process-wide embedded vocabulary.
///
/// Instances are cheap to construct; the vocabulary is parsed once per
/// process on first use and shared read-only afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl Tokenizer {
    /// Create a tokenizer, forcing vocabulary initialization.
    pub fn new() -> Self {
        let _ = vocabulary();
        Tokenizer
    }

    /// Number of tokens `text` encodes to.
    pub fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// Encode text into token ids using greedy longest-match.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let vocab = vocabulary();
        let bytes = text.as_bytes();
        let mut tokens = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let max_len = vocab.longest.min(bytes.len() - pos);
            let mut matched = false;
            for len in (1..=max_len).rev() {
                if let Some(&id) = vocab.encoder.get(&bytes[pos..pos + len]) {
                    tokens.push(id);
                    pos += len;
                    matched = true;
                    break;
                }
            }
            if !matched {
                // Raw byte fallback: ids 0-255 stand for the byte values.
                tokens.push(bytes[pos] as u32);
                pos += 1;
            }
        }

        tokens
    }

    /// Decode token ids back to text. Ids neither in the vocabulary nor in
    /// the 0-255 byte range are skipped.
    pub fn decode(&self, ids: &[u32]) -> String {
        let vocab = vocabulary();
        let mut bytes = Vec::new();

        for &id in ids {
            if let Some(token) = vocab.decoder.get(&id) {
                bytes.extend_from_slice(token);
            } else if id < 256 {
                bytes.push(id as u8);
            }
        }

        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }

    /// Fast token estimate without encoding (~4 bytes per token).
    pub fn estimate(text: &str) -> usize {
        (text.len() + 3) / 4
    }

    /// Number of entries in the embedded vocabulary.
    pub fn vocabulary_size(&self) -> usize {
        vocabulary().encoder.len()
    }
}
