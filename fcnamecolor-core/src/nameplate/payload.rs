const START_BYTE: u8 = 0x02;
const END_BYTE: u8 = 0x03;

const FOREGROUND_CHUNK: u8 = 0x48;
const GLOW_CHUNK: u8 = 0x49;

/// A single run inside a game string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    /// Sets the text color to a row of the UI color sheet. 0 resets it.
    UiForeground(u16),
    /// Sets the glow color to a row of the UI color sheet. 0 resets it.
    UiGlow(u16),
}

impl Payload {
    pub const FOREGROUND_OFF: Payload = Payload::UiForeground(0);
    pub const GLOW_OFF: Payload = Payload::UiGlow(0);

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Payload::Text(text) => out.extend_from_slice(text.as_bytes()),
            Payload::UiForeground(key) => encode_chunk(out, FOREGROUND_CHUNK, *key as u32),
            Payload::UiGlow(key) => encode_chunk(out, GLOW_CHUNK, *key as u32),
        }
    }
}

/// A game string made out of text and formatting payloads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeString {
    payloads: Vec<Payload>,
}

impl SeString {
    pub fn new(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// The visible text, without any formatting
    pub fn text_value(&self) -> String {
        self.payloads
            .iter()
            .filter_map(|p| match p {
                Payload::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.iter().all(|p| match p {
            Payload::Text(text) => text.is_empty(),
            _ => true,
        })
    }

    /// Wraps the string in a color and glow, followed by resets for both.
    ///
    /// Styling an already styled string replaces the previous style instead of nesting it,
    /// and an empty string is left as is.
    pub fn styled(&self, ui_color: u16, glow: u16) -> SeString {
        if self.is_empty() {
            return self.clone();
        }

        let inner = self.unstyled();
        let mut payloads = Vec::with_capacity(inner.len() + 4);

        payloads.push(Payload::UiForeground(ui_color));
        payloads.push(Payload::UiGlow(glow));
        payloads.extend_from_slice(inner);
        payloads.push(Payload::GLOW_OFF);
        payloads.push(Payload::FOREGROUND_OFF);

        SeString { payloads }
    }

    /// Returns the payloads inside a style wrapping produced by `styled`
    fn unstyled(&self) -> &[Payload] {
        match self.payloads.as_slice() {
            [Payload::UiForeground(_), Payload::UiGlow(_), inner @ .., Payload::UiGlow(0), Payload::UiForeground(0)] => {
                inner
            }
            all => all,
        }
    }

    /// Encodes the string into the game's byte representation
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        for payload in &self.payloads {
            payload.encode_into(&mut out);
        }

        out
    }
}

impl From<&str> for SeString {
    fn from(text: &str) -> Self {
        SeString::new(vec![Payload::Text(text.to_string())])
    }
}

impl From<String> for SeString {
    fn from(text: String) -> Self {
        SeString::new(vec![Payload::Text(text)])
    }
}

fn encode_chunk(out: &mut Vec<u8>, chunk_type: u8, value: u32) {
    let integer = encode_integer(value);

    out.push(START_BYTE);
    out.push(chunk_type);
    // The length covers the integer and the end byte
    out.push(integer.len() as u8 + 1);
    out.extend_from_slice(&integer);
    out.push(END_BYTE);
}

/// Packs an integer the way the game expects inside macro chunks.
///
/// Small values are stored as `value + 1`. Larger values get a marker byte whose low bits
/// flag which of the four bytes follow, most significant first.
fn encode_integer(value: u32) -> Vec<u8> {
    if value < 0xCF {
        return vec![value as u8 + 1];
    }

    let bytes = value.to_le_bytes();
    let mut marker = 0xF0u8;
    let mut out = vec![0];

    for i in (0..4).rev() {
        if bytes[i] != 0 {
            out.push(bytes[i]);
            marker |= 1 << i;
        }
    }

    out[0] = marker - 1;
    out
}
