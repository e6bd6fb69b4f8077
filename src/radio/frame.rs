use crate::radio::RadioError;

pub const RADIO_ADDRESS: u8 = 0xA2;
pub const CONTROLLER_ADDRESS: u8 = 0xE0;

pub const COMMAND_PREAMBLE: [u8; 4] = [0xFE, 0xFE, RADIO_ADDRESS, CONTROLLER_ADDRESS];
pub const RESPONSE_PREAMBLE: [u8; 4] = [0xFE, 0xFE, CONTROLLER_ADDRESS, RADIO_ADDRESS];
pub const TERMINATOR: u8 = 0xFD;
pub const REPLY_OK: u8 = 0xFB;
pub const REPLY_NG: u8 = 0xFA;

pub const MIN_RESPONSE_LEN: usize = 6;
pub const MAX_RESPONSE_LEN: usize = 1024;

/// Frequencies travel as ten BCD digits.
pub const FREQUENCY_BYTES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitOrder {
    /// Most significant digit pair first.
    Forward,
    /// Least significant digit pair first, as used for frequencies.
    Reverse,
}

/// `FE FE A2 E0 | cmd | [sub] | [subsub] | payload | FD`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    command: u8,
    sub: Option<u8>,
    subsub: Option<u8>,
    payload: Vec<u8>,
}

impl CommandFrame {
    pub fn new(command: u8) -> Self {
        Self {
            command,
            sub: None,
            subsub: None,
            payload: Vec::new(),
        }
    }

    pub fn sub(mut self, sub: u8) -> Self {
        self.sub = Some(sub);
        self
    }

    #[cfg(test)]
    pub fn subsub(mut self, subsub: u8) -> Self {
        self.subsub = Some(subsub);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + self.payload.len());
        bytes.extend_from_slice(&COMMAND_PREAMBLE);
        bytes.push(self.command);
        bytes.extend(self.sub);
        bytes.extend(self.subsub);
        bytes.extend_from_slice(&self.payload);
        bytes.push(TERMINATOR);
        bytes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command accepted, nothing to read back.
    Ok,
    /// Payload following the echoed command and sub-commands.
    Data(Vec<u8>),
}

/// Validates a complete reply to `sent` and extracts its payload.
pub fn parse_response(sent: &CommandFrame, bytes: &[u8]) -> Result<Reply, RadioError> {
    if bytes.len() < MIN_RESPONSE_LEN {
        return Err(RadioError::Framing(format!(
            "reply of {} bytes is too short",
            bytes.len()
        )));
    }
    if bytes[..4] != RESPONSE_PREAMBLE {
        return Err(RadioError::Framing(format!(
            "unexpected preamble {}",
            crate::serial::hex(&bytes[..4])
        )));
    }
    let end = bytes.len() - 1;
    if bytes[end] != TERMINATOR {
        return Err(RadioError::Framing("missing terminator".to_string()));
    }

    match bytes[4] {
        REPLY_NG => return Err(RadioError::Rejected { command: sent.command }),
        REPLY_OK => return Ok(Reply::Ok),
        echoed if echoed != sent.command => {
            return Err(RadioError::Framing(format!(
                "reply to command {:02X} while waiting for {:02X}",
                echoed, sent.command
            )))
        }
        _ => {}
    }

    let mut offset = 5;
    for expected in [sent.sub, sent.subsub].into_iter().flatten() {
        match bytes.get(offset) {
            Some(echoed) if offset < end && *echoed == expected => offset += 1,
            _ => {
                return Err(RadioError::Framing(format!(
                    "sub-command {:02X} not echoed",
                    expected
                )))
            }
        }
    }

    Ok(Reply::Data(bytes[offset..end].to_vec()))
}

/// Packs `value` into `byte_count` BCD bytes, high nibble first.
pub fn encode_bcd(value: u64, byte_count: usize, order: DigitOrder) -> Result<Vec<u8>, RadioError> {
    let mut remaining = value;
    let mut bytes = Vec::with_capacity(byte_count);
    for _ in 0..byte_count {
        let pair = (remaining % 100) as u8;
        bytes.push((pair / 10) << 4 | pair % 10);
        remaining /= 100;
    }
    if remaining != 0 {
        return Err(RadioError::Value(value as f64));
    }
    if order == DigitOrder::Forward {
        bytes.reverse();
    }
    Ok(bytes)
}

pub fn decode_bcd(bytes: &[u8], order: DigitOrder) -> Result<u64, RadioError> {
    let digit_pairs: Vec<u8> = match order {
        DigitOrder::Forward => bytes.to_vec(),
        DigitOrder::Reverse => bytes.iter().rev().copied().collect(),
    };

    let mut value: u64 = 0;
    for byte in digit_pairs {
        let (high, low) = (byte >> 4, byte & 0x0F);
        if high > 9 || low > 9 {
            return Err(RadioError::Framing(format!("invalid BCD byte {:02X}", byte)));
        }
        value = value * 100 + high as u64 * 10 + low as u64;
    }
    Ok(value)
}

pub fn encode_frequency(hz: f64) -> Result<Vec<u8>, RadioError> {
    if !hz.is_finite() || hz < 0.0 {
        return Err(RadioError::Value(hz));
    }
    encode_bcd(hz.round() as u64, FREQUENCY_BYTES, DigitOrder::Reverse).map_err(|_| RadioError::Value(hz))
}

pub fn decode_frequency(bytes: &[u8]) -> Result<f64, RadioError> {
    if bytes.len() != FREQUENCY_BYTES {
        return Err(RadioError::Framing(format!(
            "frequency payload of {} bytes",
            bytes.len()
        )));
    }
    Ok(decode_bcd(bytes, DigitOrder::Reverse)? as f64)
}

#[cfg(test)]
pub(crate) fn response(body: &[u8]) -> Vec<u8> {
    let mut bytes = RESPONSE_PREAMBLE.to_vec();
    bytes.extend_from_slice(body);
    bytes.push(TERMINATOR);
    bytes
}
