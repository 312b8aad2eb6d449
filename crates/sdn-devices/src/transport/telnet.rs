//! Telnet framing and RFC 2217 COM-PORT option negotiation for remote serial
//! servers.

const IAC: u8 = 0xff;
const WILL: u8 = 0xfb;
const WONT: u8 = 0xfc;
const DO: u8 = 0xfd;
const DONT: u8 = 0xfe;
const SB: u8 = 0xfa;
const SE: u8 = 0xf0;

const COM_PORT_OPTION: u8 = 44;
const SET_BAUDRATE: u8 = 1;
const SET_DATASIZE: u8 = 2;
const SET_PARITY: u8 = 3;
const SET_STOPSIZE: u8 = 4;
const PARITY_ODD: u8 = 2;

/// Line settings the bus runs at
pub const BAUD_RATE: u32 = 4800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Data,
    Iac,
    Option,
    Sub,
    SubIac,
}

/// Strips telnet commands and subnegotiations from an inbound byte stream.
/// State carries across reads, so a command split between reads is handled.
#[derive(Debug, Default)]
pub struct Decoder {
    state: State,
}

impl Decoder {
    /// Create a decoder in the data state
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the data bytes of `input` to `out`
    pub fn decode(&mut self, input: &[u8], out: &mut impl Extend<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (State::Data, IAC) => State::Iac,
                (State::Data, _) => {
                    out.extend(Some(byte));
                    State::Data
                }
                (State::Iac, IAC) => {
                    out.extend(Some(IAC));
                    State::Data
                }
                (State::Iac, WILL | WONT | DO | DONT) => State::Option,
                (State::Iac, SB) => State::Sub,
                (State::Iac, _) | (State::Option, _) => State::Data,
                (State::Sub, IAC) => State::SubIac,
                (State::Sub, _) => State::Sub,
                (State::SubIac, SE) => State::Data,
                (State::SubIac, _) => State::Sub,
            };
        }
    }
}

/// Double every IAC byte so frame data is not read as a command
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 4);
    for &byte in data {
        out.push(byte);
        if byte == IAC {
            out.push(IAC);
        }
    }
    out
}

fn subnegotiation(command: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![IAC, SB, COM_PORT_OPTION, command];
    out.extend(escape(value));
    out.extend([IAC, SE]);
    out
}

/// The option negotiation sent right after connecting: 4800 baud, 8 data
/// bits, odd parity, 1 stop bit
pub fn negotiation() -> Vec<u8> {
    let mut out = vec![IAC, WILL, COM_PORT_OPTION];
    out.extend(subnegotiation(SET_BAUDRATE, &BAUD_RATE.to_be_bytes()));
    out.extend(subnegotiation(SET_DATASIZE, &[8]));
    out.extend(subnegotiation(SET_PARITY, &[PARITY_ODD]));
    out.extend(subnegotiation(SET_STOPSIZE, &[1]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_are_stripped() {
        let mut decoder = Decoder::new();
        let mut out = Vec::new();
        decoder.decode(
            &[0x01, IAC, DO, COM_PORT_OPTION, 0x02, IAC, SB, COM_PORT_OPTION, 101, 0, 0, 0x12, 0xc0, IAC, SE, 0x03],
            &mut out,
        );
        assert_eq!(out, vec![0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut decoder = Decoder::new();
        let mut out = Vec::new();
        decoder.decode(&[0x10, IAC], &mut out);
        decoder.decode(&[IAC, 0x20], &mut out);
        assert_eq!(out, vec![0x10, 0xff, 0x20]);
        assert_eq!(escape(&out), vec![0x10, 0xff, 0xff, 0x20]);
    }

    #[test]
    fn test_negotiation() {
        let bytes = negotiation();
        assert_eq!(&bytes[..3], &[IAC, WILL, COM_PORT_OPTION]);
        assert_eq!(
            &bytes[3..13],
            &[IAC, SB, COM_PORT_OPTION, SET_BAUDRATE, 0x00, 0x00, 0x12, 0xc0, IAC, SE]
        );
        assert!(bytes.windows(6).any(|w| w == [IAC, SB, COM_PORT_OPTION, SET_PARITY, PARITY_ODD, IAC]));

        // A peer echoing our negotiation yields no data
        let mut out = Vec::new();
        Decoder::new().decode(&bytes, &mut out);
        assert!(out.is_empty());
    }
}
