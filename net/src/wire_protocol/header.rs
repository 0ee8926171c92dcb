use sha2::digest::FixedOutput;
use sha2::{Digest, Sha256};

use crate::codec::buffer::{ByteBufferComposer, ByteBufferParser};
use crate::error::PeerResult;
use crate::wire_protocol::node::Chain;
use crate::wire_protocol::raw_message::Command;

/// Byte length of an on-wire header: magic(4) + command(12) + length(4) +
/// checksum(4). Computed from the codec widths used below rather than a
/// parallel format string, so the unsigned magic field can't drift out of
/// sync with a signed format specifier.
pub const HEADER_LEN: usize = 4 + 12 + 4 + 4;

/// The 24-byte header that precedes every message payload.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    pub chain: Chain,
    pub command: Command,
    pub length: u32,
    pub checksum: u32,
}

impl MessageHeader {
    pub fn for_payload(chain: Chain, command: Command, payload: &[u8]) -> Self {
        MessageHeader {
            chain,
            command,
            length: payload.len() as u32,
            checksum: calc_checksum(payload),
        }
    }

    pub fn encode(&self, c: &mut ByteBufferComposer) {
        c.write_u32_le(self.chain.magic_value());
        c.write_fixed_string(self.command.as_bytes(), 12);
        c.write_u32_le(self.length);
        c.write_u32_le(self.checksum);
    }

    /// Parses a header from exactly `HEADER_LEN` bytes. Unknown magics fail
    /// with [`crate::error::PeerError::UnknownMagic`]; unknown commands do
    /// not fail here, `command` resolves to [`Command::Raw`] and the
    /// caller (the framer / dispatcher) decides whether that's acceptable.
    pub fn decode(p: &mut ByteBufferParser) -> PeerResult<(Self, Chain)> {
        let magic = p.read_u32_le()?;
        let chain = Chain::try_from(magic)?;
        let command_bytes = p.read_fixed_string(12)?;
        let length = p.read_u32_le()?;
        let checksum = p.read_u32_le()?;
        Ok((
            MessageHeader {
                chain,
                command: Command::resolve(command_bytes),
                length,
                checksum,
            },
            chain,
        ))
    }
}

/// `calc_checksum(payload)` = low 4 bytes of double-SHA256(payload),
/// interpreted as little-endian u32.
pub fn calc_checksum(payload: &[u8]) -> u32 {
    let digest = sha256d(payload);
    u32::from_le_bytes(digest[..4].try_into().unwrap())
}

pub fn sha256d(input: &[u8]) -> [u8; 32] {
    sha256(&sha256(input))
}

fn sha256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::default();
    hasher.update(input);
    hasher.finalize_fixed().into()
}

#[cfg(test)]
mod test {
    use hex_literal::hex;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b"hello world" as &[u8], hex!("b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"))]
    fn sha256_matches_known_vector(#[case] input: &[u8], #[case] expected: [u8; 32]) {
        assert_eq!(sha256(input), expected);
    }

    #[test]
    fn empty_payload_checksum_is_fixed_value() {
        // double-SHA256("") truncated LE: 0xE2E0F65D
        assert_eq!(calc_checksum(&[]), 0xE2E0F65D);
    }

    #[test]
    fn verack_header_on_mainnet_matches_known_bytes() {
        let header = MessageHeader::for_payload(Chain::Bitcoin, Command::Verack, &[]);
        let mut c = ByteBufferComposer::new();
        header.encode(&mut c);
        let bytes = c.result();
        let expected: [u8; 24] = hex!("F9BEB4D9 76657261636B000000000000 00000000 5DF6E0E2");
        assert_eq!(bytes, expected);
    }

    #[test]
    fn command_is_nul_padded_to_twelve_bytes() {
        let header = MessageHeader::for_payload(Chain::Bitcoin, Command::Ping, &[]);
        let mut c = ByteBufferComposer::new();
        header.encode(&mut c);
        let bytes = c.result();
        // magic(4) + command(12) starts at offset 4
        assert_eq!(&bytes[4..8], b"ping");
        assert!(bytes[8..16].iter().all(|&b| b == 0));
    }
}
