use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::codec::Hash256;
use crate::error::{PeerError, PeerResult};
use crate::wire_protocol::node::NodeServiceSet;

/// IPv4-in-IPv6 prefix prepended to every on-wire network address:
/// ten zero bytes followed by `0xFFFF`.
const IPV4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];

/// A read cursor over an immutable byte slice. Every `read_*` method
/// advances the cursor and fails with [`PeerError::Truncated`] if the
/// requested bytes aren't available. Decode never panics on short input.
pub struct ByteBufferParser<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> ByteBufferParser<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        ByteBufferParser { buffer, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.pos
    }

    fn eof_check(&self, want: usize) -> PeerResult<()> {
        if self.remaining() < want {
            Err(PeerError::Truncated(format!(
                "wanted {} bytes, only {} remaining",
                want,
                self.remaining()
            )))
        } else {
            Ok(())
        }
    }

    pub fn skip_bytes(&mut self, count: usize) -> PeerResult<()> {
        self.eof_check(count)?;
        self.pos += count;
        Ok(())
    }

    pub fn read(&mut self, size: usize) -> PeerResult<&'a [u8]> {
        self.eof_check(size)?;
        let range = self.pos..self.pos + size;
        self.pos += size;
        Ok(&self.buffer[range])
    }

    pub fn read_u8(&mut self) -> PeerResult<u8> {
        Ok(self.read(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> PeerResult<u16> {
        Ok(u16::from_le_bytes(self.read(2)?.try_into().unwrap()))
    }

    pub fn read_i16_le(&mut self) -> PeerResult<i16> {
        Ok(i16::from_le_bytes(self.read(2)?.try_into().unwrap()))
    }

    pub fn read_u16_be(&mut self) -> PeerResult<u16> {
        Ok(u16::from_be_bytes(self.read(2)?.try_into().unwrap()))
    }

    pub fn read_u32_le(&mut self) -> PeerResult<u32> {
        Ok(u32::from_le_bytes(self.read(4)?.try_into().unwrap()))
    }

    pub fn read_i32_le(&mut self) -> PeerResult<i32> {
        Ok(i32::from_le_bytes(self.read(4)?.try_into().unwrap()))
    }

    pub fn read_u64_le(&mut self) -> PeerResult<u64> {
        Ok(u64::from_le_bytes(self.read(8)?.try_into().unwrap()))
    }

    pub fn read_i64_le(&mut self) -> PeerResult<i64> {
        Ok(i64::from_le_bytes(self.read(8)?.try_into().unwrap()))
    }

    /// VarInt decode. Non-minimal encodings are accepted.
    pub fn read_var_int(&mut self) -> PeerResult<u64> {
        let discriminator = self.read_u8()?;
        match discriminator {
            0xFD => Ok(self.read_u16_le()? as u64),
            0xFE => Ok(self.read_u32_le()? as u64),
            0xFF => self.read_u64_le(),
            b => Ok(b as u64),
        }
    }

    /// VarStr decode: a VarInt length followed by that many raw bytes.
    pub fn read_var_str(&mut self) -> PeerResult<Vec<u8>> {
        let len = self.read_var_int()? as usize;
        Ok(self.read(len)?.to_vec())
    }

    /// FixedString(n) decode: read exactly `len` bytes, trim at the first NUL.
    pub fn read_fixed_string(&mut self, len: usize) -> PeerResult<Vec<u8>> {
        let data = self.read(len)?;
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Ok(data[..end].to_vec())
    }

    /// Hash256 decode: 32 raw wire bytes, already the little-endian
    /// representation of the 256-bit value.
    pub fn read_hash256(&mut self) -> PeerResult<Hash256> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(self.read(32)?);
        Ok(hash)
    }

    /// Network address without the leading timestamp (used inline in
    /// `version`'s `addr_recv`/`addr_from`).
    pub fn read_net_addr(&mut self) -> PeerResult<(NodeServiceSet, SocketAddr)> {
        let services = NodeServiceSet::from_bitmask(self.read_u64_le()?);
        let octets: [u8; 16] = self.read(16)?.try_into().unwrap();
        let ip = ipv6_octets_to_addr(octets);
        let port = self.read_u16_be()?;
        Ok((services, SocketAddr::new(ip, port)))
    }

    /// Timestamped network address, as used in `addr`'s address vector.
    pub fn read_timestamped_net_addr(&mut self) -> PeerResult<(u32, NodeServiceSet, SocketAddr)> {
        let timestamp = self.read_u32_le()?;
        let (services, addr) = self.read_net_addr()?;
        Ok((timestamp, services, addr))
    }

    /// Reads a VarInt-prefixed list, decoding each element with `decode_one`.
    /// Rejects element counts that would require more bytes than remain in
    /// the buffer, guarding against an absurd count driving an oversized
    /// allocation.
    pub fn read_list<T>(
        &mut self,
        min_element_size: usize,
        mut decode_one: impl FnMut(&mut Self) -> PeerResult<T>,
    ) -> PeerResult<Vec<T>> {
        let count = self.read_var_int()?;
        if min_element_size > 0 && count > (self.remaining() / min_element_size) as u64 {
            return Err(PeerError::Truncated(format!(
                "list of {} elements can't fit in {} remaining bytes",
                count,
                self.remaining()
            )));
        }
        let mut items = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            items.push(decode_one(self)?);
        }
        Ok(items)
    }
}

fn ipv6_octets_to_addr(octets: [u8; 16]) -> IpAddr {
    let v6 = Ipv6Addr::from(octets);
    match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    }
}

/// An append-only byte composer. Every `write_*` method appends to the
/// internal buffer; nothing here holds state across separate messages.
#[derive(Default)]
pub struct ByteBufferComposer {
    buffer: Vec<u8>,
}

impl ByteBufferComposer {
    pub fn new() -> Self {
        ByteBufferComposer::default()
    }

    pub fn result(self) -> Vec<u8> {
        self.buffer
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.append(&[v]);
    }

    pub fn write_u16_le(&mut self, v: u16) {
        self.append(&v.to_le_bytes());
    }

    pub fn write_i16_le(&mut self, v: i16) {
        self.append(&v.to_le_bytes());
    }

    pub fn write_u16_be(&mut self, v: u16) {
        self.append(&v.to_be_bytes());
    }

    pub fn write_u32_le(&mut self, v: u32) {
        self.append(&v.to_le_bytes());
    }

    pub fn write_i32_le(&mut self, v: i32) {
        self.append(&v.to_le_bytes());
    }

    pub fn write_u64_le(&mut self, v: u64) {
        self.append(&v.to_le_bytes());
    }

    pub fn write_i64_le(&mut self, v: i64) {
        self.append(&v.to_le_bytes());
    }

    /// VarInt encode: picks the smallest discriminator that fits.
    pub fn write_var_int(&mut self, value: u64) {
        if value < 0xFD {
            self.write_u8(value as u8);
        } else if value <= 0xFFFF {
            self.write_u8(0xFD);
            self.write_u16_le(value as u16);
        } else if value <= 0xFFFF_FFFF {
            self.write_u8(0xFE);
            self.write_u32_le(value as u32);
        } else {
            self.write_u8(0xFF);
            self.write_u64_le(value);
        }
    }

    pub fn write_var_str(&mut self, bytes: &[u8]) {
        self.write_var_int(bytes.len() as u64);
        self.append(bytes);
    }

    /// FixedString(n) encode: truncate to `len`, right-pad with `0x00`.
    /// Pads to the caller-supplied length rather than a hard-coded width.
    pub fn write_fixed_string(&mut self, bytes: &[u8], len: usize) {
        let truncated = &bytes[..bytes.len().min(len)];
        self.append(truncated);
        self.append(&vec![0u8; len - truncated.len()]);
    }

    pub fn write_hash256(&mut self, hash: &Hash256) {
        self.append(hash);
    }

    pub fn write_net_addr(&mut self, services: &NodeServiceSet, addr: &SocketAddr) {
        self.write_u64_le(services.as_bitmask());
        self.append(&addr_to_ipv6_octets(addr.ip()));
        self.write_u16_be(addr.port());
    }

    pub fn write_timestamped_net_addr(&mut self, timestamp: u32, services: &NodeServiceSet, addr: &SocketAddr) {
        self.write_u32_le(timestamp);
        self.write_net_addr(services, addr);
    }

    pub fn write_list<T>(&mut self, items: &[T], mut encode_one: impl FnMut(&mut Self, &T)) {
        self.write_var_int(items.len() as u64);
        for item in items {
            encode_one(self, item);
        }
    }
}

fn addr_to_ipv6_octets(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => {
            let mut octets = IPV4_MAPPED_PREFIX;
            octets[12..].copy_from_slice(&v4.octets());
            octets
        }
        IpAddr::V6(v6) => v6.octets(),
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0x00, vec![0x00])]
    #[case(0xFC, vec![0xFC])]
    #[case(0xFD, vec![0xFD, 0xFD, 0x00])]
    #[case(0x010000, vec![0xFE, 0x00, 0x00, 0x01, 0x00])]
    #[case(0x0100000000, vec![0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00])]
    fn var_int_encode_is_minimal(#[case] value: u64, #[case] expected: Vec<u8>) {
        let mut c = ByteBufferComposer::new();
        c.write_var_int(value);
        assert_eq!(c.result(), expected);
    }

    #[test]
    fn var_int_decode_accepts_non_minimal_encoding() {
        // 0x00 would normally encode as a single 0x00 byte, but a 3-byte
        // 0xFD-prefixed encoding must still decode correctly.
        let bytes = [0xFDu8, 0x00, 0x00];
        let mut p = ByteBufferParser::new(&bytes);
        assert_eq!(p.read_var_int().unwrap(), 0);
    }

    #[test]
    fn fixed_string_pads_to_configured_length() {
        let mut c = ByteBufferComposer::new();
        c.write_fixed_string(b"pong", 12);
        let bytes = c.result();
        assert_eq!(bytes.len(), 12);
        assert_eq!(&bytes[..4], b"pong");
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn fixed_string_round_trips_through_nul_trim() {
        let mut c = ByteBufferComposer::new();
        c.write_fixed_string(b"version", 12);
        let bytes = c.result();
        let mut p = ByteBufferParser::new(&bytes);
        assert_eq!(p.read_fixed_string(12).unwrap(), b"version");
    }

    #[test]
    fn truncated_read_fails_cleanly() {
        let bytes = [0x01, 0x02];
        let mut p = ByteBufferParser::new(&bytes);
        assert!(matches!(p.read_u32_le(), Err(PeerError::Truncated(_))));
    }

    #[test]
    fn ipv4_address_round_trips_with_mapped_prefix() {
        let services = NodeServiceSet::from_bitmask(1);
        let addr: SocketAddr = "10.0.0.1:8333".parse().unwrap();
        let mut c = ByteBufferComposer::new();
        c.write_net_addr(&services, &addr);
        let bytes = c.result();

        let expected_tail = [
            0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // services = 1
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, // mapped prefix
            0x0A, 0x00, 0x00, 0x01, // 10.0.0.1
            0x20, 0x8D, // port 8333 big-endian
        ];
        assert_eq!(bytes, expected_tail);

        let mut p = ByteBufferParser::new(&bytes);
        let (decoded_services, decoded_addr) = p.read_net_addr().unwrap();
        assert_eq!(decoded_services, services);
        assert_eq!(decoded_addr, addr);
    }
}
