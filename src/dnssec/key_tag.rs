/// Key tag of a DNSKEY (RFC 4034 Appendix B)
///
/// The checksum runs over the full RDATA. Algorithm 1 keys instead use
/// the low 16 bits of the modulus.
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    if algorithm == 1 {
        return match public_key {
            [.., hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
    }

    let head = flags.to_be_bytes();
    let tail = [protocol, algorithm];
    let rdata = head.iter().chain(tail.iter()).chain(public_key.iter());

    let mut accumulator: u32 = 0;
    for (i, &byte) in rdata.enumerate() {
        accumulator += if i % 2 == 0 {
            u32::from(byte) << 8
        } else {
            u32::from(byte)
        };
    }

    accumulator += (accumulator >> 16) & 0xFFFF;
    (accumulator & 0xFFFF) as u16
}
