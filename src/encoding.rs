//! Radix-64 alphabets and the unpadded base64 variants used by crypt(3).
//!
//! Two bit orders are in play: the big-endian order of standard base64
//! (used by DES sums, bcrypt and Argon2) and the little-endian order
//! traditional to crypt(3) (used by the MD5, SHA and Sun MD5 sums),
//! where each 3-byte group is read as `b0 | b1 << 8 | b2 << 16` and
//! emitted six bits at a time from the least significant end.

use rand::rngs::OsRng;
use rand::Rng;

/// A 64-character alphabet with a constant-time decode map.
pub struct Alphabet {
    chars: &'static [u8; 64],
    decode: [u8; 256],
}

impl Alphabet {
    const fn new(chars: &'static [u8; 64]) -> Self {
        let mut decode = [0xFF; 256];
        let mut i = 0;
        while i < 64 {
            decode[chars[i] as usize] = i as u8;
            i += 1;
        }
        Alphabet { chars, decode }
    }

    /// Returns the character for a six-bit index.
    #[inline]
    pub fn char(&self, index: u8) -> u8 {
        self.chars[(index & 0x3F) as usize]
    }

    /// Returns the six-bit index of a character, or 0xFF if the character
    /// is not in the alphabet.
    #[inline]
    pub fn index(&self, c: u8) -> u8 {
        self.decode[c as usize]
    }

    /// Returns the position of the first byte outside the alphabet,
    /// or `None` if every byte is valid.
    pub fn index_any_invalid(&self, b: &[u8]) -> Option<usize> {
        b.iter().position(|&c| self.decode[c as usize] == 0xFF)
    }

    /// Returns `n` cryptographically secure random characters.
    pub fn rand(&self, n: usize) -> Vec<u8> {
        let mut rng = OsRng;
        (0..n).map(|_| self.chars[rng.gen_range(0..64)]).collect()
    }

    /// Number of characters needed to encode `n` bytes without padding.
    #[must_use]
    pub const fn encoded_len(n: usize) -> usize {
        (n * 8 + 5) / 6
    }

    /// Number of bytes fully represented by `n` characters.
    #[must_use]
    pub const fn decoded_len(n: usize) -> usize {
        n * 6 / 8
    }

    /// Big-endian unpadded base64 encoding. `dst` must hold exactly
    /// `encoded_len(src.len())` bytes.
    pub fn encode_be(&self, src: &[u8], dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), Self::encoded_len(src.len()));
        let mut di = 0;
        let mut chunks = src.chunks_exact(3);
        for chunk in &mut chunks {
            let v = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
            dst[di] = self.char((v >> 18) as u8);
            dst[di + 1] = self.char((v >> 12) as u8);
            dst[di + 2] = self.char((v >> 6) as u8);
            dst[di + 3] = self.char(v as u8);
            di += 4;
        }
        match chunks.remainder() {
            [b0] => {
                dst[di] = self.char(b0 >> 2);
                dst[di + 1] = self.char(b0 << 4);
            }
            [b0, b1] => {
                let v = (*b0 as u32) << 8 | *b1 as u32;
                dst[di] = self.char((v >> 10) as u8);
                dst[di + 1] = self.char((v >> 4) as u8);
                dst[di + 2] = self.char((v << 2) as u8);
            }
            _ => {}
        }
    }

    /// Big-endian unpadded base64 decoding of previously validated text.
    /// Bytes outside the alphabet decode as zero bits.
    pub fn decode_be(&self, src: &[u8]) -> Vec<u8> {
        let mut dst = Vec::with_capacity(Self::decoded_len(src.len()));
        let mut chunks = src.chunks_exact(4);
        for chunk in &mut chunks {
            let v = (self.index(chunk[0]) as u32) << 18
                | (self.index(chunk[1]) as u32) << 12
                | (self.index(chunk[2]) as u32) << 6
                | self.index(chunk[3]) as u32;
            dst.extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8]);
        }
        match chunks.remainder() {
            [c0, c1] => dst.push(self.index(*c0) << 2 | self.index(*c1) >> 4),
            [c0, c1, c2] => {
                let v = (self.index(*c0) as u32) << 10
                    | (self.index(*c1) as u32) << 4
                    | (self.index(*c2) as u32) >> 2;
                dst.extend_from_slice(&[(v >> 8) as u8, v as u8]);
            }
            _ => {}
        }
        dst
    }

    /// Little-endian unpadded base64 encoding. `dst` must hold exactly
    /// `encoded_len(src.len())` bytes.
    pub fn encode_le(&self, src: &[u8], dst: &mut [u8]) {
        debug_assert_eq!(dst.len(), Self::encoded_len(src.len()));
        let mut di = 0;
        let mut chunks = src.chunks_exact(3);
        for chunk in &mut chunks {
            let mut v = chunk[0] as u32 | (chunk[1] as u32) << 8 | (chunk[2] as u32) << 16;
            for _ in 0..4 {
                dst[di] = self.char(v as u8);
                v >>= 6;
                di += 1;
            }
        }
        let rem = chunks.remainder();
        if !rem.is_empty() {
            let mut v = rem[0] as u32;
            if rem.len() == 2 {
                v |= (rem[1] as u32) << 8;
            }
            for _ in 0..rem.len() + 1 {
                dst[di] = self.char(v as u8);
                v >>= 6;
                di += 1;
            }
        }
    }
}

/// The crypt(3) hash alphabet `./0-9A-Za-z`.
pub static HASH64: Alphabet =
    Alphabet::new(b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz");

/// The standard base64 alphabet.
pub static BASE64: Alphabet =
    Alphabet::new(b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/");

/// The bcrypt base64 alphabet `./A-Za-z0-9`.
pub static BCRYPT64: Alphabet =
    Alphabet::new(b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789");

#[cfg(test)]
mod tests {
    use super::*;

    fn le(src: &[u8]) -> String {
        let mut dst = vec![0u8; Alphabet::encoded_len(src.len())];
        HASH64.encode_le(src, &mut dst);
        String::from_utf8(dst).unwrap()
    }

    #[test]
    fn little_endian_vectors() {
        assert_eq!(le(b""), "");
        assert_eq!(le(b"f"), "a/");
        assert_eq!(le(b"foobar"), "axqPW3aQ");
        assert_eq!(
            le(b"Twas brillig, and the slithy toves"),
            "IRLMn/WMmZ4PgZqNg.GMiF46oVKNUA5PdF5Ot/0RjNLNn/"
        );
    }

    #[test]
    fn big_endian_round_trip() {
        let data = b"any carnal pleasure.";
        let mut enc = vec![0u8; Alphabet::encoded_len(data.len())];
        BASE64.encode_be(data, &mut enc);
        assert_eq!(enc, b"YW55IGNhcm5hbCBwbGVhc3VyZS4");
        assert_eq!(BASE64.decode_be(&enc), data);
    }

    #[test]
    fn bcrypt_salt_decodes_to_sixteen_bytes() {
        let salt = b"UVjcf7m8L91VOpIRwEprgu";
        assert_eq!(BCRYPT64.decode_be(salt).len(), 16);
    }

    #[test]
    fn invalid_index() {
        assert_eq!(HASH64.index_any_invalid(b"azAZ09./"), None);
        assert_eq!(HASH64.index_any_invalid(b"az@Z"), Some(2));
        assert_eq!(BASE64.index_any_invalid(b"ab+/="), Some(4));
    }

    #[test]
    fn rand_uses_alphabet() {
        let b = HASH64.rand(32);
        assert_eq!(b.len(), 32);
        assert_eq!(HASH64.index_any_invalid(&b), None);
    }
}
