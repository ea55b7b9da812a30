//! Keyed byte-substitution stream cipher with chained feedback.
//!
//! This is the bespoke scrambler used on the gatelink wire. It is *not* a
//! vetted cryptographic primitive; it only keeps casual observers from reading
//! frames off the network. Both ends must run this exact algorithm, so the
//! scramble table, the factor chaining and the padding trailer are part of the
//! wire format and must not change.
//!
//! ## Algorithm
//!
//! For every input byte:
//!
//! ```text
//! pos_in   = position of byte in SCRAMBLE
//! adj      = position of next key byte in SCRAMBLE   (key index wraps)
//! factor1  = factor2 + adj
//! pos_out  = (pos_in ± factor1) mod 256              (+ encrypt, - decrypt)
//! emit SCRAMBLE[pos_out]
//! factor2  = factor1 + pos_out   (encrypt)
//! factor2  = factor1 + pos_in    (decrypt)
//! ```
//!
//! Decryption replays the factor evolution of encryption because the
//! decrypt-side `pos_in` is the encrypt-side `pos_out`.
//!
//! ## Padding
//!
//! With a pad size `P > 0`, encryption appends random filler so that
//! `(len + 4) % P == 0`, followed by a 4-byte big-endian filler count (both
//! scrambled). Decryption validates and strips the trailer. Malformed input
//! yields an empty buffer rather than an error.

use crate::CryptoError;
use rand::RngCore;
use zeroize::Zeroizing;

/// Size of the scramble table.
const TABLE_SIZE: i32 = 256;

/// Size of the padding trailer carrying the filler count.
pub const PAD_TRAILER_SIZE: usize = 4;

/// Largest accepted pad size (the trailer is a signed 32-bit count).
pub const MAX_PAD_SIZE: usize = i32::MAX as usize;

/// Permutation of all byte values shared by both ends of a link.
///
/// The table is the signed byte range `-128..=127` drained in order, which
/// puts `0x80` at position 0. The inverse table turns the "index of" lookup
/// into a single load.
struct ScrambleTable {
    forward: [u8; 256],
    inverse: [u8; 256],
}

impl ScrambleTable {
    const fn build() -> Self {
        let mut forward = [0u8; 256];
        let mut inverse = [0u8; 256];
        let mut i = 0;
        while i < 256 {
            let value = (i as i32 - 128) as i8 as u8;
            forward[i] = value;
            inverse[value as usize] = i as u8;
            i += 1;
        }
        Self { forward, inverse }
    }

    #[inline]
    fn position(&self, byte: u8) -> i32 {
        i32::from(self.inverse[byte as usize])
    }

    #[inline]
    fn at(&self, position: i32) -> u8 {
        self.forward[position as usize]
    }
}

static SCRAMBLE: ScrambleTable = ScrambleTable::build();

/// Direction a [`Cipher`] has been initialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    /// Plaintext in, scrambled bytes out
    Encrypt,
    /// Scrambled bytes in, plaintext out
    Decrypt,
}

/// Stateful scramble cipher.
///
/// A cipher instance covers exactly one message in one direction: call
/// [`Cipher::init`], feed bytes with [`Cipher::update`], and collect the
/// output with [`Cipher::do_final`], which also resets the instance. Reusing
/// feedback state across messages would desynchronize the peers.
///
/// # Examples
///
/// ```
/// use gatelink_crypto::cipher::Cipher;
///
/// let mut cipher = Cipher::new(256);
/// let sealed = cipher.encrypt(b"secret", b"hello").unwrap();
/// assert_eq!(sealed.len() % 256, 0);
///
/// let opened = cipher.decrypt(b"secret", &sealed).unwrap();
/// assert_eq!(opened, b"hello");
/// ```
pub struct Cipher {
    buffer: Vec<u8>,
    pad_size: usize,
    mode: Option<CipherMode>,
    key: Zeroizing<Vec<u8>>,
    key_index: usize,
    factor1: i32,
    factor2: i32,
}

impl Cipher {
    /// Create a cipher with the given pad size (0 disables padding).
    #[must_use]
    pub fn new(pad_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            pad_size,
            mode: None,
            key: Zeroizing::new(Vec::new()),
            key_index: 0,
            factor1: 0,
            factor2: 0,
        }
    }

    /// Current pad size.
    #[must_use]
    pub fn pad_size(&self) -> usize {
        self.pad_size
    }

    /// Mode set by the last [`Cipher::init`], if a cycle is in progress.
    #[must_use]
    pub fn mode(&self) -> Option<CipherMode> {
        self.mode
    }

    /// Start a new cycle in `mode` with the given key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EmptyKey`] for an empty key and
    /// [`CryptoError::InvalidPadSize`] if the pad size cannot be encoded in
    /// the trailer.
    pub fn init(&mut self, mode: CipherMode, key: &[u8]) -> Result<(), CryptoError> {
        self.reset();
        if key.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        if self.pad_size > MAX_PAD_SIZE {
            return Err(CryptoError::InvalidPadSize(self.pad_size));
        }
        self.mode = Some(mode);
        self.key = Zeroizing::new(key.to_vec());
        Ok(())
    }

    /// Shorthand for `init(CipherMode::Encrypt, key)`.
    ///
    /// # Errors
    ///
    /// See [`Cipher::init`].
    pub fn init_encrypt(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        self.init(CipherMode::Encrypt, key)
    }

    /// Shorthand for `init(CipherMode::Decrypt, key)`.
    ///
    /// # Errors
    ///
    /// See [`Cipher::init`].
    pub fn init_decrypt(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        self.init(CipherMode::Decrypt, key)
    }

    /// Abandon any cycle in progress.
    pub fn reset(&mut self) {
        self.buffer = Vec::new();
        self.key_index = 0;
        self.factor1 = 0;
        self.factor2 = 0;
        self.mode = None;
    }

    /// Feed a single byte through the cipher.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotInitialized`] outside of an init/do_final cycle.
    pub fn update_byte(&mut self, data: u8) -> Result<(), CryptoError> {
        let mode = self.mode.ok_or(CryptoError::NotInitialized)?;
        self.step(mode, data);
        Ok(())
    }

    /// Feed a slice through the cipher.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotInitialized`] outside of an init/do_final cycle.
    pub fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        let mode = self.mode.ok_or(CryptoError::NotInitialized)?;
        self.buffer.reserve(data.len());
        for &byte in data {
            self.step(mode, byte);
        }
        Ok(())
    }

    /// Finish the cycle and return the transformed bytes.
    ///
    /// The instance is reset whether or not the output is usable. On decrypt,
    /// a misaligned length or an out-of-range filler count returns an empty
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotInitialized`] outside of an init/do_final cycle.
    pub fn do_final(&mut self) -> Result<Vec<u8>, CryptoError> {
        let mode = self.mode.ok_or(CryptoError::NotInitialized)?;
        let output = if self.pad_size == 0 {
            std::mem::take(&mut self.buffer)
        } else {
            match mode {
                CipherMode::Encrypt => self.seal_padding(),
                CipherMode::Decrypt => self.strip_padding(),
            }
        };
        self.reset();
        Ok(output)
    }

    /// Feed `data` and finish the cycle.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::NotInitialized`] outside of an init/do_final cycle.
    pub fn do_final_with(&mut self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.update(data)?;
        self.do_final()
    }

    /// Encrypt `plaintext` with `key` in one call.
    ///
    /// # Errors
    ///
    /// See [`Cipher::init`].
    pub fn encrypt(&mut self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.init_encrypt(key)?;
        self.do_final_with(plaintext)
    }

    /// Decrypt `ciphertext` with `key` in one call.
    ///
    /// # Errors
    ///
    /// See [`Cipher::init`].
    pub fn decrypt(&mut self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.init_decrypt(key)?;
        self.do_final_with(ciphertext)
    }

    fn step(&mut self, mode: CipherMode, data: u8) {
        let pos_in = SCRAMBLE.position(data);
        let adj = SCRAMBLE.position(self.key[self.key_index]);
        self.key_index += 1;
        if self.key_index >= self.key.len() {
            self.key_index = 0;
        }

        self.factor1 = self.factor2.wrapping_add(adj);

        let pos_out = match mode {
            CipherMode::Encrypt => pos_in.wrapping_add(self.factor1),
            CipherMode::Decrypt => pos_in.wrapping_sub(self.factor1),
        };
        let mut pos_out = pos_out % TABLE_SIZE;
        if pos_out < 0 {
            pos_out += TABLE_SIZE;
        }

        self.factor2 = match mode {
            CipherMode::Encrypt => self.factor1.wrapping_add(pos_out),
            CipherMode::Decrypt => self.factor1.wrapping_add(pos_in),
        };

        self.buffer.push(SCRAMBLE.at(pos_out));
    }

    fn seal_padding(&mut self) -> Vec<u8> {
        let mut extra = self.pad_size - ((self.buffer.len() + PAD_TRAILER_SIZE) % self.pad_size);
        if extra == self.pad_size {
            extra = 0;
        }

        let mut filler = vec![0u8; extra];
        rand::thread_rng().fill_bytes(&mut filler);
        let trailer = (extra as u32).to_be_bytes();

        self.buffer.reserve(extra + PAD_TRAILER_SIZE);
        for byte in filler.into_iter().chain(trailer) {
            self.step(CipherMode::Encrypt, byte);
        }
        std::mem::take(&mut self.buffer)
    }

    fn strip_padding(&mut self) -> Vec<u8> {
        let clear = std::mem::take(&mut self.buffer);
        if clear.len() % self.pad_size != 0 || clear.len() < PAD_TRAILER_SIZE {
            return Vec::new();
        }

        let trailer_at = clear.len() - PAD_TRAILER_SIZE;
        let mut count = [0u8; PAD_TRAILER_SIZE];
        count.copy_from_slice(&clear[trailer_at..]);
        let extra = i32::from_be_bytes(count);
        if extra < 0 || extra as usize >= self.pad_size {
            return Vec::new();
        }

        match trailer_at.checked_sub(extra as usize) {
            Some(payload_len) => {
                let mut clear = clear;
                clear.truncate(payload_len);
                clear
            }
            None => Vec::new(),
        }
    }
}

impl Default for Cipher {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("pad_size", &self.pad_size)
            .field("mode", &self.mode)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scramble_table_is_permutation() {
        let mut seen = [false; 256];
        for pos in 0..256 {
            let byte = SCRAMBLE.at(pos);
            assert!(!seen[byte as usize]);
            seen[byte as usize] = true;
            assert_eq!(SCRAMBLE.position(byte), pos);
        }
        assert_eq!(SCRAMBLE.at(0), 0x80);
        assert_eq!(SCRAMBLE.at(128), 0x00);
    }

    #[test]
    fn test_known_vector_unpadded() {
        // key 'A' sits at position 193; two zero bytes chain through factor2 = 258
        let mut cipher = Cipher::new(0);
        let out = cipher.encrypt(b"A", &[0x00, 0x00]).unwrap();
        assert_eq!(out, vec![0xC1, 0xC3]);

        let back = cipher.decrypt(b"A", &out).unwrap();
        assert_eq!(back, vec![0x00, 0x00]);
    }

    #[test]
    fn test_roundtrip_unpadded_preserves_length() {
        let mut cipher = Cipher::new(0);
        let plain = b"The quick brown fox jumps over the lazy dog";
        let sealed = cipher.encrypt(b"key", plain).unwrap();
        assert_eq!(sealed.len(), plain.len());
        assert_ne!(&sealed[..], &plain[..]);
        assert_eq!(cipher.decrypt(b"key", &sealed).unwrap(), plain);
    }

    #[test]
    fn test_padded_length_is_multiple_of_pad() {
        let mut cipher = Cipher::new(256);
        let sealed = cipher.encrypt(b"key", &[7u8; 10]).unwrap();
        assert_eq!(sealed.len(), 256);

        // 252 + 4 is already aligned, no filler needed
        let sealed = cipher.encrypt(b"key", &[7u8; 252]).unwrap();
        assert_eq!(sealed.len(), 256);

        let sealed = cipher.encrypt(b"key", &[7u8; 253]).unwrap();
        assert_eq!(sealed.len(), 512);
    }

    #[test]
    fn test_roundtrip_padded_sizes() {
        for pad in [1usize, 256, 8192] {
            let mut cipher = Cipher::new(pad);
            for len in [0usize, 1, 255, 256, 257] {
                let plain: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
                let sealed = cipher.encrypt(b"shared-key", &plain).unwrap();
                assert_eq!(sealed.len() % pad, 0);
                let opened = cipher.decrypt(b"shared-key", &sealed).unwrap();
                assert_eq!(opened, plain, "pad {pad} len {len}");
            }
        }
    }

    #[test]
    fn test_wrong_key_does_not_recover_plaintext() {
        let mut cipher = Cipher::new(0);
        let sealed = cipher.encrypt(b"alpha", b"attack at dawn").unwrap();
        let opened = cipher.decrypt(b"bravo", &sealed).unwrap();
        assert_ne!(opened, b"attack at dawn");
    }

    #[test]
    fn test_misaligned_ciphertext_decrypts_empty() {
        let mut cipher = Cipher::new(256);
        let sealed = cipher.encrypt(b"key", b"payload").unwrap();
        let opened = cipher.decrypt(b"key", &sealed[..sealed.len() - 1]).unwrap();
        assert!(opened.is_empty());
    }

    #[test]
    fn test_empty_ciphertext_decrypts_empty() {
        let mut cipher = Cipher::new(16);
        assert!(cipher.decrypt(b"key", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_filler_count_decrypts_empty() {
        // Unpadded encryption of a fake trailer claiming 300 filler bytes
        let mut cipher = Cipher::new(0);
        let mut forged = vec![1, 2, 3, 4];
        forged.extend_from_slice(&300u32.to_be_bytes());
        let sealed = cipher.encrypt(b"key", &forged).unwrap();

        let mut padded = Cipher::new(8);
        assert!(padded.decrypt(b"key", &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_filler_count_longer_than_payload_decrypts_empty() {
        let mut cipher = Cipher::new(0);
        let mut forged = vec![9, 9, 9, 9];
        forged.extend_from_slice(&5u32.to_be_bytes());
        let sealed = cipher.encrypt(b"key", &forged).unwrap();

        let mut padded = Cipher::new(8);
        assert!(padded.decrypt(b"key", &sealed).unwrap().is_empty());
    }

    #[test]
    fn test_update_requires_init() {
        let mut cipher = Cipher::new(0);
        assert!(matches!(
            cipher.update(b"x"),
            Err(CryptoError::NotInitialized)
        ));
        assert!(matches!(cipher.do_final(), Err(CryptoError::NotInitialized)));
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut cipher = Cipher::new(0);
        assert!(matches!(
            cipher.init_encrypt(&[]),
            Err(CryptoError::EmptyKey)
        ));
    }

    #[test]
    fn test_do_final_resets_state() {
        let mut cipher = Cipher::new(0);
        cipher.init_encrypt(b"key").unwrap();
        cipher.update(b"abc").unwrap();
        let first = cipher.do_final().unwrap();
        assert_eq!(cipher.mode(), None);

        // Same key and input after reset yields the same bytes
        let second = cipher.encrypt(b"key", b"abc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_incremental_matches_one_shot() {
        let mut one_shot = Cipher::new(0);
        let expected = one_shot.encrypt(b"k3y", b"incremental data").unwrap();

        let mut cipher = Cipher::new(0);
        cipher.init_encrypt(b"k3y").unwrap();
        for &b in b"incremental " {
            cipher.update_byte(b).unwrap();
        }
        cipher.update(b"data").unwrap();
        assert_eq!(cipher.do_final().unwrap(), expected);
    }

    #[test]
    fn test_output_depends_on_prior_bytes() {
        let mut cipher = Cipher::new(0);
        let a = cipher.encrypt(b"key", b"xAAAA").unwrap();
        let b = cipher.encrypt(b"key", b"yAAAA").unwrap();
        assert_ne!(a[1..], b[1..]);
    }
}
