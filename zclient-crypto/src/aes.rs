#![forbid(unsafe_code)]

//! AES contexts with ECB, CBC and CTR mode drivers.
//!
//! The block transform and key schedule come from the `aes` crate (constant
//! time, schedule zeroized on drop). Everything above the single-block
//! transform lives here:
//! - ECB: every 16-byte block independently
//! - CBC: `C[i] = E(P[i] ^ C[i-1])`, `C[-1] = IV`
//! - CTR: `C[i] = P[i] ^ E(IV + i)` with a 128-bit big-endian counter
//!
//! Contexts are immutable after `init`; each call starts from the IV again,
//! so callers streaming across calls must supply a fresh IV / counter.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256, Block};
use tracing::debug;
use zeroize::Zeroize;

use crate::memory::{MemoryState, TaggedBuf};
use crate::{ensure_capacity, Error, Result};

/// AES block size in bytes.
pub const AES_BLOCK_SIZE: usize = 16;

/// Maximum AES key size in bytes (AES-256).
pub const AES_MAX_KEY_SIZE: usize = 32;

/// Block cipher mode of operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AesMode {
    /// Electronic codebook
    Ecb,
    /// Cipher block chaining
    Cbc,
    /// Counter
    Ctr,
}

impl AesMode {
    /// Whether this mode needs a 16-byte IV.
    pub fn requires_iv(self) -> bool {
        !matches!(self, AesMode::Ecb)
    }
}

enum KeySchedule {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl KeySchedule {
    fn expand(key: &[u8]) -> Result<Self> {
        let bad_len = |_| Error::invalid_params("AES key length must be 16, 24 or 32 bytes");
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(bad_len),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(bad_len),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(bad_len),
            _ => Err(Error::invalid_params("AES key length must be 16, 24 or 32 bytes")),
        }
    }

    fn encrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let mut b = Block::from(*block);
        match self {
            Self::Aes128(c) => c.encrypt_block(&mut b),
            Self::Aes192(c) => c.encrypt_block(&mut b),
            Self::Aes256(c) => c.encrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
        b.as_mut_slice().zeroize();
    }

    fn decrypt_block(&self, block: &mut [u8; AES_BLOCK_SIZE]) {
        let mut b = Block::from(*block);
        match self {
            Self::Aes128(c) => c.decrypt_block(&mut b),
            Self::Aes192(c) => c.decrypt_block(&mut b),
            Self::Aes256(c) => c.decrypt_block(&mut b),
        }
        block.copy_from_slice(&b);
        b.as_mut_slice().zeroize();
    }
}

/// Immutable AES encryption/decryption context.
///
/// The key and IV are [`TaggedBuf`]s: borrowed caller buffers are held for
/// the context's lifetime and never modified, owned buffers are wiped by
/// [`AesContext::cleanup`] (or on drop).
pub struct AesContext<'a> {
    key: TaggedBuf<'a>,
    iv: TaggedBuf<'a>,
    mode: AesMode,
    // None once cleaned up; dropping the schedule wipes the round keys
    schedule: Option<KeySchedule>,
}

impl<'a> AesContext<'a> {
    /// Validate key / mode / IV and expand the key schedule.
    ///
    /// # Errors
    /// `InvalidParameters` when the key is not 16/24/32 bytes, when an IV is
    /// given for ECB, or when CBC/CTR lack a 16-byte IV.
    pub fn init(key: TaggedBuf<'a>, mode: AesMode, iv: Option<TaggedBuf<'a>>) -> Result<Self> {
        let iv = match (mode.requires_iv(), iv) {
            (false, None) => TaggedBuf::freed(),
            (false, Some(_)) => {
                debug!(?mode, "rejecting IV for mode without IV");
                return Err(Error::invalid_params("ECB mode does not take an IV"));
            }
            (true, None) => {
                debug!(?mode, "rejecting missing IV");
                return Err(Error::invalid_params("mode requires a 16-byte IV"));
            }
            (true, Some(iv)) if iv.len() != AES_BLOCK_SIZE => {
                debug!(?mode, iv_len = iv.len(), "rejecting IV of wrong length");
                return Err(Error::invalid_params("IV must be exactly 16 bytes"));
            }
            (true, Some(iv)) => iv,
        };
        let schedule = KeySchedule::expand(key.as_bytes())?;
        debug!(?mode, key_bits = key.len() * 8, "AES context initialized");
        Ok(Self { key, iv, mode, schedule: Some(schedule) })
    }

    /// Borrowing convenience over [`AesContext::init`].
    pub fn new(key: &'a [u8], mode: AesMode, iv: Option<&'a [u8]>) -> Result<Self> {
        Self::init(TaggedBuf::borrowed(key), mode, iv.map(TaggedBuf::borrowed))
    }

    /// Mode this context was initialized with.
    pub fn mode(&self) -> AesMode {
        self.mode
    }

    /// Key length in bytes (0 once cleaned up).
    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    /// Ownership tag of the key buffer.
    pub fn key_state(&self) -> MemoryState {
        self.key.state()
    }

    /// Ownership tag of the IV buffer (`Freed` for ECB).
    pub fn iv_state(&self) -> MemoryState {
        self.iv.state()
    }

    /// Whether [`AesContext::cleanup`] has run.
    pub fn is_released(&self) -> bool {
        self.schedule.is_none()
    }

    /// Encrypt `input` into `output`, returning the number of bytes written.
    ///
    /// # Errors
    /// - `InvalidContext` after cleanup
    /// - `InvalidParameters` when `input` is empty or not a multiple of 16
    /// - `BufferTooSmall` when `output` is shorter than `input`
    ///
    /// Nothing is written on any error.
    pub fn encrypt(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let schedule = self.checked(input, output)?;
        let out = &mut output[..input.len()];
        match self.mode {
            AesMode::Ecb => ecb(input, out, |b| schedule.encrypt_block(b)),
            AesMode::Cbc => self.cbc_encrypt(schedule, input, out),
            AesMode::Ctr => self.ctr_apply(schedule, input, out),
        }
        Ok(input.len())
    }

    /// Decrypt `input` into `output`, returning the number of bytes written.
    ///
    /// Same errors as [`AesContext::encrypt`].
    pub fn decrypt(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let schedule = self.checked(input, output)?;
        let out = &mut output[..input.len()];
        match self.mode {
            AesMode::Ecb => ecb(input, out, |b| schedule.decrypt_block(b)),
            AesMode::Cbc => self.cbc_decrypt(schedule, input, out),
            AesMode::Ctr => self.ctr_apply(schedule, input, out),
        }
        Ok(input.len())
    }

    /// Encrypt into a freshly allocated buffer.
    pub fn encrypt_to_vec(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; input.len()];
        self.encrypt(input, &mut out)?;
        Ok(out)
    }

    /// Decrypt into a freshly allocated buffer.
    pub fn decrypt_to_vec(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = vec![0u8; input.len()];
        self.decrypt(input, &mut out)?;
        Ok(out)
    }

    /// Wipe the key schedule and owned key/IV storage, then release them.
    ///
    /// Safe to call more than once; later encrypt/decrypt calls fail with
    /// `InvalidContext`.
    pub fn cleanup(&mut self) {
        if self.schedule.take().is_some() {
            debug!(mode = ?self.mode, "AES context released");
        }
        self.key.release();
        self.iv.release();
    }

    fn checked(&self, input: &[u8], output: &[u8]) -> Result<&KeySchedule> {
        let schedule = self.schedule.as_ref().ok_or(Error::InvalidContext)?;
        if input.is_empty() || input.len() % AES_BLOCK_SIZE != 0 {
            return Err(Error::invalid_params(
                "data length must be a positive multiple of 16 bytes",
            ));
        }
        ensure_capacity(input.len(), output.len())?;
        Ok(schedule)
    }

    fn iv_block(&self) -> [u8; AES_BLOCK_SIZE] {
        let mut block = [0u8; AES_BLOCK_SIZE];
        block.copy_from_slice(self.iv.as_bytes());
        block
    }

    fn cbc_encrypt(&self, schedule: &KeySchedule, input: &[u8], output: &mut [u8]) {
        let mut chain = self.iv_block();
        for (src, dst) in input.chunks_exact(AES_BLOCK_SIZE).zip(output.chunks_exact_mut(AES_BLOCK_SIZE)) {
            for (c, p) in chain.iter_mut().zip(src) {
                *c ^= p;
            }
            schedule.encrypt_block(&mut chain);
            dst.copy_from_slice(&chain);
        }
        chain.zeroize();
    }

    fn cbc_decrypt(&self, schedule: &KeySchedule, input: &[u8], output: &mut [u8]) {
        let mut prev = self.iv_block();
        let mut block = [0u8; AES_BLOCK_SIZE];
        for (src, dst) in input.chunks_exact(AES_BLOCK_SIZE).zip(output.chunks_exact_mut(AES_BLOCK_SIZE)) {
            block.copy_from_slice(src);
            schedule.decrypt_block(&mut block);
            for ((d, b), p) in dst.iter_mut().zip(&block).zip(&prev) {
                *d = b ^ p;
            }
            prev.copy_from_slice(src);
        }
        block.zeroize();
        prev.zeroize();
    }

    fn ctr_apply(&self, schedule: &KeySchedule, input: &[u8], output: &mut [u8]) {
        let mut counter = u128::from_be_bytes(self.iv_block());
        let mut keystream = [0u8; AES_BLOCK_SIZE];
        for (src, dst) in input.chunks_exact(AES_BLOCK_SIZE).zip(output.chunks_exact_mut(AES_BLOCK_SIZE)) {
            keystream = counter.to_be_bytes();
            schedule.encrypt_block(&mut keystream);
            for ((d, s), k) in dst.iter_mut().zip(src).zip(&keystream) {
                *d = s ^ k;
            }
            counter = counter.wrapping_add(1);
        }
        keystream.zeroize();
        counter.zeroize();
    }
}

fn ecb(input: &[u8], output: &mut [u8], transform: impl Fn(&mut [u8; AES_BLOCK_SIZE])) {
    let mut block = [0u8; AES_BLOCK_SIZE];
    for (src, dst) in input.chunks_exact(AES_BLOCK_SIZE).zip(output.chunks_exact_mut(AES_BLOCK_SIZE)) {
        block.copy_from_slice(src);
        transform(&mut block);
        dst.copy_from_slice(&block);
    }
    block.zeroize();
}

impl Drop for AesContext<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl core::fmt::Debug for AesContext<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AesContext")
            .field("mode", &self.mode)
            .field("key_bits", &(self.key.len() * 8))
            .field("key_state", &self.key.state())
            .field("iv_state", &self.iv.state())
            .field("released", &self.is_released())
            .finish()
    }
}
