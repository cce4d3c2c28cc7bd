//! Legacy Winbox session cipher.
//!
//! Clients before 6.43 encrypt session traffic with a modified RC4: the
//! usual key schedule and drop-3072, plus three non-standard twists that
//! this module reproduces exactly:
//!
//! 1. The accumulator `j` left over from the key schedule is kept as the
//!    engine's running cursor instead of being reset to zero.
//! 2. A carry byte `k` feeds the previous plaintext byte into each mixing
//!    step, and between blocks it persists on the client-to-server stream
//!    while the server-to-client stream clears it.
//! 3. Every block ends with a 256-round table remix seeded by `k + j`,
//!    followed by a fixed 10-byte padding block, after which the cursor is
//!    rebased to `payload length + 10`.
//!
//! Because of (1)-(3) each block's output depends on all prior blocks in
//! the same stream. An engine that resets its cursors per call silently
//! desynchronizes from a real peer after the first message.
//!
//! One [`CipherState`] exists per stream direction per connection; the two
//! directions never share state.
//!
//! # Example
//!
//! ```rust
//! use krait_proto::winbox::{CipherState, Direction, PADDING_LEN};
//!
//! let key = [0x42u8; 124];
//! let mut outbound = CipherState::new(&key, Direction::Outbound);
//! let sealed = outbound.encrypt_block(b"message", &[0u8; PADDING_LEN]);
//!
//! // Output carries the encrypted padding first, then the payload.
//! assert_eq!(sealed.len(), PADDING_LEN + 7);
//! ```

use zeroize::Zeroize;

/// Trailing padding length appended to every encrypted block.
pub const PADDING_LEN: usize = 10;

/// Session key length fixed by the protocol (half of the shared secret).
pub const SESSION_KEY_LEN: usize = 0x7C;

/// Keystream bytes discarded after the key schedule.
const DROP_LEN: usize = 0xC00;

/// Stream direction, from the emulated server's point of view.
///
/// The direction decides what happens to the carry byte at the end of a
/// block: the client-to-server stream keeps it for the next block, the
/// server-to-client stream clears it. Both ends of a stream must agree, so
/// a client implementation uses the same variants for the same streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client-to-server stream. The carry byte persists across blocks.
    Inbound,
    /// Server-to-client stream. The carry byte is cleared after each block.
    Outbound,
}

/// Stateful cipher engine for one stream direction.
///
/// Holds the 256-entry permutation table, the two cursors and the carry
/// byte. The table is a bijection on `[0, 255]` at all times: it is
/// initialized to the identity and only ever mutated by swaps.
pub struct CipherState {
    s: [u8; 256],
    i: u8,
    j: u8,
    k: u8,
    direction: Direction,
}

impl CipherState {
    /// Creates an engine for one direction from a session key.
    ///
    /// Runs the key schedule, keeps the final `j` as the running cursor,
    /// then discards the first 3072 keystream bytes.
    ///
    /// The protocol fixes the key at [`SESSION_KEY_LEN`] bytes but the
    /// schedule itself accepts any non-empty key.
    ///
    /// # Panics
    ///
    /// Panics if `key` is empty.
    pub fn new(key: &[u8], direction: Direction) -> Self {
        assert!(!key.is_empty(), "cipher key must not be empty");

        let mut s = [0u8; 256];
        for (idx, slot) in s.iter_mut().enumerate() {
            *slot = idx as u8;
        }

        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(key[i % key.len()]).wrapping_add(s[i]);
            s.swap(i, j as usize);
        }

        let mut state = Self {
            s,
            i: 0,
            j,
            k: 0,
            direction,
        };

        for _ in 0..DROP_LEN {
            state.keystream_byte();
        }

        state
    }

    /// Plain single-byte generator. Only used to drop early keystream
    /// during initialization; blocks use the distinct transform below.
    fn keystream_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);
        self.s[(self.s[self.i as usize] as usize + self.s[self.j as usize] as usize) & 0xff]
    }

    /// Encrypts one block of plaintext plus its 10-byte padding.
    ///
    /// Returns `padding_out || payload_out` - the encrypted padding comes
    /// first, matching the wire layout.
    pub fn encrypt_block(&mut self, plaintext: &[u8], padding: &[u8; PADDING_LEN]) -> Vec<u8> {
        self.transform(plaintext, padding, false)
    }

    /// Decrypts one block of ciphertext plus its 10-byte padding.
    ///
    /// Returns `padding_plain || payload_plain`.
    pub fn decrypt_block(&mut self, ciphertext: &[u8], padding: &[u8; PADDING_LEN]) -> Vec<u8> {
        self.transform(ciphertext, padding, true)
    }

    /// Block transform shared by both operations.
    ///
    /// The carry byte always tracks plaintext: when decrypting that is the
    /// byte just produced, when encrypting it is the input byte.
    fn transform(
        &mut self,
        data: &[u8],
        padding: &[u8; PADDING_LEN],
        plaintext_is_output: bool,
    ) -> Vec<u8> {
        let n = data.len();
        let mut body = vec![0u8; n];

        let mut j = self.j;
        for c in 0..n {
            let i = (self.i as usize + c + 1) & 0xff;
            j = j.wrapping_add(self.k).wrapping_add(self.s[i]);
            self.s.swap(i, j as usize);
            body[c] =
                data[c] ^ self.s[(self.s[i] as usize + self.s[j as usize] as usize) & 0xff];
            self.k = if plaintext_is_output { body[c] } else { data[c] };
        }

        // Remix the whole table, seeded by the carry.
        j = j.wrapping_add(self.k);
        for i in 0..256 {
            j = j.wrapping_add(self.s[i]);
            self.s.swap(i, j as usize);
        }

        // Padding continues the payload's cursor sequence.
        let mut pad = [0u8; PADDING_LEN];
        for (c, slot) in pad.iter_mut().enumerate() {
            let i = (self.i as usize + n + 1 + c) & 0xff;
            j = j.wrapping_add(self.s[i]);
            self.s.swap(i, j as usize);
            *slot =
                padding[c] ^ self.s[(self.s[i] as usize + self.s[j as usize] as usize) & 0xff];
        }

        self.i = ((n + PADDING_LEN) & 0xff) as u8;
        self.j = j;
        if self.direction == Direction::Outbound {
            self.k = 0;
        }

        let mut out = Vec::with_capacity(PADDING_LEN + n);
        out.extend_from_slice(&pad);
        out.extend_from_slice(&body);
        out
    }
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.s.zeroize();
        self.i.zeroize();
        self.j.zeroize();
        self.k.zeroize();
    }
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key-derived state.
        f.debug_struct("CipherState")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}
