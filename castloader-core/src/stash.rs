use crate::Introspect;

/// A snapshot of a [`StashEngine`]'s state, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct StashIntrospection {
    pub byte_start: u64,
    pub used: usize,
    pub buffer_size: usize,
    pub stash_size: usize,
}

/// The Controller's byte-accumulating window.
///
/// Grounded on `LoadableNetworkStream`'s `loaded_bytes: Mutex<Vec<u8>>` +
/// `loaded_bytes_offset` cache (a single contiguous prefetch window keyed by
/// an absolute offset) and on `RangeBuffer::retain_range`'s memmove-via-drain
/// technique for discarding consumed bytes in place.
pub struct StashEngine {
    buffer: Vec<u8>,
    /// Logical target window. Invariant: `stash_size <= buffer.len()`.
    stash_size: usize,
    /// How many of `buffer`'s leading bytes currently hold valid data.
    used: usize,
    /// Absolute resource offset of `buffer[0]`, meaningful only when
    /// `used > 0`.
    byte_start: u64,
}

/// What a dispatch callback returns: the Controller must honor this value
/// exactly.
pub type Consumed = usize;

impl StashEngine {
    pub const INITIAL_BUFFER_SIZE: usize = 3 * 1024 * 1024;
    pub const BUFFER_HEADROOM: usize = 1024 * 1024;

    pub fn new(stash_initial_size: usize) -> Self {
        Self {
            buffer: vec![0; Self::INITIAL_BUFFER_SIZE],
            stash_size: stash_initial_size,
            used: 0,
            byte_start: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn byte_start(&self) -> u64 {
        self.byte_start
    }

    pub fn stash_size(&self) -> usize {
        self.stash_size
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// The retained tail, i.e. `buffer[0..used]`.
    pub fn retained(&self) -> &[u8] {
        &self.buffer[..self.used]
    }

    /// Sets the stash's start offset. Only valid to call while empty.
    pub fn set_fresh_start(&mut self, byte_start: u64) {
        debug_assert_eq!(self.used, 0, "set_fresh_start called on a non-empty stash");
        self.byte_start = byte_start;
    }

    /// Discards everything retained, per `abort`/`seek`/`pause`.
    pub fn reset(&mut self) {
        self.used = 0;
        self.byte_start = 0;
    }

    /// Resets `stash_size` to `initial_size` without shrinking `buffer_size`.
    pub fn reset_stash_size(&mut self, initial_size: usize) {
        self.stash_size = initial_size;
    }

    /// Appends `data` to the retained tail, growing the buffer first if
    /// needed.
    pub fn append(&mut self, data: &[u8]) {
        self.ensure_capacity(self.used + data.len());
        self.buffer[self.used..self.used + data.len()].copy_from_slice(data);
        self.used += data.len();
    }

    /// Replaces the retained tail outright with `data`, starting at
    /// `byte_start`. Used when a fresh unconsumed remainder is stashed after
    /// a direct dispatch.
    pub fn replace_with(&mut self, byte_start: u64, data: &[u8]) {
        self.ensure_capacity(data.len());
        self.buffer[..data.len()].copy_from_slice(data);
        self.used = data.len();
        self.byte_start = byte_start;
    }

    /// After a dispatch of the whole retained tail returned `consumed`,
    /// compacts the unconsumed remainder to `buffer[0]` and advances
    /// `byte_start`.
    pub fn compact_retain(&mut self, consumed: Consumed) {
        debug_assert!(consumed <= self.used);

        let remain = self.used - consumed;
        if consumed > 0 && remain > 0 {
            self.buffer.copy_within(consumed..self.used, 0);
        }

        self.used = remain;
        self.byte_start += consumed as u64;
    }

    /// Grows the buffer to hold at least `expected_bytes`, doubling (then
    /// padding by one more headroom block) until it fits. A no-op if the
    /// buffer is already big enough.
    pub fn ensure_capacity(&mut self, expected_bytes: usize) {
        let mut new_size = self.stash_size.max(1);

        while new_size + Self::BUFFER_HEADROOM < expected_bytes {
            new_size *= 2;
        }
        new_size += Self::BUFFER_HEADROOM;

        if new_size <= self.buffer.len() {
            return;
        }

        let mut grown = vec![0u8; new_size];
        grown[..self.used].copy_from_slice(&self.buffer[..self.used]);
        self.buffer = grown;
    }

    /// Directly grows to exactly `desired_buffer` bytes if the current
    /// buffer is smaller, used by `adjust_stash_size` which already
    /// computes the desired size itself.
    pub fn grow_to(&mut self, desired_buffer: usize) {
        if desired_buffer <= self.buffer.len() {
            return;
        }

        let mut grown = vec![0u8; desired_buffer];
        grown[..self.used].copy_from_slice(&self.buffer[..self.used]);
        self.buffer = grown;
    }

    pub fn set_stash_size(&mut self, stash_size: usize) {
        self.stash_size = stash_size;
    }

    /// Flushes the retained tail through `dispatch`.
    ///
    /// `dispatch` receives the retained bytes and their absolute start
    /// offset and returns how many bytes were consumed. Returns the number
    /// of bytes that remained undispatched (always 0 unless
    /// `drop_unconsumed` and the consumer didn't take everything).
    pub fn flush(
        &mut self,
        drop_unconsumed: bool,
        dispatch: impl FnOnce(&[u8], u64) -> Consumed,
    ) -> usize {
        if self.used == 0 {
            return 0;
        }

        let byte_start = self.byte_start;
        let consumed = dispatch(&self.buffer[..self.used], byte_start).min(self.used);
        let remain = self.used - consumed;

        if remain == 0 {
            self.reset();
            return 0;
        }

        if drop_unconsumed {
            log::warn!(
                "dropping {remain} unconsumed stash bytes at offset {}",
                byte_start + consumed as u64
            );
            self.reset();
            remain
        } else {
            self.compact_retain(consumed);
            0
        }
    }
}

impl Introspect<StashIntrospection> for StashEngine {
    fn introspect(&self) -> StashIntrospection {
        StashIntrospection {
            byte_start: self.byte_start,
            used: self.used,
            buffer_size: self.buffer.len(),
            stash_size: self.stash_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_flush_full_consumption() {
        let mut stash = StashEngine::new(1024);
        stash.set_fresh_start(0);
        stash.append(b"ABCDE");
        stash.append(b"FGHIJ");

        let mut dispatched = None;
        let remain = stash.flush(false, |buf, start| {
            dispatched = Some((buf.to_vec(), start));
            buf.len()
        });

        assert_eq!(remain, 0);
        assert_eq!(dispatched, Some((b"ABCDEFGHIJ".to_vec(), 0)));
        assert!(stash.is_empty());
    }

    #[test]
    fn test_partial_consumption_retains_tail() {
        // Stash-disabled style usage: replace_with + compact_retain.
        let mut stash = StashEngine::new(1024);
        stash.replace_with(100, b"0123456789");

        let consumed = stash.flush(false, |buf, start| {
            assert_eq!(start, 100);
            assert_eq!(buf, b"0123456789");
            4
        });

        assert_eq!(consumed, 0);
        assert_eq!(stash.used(), 6);
        assert_eq!(stash.byte_start(), 104);
        assert_eq!(stash.retained(), b"456789");
    }

    #[test]
    fn test_drop_unconsumed_on_flush() {
        let mut stash = StashEngine::new(1024);
        stash.replace_with(50, b"hello world");

        let remain = stash.flush(true, |_, _| 5);

        assert_eq!(remain, 6);
        assert!(stash.is_empty());
        assert_eq!(stash.byte_start(), 0);
    }

    #[test]
    fn test_ensure_capacity_growth_policy() {
        let mut stash = StashEngine::new(1024);
        // expected_bytes well beyond stash_size forces doubling.
        stash.ensure_capacity(10 * 1024 * 1024);

        // new_size doubles from 1024 until new_size + 1MiB >= 10MiB, then + 1MiB.
        assert!(stash.buffer_size() >= 10 * 1024 * 1024);
    }

    #[test]
    fn test_grow_to_is_monotonic() {
        let mut stash = StashEngine::new(1024);
        let initial = stash.buffer_size();

        stash.grow_to(initial - 1);
        assert_eq!(stash.buffer_size(), initial, "must not shrink");

        stash.grow_to(initial + 100);
        assert_eq!(stash.buffer_size(), initial + 100);
    }
}
