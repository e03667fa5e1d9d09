use std::sync::{Mutex, MutexGuard};

use crate::error::ValidationError;

/// Three bytes (R, G, B) per LED
pub type ColorBuffer = Vec<u8>;

/// The strip's current colors. Every mutation replaces the whole buffer.
pub struct ColorStore {
    len: usize,
    colors: Mutex<ColorBuffer>,
}

impl ColorStore {
    /// All LEDs start off
    pub fn new(led_count: usize) -> Self {
        let len = led_count * 3;
        ColorStore {
            len,
            colors: Mutex::new(vec![0; len]),
        }
    }

    pub fn buffer_len(&self) -> usize {
        self.len
    }

    pub fn check(&self, buffer: &[u8]) -> Result<(), ValidationError> {
        if buffer.len() != self.len {
            return Err(ValidationError::LengthMismatch {
                expected: self.len,
                actual: buffer.len(),
            });
        }
        Ok(())
    }

    /// Replace the buffer and run `publish` with the new contents before the
    /// lock is released, so whatever `publish` does is ordered exactly like
    /// the mutations. A buffer of the wrong length changes nothing.
    pub fn set<F, E>(&self, buffer: ColorBuffer, publish: F) -> Result<(), E>
    where
        F: FnOnce(&ColorBuffer) -> Result<(), E>,
        E: From<ValidationError>,
    {
        self.check(&buffer)?;

        let mut colors = self.lock();
        *colors = buffer;
        publish(&*colors)
    }

    /// Copy of the current buffer
    pub fn snapshot(&self) -> ColorBuffer {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, ColorBuffer> {
        // The buffer is only ever swapped whole, a poisoned lock still holds a valid one
        self.colors.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn set(store: &ColorStore, buffer: ColorBuffer) -> Result<(), ValidationError> {
        store.set(buffer, |_| Ok(()))
    }

    #[test]
    fn starts_black() {
        let store = ColorStore::new(16);
        assert_eq!(store.buffer_len(), 48);
        assert_eq!(store.snapshot(), vec![0; 48]);
    }

    #[test]
    fn accepted_buffer_is_returned_by_snapshot() {
        let store = ColorStore::new(4);
        let colors: ColorBuffer = (0..12).collect();
        set(&store, colors.clone()).unwrap();
        assert_eq!(store.snapshot(), colors);
    }

    #[test]
    fn wrong_length_leaves_store_unchanged() {
        let store = ColorStore::new(4);
        set(&store, vec![7; 12]).unwrap();

        for len in [0, 11, 13, 48] {
            let err = set(&store, vec![1; len]).unwrap_err();
            assert_eq!(err, ValidationError::LengthMismatch { expected: 12, actual: len });
        }
        assert_eq!(store.snapshot(), vec![7; 12]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = ColorStore::new(1);
        let mut copy = store.snapshot();
        copy[0] = 255;
        assert_eq!(store.snapshot(), vec![0, 0, 0]);
    }

    #[test]
    fn publish_error_keeps_new_buffer() {
        let store = ColorStore::new(1);
        let result: Result<(), ValidationError> = store.set(vec![1, 2, 3], |_| {
            Err(ValidationError::LengthMismatch { expected: 0, actual: 0 })
        });
        assert!(result.is_err());
        assert_eq!(store.snapshot(), vec![1, 2, 3]);
    }

    #[test]
    fn concurrent_writers_never_tear_a_buffer() {
        let store = Arc::new(ColorStore::new(32));
        let writers: Vec<_> = (0..4u8)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        set(&store, vec![n; 96]).unwrap();
                    }
                })
            })
            .collect();

        for _ in 0..200 {
            let snap = store.snapshot();
            assert_eq!(snap.len(), 96);
            assert!(snap.iter().all(|&b| b == snap[0]));
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
