use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::features::SampleWindow;

/// Pull-based provider of analysis windows.
///
/// The live stream polls this once per tick; implementations must never
/// block and must return `None` when nothing new has arrived since the
/// last pull (the tick is then skipped).
pub trait SignalSource: Send {
    fn current_window(&mut self) -> Option<SampleWindow>;
    fn sample_rate(&self) -> u32;
}

/// Ring buffer size (power of 2 for fast modular arithmetic).
const RING_SIZE: usize = 65536;
const RING_MASK: u32 = (RING_SIZE - 1) as u32;

/// Lock-free single-producer single-consumer ring buffer for audio samples.
struct RingBuffer {
    data: Box<[f32; RING_SIZE]>,
    write_pos: AtomicU32,
    read_pos: AtomicU32,
}

impl RingBuffer {
    fn new() -> Self {
        Self {
            data: Box::new([0.0; RING_SIZE]),
            write_pos: AtomicU32::new(0),
            read_pos: AtomicU32::new(0),
        }
    }

    /// Push samples (called from the producer thread).
    /// Safety: Only one thread should call push at a time.
    fn push(&self, samples: &[f32]) {
        let mut wp = self.write_pos.load(Ordering::Relaxed);
        for &sample in samples {
            // Safety: we're the only writer, and RING_SIZE is a power of 2
            let idx = (wp & RING_MASK) as usize;
            // This is safe because we're the only writer and readers
            // can tolerate stale data gracefully.
            unsafe {
                let ptr = self.data.as_ptr() as *mut f32;
                *ptr.add(idx) = sample;
            }
            wp = wp.wrapping_add(1);
        }
        self.write_pos.store(wp, Ordering::Release);
    }

    /// Read available samples into dst. Returns number of samples read.
    fn read(&self, dst: &mut [f32]) -> usize {
        let wp = self.write_pos.load(Ordering::Acquire);
        let rp = self.read_pos.load(Ordering::Relaxed);
        let available = wp.wrapping_sub(rp) as usize;
        let to_read = available.min(dst.len());

        for i in 0..to_read {
            let idx = (rp.wrapping_add(i as u32) & RING_MASK) as usize;
            dst[i] = self.data[idx];
        }

        self.read_pos
            .store(rp.wrapping_add(to_read as u32), Ordering::Release);
        to_read
    }
}

// Safety: RingBuffer uses atomics for synchronization
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

/// Producer half of a [`RingSource`]. Hosts push mono samples from wherever
/// they get them (capture callback, decoder thread).
#[derive(Clone)]
pub struct RingProducer {
    ring: Arc<RingBuffer>,
}

impl RingProducer {
    /// Push mono samples. Only one thread should push at a time.
    pub fn push(&self, samples: &[f32]) {
        self.ring.push(samples);
    }
}

/// [`SignalSource`] backed by an SPSC ring: drains whatever the producer
/// pushed since the last pull and slides it into a fixed-length analysis
/// window.
pub struct RingSource {
    ring: Arc<RingBuffer>,
    window: Vec<f32>,
    read_buf: Vec<f32>,
    filled: usize,
    sample_rate: u32,
}

impl RingSource {
    pub fn new(sample_rate: u32, window_len: usize) -> (Self, RingProducer) {
        let ring = Arc::new(RingBuffer::new());
        let producer = RingProducer { ring: ring.clone() };
        let source = Self {
            ring,
            window: vec![0.0; window_len],
            read_buf: vec![0.0; window_len * 2],
            filled: 0,
            sample_rate,
        };
        (source, producer)
    }

    /// Shift the window left and append new samples at the tail.
    fn append(&mut self, samples: &[f32]) {
        let len = self.window.len();
        let shift = samples.len().min(len);
        if shift < len {
            self.window.copy_within(shift.., 0);
        }
        let src_offset = samples.len() - shift;
        self.window[len - shift..].copy_from_slice(&samples[src_offset..]);
        self.filled = (self.filled + samples.len()).min(len);
    }
}

impl SignalSource for RingSource {
    fn current_window(&mut self) -> Option<SampleWindow> {
        let mut drained = 0;
        loop {
            let read = self.ring.read(&mut self.read_buf);
            if read == 0 {
                break;
            }
            let chunk = self.read_buf[..read].to_vec();
            self.append(&chunk);
            drained += read;
        }
        // Nothing new, or not enough yet for a first full window
        if drained == 0 || self.filled < self.window.len() {
            return None;
        }
        Some(SampleWindow {
            samples: self.window.clone(),
            sample_rate: self.sample_rate,
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
