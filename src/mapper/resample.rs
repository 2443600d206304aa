/// Stateful linear audio resampler.
///
/// Converts planar audio between sample rates and channel counts. The
/// fractional read position and the last consumed sample of each channel are
/// carried across calls, so feeding consecutive blocks in increasing frame
/// order produces a continuous output stream with no seams. Feeding blocks
/// out of order corrupts the carried state; callers own that ordering.
#[derive(Debug)]
pub struct LinearResampler {
    src_rate: i32,
    dst_rate: i32,
    dst_channels: i32,
    /// Fractional position into the virtual input stream, in `[0, 1)`.
    pos: f64,
    /// Last consumed input sample per destination channel.
    tail: Vec<f32>,
}

impl LinearResampler {
    pub fn new(src_rate: i32, dst_rate: i32, dst_channels: i32) -> Self {
        Self {
            src_rate,
            dst_rate,
            dst_channels,
            pos: 0.0,
            tail: vec![0.0; dst_channels.max(1) as usize],
        }
    }

    /// Convert one block of planar input into exactly `out_len` samples per
    /// destination channel.
    pub fn process(&mut self, input: &[Vec<f32>], out_len: usize) -> Vec<Vec<f32>> {
        let planes = remap_channels(input, self.dst_channels);
        let step = f64::from(self.src_rate) / f64::from(self.dst_rate);
        let block_len = planes.first().map_or(0, Vec::len);

        let mut out = vec![Vec::with_capacity(out_len); planes.len()];
        for i in 0..out_len {
            // Stream index 0 is the carried tail sample, 1.. is this block.
            let pos = self.pos + i as f64 * step;
            let idx = pos.floor() as usize;
            let t = (pos - idx as f64) as f32;
            for (c, plane) in planes.iter().enumerate() {
                let a = self.stream_sample(plane, c, idx, block_len);
                let b = self.stream_sample(plane, c, idx + 1, block_len);
                out[c].push(a + (b - a) * t);
            }
        }

        // Advance the carried position past what this call consumed.
        let end = self.pos + out_len as f64 * step;
        let consumed = (end.floor() as usize).min(block_len);
        if consumed > 0 {
            for (c, plane) in planes.iter().enumerate() {
                self.tail[c] = plane[consumed - 1];
            }
        }
        self.pos = end - consumed as f64;
        out
    }

    fn stream_sample(&self, plane: &[f32], channel: usize, idx: usize, block_len: usize) -> f32 {
        if idx == 0 {
            self.tail[channel]
        } else if idx <= block_len {
            plane[idx - 1]
        } else {
            // Input-limited at the end of the stream; hold the last sample.
            plane.last().copied().unwrap_or(self.tail[channel])
        }
    }
}

/// Remap planar audio to a different channel count: extra destination
/// channels cycle over the source, extra source channels fold (averaged)
/// into their destination slot.
fn remap_channels(input: &[Vec<f32>], dst_channels: i32) -> Vec<Vec<f32>> {
    let dst = dst_channels.max(1) as usize;
    let src = input.len();
    if src == dst {
        return input.to_vec();
    }
    let len = input.first().map_or(0, Vec::len);
    if src == 0 {
        return vec![vec![0.0; len]; dst];
    }
    if dst > src {
        return (0..dst).map(|c| input[c % src].clone()).collect();
    }
    let mut out = vec![vec![0.0f32; len]; dst];
    let mut counts = vec![0u32; dst];
    for (c, plane) in input.iter().enumerate() {
        let slot = c % dst;
        counts[slot] += 1;
        for (o, &s) in out[slot].iter_mut().zip(plane) {
            *o += s;
        }
    }
    for (plane, &n) in out.iter_mut().zip(&counts) {
        if n > 1 {
            for s in plane {
                *s /= n as f32;
            }
        }
    }
    out
}
