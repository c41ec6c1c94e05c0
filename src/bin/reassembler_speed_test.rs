use std::collections::VecDeque;
use std::io;
use std::io::{Error, ErrorKind};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tcp_endpoint::{ByteStream, Reassembler};

fn speed_test(num_chunks: usize, capacity: usize, random_seed: usize) -> io::Result<()> {
    let mut rng = StdRng::seed_from_u64(random_seed as u64);
    let mut data = vec![0u8; num_chunks * capacity];
    rng.fill_bytes(&mut data);

    let mut chunks: VecDeque<(usize, &[u8], bool)> = VecDeque::new();
    for i in (0..data.len()).step_by(capacity) {
        for offset in 0..3 {
            let start = i + offset;
            if start > data.len() {
                continue;
            }
            let end = usize::min(start + capacity * 2, data.len());
            let segment = data.get(start..end).unwrap_or(&[]);
            let is_last = end >= data.len();
            chunks.push_back((start, segment, is_last));
        }
    }

    let mut ra = Reassembler::new(ByteStream::new(capacity));
    let mut output_buffer = Vec::with_capacity(data.len());

    let t0 = Instant::now();

    while let Some((first_index, segment, is_last)) = chunks.pop_front() {
        ra.insert(first_index as u64, segment.to_vec(), is_last);

        loop {
            let chunk = ra.output().peek().to_vec();
            if chunk.is_empty() {
                break;
            }
            ra.output_mut().pop(chunk.len());
            output_buffer.extend_from_slice(&chunk);
        }
    }

    let duration = t0.elapsed();

    if !ra.output().is_finished() {
        return Err(Error::new(
            ErrorKind::Other,
            "reassembler did not close its output stream when finished",
        ));
    }

    if data != output_buffer {
        return Err(Error::new(
            ErrorKind::Other,
            "mismatch between data written and data read",
        ));
    }

    let duration_secs = duration.as_secs_f64();
    let bytes_per_sec = (num_chunks * capacity) as f64 / duration_secs;
    let bits_per_sec = bytes_per_sec * 8.0;
    let gigabits_per_sec = bits_per_sec / 1e9;

    println!(
        "Reassembler to ByteStream with capacity={capacity} reached {gigabits_per_sec:.2} Gbit/s"
    );

    Ok(())
}

fn main() {
    let num_chunks = 10_000;
    let capacity = 1500;
    let random_seed = 1370;

    if let Err(e) = speed_test(num_chunks, capacity, random_seed) {
        eprintln!("Speed test failed: {e}");
        std::process::exit(1);
    }
}
