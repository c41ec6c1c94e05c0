use std::collections::BTreeMap;

use crate::byte_stream::ByteStream;

/// Reassembles possibly-overlapping, possibly-out-of-order byte fragments into a single
/// in-order `ByteStream`, under the stream's own capacity bound.
#[derive(Debug)]
pub struct Reassembler {
    output: ByteStream,
    // Pending fragments keyed by first absolute index. Kept free of overlaps: every stored
    // fragment's key exceeds `output.bytes_pushed()`, and no two stored fragments overlap or
    // even touch (they're separated by at least one byte).
    pending: BTreeMap<u64, (Vec<u8>, bool)>,
}

impl Reassembler {
    pub fn new(output: ByteStream) -> Self {
        Reassembler {
            output,
            pending: BTreeMap::new(),
        }
    }

    /// Insert a fragment starting at absolute stream index `first_index`. `is_last` marks the
    /// final byte of `data` as the final byte of the whole stream.
    pub fn insert(&mut self, mut first_index: u64, mut data: Vec<u8>, mut is_last: bool) {
        if self.output.is_closed() || self.output.has_error() {
            return;
        }

        let ni = self.output.bytes_pushed();
        let win_end = ni + self.output.available_capacity() as u64;

        // Trim the prefix that's already been delivered.
        if first_index < ni {
            let trim = ((ni - first_index) as usize).min(data.len());
            data.drain(..trim);
            first_index = ni;
            if data.is_empty() && !is_last {
                return;
            }
        }

        // Entirely-past (now necessarily zero-length, since first_index == ni here whenever the
        // trim above ran): nothing left to write, but an empty final fragment still closes.
        if first_index + data.len() as u64 <= ni {
            if is_last && first_index + data.len() as u64 == ni {
                self.push_and_drain(Vec::new(), true);
            }
            return;
        }

        // Trim the suffix that falls outside the acceptance window.
        if first_index + data.len() as u64 > win_end {
            let keep = win_end.saturating_sub(first_index) as usize;
            data.truncate(keep);
            is_last = false;
        }

        if first_index == ni {
            self.push_and_drain(data, is_last);
        } else {
            self.merge_into_pending(first_index, data, is_last);
        }
    }

    /// Write `data` (known to start exactly at `next_index`) to the output, then drain every
    /// pending fragment that has become contiguous as a result.
    fn push_and_drain(&mut self, data: Vec<u8>, is_last: bool) {
        if !data.is_empty() {
            self.output.push(&data);
        }
        if is_last {
            self.output.close();
        }

        loop {
            let Some((&k, _)) = self.pending.iter().next() else {
                break;
            };
            let ni = self.output.bytes_pushed();
            if k > ni {
                break;
            }
            let (frag_data, frag_last) = self.pending.remove(&k).unwrap();
            if k + frag_data.len() as u64 <= ni {
                // Already fully covered; nothing to write, but its is_last still applies.
                if frag_last {
                    self.output.close();
                }
                continue;
            }
            let offset = (ni - k) as usize;
            self.output.push(&frag_data[offset..]);
            if frag_last {
                self.output.close();
            }
        }
    }

    /// Coalesce a not-yet-contiguous fragment into the pending map, merging with any stored
    /// fragment it abuts or overlaps.
    fn merge_into_pending(&mut self, first_index: u64, data: Vec<u8>, mut is_last: bool) {
        let mut start = first_index;
        let mut end = first_index + data.len() as u64;
        let mut bytes = data;

        // Left neighbor: at most one can abut/overlap, since stored fragments never touch.
        if let Some((&pk, pv)) = self.pending.range(..start).next_back() {
            let p_end = pk + pv.0.len() as u64;
            if p_end >= start {
                let (pdata, plast) = self.pending.remove(&pk).unwrap();
                let (new_start, merged) = union(pk, &pdata, start, &bytes, true);
                start = new_start;
                bytes = merged;
                is_last |= plast;
            }
        }

        // Right neighbors: consume every stored fragment whose key falls inside [start, end].
        while let Some((&nk, _)) = self.pending.range(start..=end).next() {
            let (ndata, nlast) = self.pending.remove(&nk).unwrap();
            let n_end = nk + ndata.len() as u64;
            let (new_start, merged) = union(start, &bytes, nk, &ndata, true);
            start = new_start;
            bytes = merged;
            end = end.max(n_end);
            is_last |= nlast;
        }

        self.pending.insert(start, (bytes, is_last));
    }

    /// Total bytes held in the pending map (stored bytes only, excluding gaps).
    pub fn count_bytes_pending(&self) -> usize {
        self.pending.values().map(|(data, _)| data.len()).sum()
    }

    pub fn set_error(&mut self) {
        self.output.set_error();
    }

    pub fn has_error(&self) -> bool {
        self.output.has_error()
    }

    pub fn bytes_pushed(&self) -> u64 {
        self.output.bytes_pushed()
    }

    pub fn available_capacity(&self) -> usize {
        self.output.available_capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.output.is_closed()
    }

    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }
}

/// The union of two byte ranges `[a_start, a_start+a.len())` and `[b_start, b_start+b.len())`,
/// which must overlap or abut. Returns the merged start and bytes. When `b_wins` is true, `b`'s
/// bytes take precedence in the overlap (irrelevant in practice: overlapping TCP retransmissions
/// are required to be byte-identical).
fn union(a_start: u64, a: &[u8], b_start: u64, b: &[u8], b_wins: bool) -> (u64, Vec<u8>) {
    let a_end = a_start + a.len() as u64;
    let b_end = b_start + b.len() as u64;
    let start = a_start.min(b_start);
    let end = a_end.max(b_end);
    let mut out = vec![0u8; (end - start) as usize];

    let (lo_start, lo, hi_start, hi) = if b_wins {
        (a_start, a, b_start, b)
    } else {
        (b_start, b, a_start, a)
    };

    let lo_off = (lo_start - start) as usize;
    out[lo_off..lo_off + lo.len()].copy_from_slice(lo);
    let hi_off = (hi_start - start) as usize;
    out[hi_off..hi_off + hi.len()].copy_from_slice(hi);

    (start, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn reassembler(capacity: usize) -> Reassembler {
        Reassembler::new(ByteStream::new(capacity))
    }

    fn read_all(ra: &mut Reassembler) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let chunk = ra.output().peek().to_vec();
            if chunk.is_empty() {
                break;
            }
            ra.output_mut().pop(chunk.len());
            out.extend(chunk);
        }
        out
    }

    #[test]
    fn test_in_order_delivery() {
        let mut ra = reassembler(16);
        ra.insert(0, b"abc".to_vec(), false);
        ra.insert(3, b"def".to_vec(), false);
        ra.insert(6, b"ghi".to_vec(), true);

        assert_eq!(read_all(&mut ra), b"abcdefghi");
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_out_of_order_with_overlap() {
        let mut ra = reassembler(10);
        ra.insert(3, b"defg".to_vec(), false);
        ra.insert(0, b"abcd".to_vec(), false);
        ra.insert(6, b"ghij".to_vec(), true);

        assert_eq!(read_all(&mut ra), b"abcdefghij");
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_beyond_capacity_truncates_and_clears_is_last() {
        let mut ra = reassembler(4);
        ra.insert(0, b"abcdefgh".to_vec(), true);

        assert_eq!(read_all(&mut ra), b"abcd");
        assert!(!ra.output().is_finished());
    }

    #[test]
    fn test_duplicate_insert_is_a_no_op() {
        let mut ra = reassembler(64);
        ra.insert(0, b"abcd".to_vec(), false);
        assert_eq!(ra.bytes_pushed(), 4);

        ra.insert(0, b"abcd".to_vec(), false);
        assert_eq!(ra.bytes_pushed(), 4);
        assert_eq!(ra.count_bytes_pending(), 0);
    }

    #[test]
    fn test_pending_fragments_merge_left_and_right() {
        let mut ra = reassembler(10);
        ra.insert(1, b"b".to_vec(), false);
        assert_eq!(ra.count_bytes_pending(), 1);

        ra.insert(3, b"d".to_vec(), false);
        assert_eq!(ra.count_bytes_pending(), 2);

        // abuts both neighbors and should merge all three into one pending run
        ra.insert(2, b"c".to_vec(), false);
        assert_eq!(ra.count_bytes_pending(), 3);

        ra.insert(0, b"a".to_vec(), false);
        assert_eq!(read_all(&mut ra), b"abcd");
        assert_eq!(ra.count_bytes_pending(), 0);
    }

    #[test]
    fn test_pending_fragments_separated_by_real_gap_do_not_merge() {
        let mut ra = reassembler(10);
        ra.insert(1, b"bc".to_vec(), false);
        // a genuine one-byte gap at absolute index 3 separates these two fragments
        ra.insert(4, b"e".to_vec(), false);
        assert_eq!(ra.count_bytes_pending(), 3);

        ra.insert(0, b"a".to_vec(), false);
        // byte index 3 was never supplied, so it must still be withheld
        assert_eq!(read_all(&mut ra), b"abc");
        assert_eq!(ra.count_bytes_pending(), 1);

        ra.insert(3, b"d".to_vec(), false);
        assert_eq!(read_all(&mut ra), b"de");
    }

    #[test]
    fn test_empty_final_fragment_at_next_index_closes_stream() {
        let mut ra = reassembler(10);
        ra.insert(0, b"ab".to_vec(), false);
        assert_eq!(read_all(&mut ra), b"ab");
        assert!(!ra.output().is_finished());

        // a zero-length fragment exactly at next_index, marked last, closes the stream
        ra.insert(2, Vec::new(), true);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_stale_empty_fragment_before_next_index_still_closes() {
        let mut ra = reassembler(10);
        ra.insert(0, b"ab".to_vec(), false);
        read_all(&mut ra);

        // first_index < next_index, data trims to empty, but is_last is honored
        ra.insert(0, Vec::new(), true);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_boundedness_holds_across_random_insertions() {
        let mut ra = reassembler(64);
        let data = b"abcdefghijklmnop";
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let i = rng.gen_range(0..data.len());
            let j = rng.gen_range(i..=data.len());
            ra.insert(i as u64, data[i..j].to_vec(), false);
            assert!(ra.count_bytes_pending() + ra.output().bytes_buffered() <= 64);
        }

        ra.insert(0, data.to_vec(), true);
        assert_eq!(read_all(&mut ra), data);
        assert!(ra.output().is_finished());
    }

    #[test]
    fn test_reconstruction_from_random_partition() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let s: Vec<u8> = (0..64u32).map(|i| (i % 251) as u8).collect();
            let mut cuts: Vec<usize> = (0..6).map(|_| rng.gen_range(0..=s.len())).collect();
            cuts.sort_unstable();
            cuts.dedup();
            cuts.push(s.len());

            let mut fragments = Vec::new();
            let mut start = 0usize;
            for &cut in &cuts {
                if cut > start {
                    fragments.push((start, s[start..cut].to_vec()));
                    start = cut;
                }
            }
            // permute delivery order
            for i in (1..fragments.len()).rev() {
                let j = rng.gen_range(0..=i);
                fragments.swap(i, j);
            }

            let mut ra = reassembler(s.len());
            let last_start = fragments.len() - 1;
            for (idx, (offset, frag)) in fragments.into_iter().enumerate() {
                ra.insert(offset as u64, frag, idx == last_start);
            }

            assert_eq!(read_all(&mut ra), s);
            assert!(ra.output().is_finished());
        }
    }
}
