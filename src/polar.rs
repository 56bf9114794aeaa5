//! Successive-cancellation decoder and encoder for polar codes

use std::sync::Arc;

use crate::{Bit, Error, Llr};

/// Per-node buffers of the decode tree
#[derive(Debug)]
struct NodeContents<R: Llr> {
    /// LLR values for the node's subtree, length = subtree leaf count
    lambda: Vec<R>,
    /// Partial sums for the node's subtree, same length
    s: Vec<Bit>,
    /// Whether this node is a frozen leaf
    is_frozen: bool,
}

/// Successive-cancellation decoder for a polar code of length `N = 2^m`
///
/// The decode tree is a perfect binary tree of depth `m`, stored as an arena in heap order: the
/// root is node `0` and the children of node `n` are nodes `2n + 1` and `2n + 2`, so the leaves
/// occupy the last `N` slots in natural left-to-right order. Each node owns an LLR buffer and a
/// partial-sum buffer sized to its subtree leaf count; the tree topology and the buffers are
/// allocated once at construction and reused by every decode call.
///
/// Decoding follows the three-phase protocol of the trellis decoder, with an explicit frame index
/// for batch orchestration by the caller: [`load`](Self::load) copies one frame's channel LLRs
/// into the root, [`decode`](Self::decode) runs the recursion, and [`store`](Self::store) appends
/// the information-bit decisions (frozen leaves carry no output). The fused
/// [`decode_siho`](Self::decode_siho) chains all three.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use sisodec::{polar, Bit, PolarDecoder};
/// use Bit::{One, Zero};
///
/// let frozen_bits: Arc<[bool]> = Arc::from([true, true, false, false].as_slice());
/// let info_bits = [One, Zero];
/// let code_bits = polar::encode(&info_bits, &frozen_bits)?;
/// // Noiseless BPSK: bit Zero maps to +1.0, bit One to -1.0.
/// let y_n: Vec<f64> = code_bits
///     .iter()
///     .map(|&b| if b == Zero { 1.0 } else { -1.0 })
///     .collect();
/// let mut decoder = PolarDecoder::new(2, 4, frozen_bits, 1);
/// let mut decisions = [Zero; 2];
/// decoder.decode_siho(&y_n, &mut decisions, 0)?;
/// assert_eq!(decisions, info_bits);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct PolarDecoder<R: Llr> {
    /// Number of information bits per frame
    num_info_bits: usize,
    /// Code length (number of leaves)
    code_len: usize,
    /// Tree depth, `log2(code_len)`
    depth: usize,
    /// Frozen-position flags, shared with the code-construction collaborator
    frozen_bits: Arc<[bool]>,
    /// Number of frames per batched caller buffer
    num_frames: usize,
    /// Node arena in heap order
    tree: Vec<NodeContents<R>>,
}

impl<R: Llr> PolarDecoder<R> {
    /// Returns an SC decoder for the given code.
    ///
    /// # Parameters
    ///
    /// - `num_info_bits`: Number of information bits `K` per frame.
    ///
    /// - `code_len`: Code length `N`; must be a power of two.
    ///
    /// - `frozen_bits`: Frozen-position flags of length `N`, `true` marking a frozen position.
    ///   Referenced, not copied; exactly `N - K` positions must be frozen.
    ///
    /// - `num_frames`: Number of frames in the caller's batched buffers.
    ///
    /// # Panics
    ///
    /// Panics if `code_len` is not a power of two, if `frozen_bits.len() != code_len`, if the
    /// number of non-frozen positions is not `num_info_bits`, or if `num_frames` is zero. These
    /// are configuration bugs, not runtime data errors.
    #[must_use]
    pub fn new(
        num_info_bits: usize,
        code_len: usize,
        frozen_bits: Arc<[bool]>,
        num_frames: usize,
    ) -> Self {
        assert!(
            code_len.is_power_of_two(),
            "Polar code length must be a power of two (found {code_len})",
        );
        assert_eq!(
            frozen_bits.len(),
            code_len,
            "Frozen-bit set length must equal the code length",
        );
        let num_non_frozen = frozen_bits.iter().filter(|&&frozen| !frozen).count();
        assert_eq!(
            num_non_frozen, num_info_bits,
            "Number of non-frozen positions must equal the number of information bits",
        );
        assert!(num_frames > 0, "Number of frames cannot be zero");
        let depth = code_len.trailing_zeros() as usize;
        let mut tree = Vec::with_capacity(2 * code_len - 1);
        for node in 0 .. 2 * code_len - 1 {
            let node_depth = (usize::BITS - (node + 1).leading_zeros() - 1) as usize;
            let size = code_len >> node_depth;
            tree.push(NodeContents {
                lambda: vec![R::ZERO; size],
                s: vec![Bit::Zero; size],
                is_frozen: size == 1 && frozen_bits[node - (code_len - 1)],
            });
        }
        Self {
            num_info_bits,
            code_len,
            depth,
            frozen_bits,
            num_frames,
            tree,
        }
    }

    /// Returns the code length `N`.
    #[must_use]
    pub fn code_len(&self) -> usize {
        self.code_len
    }

    /// Returns the tree depth `log2(N)`.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Copies one frame's channel LLR values into the root of the decode tree.
    ///
    /// # Parameters
    ///
    /// - `y_n`: Channel LLR values for the whole batch, `N * num_frames` of them, frame-major.
    ///
    /// - `frame_id`: Index of the frame to load.
    ///
    /// # Errors
    ///
    /// Returns an error if `y_n.len()` does not equal `N * num_frames` or if `frame_id` is out
    /// of range.
    pub fn load(&mut self, y_n: &[R], frame_id: usize) -> Result<(), Error> {
        let expected_len = self.code_len * self.num_frames;
        if y_n.len() != expected_len {
            return Err(Error::InvalidInput(format!(
                "Wrong number of channel LLR values (expected {expected_len}, found {})",
                y_n.len()
            )));
        }
        if frame_id >= self.num_frames {
            return Err(Error::InvalidInput(format!(
                "Frame index {frame_id} out of range (number of frames is {})",
                self.num_frames
            )));
        }
        self.tree[0]
            .lambda
            .copy_from_slice(&y_n[frame_id * self.code_len .. (frame_id + 1) * self.code_len]);
        Ok(())
    }

    /// Runs the successive-cancellation recursion over the loaded LLR values.
    ///
    /// Partial sums are reset first; the per-node LLR buffers need no reset since the top-down
    /// propagation fully overwrites each one before it is read. Must be called after
    /// [`load`](Self::load).
    pub fn decode(&mut self) {
        self.reset_partial_sums();
        self.recursive_decode(0);
    }

    /// Writes one frame's information-bit decisions in caller layout.
    ///
    /// Walks the leaves left to right, appending the decision of every non-frozen leaf; frozen
    /// leaves are skipped. Must be called after [`decode`](Self::decode).
    ///
    /// # Parameters
    ///
    /// - `v_k`: Destination for the whole batch's decisions, `K * num_frames` of them,
    ///   frame-major.
    ///
    /// - `frame_id`: Index of the frame to store.
    ///
    /// # Errors
    ///
    /// Returns an error if `v_k.len()` does not equal `K * num_frames` or if `frame_id` is out
    /// of range.
    pub fn store(&self, v_k: &mut [Bit], frame_id: usize) -> Result<(), Error> {
        let expected_len = self.num_info_bits * self.num_frames;
        if v_k.len() != expected_len {
            return Err(Error::InvalidInput(format!(
                "Wrong number of bit decisions (expected {expected_len}, found {})",
                v_k.len()
            )));
        }
        if frame_id >= self.num_frames {
            return Err(Error::InvalidInput(format!(
                "Frame index {frame_id} out of range (number of frames is {})",
                self.num_frames
            )));
        }
        let first_leaf = self.code_len - 1;
        let mut k = frame_id * self.num_info_bits;
        for leaf_pos in 0 .. self.code_len {
            if !self.frozen_bits[leaf_pos] {
                v_k[k] = self.tree[first_leaf + leaf_pos].s[0];
                k += 1;
            }
        }
        Ok(())
    }

    /// Loads, decodes and stores one frame of a batched buffer pair.
    ///
    /// # Parameters
    ///
    /// - `y_n`: Channel LLR values for the whole batch, `N * num_frames` of them, frame-major.
    ///
    /// - `v_k`: Destination for the whole batch's decisions, `K * num_frames` of them,
    ///   frame-major.
    ///
    /// - `frame_id`: Index of the frame to decode.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer has the wrong length or if `frame_id` is out of range.
    pub fn decode_siho(&mut self, y_n: &[R], v_k: &mut [Bit], frame_id: usize) -> Result<(), Error> {
        self.load(y_n, frame_id)?;
        self.decode();
        self.store(v_k, frame_id)
    }

    /// Resets every partial-sum buffer to zero.
    fn reset_partial_sums(&mut self) {
        for node in &mut self.tree {
            node.s.fill(Bit::Zero);
        }
    }

    /// Decodes the subtree rooted at `node`: pre-order LLR propagation through `f` and `g`,
    /// post-order partial-sum combination through `h`.
    fn recursive_decode(&mut self, node: usize) {
        let size = self.tree[node].lambda.len();
        if size == 1 {
            let contents = &mut self.tree[node];
            contents.s[0] = if contents.is_frozen {
                Bit::Zero
            } else {
                contents.lambda[0].to_hard_bit()
            };
            return;
        }
        let half = size / 2;
        let left = 2 * node + 1;
        let right = 2 * node + 2;
        {
            let (head, tail) = self.tree.split_at_mut(left);
            let parent = &head[node];
            let left_node = &mut tail[0];
            for i in 0 .. half {
                left_node.lambda[i] = f_llr(parent.lambda[i], parent.lambda[half + i]);
            }
        }
        self.recursive_decode(left);
        {
            let (head, tail) = self.tree.split_at_mut(left);
            let parent = &head[node];
            let (left_node, right_node) = tail.split_at_mut(1);
            for i in 0 .. half {
                right_node[0].lambda[i] = g_llr(
                    parent.lambda[i],
                    parent.lambda[half + i],
                    left_node[0].s[i],
                );
            }
        }
        self.recursive_decode(right);
        {
            let (head, tail) = self.tree.split_at_mut(left);
            let parent = &mut head[node];
            let (left_node, right_node) = tail.split_at(1);
            for i in 0 .. half {
                parent.s[i] = left_node[0].s[i] ^ right_node[0].s[i];
                parent.s[half + i] = right_node[0].s[i];
            }
        }
    }
}

/// Polar `f` function: min-magnitude combination with sign product.
fn f_llr<R: Llr>(a: R, b: R) -> R {
    let magnitude = a.abs_val().min_val(b.abs_val());
    if a.is_negative() ^ b.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Polar `g` function: partial-sum-steered sum or difference.
fn g_llr<R: Llr>(a: R, b: R, s: Bit) -> R {
    match s {
        Bit::Zero => b.add_sat(a),
        Bit::One => b.sub_sat(a),
    }
}

/// Returns code bits from the polar encoder for given information bits.
///
/// The information bits are expanded into the non-frozen positions (frozen positions carry
/// `Zero`), then the in-place butterfly XOR transform is applied; the result matches the
/// decoder's partial-sum combination rule.
///
/// # Parameters
///
/// - `info_bits`: Information bits to be encoded; must number exactly the non-frozen positions.
///
/// - `frozen_bits`: Frozen-position flags; the length is the code length `N` and must be a power
///   of two.
///
/// # Errors
///
/// Returns an error if `info_bits.len()` does not equal the number of non-frozen positions.
///
/// # Panics
///
/// Panics if `frozen_bits.len()` is not a power of two.
pub fn encode(info_bits: &[Bit], frozen_bits: &[bool]) -> Result<Vec<Bit>, Error> {
    let code_len = frozen_bits.len();
    assert!(
        code_len.is_power_of_two(),
        "Polar code length must be a power of two (found {code_len})",
    );
    let num_non_frozen = frozen_bits.iter().filter(|&&frozen| !frozen).count();
    if info_bits.len() != num_non_frozen {
        return Err(Error::InvalidInput(format!(
            "Wrong number of information bits (expected {num_non_frozen}, found {})",
            info_bits.len()
        )));
    }
    let mut code_bits = vec![Bit::Zero; code_len];
    let mut next_info = info_bits.iter().copied();
    for (slot, &frozen) in code_bits.iter_mut().zip(frozen_bits) {
        if !frozen {
            *slot = next_info.next().unwrap_or(Bit::Zero);
        }
    }
    let mut half = 1;
    while half < code_len {
        let mut start = 0;
        while start < code_len {
            for i in start .. start + half {
                code_bits[i] = code_bits[i] ^ code_bits[i + half];
            }
            start += 2 * half;
        }
        half *= 2;
    }
    Ok(code_bits)
}


#[cfg(test)]
mod tests_of_decoder {
    use super::*;
    use crate::utils;
    use Bit::{One, Zero};

    /// Maps code bits to noiseless BPSK LLR values.
    fn noiseless_llr(code_bits: &[Bit]) -> Vec<f64> {
        code_bits
            .iter()
            .map(|&b| if b == Zero { 1.5 } else { -1.5 })
            .collect()
    }

    /// Frozen set with a fixed arbitrary pattern of given rate.
    fn every_other_frozen(code_len: usize) -> Arc<[bool]> {
        (0 .. code_len).map(|i| i % 2 == 0).collect()
    }

    #[test]
    fn test_tree_shape() {
        let decoder: PolarDecoder<f64> = PolarDecoder::new(4, 8, every_other_frozen(8), 1);
        assert_eq!(decoder.code_len(), 8);
        assert_eq!(decoder.depth(), 3);
        assert_eq!(decoder.tree.len(), 15);
        assert_eq!(decoder.tree[0].lambda.len(), 8);
        assert_eq!(decoder.tree[1].lambda.len(), 4);
        assert_eq!(decoder.tree[3].lambda.len(), 2);
        assert_eq!(decoder.tree[7].lambda.len(), 1);
        assert!(decoder.tree[7].is_frozen);
        assert!(!decoder.tree[8].is_frozen);
    }

    #[test]
    fn test_noiseless_round_trip() {
        let code_len = 64;
        let frozen_bits = every_other_frozen(code_len);
        let info_bits = utils::random_bits(code_len / 2);
        let code_bits = encode(&info_bits, &frozen_bits).unwrap();
        let mut decoder = PolarDecoder::new(code_len / 2, code_len, frozen_bits, 1);
        let mut decisions = vec![Zero; code_len / 2];
        decoder
            .decode_siho(&noiseless_llr(&code_bits), &mut decisions, 0)
            .unwrap();
        assert_eq!(decisions, info_bits);
    }

    #[test]
    fn test_all_positions_frozen() {
        let code_len = 8;
        let frozen_bits: Arc<[bool]> = (0 .. code_len).map(|_| true).collect();
        let code_bits = encode(&[], &frozen_bits).unwrap();
        assert_eq!(code_bits, vec![Zero; code_len]);
        let mut decoder = PolarDecoder::new(0, code_len, frozen_bits, 1);
        let mut decisions: Vec<Bit> = Vec::new();
        decoder
            .decode_siho(&noiseless_llr(&code_bits), &mut decisions, 0)
            .unwrap();
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_no_positions_frozen() {
        let code_len = 16;
        let frozen_bits: Arc<[bool]> = (0 .. code_len).map(|_| false).collect();
        let info_bits = utils::random_bits(code_len);
        let code_bits = encode(&info_bits, &frozen_bits).unwrap();
        let mut decoder = PolarDecoder::new(code_len, code_len, frozen_bits, 1);
        let mut decisions = vec![Zero; code_len];
        decoder
            .decode_siho(&noiseless_llr(&code_bits), &mut decisions, 0)
            .unwrap();
        assert_eq!(decisions.len(), code_len);
        assert_eq!(decisions, info_bits);
    }

    #[test]
    fn test_multi_frame_decode() {
        let code_len = 32;
        let num_frames = 2;
        let frozen_bits = every_other_frozen(code_len);
        let num_info_bits = code_len / 2;
        let all_info_bits: Vec<Vec<Bit>> = (0 .. num_frames)
            .map(|_| utils::random_bits(num_info_bits))
            .collect();
        let y_n: Vec<f64> = all_info_bits
            .iter()
            .flat_map(|info_bits| {
                noiseless_llr(&encode(info_bits, &frozen_bits).unwrap())
            })
            .collect();
        let mut decoder = PolarDecoder::new(num_info_bits, code_len, frozen_bits, num_frames);
        let mut decisions = vec![Zero; num_info_bits * num_frames];
        for frame_id in 0 .. num_frames {
            decoder.decode_siho(&y_n, &mut decisions, frame_id).unwrap();
        }
        for (f, info_bits) in all_info_bits.iter().enumerate() {
            assert_eq!(
                &decisions[f * num_info_bits .. (f + 1) * num_info_bits],
                info_bits.as_slice()
            );
        }
    }

    #[test]
    fn test_size_and_frame_checks() {
        let mut decoder: PolarDecoder<f64> = PolarDecoder::new(4, 8, every_other_frozen(8), 2);
        assert!(decoder.load(&[0.0; 8], 0).is_err());
        assert!(decoder.load(&[0.0; 16], 2).is_err());
        decoder.load(&[1.0; 16], 1).unwrap();
        decoder.decode();
        let mut too_short = vec![Zero; 4];
        assert!(decoder.store(&mut too_short, 1).is_err());
        let mut decisions = vec![Zero; 8];
        assert!(decoder.store(&mut decisions, 2).is_err());
        decoder.store(&mut decisions, 1).unwrap();
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_bad_code_length() {
        let frozen_bits: Arc<[bool]> = Arc::from([true, false, false].as_slice());
        let _: PolarDecoder<f64> = PolarDecoder::new(2, 3, frozen_bits, 1);
    }

    #[test]
    #[should_panic(expected = "non-frozen positions")]
    fn test_rejects_bad_info_bit_count() {
        let _: PolarDecoder<f64> = PolarDecoder::new(3, 8, every_other_frozen(8), 1);
    }
}
