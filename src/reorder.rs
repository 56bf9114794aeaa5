//! Inter-frame transpose for batched lockstep decoding
//!
//! Pure data movement, no arithmetic: [`apply`] gathers the `k`-th sample of every frame in a
//! batch into one contiguous batch-major slot, so that a single lane operation can later process
//! the same trellis step of all frames simultaneously; [`apply_rev`] is the inverse.

/// Gathers element `k` of every source frame into `dst[k * frames.len() + f]`.
///
/// # Parameters
///
/// - `frames`: Source frames, all of the same length.
///
/// - `dst`: Destination buffer of length `frames[0].len() * frames.len()`.
///
/// # Panics
///
/// Panics if the frames do not all have the same length or if `dst` has the wrong length.
/// With a single frame this is an identity copy.
pub fn apply<T: Copy>(frames: &[&[T]], dst: &mut [T]) {
    let num_frames = frames.len();
    let frame_len = frames[0].len();
    assert!(frames.iter().all(|frame| frame.len() == frame_len));
    assert_eq!(dst.len(), frame_len * num_frames);
    if num_frames == 1 {
        dst.copy_from_slice(frames[0]);
        return;
    }
    for (f, frame) in frames.iter().enumerate() {
        for (k, &sample) in frame.iter().enumerate() {
            dst[k * num_frames + f] = sample;
        }
    }
}

/// Scatters `src[k * frames.len() + f]` back to element `k` of destination frame `f`.
///
/// # Parameters
///
/// - `src`: Batch-major source buffer of length `frames[0].len() * frames.len()`.
///
/// - `frames`: Destination frames, all of the same length.
///
/// # Panics
///
/// Panics if the frames do not all have the same length or if `src` has the wrong length.
/// With a single frame this is an identity copy.
pub fn apply_rev<T: Copy>(src: &[T], frames: &mut [&mut [T]]) {
    let num_frames = frames.len();
    let frame_len = frames[0].len();
    assert!(frames.iter().all(|frame| frame.len() == frame_len));
    assert_eq!(src.len(), frame_len * num_frames);
    if num_frames == 1 {
        frames[0].copy_from_slice(src);
        return;
    }
    for (f, frame) in frames.iter_mut().enumerate() {
        for (k, sample) in frame.iter_mut().enumerate() {
            *sample = src[k * num_frames + f];
        }
    }
}

#[cfg(test)]
mod tests_of_reorder {
    use super::*;

    fn round_trip(num_frames: usize, frame_len: usize) {
        let frames: Vec<Vec<usize>> = (0 .. num_frames)
            .map(|f| (0 .. frame_len).map(|k| 100 * f + k).collect())
            .collect();
        let frame_refs: Vec<&[usize]> = frames.iter().map(Vec::as_slice).collect();
        let mut batched = vec![0; num_frames * frame_len];
        apply(&frame_refs, &mut batched);
        for (f, frame) in frames.iter().enumerate() {
            for (k, &sample) in frame.iter().enumerate() {
                assert_eq!(batched[k * num_frames + f], sample);
            }
        }
        let mut restored: Vec<Vec<usize>> = vec![vec![0; frame_len]; num_frames];
        let mut restored_refs: Vec<&mut [usize]> =
            restored.iter_mut().map(Vec::as_mut_slice).collect();
        apply_rev(&batched, &mut restored_refs);
        assert_eq!(restored, frames);
    }

    #[test]
    fn test_round_trip_single_frame() {
        round_trip(1, 7);
    }

    #[test]
    fn test_round_trip_two_frames() {
        round_trip(2, 5);
    }

    #[test]
    fn test_round_trip_three_frames() {
        round_trip(3, 4);
    }

    #[test]
    fn test_round_trip_four_frames() {
        round_trip(4, 6);
    }

    #[test]
    fn test_apply_batch_major_order() {
        let top = [1, 2, 3];
        let bottom = [4, 5, 6];
        let mut batched = [0; 6];
        apply(&[&top, &bottom], &mut batched);
        assert_eq!(batched, [1, 4, 2, 5, 3, 6]);
    }
}
