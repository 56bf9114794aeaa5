//! Soft-input/soft-output BCJR decoder for RSC codes over a trellis

use itertools::izip;
use serde::{Deserialize, Serialize};

use crate::trellis::Transition;
use crate::{reorder, Bit, DecodingAlgo, Error, Llr, Trellis};

/// Slack elements appended to every sample buffer so that a whole lane group read at the last
/// trellis step stays in bounds.
const LANE_SLACK: usize = 8;

/// Enumeration of channel sample layouts accepted by [`BcjrDecoder::load`]
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum FrameLayout {
    /// Each frame is contiguous: `K` systematic samples, `K` parity samples, then the tail
    /// samples split into a systematic half and a parity half.
    Buffered,
    /// Systematic and parity samples alternate pairwise within each frame, one pair per trellis
    /// step, tail steps included.
    Interleaved,
}

/// Enumeration of trellis termination policies
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum Termination {
    /// Tail bits drive the encoder back to the all-zero state; the backward recursion starts
    /// from that known state.
    Tail,
    /// No tail steps; the backward recursion starts uniform over all states.
    Truncated,
}

/// Enumeration of metric engine implementations
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum EngineKind {
    /// Sequential tier: one frame at a time through the full recursion.
    Seq,
    /// Lockstep tier: every frame of the batch advances through each trellis step together.
    Lockstep,
}

/// Branch/forward/backward metric computation over the loaded sample streams.
///
/// One implementation exists per performance tier; all implementations must produce identical
/// results on identical inputs. The three operations must be invoked in order: gamma, alpha,
/// beta/extrinsic.
pub trait MetricEngine<R: Llr>: std::fmt::Debug + Send {
    /// Fills the branch-metric planes from the batch-major systematic and parity streams.
    fn compute_gamma(&mut self, sys: &[R], par: &[R]);

    /// Runs the forward recursion, recentering on the all-zero state at every step.
    fn compute_alpha(&mut self);

    /// Runs the backward recursion, then writes the extrinsic LLR for every information bit.
    fn compute_beta_ext(&mut self, sys: &[R], ext: &mut [R]);
}

/// Scratch tables and dimensions shared by the metric engine tiers
#[derive(Debug)]
struct MetricTables<R: Llr> {
    /// Number of trellis states
    num_states: usize,
    /// Number of information bits per frame
    num_info_bits: usize,
    /// Number of trellis steps per frame (information plus tail)
    num_steps: usize,
    /// Number of frames advanced in lockstep (batch-major lane count)
    lanes: usize,
    /// Termination policy
    termination: Termination,
    /// Metric combination rule
    algo: DecodingAlgo,
    /// Transition table, one entry per (state, input bit)
    transitions: Vec<[Transition; 2]>,
    /// Branch-metric plane selector per (state, input bit)
    gamma_plane: Vec<[usize; 2]>,
    /// Branch-metric sign selector per (state, input bit)
    gamma_negate: Vec<[bool; 2]>,
    /// Forward state metrics, `(num_steps + 1) * num_states * lanes`
    alpha: Vec<R>,
    /// Backward state metrics, `(num_steps + 1) * num_states * lanes`
    beta: Vec<R>,
    /// Branch metric planes, `num_steps * lanes` each: `(sys + par) / 2` and `(sys - par) / 2`
    gamma: [Vec<R>; 2],
    /// Per-lane recentering scratch
    center: Vec<R>,
}

impl<R: Llr> MetricTables<R> {
    /// Returns scratch tables sized for one batch.
    fn new(
        trellis: &Trellis,
        num_info_bits: usize,
        num_tail_steps: usize,
        lanes: usize,
        termination: Termination,
        algo: DecodingAlgo,
    ) -> Self {
        let num_states = trellis.num_states();
        let num_steps = num_info_bits + num_tail_steps;
        let transitions: Vec<[Transition; 2]> = (0 .. num_states)
            .map(|state| {
                [
                    trellis.transition(state, Bit::Zero),
                    trellis.transition(state, Bit::One),
                ]
            })
            .collect();
        // A transition labelled (s, p) has branch metric `sign * gamma[s XOR p]` with a negative
        // sign exactly when the systematic label is One.
        let gamma_plane: Vec<[usize; 2]> = transitions
            .iter()
            .map(|per_input| {
                [
                    (per_input[0].sys ^ per_input[0].par) as usize,
                    (per_input[1].sys ^ per_input[1].par) as usize,
                ]
            })
            .collect();
        let gamma_negate: Vec<[bool; 2]> = transitions
            .iter()
            .map(|per_input| {
                [
                    per_input[0].sys == Bit::One,
                    per_input[1].sys == Bit::One,
                ]
            })
            .collect();
        Self {
            num_states,
            num_info_bits,
            num_steps,
            lanes,
            termination,
            algo,
            transitions,
            gamma_plane,
            gamma_negate,
            alpha: vec![R::ZERO; (num_steps + 1) * num_states * lanes],
            beta: vec![R::ZERO; (num_steps + 1) * num_states * lanes],
            gamma: [
                vec![R::ZERO; num_steps * lanes + LANE_SLACK],
                vec![R::ZERO; num_steps * lanes + LANE_SLACK],
            ],
            center: vec![R::ZERO; lanes],
        }
    }

    /// Returns the index of a state metric at (trellis step, state, lane).
    fn midx(&self, step: usize, state: usize, lane: usize) -> usize {
        (step * self.num_states + state) * self.lanes + lane
    }

    /// Returns the signed branch metric of a transition at (trellis step, lane).
    fn gamma_at(&self, step: usize, state: usize, input: usize, lane: usize) -> R {
        let value = self.gamma[self.gamma_plane[state][input]][step * self.lanes + lane];
        if self.gamma_negate[state][input] {
            -value
        } else {
            value
        }
    }

    /// Fills both branch-metric planes; elementwise over steps and lanes.
    fn fill_gamma(&mut self, sys: &[R], par: &[R]) {
        let count = self.num_steps * self.lanes;
        for (g0, &s, &p) in izip!(&mut self.gamma[0][.. count], &sys[.. count], &par[.. count]) {
            *g0 = s.add_sat(p).div2();
        }
        for (g1, &s, &p) in izip!(&mut self.gamma[1][.. count], &sys[.. count], &par[.. count]) {
            *g1 = s.sub_sat(p).div2();
        }
    }

    /// Writes the forward boundary condition: all-zero state at metric zero.
    fn init_alpha_boundary(&mut self) {
        for lane in 0 .. self.lanes {
            let idx = self.midx(0, 0, lane);
            self.alpha[idx] = R::ZERO;
        }
        for state in 1 .. self.num_states {
            for lane in 0 .. self.lanes {
                let idx = self.midx(0, state, lane);
                self.alpha[idx] = R::NEG_SATURATION;
            }
        }
    }

    /// Writes the backward boundary condition per the termination policy.
    fn init_beta_boundary(&mut self) {
        let last = self.num_steps;
        for state in 0 .. self.num_states {
            let boundary = match self.termination {
                Termination::Tail if state != 0 => R::NEG_SATURATION,
                Termination::Tail | Termination::Truncated => R::ZERO,
            };
            for lane in 0 .. self.lanes {
                let idx = self.midx(last, state, lane);
                self.beta[idx] = boundary;
            }
        }
    }

    /// Writes the extrinsic LLR for one information bit and lane from the surrounding metrics.
    fn write_extrinsic(&self, step: usize, lane: usize, sys: &[R], ext: &mut [R]) {
        let mut metric_for_zero = R::NEG_SATURATION;
        let mut metric_for_one = R::NEG_SATURATION;
        for state in 0 .. self.num_states {
            for input in 0 .. 2 {
                let next = self.transitions[state][input].next;
                let cand = self.alpha[self.midx(step, state, lane)]
                    .add_sat(self.gamma_at(step, state, input, lane))
                    .add_sat(self.beta[self.midx(step + 1, next, lane)]);
                if input == 0 {
                    metric_for_zero = max_star(metric_for_zero, cand, self.algo);
                } else {
                    metric_for_one = max_star(metric_for_one, cand, self.algo);
                }
            }
        }
        let slot = step * self.lanes + lane;
        // The systematic contribution rides along in gamma; removing it leaves the extrinsic part.
        ext[slot] = metric_for_zero.sub_sat(metric_for_one).sub_sat(sys[slot]);
    }
}

/// Returns the maxstar of two metrics for given decoding algorithm.
fn max_star<R: Llr>(x: R, y: R, algo: DecodingAlgo) -> R {
    let max_val = x.max_val(y);
    match algo {
        DecodingAlgo::MaxLogMAP => max_val,
        DecodingAlgo::LinearLogMAP => {
            max_val.add_sat(R::max_star_linear_correction(x.sub_sat(y).abs_val()))
        }
        DecodingAlgo::LogMAP => {
            max_val.add_sat(R::max_star_exact_correction(x.sub_sat(y).abs_val()))
        }
    }
}

/// Sequential metric engine: each frame of the batch runs the full recursion on its own lane.
#[derive(Debug)]
struct SeqEngine<R: Llr> {
    tables: MetricTables<R>,
}

impl<R: Llr> MetricEngine<R> for SeqEngine<R> {
    fn compute_gamma(&mut self, sys: &[R], par: &[R]) {
        self.tables.fill_gamma(sys, par);
    }

    fn compute_alpha(&mut self) {
        let t = &mut self.tables;
        t.init_alpha_boundary();
        for lane in 0 .. t.lanes {
            for step in 0 .. t.num_steps {
                for state in 0 .. t.num_states {
                    let idx = t.midx(step + 1, state, lane);
                    t.alpha[idx] = R::NEG_SATURATION;
                }
                for state in 0 .. t.num_states {
                    for input in 0 .. 2 {
                        let next = t.transitions[state][input].next;
                        let cand = t.alpha[t.midx(step, state, lane)]
                            .add_sat(t.gamma_at(step, state, input, lane));
                        let slot = t.midx(step + 1, next, lane);
                        t.alpha[slot] = max_star(t.alpha[slot], cand, t.algo);
                    }
                }
                let center = t.alpha[t.midx(step + 1, 0, lane)];
                for state in 0 .. t.num_states {
                    let slot = t.midx(step + 1, state, lane);
                    t.alpha[slot] = t.alpha[slot].sub_sat(center);
                }
            }
        }
    }

    fn compute_beta_ext(&mut self, sys: &[R], ext: &mut [R]) {
        let t = &mut self.tables;
        t.init_beta_boundary();
        for lane in 0 .. t.lanes {
            for step in (0 .. t.num_steps).rev() {
                for state in 0 .. t.num_states {
                    let mut metric = R::NEG_SATURATION;
                    for input in 0 .. 2 {
                        let next = t.transitions[state][input].next;
                        let cand = t.gamma_at(step, state, input, lane)
                            .add_sat(t.beta[t.midx(step + 1, next, lane)]);
                        metric = max_star(metric, cand, t.algo);
                    }
                    let idx = t.midx(step, state, lane);
                    t.beta[idx] = metric;
                }
                let center = t.beta[t.midx(step, 0, lane)];
                for state in 0 .. t.num_states {
                    let slot = t.midx(step, state, lane);
                    t.beta[slot] = t.beta[slot].sub_sat(center);
                }
            }
            for step in 0 .. t.num_info_bits {
                t.write_extrinsic(step, lane, sys, ext);
            }
        }
    }
}

/// Lockstep metric engine: all frames of the batch advance through each trellis step together,
/// with the lane loop innermost over the batch-major tables.
#[derive(Debug)]
struct LockstepEngine<R: Llr> {
    tables: MetricTables<R>,
}

impl<R: Llr> MetricEngine<R> for LockstepEngine<R> {
    fn compute_gamma(&mut self, sys: &[R], par: &[R]) {
        self.tables.fill_gamma(sys, par);
    }

    fn compute_alpha(&mut self) {
        let t = &mut self.tables;
        t.init_alpha_boundary();
        for step in 0 .. t.num_steps {
            for state in 0 .. t.num_states {
                for lane in 0 .. t.lanes {
                    let idx = t.midx(step + 1, state, lane);
                    t.alpha[idx] = R::NEG_SATURATION;
                }
            }
            for state in 0 .. t.num_states {
                for input in 0 .. 2 {
                    let next = t.transitions[state][input].next;
                    for lane in 0 .. t.lanes {
                        let cand = t.alpha[t.midx(step, state, lane)]
                            .add_sat(t.gamma_at(step, state, input, lane));
                        let slot = t.midx(step + 1, next, lane);
                        t.alpha[slot] = max_star(t.alpha[slot], cand, t.algo);
                    }
                }
            }
            for lane in 0 .. t.lanes {
                t.center[lane] = t.alpha[t.midx(step + 1, 0, lane)];
            }
            for state in 0 .. t.num_states {
                for lane in 0 .. t.lanes {
                    let slot = t.midx(step + 1, state, lane);
                    t.alpha[slot] = t.alpha[slot].sub_sat(t.center[lane]);
                }
            }
        }
    }

    fn compute_beta_ext(&mut self, sys: &[R], ext: &mut [R]) {
        let t = &mut self.tables;
        t.init_beta_boundary();
        for step in (0 .. t.num_steps).rev() {
            for state in 0 .. t.num_states {
                for lane in 0 .. t.lanes {
                    let mut metric = R::NEG_SATURATION;
                    for input in 0 .. 2 {
                        let next = t.transitions[state][input].next;
                        let cand = t.gamma_at(step, state, input, lane)
                            .add_sat(t.beta[t.midx(step + 1, next, lane)]);
                        metric = max_star(metric, cand, t.algo);
                    }
                    let idx = t.midx(step, state, lane);
                    t.beta[idx] = metric;
                }
            }
            for lane in 0 .. t.lanes {
                t.center[lane] = t.beta[t.midx(step, 0, lane)];
            }
            for state in 0 .. t.num_states {
                for lane in 0 .. t.lanes {
                    let slot = t.midx(step, state, lane);
                    t.beta[slot] = t.beta[slot].sub_sat(t.center[lane]);
                }
            }
        }
        for step in 0 .. t.num_info_bits {
            for lane in 0 .. t.lanes {
                t.write_extrinsic(step, lane, sys, ext);
            }
        }
    }
}

/// Soft-input/soft-output BCJR decoder for a batch of independently coded frames
///
/// The decoder follows a three-phase protocol: [`load`](Self::load) splits one contiguous channel
/// buffer into internal batch-major systematic/parity streams, [`decode`](Self::decode) runs the
/// forward-backward recursion and the hard-decision pass, and [`store`](Self::store) writes the
/// bit decisions back in caller layout. The phases must be called in that order; a full
/// load/decode/store sequence leaves no state behind other than the reused scratch buffers, so
/// repeating it with the same input yields the same output.
///
/// # Examples
///
/// ```
/// use sisodec::{Bit, BcjrDecoder, DecodingAlgo, EngineKind, FrameLayout, Termination, Trellis};
/// use Bit::{One, Zero};
///
/// let trellis = Trellis::from_polynomials(&[0o7, 0o5])?;
/// let info_bits = [One, Zero, One, Zero];
/// let mut code_bits = Vec::new();
/// trellis.encode(&info_bits, &mut code_bits);
/// // Noiseless BPSK: bit Zero maps to +1.0, bit One to -1.0.
/// let y_n: Vec<f64> = code_bits
///     .iter()
///     .map(|&b| if b == Zero { 1.0 } else { -1.0 })
///     .collect();
/// let mut decoder = BcjrDecoder::new(
///     trellis,
///     info_bits.len(),
///     FrameLayout::Interleaved,
///     Termination::Tail,
///     1,
///     DecodingAlgo::MaxLogMAP,
///     EngineKind::Lockstep,
/// );
/// let mut decisions = vec![Zero; info_bits.len()];
/// decoder.load(&y_n)?;
/// decoder.decode();
/// decoder.store(&mut decisions)?;
/// assert_eq!(decisions, info_bits);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct BcjrDecoder<R: Llr> {
    /// Number of information bits per frame
    num_info_bits: usize,
    /// Number of tail steps per frame
    num_tail_steps: usize,
    /// Channel sample layout
    layout: FrameLayout,
    /// Number of frames per batch
    num_frames: usize,
    /// Batch-major systematic samples
    sys: Vec<R>,
    /// Batch-major parity samples
    par: Vec<R>,
    /// Batch-major extrinsic output
    ext: Vec<R>,
    /// Batch-major hard decisions
    s: Vec<Bit>,
    /// Metric computation tier
    engine: Box<dyn MetricEngine<R>>,
}

impl<R: Llr> BcjrDecoder<R> {
    /// Returns a BCJR decoder for the given trellis and batch configuration.
    ///
    /// # Parameters
    ///
    /// - `trellis`: Trellis of the RSC code (shared read-only by every decode call).
    ///
    /// - `num_info_bits`: Number of information bits `K` per frame.
    ///
    /// - `layout`: Channel sample layout accepted by [`load`](Self::load).
    ///
    /// - `termination`: Trellis termination policy. With [`Termination::Tail`] each frame carries
    ///   `memory_len` tail steps; with [`Termination::Truncated`] it carries none.
    ///
    /// - `num_frames`: Number of frames decoded per batch.
    ///
    /// - `algo`: Metric combination rule.
    ///
    /// - `engine_kind`: Metric engine tier; both tiers produce identical results.
    ///
    /// # Panics
    ///
    /// Panics if `num_info_bits` or `num_frames` is zero.
    #[must_use]
    pub fn new(
        trellis: Trellis,
        num_info_bits: usize,
        layout: FrameLayout,
        termination: Termination,
        num_frames: usize,
        algo: DecodingAlgo,
        engine_kind: EngineKind,
    ) -> Self {
        assert!(num_info_bits > 0, "Number of information bits cannot be zero");
        assert!(num_frames > 0, "Number of frames cannot be zero");
        let num_tail_steps = match termination {
            Termination::Tail => trellis.memory_len(),
            Termination::Truncated => 0,
        };
        let tables = MetricTables::new(
            &trellis,
            num_info_bits,
            num_tail_steps,
            num_frames,
            termination,
            algo,
        );
        let engine: Box<dyn MetricEngine<R>> = match engine_kind {
            EngineKind::Seq => Box::new(SeqEngine { tables }),
            EngineKind::Lockstep => Box::new(LockstepEngine { tables }),
        };
        let num_samples = (num_info_bits + num_tail_steps) * num_frames + LANE_SLACK;
        let num_decisions = num_info_bits * num_frames + LANE_SLACK;
        Self {
            num_info_bits,
            num_tail_steps,
            layout,
            num_frames,
            sys: vec![R::ZERO; num_samples],
            par: vec![R::ZERO; num_samples],
            ext: vec![R::ZERO; num_decisions],
            s: vec![Bit::Zero; num_decisions],
            engine,
        }
    }

    /// Returns the number of channel samples per frame.
    #[must_use]
    pub fn frame_size(&self) -> usize {
        2 * (self.num_info_bits + self.num_tail_steps)
    }

    /// Splits a contiguous channel buffer into the internal systematic and parity streams.
    ///
    /// For a multi-frame batch the samples are gathered batch-major (an inter-frame transpose),
    /// so that one lane group holds the same trellis step of every frame.
    ///
    /// # Parameters
    ///
    /// - `y_n`: Channel LLR values, `frame_size() * num_frames` of them, in the configured
    ///   layout.
    ///
    /// # Errors
    ///
    /// Returns an error if `y_n.len()` does not equal `frame_size() * num_frames`.
    pub fn load(&mut self, y_n: &[R]) -> Result<(), Error> {
        let expected_len = self.frame_size() * self.num_frames;
        if y_n.len() != expected_len {
            return Err(Error::InvalidInput(format!(
                "Wrong number of channel LLR values (expected {expected_len}, found {})",
                y_n.len()
            )));
        }
        let k = self.num_info_bits;
        let tail = self.num_tail_steps;
        let num_frames = self.num_frames;
        let frame_size = self.frame_size();
        match self.layout {
            FrameLayout::Buffered => {
                if num_frames == 1 {
                    self.sys[.. k].copy_from_slice(&y_n[.. k]);
                    self.par[.. k].copy_from_slice(&y_n[k .. 2 * k]);
                    self.sys[k .. k + tail].copy_from_slice(&y_n[2 * k .. 2 * k + tail]);
                    self.par[k .. k + tail].copy_from_slice(&y_n[2 * k + tail .. 2 * k + 2 * tail]);
                } else {
                    let frames: Vec<&[R]> = (0 .. num_frames)
                        .map(|f| &y_n[f * frame_size .. f * frame_size + k])
                        .collect();
                    reorder::apply(&frames, &mut self.sys[.. k * num_frames]);
                    let frames: Vec<&[R]> = (0 .. num_frames)
                        .map(|f| &y_n[f * frame_size + k .. f * frame_size + 2 * k])
                        .collect();
                    reorder::apply(&frames, &mut self.par[.. k * num_frames]);
                    if tail > 0 {
                        let frames: Vec<&[R]> = (0 .. num_frames)
                            .map(|f| &y_n[f * frame_size + 2 * k .. f * frame_size + 2 * k + tail])
                            .collect();
                        reorder::apply(
                            &frames,
                            &mut self.sys[k * num_frames .. (k + tail) * num_frames],
                        );
                        let frames: Vec<&[R]> = (0 .. num_frames)
                            .map(|f| &y_n[f * frame_size + 2 * k + tail .. (f + 1) * frame_size])
                            .collect();
                        reorder::apply(
                            &frames,
                            &mut self.par[k * num_frames .. (k + tail) * num_frames],
                        );
                    }
                }
            }
            FrameLayout::Interleaved => {
                for i in 0 .. k + tail {
                    for f in 0 .. num_frames {
                        self.sys[i * num_frames + f] = y_n[f * frame_size + 2 * i];
                        self.par[i * num_frames + f] = y_n[f * frame_size + 2 * i + 1];
                    }
                }
            }
        }
        Ok(())
    }

    /// Runs the forward-backward recursion over the loaded streams, then takes hard decisions.
    ///
    /// The decision for each information bit is the sign of `ext + sys`: a negative sum decodes
    /// as `One`. Must be called after [`load`](Self::load).
    pub fn decode(&mut self) {
        let num_samples = (self.num_info_bits + self.num_tail_steps) * self.num_frames;
        let num_decisions = self.num_info_bits * self.num_frames;
        self.engine
            .compute_gamma(&self.sys[.. num_samples], &self.par[.. num_samples]);
        self.engine.compute_alpha();
        self.engine
            .compute_beta_ext(&self.sys[.. num_samples], &mut self.ext[.. num_decisions]);
        for (s, &ext, &sys) in izip!(
            &mut self.s[.. num_decisions],
            &self.ext[.. num_decisions],
            &self.sys[.. num_decisions]
        ) {
            *s = ext.add_sat(sys).to_hard_bit();
        }
    }

    /// Writes the hard decisions back in caller layout.
    ///
    /// The single-frame case is a straight copy of the first `K` decisions; the multi-frame case
    /// applies the inverse inter-frame transpose. Must be called after [`decode`](Self::decode).
    ///
    /// # Parameters
    ///
    /// - `v_k`: Destination for the bit decisions, `num_info_bits * num_frames` of them,
    ///   frame-major.
    ///
    /// # Errors
    ///
    /// Returns an error if `v_k.len()` does not equal `num_info_bits * num_frames`.
    pub fn store(&self, v_k: &mut [Bit]) -> Result<(), Error> {
        let expected_len = self.num_info_bits * self.num_frames;
        if v_k.len() != expected_len {
            return Err(Error::InvalidInput(format!(
                "Wrong number of bit decisions (expected {expected_len}, found {})",
                v_k.len()
            )));
        }
        if self.num_frames == 1 {
            v_k.copy_from_slice(&self.s[.. self.num_info_bits]);
        } else {
            let mut frames: Vec<&mut [Bit]> = v_k.chunks_mut(self.num_info_bits).collect();
            reorder::apply_rev(&self.s[.. expected_len], &mut frames);
        }
        Ok(())
    }

    /// Returns the extrinsic LLR values of the last decode, batch-major.
    ///
    /// This is the refined soft output an iterative (turbo) outer loop feeds back as priors.
    #[must_use]
    pub fn extrinsic(&self) -> &[R] {
        &self.ext[.. self.num_info_bits * self.num_frames]
    }
}

#[cfg(test)]
mod tests_of_engines {
    use super::*;
    use float_eq::assert_float_eq;

    fn tables_for(
        polynomials: &[usize],
        num_info_bits: usize,
        lanes: usize,
        termination: Termination,
    ) -> MetricTables<f64> {
        let trellis = Trellis::from_polynomials(polynomials).unwrap();
        let num_tail_steps = match termination {
            Termination::Tail => trellis.memory_len(),
            Termination::Truncated => 0,
        };
        MetricTables::new(
            &trellis,
            num_info_bits,
            num_tail_steps,
            lanes,
            termination,
            DecodingAlgo::MaxLogMAP,
        )
    }

    #[test]
    fn test_alpha_boundary_invariant() {
        let mut tables = tables_for(&[0o13, 0o15], 4, 2, Termination::Tail);
        tables.init_alpha_boundary();
        for lane in 0 .. 2 {
            assert_float_eq!(tables.alpha[tables.midx(0, 0, lane)], 0.0, abs <= 0.0);
            for state in 1 .. tables.num_states {
                assert_float_eq!(
                    tables.alpha[tables.midx(0, state, lane)],
                    f64::NEG_SATURATION,
                    abs <= 0.0
                );
            }
        }
    }

    #[test]
    fn test_beta_boundary_terminated() {
        let mut tables = tables_for(&[0o13, 0o15], 4, 1, Termination::Tail);
        tables.init_beta_boundary();
        let last = tables.num_steps;
        assert_float_eq!(tables.beta[tables.midx(last, 0, 0)], 0.0, abs <= 0.0);
        for state in 1 .. tables.num_states {
            assert_float_eq!(
                tables.beta[tables.midx(last, state, 0)],
                f64::NEG_SATURATION,
                abs <= 0.0
            );
        }
    }

    #[test]
    fn test_beta_boundary_truncated() {
        let mut tables = tables_for(&[0o13, 0o15], 4, 1, Termination::Truncated);
        tables.init_beta_boundary();
        let last = tables.num_steps;
        for state in 0 .. tables.num_states {
            assert_float_eq!(tables.beta[tables.midx(last, state, 0)], 0.0, abs <= 0.0);
        }
    }

    #[test]
    fn test_gamma_planes() {
        let mut tables = tables_for(&[0o7, 0o5], 2, 1, Termination::Truncated);
        tables.fill_gamma(&[3.0, -1.0], &[1.0, 5.0]);
        assert_float_eq!(tables.gamma[0][0], 2.0, abs <= 1e-12);
        assert_float_eq!(tables.gamma[1][0], 1.0, abs <= 1e-12);
        assert_float_eq!(tables.gamma[0][1], 2.0, abs <= 1e-12);
        assert_float_eq!(tables.gamma[1][1], -3.0, abs <= 1e-12);
        // From state 0: input Zero emits (0, 0), input One emits (1, 1).
        assert_float_eq!(tables.gamma_at(0, 0, 0, 0), 2.0, abs <= 1e-12);
        assert_float_eq!(tables.gamma_at(0, 0, 1, 0), -2.0, abs <= 1e-12);
    }

    #[test]
    fn test_max_star() {
        assert_float_eq!(max_star(1.2, 1.3, DecodingAlgo::MaxLogMAP), 1.3, abs <= 1e-8);
        assert_float_eq!(
            max_star(-1.2, -1.3, DecodingAlgo::MaxLogMAP),
            -1.2,
            abs <= 1e-8
        );
        assert_float_eq!(
            max_star(-1.2, 1.2, DecodingAlgo::LinearLogMAP),
            1.226_601_750_600_968_3,
            abs <= 1e-8
        );
        assert_float_eq!(
            max_star(1.2, 1.3, DecodingAlgo::LogMAP),
            1.944_396_660_073_571,
            abs <= 1e-8
        );
        assert_float_eq!(
            max_star(-1.2, -1.3, DecodingAlgo::LogMAP),
            -0.555_603_339_926_429_1,
            abs <= 1e-8
        );
    }
}

#[cfg(test)]
mod tests_of_decoder {
    use super::*;
    use crate::utils;
    use float_eq::assert_float_eq;
    use Bit::{One, Zero};

    /// Maps code bits to noiseless BPSK LLR values.
    fn noiseless_llr(code_bits: &[Bit]) -> Vec<f64> {
        code_bits
            .iter()
            .map(|&b| if b == Zero { 2.0 } else { -2.0 })
            .collect()
    }

    fn decoder_for(
        polynomials: &[usize],
        num_info_bits: usize,
        layout: FrameLayout,
        termination: Termination,
        num_frames: usize,
        algo: DecodingAlgo,
        engine_kind: EngineKind,
    ) -> BcjrDecoder<f64> {
        BcjrDecoder::new(
            Trellis::from_polynomials(polynomials).unwrap(),
            num_info_bits,
            layout,
            termination,
            num_frames,
            algo,
            engine_kind,
        )
    }

    #[test]
    fn test_all_zero_noiseless() {
        // K = 4, four-state trellis, noiseless all-zero input.
        let trellis = Trellis::from_polynomials(&[0o7, 0o5]).unwrap();
        let info_bits = [Zero; 4];
        let mut code_bits = Vec::new();
        trellis.encode(&info_bits, &mut code_bits);
        assert!(code_bits.iter().all(|&b| b == Zero));
        let mut decoder = decoder_for(
            &[0o7, 0o5],
            4,
            FrameLayout::Interleaved,
            Termination::Tail,
            1,
            DecodingAlgo::MaxLogMAP,
            EngineKind::Lockstep,
        );
        let mut decisions = [One; 4];
        decoder.load(&noiseless_llr(&code_bits)).unwrap();
        decoder.decode();
        decoder.store(&mut decisions).unwrap();
        assert_eq!(decisions, [Zero; 4]);
        assert!(decoder.extrinsic().iter().all(|&x| x > 0.0));
    }

    #[test]
    fn test_noiseless_round_trip_interleaved() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let info_bits = utils::random_bits(40);
        let mut code_bits = Vec::new();
        trellis.encode(&info_bits, &mut code_bits);
        for algo in [
            DecodingAlgo::MaxLogMAP,
            DecodingAlgo::LinearLogMAP,
            DecodingAlgo::LogMAP,
        ] {
            let mut decoder = decoder_for(
                &[0o13, 0o15],
                40,
                FrameLayout::Interleaved,
                Termination::Tail,
                1,
                algo,
                EngineKind::Seq,
            );
            let mut decisions = vec![Zero; 40];
            decoder.load(&noiseless_llr(&code_bits)).unwrap();
            decoder.decode();
            decoder.store(&mut decisions).unwrap();
            assert_eq!(decisions, info_bits);
        }
    }

    #[test]
    fn test_noiseless_round_trip_buffered() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let info_bits = utils::random_bits(40);
        let mut code_bits = Vec::new();
        trellis.encode_buffered(&info_bits, &mut code_bits);
        let mut decoder = decoder_for(
            &[0o13, 0o15],
            40,
            FrameLayout::Buffered,
            Termination::Tail,
            1,
            DecodingAlgo::MaxLogMAP,
            EngineKind::Lockstep,
        );
        let mut decisions = vec![Zero; 40];
        decoder.load(&noiseless_llr(&code_bits)).unwrap();
        decoder.decode();
        decoder.store(&mut decisions).unwrap();
        assert_eq!(decisions, info_bits);
    }

    #[test]
    fn test_noiseless_round_trip_truncated() {
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let info_bits = utils::random_bits(40);
        let mut paired = Vec::new();
        trellis.encode(&info_bits, &mut paired);
        // Drop the tail steps: a truncated frame carries information steps only.
        paired.truncate(2 * info_bits.len());
        let mut decoder = decoder_for(
            &[0o13, 0o15],
            40,
            FrameLayout::Interleaved,
            Termination::Truncated,
            1,
            DecodingAlgo::MaxLogMAP,
            EngineKind::Seq,
        );
        let mut decisions = vec![Zero; 40];
        decoder.load(&noiseless_llr(&paired)).unwrap();
        decoder.decode();
        decoder.store(&mut decisions).unwrap();
        assert_eq!(decisions, info_bits);
    }

    #[test]
    fn test_fixed_point_round_trip() {
        let trellis = Trellis::from_polynomials(&[0o7, 0o5]).unwrap();
        let info_bits = utils::random_bits(16);
        let mut code_bits = Vec::new();
        trellis.encode(&info_bits, &mut code_bits);
        let y_n: Vec<i16> = code_bits
            .iter()
            .map(|&b| if b == Zero { 8 } else { -8 })
            .collect();
        let mut decoder: BcjrDecoder<i16> = BcjrDecoder::new(
            trellis,
            16,
            FrameLayout::Interleaved,
            Termination::Tail,
            1,
            DecodingAlgo::MaxLogMAP,
            EngineKind::Lockstep,
        );
        let mut decisions = vec![Zero; 16];
        decoder.load(&y_n).unwrap();
        decoder.decode();
        decoder.store(&mut decisions).unwrap();
        assert_eq!(decisions, info_bits);
    }

    #[test]
    fn test_batched_matches_single_frame() {
        let num_frames = 3;
        let num_info_bits = 24;
        let all_info_bits: Vec<Vec<Bit>> = (0 .. num_frames)
            .map(|_| utils::random_bits(num_info_bits))
            .collect();
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        // Mildly noisy samples so that the extrinsic values are nontrivial.
        let all_y_n: Vec<Vec<f64>> = all_info_bits
            .iter()
            .map(|info_bits| {
                let mut code_bits = Vec::new();
                trellis.encode_buffered(info_bits, &mut code_bits);
                utils::bpsk_awgn_channel(&code_bits, 3.0, &mut rand::rng())
            })
            .collect();
        // Batched decode of all frames at once.
        let mut batched = decoder_for(
            &[0o13, 0o15],
            num_info_bits,
            FrameLayout::Buffered,
            Termination::Tail,
            num_frames,
            DecodingAlgo::LogMAP,
            EngineKind::Lockstep,
        );
        let y_n: Vec<f64> = all_y_n.iter().flatten().copied().collect();
        let mut batched_decisions = vec![Zero; num_info_bits * num_frames];
        batched.load(&y_n).unwrap();
        batched.decode();
        batched.store(&mut batched_decisions).unwrap();
        // Frame-by-frame decode with a single-frame instance.
        let mut single = decoder_for(
            &[0o13, 0o15],
            num_info_bits,
            FrameLayout::Buffered,
            Termination::Tail,
            1,
            DecodingAlgo::LogMAP,
            EngineKind::Lockstep,
        );
        for (f, frame_y_n) in all_y_n.iter().enumerate() {
            let mut decisions = vec![Zero; num_info_bits];
            single.load(frame_y_n).unwrap();
            single.decode();
            single.store(&mut decisions).unwrap();
            assert_eq!(
                decisions,
                batched_decisions[f * num_info_bits .. (f + 1) * num_info_bits]
            );
            for k in 0 .. num_info_bits {
                assert_float_eq!(
                    single.extrinsic()[k],
                    batched.extrinsic()[k * num_frames + f],
                    abs <= 0.0
                );
            }
        }
    }

    #[test]
    fn test_engines_agree() {
        let num_frames = 2;
        let num_info_bits = 32;
        let trellis = Trellis::from_polynomials(&[0o13, 0o15]).unwrap();
        let y_n: Vec<f64> = (0 .. num_frames)
            .flat_map(|_| {
                let info_bits = utils::random_bits(num_info_bits);
                let mut code_bits = Vec::new();
                trellis.encode_buffered(&info_bits, &mut code_bits);
                utils::bpsk_awgn_channel(&code_bits, 0.0, &mut rand::rng())
            })
            .collect();
        let mut outputs = Vec::new();
        for engine_kind in [EngineKind::Seq, EngineKind::Lockstep] {
            let mut decoder = decoder_for(
                &[0o13, 0o15],
                num_info_bits,
                FrameLayout::Buffered,
                Termination::Tail,
                num_frames,
                DecodingAlgo::LogMAP,
                engine_kind,
            );
            decoder.load(&y_n).unwrap();
            decoder.decode();
            outputs.push(decoder.extrinsic().to_vec());
        }
        assert_float_eq!(outputs[0], outputs[1], abs_all <= 0.0);
    }

    #[test]
    fn test_load_and_store_size_checks() {
        let mut decoder = decoder_for(
            &[0o7, 0o5],
            8,
            FrameLayout::Buffered,
            Termination::Tail,
            2,
            DecodingAlgo::MaxLogMAP,
            EngineKind::Seq,
        );
        assert!(decoder.load(&[0.0; 10]).is_err());
        let y_n = vec![1.0; decoder.frame_size() * 2];
        decoder.load(&y_n).unwrap();
        decoder.decode();
        let mut too_short = vec![Zero; 8];
        assert!(decoder.store(&mut too_short).is_err());
        let mut decisions = vec![Zero; 16];
        decoder.store(&mut decisions).unwrap();
    }
}
