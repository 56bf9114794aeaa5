//! Simulator to evaluate BER/BLER performance of the decoders over a BPSK-AWGN channel

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    polar, utils, BcjrDecoder, Bit, DecodingAlgo, EngineKind, Error, FrameLayout, PolarDecoder,
    Termination, Trellis,
};

/// Generator polynomials of the simulated rate-1/2 RSC code
const RSC_POLYNOMIALS: [usize; 2] = [0o13, 0o15];

/// Design erasure probability of the BEC used to pick the polar frozen set
const BEC_DESIGN_ERASURE: f64 = 0.5;

/// Enumeration of simulated decoder chains
#[derive(Clone, Eq, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub enum CodeKind {
    /// Tail-terminated rate-1/2 RSC code decoded with BCJR
    Rsc,
    /// Polar code decoded with successive cancellation
    Polar,
}

/// Parameters for decoder simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct SimParams {
    /// Decoder chain to be simulated
    pub code: CodeKind,
    /// Number of information bits per block
    pub num_info_bits_per_block: u32,
    /// Ratio (dB) of symbol energy to noise power spectral density at BPSK-AWGN channel output
    pub es_over_n0_db: f64,
    /// Decoding algorithm to be used (BCJR only)
    pub decoding_algo: DecodingAlgo,
    /// Metric engine tier to be used (BCJR only)
    pub engine: EngineKind,
    /// Number of frames per BCJR decode call (BCJR only)
    pub num_frames_per_decode: u32,
    /// Desired minimum number of block errors
    pub num_block_errors_min: u32,
    /// Number of blocks to be transmitted per run (rounded up to whole decode batches for the
    /// BCJR chain)
    pub num_blocks_per_run: u32,
    /// Minimum number of runs of blocks to be simulated
    pub num_runs_min: u32,
    /// Maximum number of runs of blocks to be simulated
    pub num_runs_max: u32,
}

/// Results from decoder simulation over BPSK-AWGN channel
#[derive(Clone, PartialEq, Debug, Copy, Deserialize, Serialize)]
pub struct SimResults {
    /// Simulation parameters
    pub params: SimParams,
    /// Number of blocks transmitted
    pub num_blocks: u32,
    /// Number of block errors observed
    pub num_block_errors: u32,
    /// Number of information bits transmitted
    pub num_info_bits: u64,
    /// Number of information bit errors observed
    pub num_info_bit_errors: u64,
}

impl SimResults {
    /// Returns the observed block error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn block_error_rate(&self) -> f64 {
        f64::from(self.num_block_errors) / f64::from(self.num_blocks)
    }

    /// Returns the observed information bit error rate.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bit_error_rate(&self) -> f64 {
        self.num_info_bit_errors as f64 / self.num_info_bits as f64
    }
}

impl std::fmt::Display for SimResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Es/N0 = {:.2} dB: {} blocks, BLER = {:.3e}, BER = {:.3e}",
            self.params.es_over_n0_db,
            self.num_blocks,
            self.block_error_rate(),
            self.bit_error_rate()
        )
    }
}

/// Error and transmission counts accumulated over blocks
#[derive(Clone, Eq, PartialEq, Debug, Copy, Default)]
struct Counts {
    /// Number of blocks transmitted
    blocks: u32,
    /// Number of block errors observed
    block_errors: u32,
    /// Number of information bits transmitted
    bits: u64,
    /// Number of information bit errors observed
    bit_errors: u64,
}

impl Counts {
    /// Returns elementwise sum of two counts.
    fn merge(self, other: Self) -> Self {
        Self {
            blocks: self.blocks + other.blocks,
            block_errors: self.block_errors + other.block_errors,
            bits: self.bits + other.bits,
            bit_errors: self.bit_errors + other.bit_errors,
        }
    }

    /// Updates counts with the outcome of one decoded block.
    fn tally(&mut self, decisions: &[Bit], info_bits: &[Bit]) {
        let num_errors = utils::error_count(decisions, info_bits);
        self.blocks += 1;
        self.block_errors += u32::from(num_errors > 0);
        self.bits += info_bits.len() as u64;
        self.bit_errors += num_errors as u64;
    }
}

/// Runs simulations for all given parameter sets and saves results to a JSON file.
///
/// Each parameter set is simulated in turn, with the blocks of every run spread over the rayon
/// worker pool; each worker owns its decoder instance and random number generator. A progress
/// line per parameter set is printed to stderr.
///
/// # Parameters
///
/// - `all_params`: Parameter sets to be simulated.
///
/// - `json_filename`: Name of JSON file to which results must be saved.
///
/// # Errors
///
/// Returns an error if some parameter set is invalid, or if the results cannot be written to the
/// given file.
pub fn run_bpsk_awgn_sims(all_params: &[SimParams], json_filename: &str) -> Result<(), Error> {
    let mut all_results = Vec::with_capacity(all_params.len());
    for params in all_params {
        let results = run_sim(params)?;
        eprintln!("{results}");
        all_results.push(results);
    }
    let file = std::fs::File::create(json_filename)?;
    serde_json::to_writer_pretty(file, &all_results)?;
    Ok(())
}

/// Runs the simulation for one parameter set.
///
/// Runs of `num_blocks_per_run` blocks are simulated until at least `num_block_errors_min` block
/// errors have been observed (but at least `num_runs_min` runs and at most `num_runs_max` runs).
///
/// # Errors
///
/// Returns an error if the parameter set is invalid.
pub fn run_sim(params: &SimParams) -> Result<SimResults, Error> {
    check_sim_params(params)?;
    let mut totals = Counts::default();
    for run_index in 0 .. params.num_runs_max {
        let run_counts = match params.code {
            CodeKind::Rsc => run_rsc_blocks(params)?,
            CodeKind::Polar => run_polar_blocks(params)?,
        };
        totals = totals.merge(run_counts);
        if run_index + 1 >= params.num_runs_min
            && totals.block_errors >= params.num_block_errors_min
        {
            break;
        }
    }
    Ok(SimResults {
        params: *params,
        num_blocks: totals.blocks,
        num_block_errors: totals.block_errors,
        num_info_bits: totals.bits,
        num_info_bit_errors: totals.bit_errors,
    })
}

/// Checks validity of simulation parameters.
fn check_sim_params(params: &SimParams) -> Result<(), Error> {
    if params.num_info_bits_per_block == 0 {
        return Err(Error::InvalidInput(
            "Number of information bits per block cannot be zero".to_string(),
        ));
    }
    if params.num_frames_per_decode == 0 {
        return Err(Error::InvalidInput(
            "Number of frames per decode cannot be zero".to_string(),
        ));
    }
    if params.num_blocks_per_run == 0 {
        return Err(Error::InvalidInput(
            "Number of blocks per run cannot be zero".to_string(),
        ));
    }
    if params.num_runs_min > params.num_runs_max {
        return Err(Error::InvalidInput(format!(
            "Minimum number of runs ({}) exceeds maximum number of runs ({})",
            params.num_runs_min, params.num_runs_max
        )));
    }
    Ok(())
}

/// Simulates one run of BCJR-decoded RSC blocks, batched `num_frames_per_decode` at a time.
fn run_rsc_blocks(params: &SimParams) -> Result<Counts, Error> {
    let num_info_bits = params.num_info_bits_per_block as usize;
    let num_frames = params.num_frames_per_decode as usize;
    let num_batches = (params.num_blocks_per_run as usize).div_ceil(num_frames);
    let trellis = Trellis::from_polynomials(&RSC_POLYNOMIALS)?;
    let all_counts: Result<Vec<Counts>, Error> = (0 .. num_batches)
        .into_par_iter()
        .map_init(
            || {
                (
                    BcjrDecoder::<f64>::new(
                        trellis.clone(),
                        num_info_bits,
                        FrameLayout::Buffered,
                        Termination::Tail,
                        num_frames,
                        params.decoding_algo,
                        params.engine,
                    ),
                    trellis.clone(),
                    rand::rng(),
                )
            },
            |(decoder, trellis, rng), _| {
                let mut counts = Counts::default();
                let mut code_bits = Vec::new();
                let mut y_n = Vec::with_capacity(decoder.frame_size() * num_frames);
                let all_info_bits: Vec<Vec<Bit>> = (0 .. num_frames)
                    .map(|_| utils::random_bits(num_info_bits))
                    .collect();
                for info_bits in &all_info_bits {
                    trellis.encode_buffered(info_bits, &mut code_bits);
                    y_n.extend(utils::bpsk_awgn_channel(
                        &code_bits,
                        params.es_over_n0_db,
                        rng,
                    ));
                }
                let mut decisions = vec![Bit::Zero; num_info_bits * num_frames];
                decoder.load(&y_n)?;
                decoder.decode();
                decoder.store(&mut decisions)?;
                for (f, info_bits) in all_info_bits.iter().enumerate() {
                    counts.tally(
                        &decisions[f * num_info_bits .. (f + 1) * num_info_bits],
                        info_bits,
                    );
                }
                Ok(counts)
            },
        )
        .collect();
    Ok(all_counts?
        .into_iter()
        .fold(Counts::default(), Counts::merge))
}

/// Simulates one run of SC-decoded polar blocks.
fn run_polar_blocks(params: &SimParams) -> Result<Counts, Error> {
    let num_info_bits = params.num_info_bits_per_block as usize;
    let code_len = (2 * num_info_bits).next_power_of_two();
    let frozen_bits = bec_frozen_bits(num_info_bits, code_len);
    let all_counts: Result<Vec<Counts>, Error> = (0 .. params.num_blocks_per_run as usize)
        .into_par_iter()
        .map_init(
            || {
                (
                    PolarDecoder::<f64>::new(num_info_bits, code_len, frozen_bits.clone(), 1),
                    rand::rng(),
                )
            },
            |(decoder, rng), _| {
                let mut counts = Counts::default();
                let info_bits = utils::random_bits(num_info_bits);
                let code_bits = polar::encode(&info_bits, &frozen_bits)?;
                let y_n = utils::bpsk_awgn_channel(&code_bits, params.es_over_n0_db, rng);
                let mut decisions = vec![Bit::Zero; num_info_bits];
                decoder.decode_siho(&y_n, &mut decisions, 0)?;
                counts.tally(&decisions, &info_bits);
                Ok(counts)
            },
        )
        .collect();
    Ok(all_counts?
        .into_iter()
        .fold(Counts::default(), Counts::merge))
}

/// Returns a frozen-bit set from the Bhattacharyya parameter recursion on a binary erasure
/// channel: the `N - K` positions with the largest erasure parameter are frozen.
///
/// # Panics
///
/// Panics if `code_len` is not a power of two or if `num_info_bits` exceeds it.
#[must_use]
pub fn bec_frozen_bits(num_info_bits: usize, code_len: usize) -> Arc<[bool]> {
    assert!(
        code_len.is_power_of_two(),
        "Polar code length must be a power of two (found {code_len})",
    );
    assert!(
        num_info_bits <= code_len,
        "Number of information bits cannot exceed the code length",
    );
    let mut z = vec![BEC_DESIGN_ERASURE];
    while z.len() < code_len {
        let mut split = Vec::with_capacity(2 * z.len());
        for &p in &z {
            split.push(2.0 * p - p * p);
            split.push(p * p);
        }
        z = split;
    }
    let mut order: Vec<usize> = (0 .. code_len).collect();
    order.sort_by(|&a, &b| z[b].total_cmp(&z[a]));
    let mut frozen = vec![false; code_len];
    for &position in order.iter().take(code_len - num_info_bits) {
        frozen[position] = true;
    }
    frozen.into()
}
