use fr_core::derive_substream_seed;

const SEEDING_STREAM: u64 = 0x5EED_0000_0000_0001;

/// Seed of the stream that places the initial walkers.
pub fn seeding_seed(master_seed: u64) -> u64 {
    derive_substream_seed(master_seed, SEEDING_STREAM)
}

/// Seed of the draws made for one walker update at a given step.
pub fn walker_step_seed(master_seed: u64, step: usize, walker: usize) -> u64 {
    let intermediate = derive_substream_seed(master_seed, step as u64);
    derive_substream_seed(intermediate, walker as u64)
}
