// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block-parallel scanning.
//!
//! The input is cut into fixed-size blocks. Workers claim blocks through an
//! atomic counter and scan each from scratch: block 0 from
//! [`Transducer::initial_result`], every other block from
//! [`Transducer::identity_result`]. Block results are then merged pairwise,
//! adjacent neighbours only, one level at a time until one result remains.
//! Any association order gives the same result, so the reduction shape is free
//! to follow the worker count.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, instrument};

use crate::config::{ConfigError, ScanConfig};
use crate::transducer::Transducer;

/// Scans `input` as a single block.
pub fn scan_sequential<T>(transducer: &T, input: &[T::Input]) -> T::PartialResult
where
    T: Transducer,
    T::Input: Copy,
{
    let mut result = transducer.initial_result();
    for (offset, &symbol) in input.iter().enumerate() {
        transducer.process_symbol(&mut result, symbol, offset);
    }
    result
}

/// Scans `input` in blocks of `config.block_size` on `config.workers` threads.
///
/// Produces the same result as [`scan_sequential`]. A panic on any worker is
/// re-raised on the caller.
#[instrument(
    skip_all,
    fields(len = input.len(), workers = config.workers, block_size = config.block_size)
)]
pub fn scan_parallel<T>(
    transducer: &T,
    input: &[T::Input],
    config: &ScanConfig,
) -> Result<T::PartialResult, ConfigError>
where
    T: Transducer + Sync,
    T::Input: Copy + Sync,
    T::PartialResult: Send,
{
    config.validate()?;
    let blocks: Vec<&[T::Input]> = input.chunks(config.block_size).collect();
    let scanned = scan_blocks(transducer, &blocks, config);
    Ok(reduce(transducer, scanned, config.workers))
}

fn scan_blocks<T>(
    transducer: &T,
    blocks: &[&[T::Input]],
    config: &ScanConfig,
) -> Vec<T::PartialResult>
where
    T: Transducer + Sync,
    T::Input: Copy + Sync,
    T::PartialResult: Send,
{
    let next_block = AtomicUsize::new(0);
    let workers = config.workers.min(blocks.len());
    let block_size = config.block_size;

    let mut scanned: Vec<(usize, T::PartialResult)> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let next_block = &next_block;
                s.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = next_block.fetch_add(1, Ordering::Relaxed);
                        let Some(block) = blocks.get(index) else {
                            break;
                        };
                        let mut result = if index == 0 {
                            transducer.initial_result()
                        } else {
                            transducer.identity_result()
                        };
                        let base = index * block_size;
                        for (i, &symbol) in block.iter().enumerate() {
                            transducer.process_symbol(&mut result, symbol, base + i);
                        }
                        debug!(block = index, len = block.len(), "scanned block");
                        done.push((index, result));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(done) => done,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    });

    scanned.sort_unstable_by_key(|(index, _)| *index);
    scanned.into_iter().map(|(_, result)| result).collect()
}

fn reduce<T>(transducer: &T, mut level: Vec<T::PartialResult>, workers: usize) -> T::PartialResult
where
    T: Transducer + Sync,
    T::PartialResult: Send,
{
    let mut depth = 0usize;
    while level.len() > 1 {
        let carry = if level.len() % 2 == 1 {
            level.pop()
        } else {
            None
        };
        let mut pairs = Vec::with_capacity(level.len() / 2);
        let mut rest = level.into_iter();
        while let (Some(left), Some(right)) = (rest.next(), rest.next()) {
            pairs.push((left, right));
        }
        level = merge_pairs(transducer, pairs, workers);
        level.extend(carry);
        depth += 1;
        debug!(depth, remaining = level.len(), "reduction level merged");
    }
    // Only an empty input leaves nothing to reduce.
    level.pop().unwrap_or_else(|| transducer.initial_result())
}

fn merge_pairs<T>(
    transducer: &T,
    pairs: Vec<(T::PartialResult, T::PartialResult)>,
    workers: usize,
) -> Vec<T::PartialResult>
where
    T: Transducer + Sync,
    T::PartialResult: Send,
{
    let merge = |(mut left, right): (T::PartialResult, T::PartialResult)| {
        transducer.merge_results(&mut left, right);
        left
    };
    if workers <= 1 || pairs.len() <= 1 {
        return pairs.into_iter().map(merge).collect();
    }

    let chunk_len = pairs.len().div_ceil(workers);
    let mut chunks = Vec::with_capacity(workers);
    let mut rest = pairs;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk_len.min(rest.len()));
        chunks.push(rest);
        rest = tail;
    }

    std::thread::scope(|s| {
        let handles: Vec<_> = chunks
            .into_iter()
            .map(|chunk| s.spawn(move || chunk.into_iter().map(merge).collect::<Vec<_>>()))
            .collect();

        handles
            .into_iter()
            .flat_map(|h| match h.join() {
                Ok(merged) => merged,
                Err(e) => std::panic::resume_unwind(e),
            })
            .collect()
    })
}
