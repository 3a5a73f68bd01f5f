//! Data-parallel helpers shared by the ISP stages and the statistics code.
//!
//! Work is split into row bands of [`GRAIN_ROWS`] rows. With
//! [`Parallelism::Sequential`] the same bands are processed in order on the
//! calling thread, so results never depend on the mode.

use rayon::prelude::*;

/// Rows per work item.
pub const GRAIN_ROWS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    Sequential,
    #[default]
    Rayon,
}

impl Parallelism {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Parallelism::Rayon
        } else {
            Parallelism::Sequential
        }
    }
}

/// Apply `f(row, row_slice)` to every row of a row-major buffer with
/// `row_len` elements per row.
pub fn for_each_row<T, F>(data: &mut [T], row_len: usize, mode: Parallelism, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if data.is_empty() || row_len == 0 {
        return;
    }
    let band_len = row_len * GRAIN_ROWS;
    let process_band = |(band_idx, band): (usize, &mut [T])| {
        for (i, row) in band.chunks_mut(row_len).enumerate() {
            f(band_idx * GRAIN_ROWS + i, row);
        }
    };
    match mode {
        Parallelism::Rayon => data.par_chunks_mut(band_len).enumerate().for_each(process_band),
        Parallelism::Sequential => data.chunks_mut(band_len).enumerate().for_each(process_band),
    }
}

/// Build one accumulator per row band with `fold_band(first_row, last_row)`
/// and merge them with `merge`. `merge` must be associative and commutative.
pub fn reduce_rows<A, F, M>(height: usize, mode: Parallelism, identity: A, fold_band: F, merge: M) -> A
where
    A: Send + Sync + Clone,
    F: Fn(usize, usize) -> A + Sync + Send,
    M: Fn(A, A) -> A + Sync + Send,
{
    let num_bands = height.div_ceil(GRAIN_ROWS);
    let band = |b: usize| fold_band(b * GRAIN_ROWS, ((b + 1) * GRAIN_ROWS).min(height));
    match mode {
        Parallelism::Rayon => (0..num_bands)
            .into_par_iter()
            .map(band)
            .reduce(|| identity.clone(), &merge),
        Parallelism::Sequential => (0..num_bands).map(band).fold(identity, &merge),
    }
}

/// Map a slice of independent items, preserving order.
pub fn map_items<T, R, F>(items: &[T], mode: Parallelism, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync + Send,
{
    match mode {
        Parallelism::Rayon => items.par_iter().enumerate().map(|(i, t)| f(i, t)).collect(),
        Parallelism::Sequential => items.iter().enumerate().map(|(i, t)| f(i, t)).collect(),
    }
}
