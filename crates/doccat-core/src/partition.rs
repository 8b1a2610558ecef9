use crate::error::{Error, Result};

/// Splits `items` into `workers` contiguous slices by count.
///
/// Each worker gets `N / W` items and the first `N % W` workers one more.
/// Enumeration order is preserved. Document size is not considered, so
/// uneven documents can still skew the load.
pub fn partition<T: Clone>(items: &[T], workers: usize) -> Result<Vec<Vec<T>>> {
    let mut start = 0;
    let assignments = partition_sizes(items.len(), workers)?
        .into_iter()
        .map(|len| {
            let slice = items[start..start + len].to_vec();
            start += len;
            slice
        })
        .collect();
    Ok(assignments)
}

/// Per-worker assignment sizes for `items` documents, in worker order.
pub fn partition_sizes(items: usize, workers: usize) -> Result<Vec<usize>> {
    if workers == 0 {
        return Err(Error::InsufficientWorkers { units: 0, required: 1 });
    }
    Ok((0..workers).map(|w| items / workers + usize::from(w < items % workers)).collect())
}
