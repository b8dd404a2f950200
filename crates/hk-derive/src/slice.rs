//! Slice resolution: mapping scale-factor slice edges onto a histogram's
//! native bins.

use hk_store::Hist1D;

/// A contiguous half-open bin range `[lo_bin, hi_bin)` over which one scale
/// factor is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// First bin covered.
    pub lo_bin: usize,
    /// One past the last bin covered.
    pub hi_bin: usize,
}

impl Slice {
    /// Whether the slice spans the whole histogram.
    pub fn is_full_range(&self, hist: &Hist1D) -> bool {
        self.lo_bin == 0 && self.hi_bin == hist.n_bins()
    }
}

/// Resolve slice edges against a target histogram's bin edges.
///
/// A slice covers the bins whose low edge is at or above the slice's start
/// edge and below the next slice edge. An empty edge list defaults to one
/// slice per native bin. First/last boundaries outside the histogram range
/// are diagnosed and clamped.
pub fn resolve_slices(hist: &Hist1D, slice_edges: &[f64]) -> Vec<Slice> {
    let n_bins = hist.n_bins();
    if slice_edges.len() < 2 {
        return (0..n_bins).map(|i| Slice { lo_bin: i, hi_bin: i + 1 }).collect();
    }
    let first = slice_edges[0];
    let last = slice_edges[slice_edges.len() - 1];
    if first < hist.bin_edges[0] || last > hist.bin_edges[n_bins] {
        log::warn!(
            "slice boundaries [{first}, {last}] fall outside histogram range [{}, {}]",
            hist.bin_edges[0],
            hist.bin_edges[n_bins]
        );
    }
    let mut slices = Vec::with_capacity(slice_edges.len() - 1);
    for w in slice_edges.windows(2) {
        let lo_bin = (0..n_bins).find(|&i| hist.bin_edges[i] >= w[0]).unwrap_or(n_bins);
        let hi_bin = (lo_bin..n_bins)
            .take_while(|&i| hist.bin_edges[i] < w[1])
            .last()
            .map(|i| i + 1)
            .unwrap_or(lo_bin);
        slices.push(Slice { lo_bin, hi_bin });
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hist() -> Hist1D {
        Hist1D::uniform(10, 0.0, 100.0).unwrap()
    }

    #[test]
    fn empty_edges_default_to_native_bins() {
        let slices = resolve_slices(&hist(), &[]);
        assert_eq!(slices.len(), 10);
        assert_eq!(slices[0], Slice { lo_bin: 0, hi_bin: 1 });
        assert_eq!(slices[9], Slice { lo_bin: 9, hi_bin: 10 });
    }

    #[test]
    fn full_range_single_slice() {
        let h = hist();
        let slices = resolve_slices(&h, &[0.0, 100.0]);
        assert_eq!(slices, vec![Slice { lo_bin: 0, hi_bin: 10 }]);
        assert!(slices[0].is_full_range(&h));
    }

    #[test]
    fn two_slices_split_at_bin_boundary() {
        let slices = resolve_slices(&hist(), &[0.0, 50.0, 100.0]);
        assert_eq!(
            slices,
            vec![Slice { lo_bin: 0, hi_bin: 5 }, Slice { lo_bin: 5, hi_bin: 10 }]
        );
    }

    #[test]
    fn off_boundary_edge_covers_bins_by_low_edge() {
        // Slice edge at 45: bins with low edge >= 45 start at bin 5 (low edge 50).
        let slices = resolve_slices(&hist(), &[0.0, 45.0, 100.0]);
        assert_eq!(
            slices,
            vec![Slice { lo_bin: 0, hi_bin: 5 }, Slice { lo_bin: 5, hi_bin: 10 }]
        );
    }

    #[test]
    fn out_of_range_boundaries_clamp() {
        let slices = resolve_slices(&hist(), &[-10.0, 150.0]);
        assert_eq!(slices, vec![Slice { lo_bin: 0, hi_bin: 10 }]);
    }
}
