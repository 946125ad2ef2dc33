//! Discrete Gaussian kernel derivation.
//!
//! The kernel is a truncated binomial distribution: for a radius `R` the
//! coefficients of `(1 + x)^N` with `N = 2*(R + 2) - 2` approximate a
//! Gaussian of matching support (central-limit behaviour of the binomial),
//! and walking the Pascal recurrence outward from the central coefficient
//! yields the tap weights directly. The two coefficients past the retained
//! radius are dropped on both sides, and the `2^N` normalisation is
//! corrected for that truncation; without the correction the blurred output
//! visibly darkens.
//!
//! Optionally, adjacent tap pairs are merged into single fetches placed at
//! the pair's weighted-average offset. Hardware bilinear filtering then
//! reproduces both samples' contribution with one texture read, halving the
//! per-pass fetch count for the same perceived kernel width.

use tracing::warn;

/// Hard upper bound on the accepted blur radius.
///
/// The binomial recurrence is evaluated on unnormalised coefficients; past
/// this order their magnitude leaves the range where the ratio arithmetic
/// stays accurate, so larger radii are clamped rather than computed.
pub const MAX_KERNEL_RADIUS: u32 = 49;

/// Number of vec4 rows in the GPU-side tap array.
pub(crate) const MAX_KERNEL_TAPS: usize = MAX_KERNEL_RADIUS as usize;

/// One convolution sample: a pixel offset from the output position and the
/// weight of the fetched texel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelTap {
    /// Distance from the center sample, in working-target pixels.
    pub offset: f32,
    /// Contribution of this sample. Taps past index 0 are fetched twice,
    /// mirrored around the center.
    pub weight: f32,
}

/// A one-dimensional blur kernel, shared by the vertical and horizontal
/// passes of a separable convolution.
///
/// `taps[0]` is always the unmirrored center sample with offset 0. The
/// kernel is immutable once built; changing the radius builds a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlurKernel {
    taps: Vec<KernelTap>,
}

impl BlurKernel {
    /// The disabled kernel: no taps, no blur work.
    pub const fn disabled() -> Self {
        Self { taps: Vec::new() }
    }

    /// Final tap count of this kernel (after any reduction).
    pub fn radius(&self) -> u32 {
        self.taps.len() as u32
    }

    /// Whether this kernel performs any blurring.
    pub fn is_enabled(&self) -> bool {
        !self.taps.is_empty()
    }

    /// The ordered tap sequence, center first.
    pub fn taps(&self) -> &[KernelTap] {
        &self.taps
    }

    /// Packs the taps into fixed-size vec4 rows (`[offset, weight, 0, 0]`)
    /// for the pass uniform buffer. Unused rows are zero.
    pub(crate) fn uniform_rows(&self) -> [[f32; 4]; MAX_KERNEL_TAPS] {
        let mut rows = [[0.0f32; 4]; MAX_KERNEL_TAPS];
        for (row, tap) in rows.iter_mut().zip(&self.taps) {
            row[0] = tap.offset;
            row[1] = tap.weight;
        }
        rows
    }
}

/// Builds the blur kernel for `requested_radius`.
///
/// Even radii round up to the next odd value; radius 0 yields the disabled
/// kernel. `sigma` is the pixel spacing between taps. With `reduce_taps`
/// the tap count is roughly halved by pairwise merging; the merge is a
/// no-op below radius 3 (there is no pair to merge).
pub fn build_kernel(requested_radius: u32, sigma: f32, reduce_taps: bool) -> BlurKernel {
    if requested_radius == 0 {
        return BlurKernel::disabled();
    }

    let clamped = if requested_radius > MAX_KERNEL_RADIUS {
        warn!(
            requested_radius,
            cap = MAX_KERNEL_RADIUS,
            "blur radius exceeds kernel cap, clamping"
        );
        MAX_KERNEL_RADIUS
    } else {
        requested_radius
    };
    let radius = (clamped + (clamped + 1) % 2) as usize;
    let order = 2 * (radius + 2) - 2;

    // coefficients[i] holds C(order, radius + 1 - i): the central binomial
    // coefficient at i == 0, falling off toward the truncated tail.
    let mut coefficients = vec![0.0f64; radius + 2];
    coefficients[radius + 1] = 1.0;
    for i in 1..radius + 2 {
        coefficients[radius + 1 - i] =
            coefficients[radius + 2 - i] * (order - i + 1) as f64 / i as f64;
    }

    // Correct the full-distribution sum for the two dropped tail
    // coefficients on each side, so the retained taps sum to exactly 1.
    let mut sum = 2.0f64.powi(order as i32);
    sum -= (coefficients[radius + 1] + coefficients[radius]) * 2.0;

    let mut taps: Vec<KernelTap> = (0..radius)
        .map(|i| KernelTap {
            offset: i as f32 * sigma,
            weight: (coefficients[i] / sum) as f32,
        })
        .collect();

    if reduce_taps && radius >= 3 {
        let merged = (radius + 1) / 2;
        for i in 1..merged {
            let (a, b) = (taps[i * 2], taps[i * 2 - 1]);
            let weight = a.weight + b.weight;
            let offset = (a.offset * a.weight + b.offset * b.weight) / weight;
            taps[i] = KernelTap { offset, weight };
        }
        taps.truncate(merged);
    }

    BlurKernel { taps }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirrored_sum(kernel: &BlurKernel) -> f32 {
        let taps = kernel.taps();
        taps[0].weight + 2.0 * taps[1..].iter().map(|t| t.weight).sum::<f32>()
    }

    /// Applies one mirrored 1D convolution of `kernel` over `signal`.
    /// Offsets are assumed integral (unreduced kernels with sigma 1).
    fn convolve_1d(signal: &[f64], kernel: &BlurKernel) -> Vec<f64> {
        let n = signal.len() as isize;
        let sample = |i: isize| {
            if i < 0 || i >= n {
                0.0
            } else {
                signal[i as usize]
            }
        };
        (0..n)
            .map(|i| {
                let mut acc = sample(i) * kernel.taps()[0].weight as f64;
                for tap in &kernel.taps()[1..] {
                    let d = tap.offset.round() as isize;
                    acc += (sample(i - d) + sample(i + d)) * tap.weight as f64;
                }
                acc
            })
            .collect()
    }

    fn weighted_variance(signal: &[f64]) -> f64 {
        let total: f64 = signal.iter().sum();
        let mean: f64 = signal
            .iter()
            .enumerate()
            .map(|(i, v)| i as f64 * v)
            .sum::<f64>()
            / total;
        signal
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64 - mean).powi(2) * v)
            .sum::<f64>()
            / total
    }

    #[test]
    fn weights_sum_to_one_for_all_odd_radii() {
        for radius in (1..=MAX_KERNEL_RADIUS).step_by(2) {
            for reduce in [false, true] {
                let kernel = build_kernel(radius, 1.0, reduce);
                let sum = mirrored_sum(&kernel);
                assert!(
                    (sum - 1.0).abs() < 1e-4,
                    "radius {radius} reduce {reduce}: sum {sum}"
                );
                assert_eq!(kernel.taps()[0].offset, 0.0);
            }
        }
    }

    #[test]
    fn even_radii_round_up() {
        for radius in (2..MAX_KERNEL_RADIUS).step_by(2) {
            let even = build_kernel(radius, 1.0, false);
            let odd = build_kernel(radius + 1, 1.0, false);
            assert_eq!(even, odd, "radius {radius}");
        }
    }

    #[test]
    fn zero_radius_is_disabled() {
        let kernel = build_kernel(0, 1.0, true);
        assert!(!kernel.is_enabled());
        assert_eq!(kernel.radius(), 0);
    }

    #[test]
    fn reduction_halves_tap_count() {
        for radius in [3u32, 5, 9, 19, 49] {
            let full = build_kernel(radius, 1.0, false);
            let reduced = build_kernel(radius, 1.0, true);
            assert_eq!(full.radius(), radius);
            assert_eq!(reduced.radius(), (radius + 1) / 2);
            assert!((mirrored_sum(&reduced) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn reduction_is_noop_below_radius_three() {
        let plain = build_kernel(1, 1.0, false);
        let reduced = build_kernel(1, 1.0, true);
        assert_eq!(plain, reduced);
        assert_eq!(plain.radius(), 1);
    }

    #[test]
    fn radius_above_cap_is_clamped() {
        let capped = build_kernel(MAX_KERNEL_RADIUS, 1.0, false);
        let over = build_kernel(120, 1.0, false);
        assert_eq!(capped, over);
    }

    #[test]
    fn offsets_strictly_increase() {
        for reduce in [false, true] {
            let kernel = build_kernel(9, 1.0, reduce);
            for pair in kernel.taps().windows(2) {
                assert!(pair[1].offset > pair[0].offset);
            }
        }
    }

    #[test]
    fn radius_five_scenario() {
        let kernel = build_kernel(5, 1.0, false);
        assert_eq!(kernel.radius(), 5);
        let offsets: Vec<f32> = kernel.taps().iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        // Truncated binomial over C(12, k): 924, 792, 495, 220, 66 / 4070.
        let expected = [924.0, 792.0, 495.0, 220.0, 66.0].map(|c: f32| c / 4070.0);
        for (tap, want) in kernel.taps().iter().zip(expected) {
            assert!((tap.weight - want).abs() < 1e-6);
        }
        // Peak at the center, monotonically decaying outward.
        for pair in kernel.taps().windows(2) {
            assert!(pair[0].weight > pair[1].weight);
        }

        let reduced = build_kernel(5, 1.0, true);
        assert_eq!(reduced.radius(), 3);
        assert_eq!(reduced.taps()[0].weight, kernel.taps()[0].weight);
    }

    #[test]
    fn sigma_scales_offsets() {
        let kernel = build_kernel(5, 2.0, false);
        let offsets: Vec<f32> = kernel.taps().iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn uniform_rows_pack_offset_weight_pairs() {
        let kernel = build_kernel(5, 1.0, true);
        let rows = kernel.uniform_rows();
        for (row, tap) in rows.iter().zip(kernel.taps()) {
            assert_eq!(row[0], tap.offset);
            assert_eq!(row[1], tap.weight);
        }
        assert_eq!(rows[kernel.radius() as usize], [0.0; 4]);
    }

    #[test]
    fn extra_rounds_widen_the_response() {
        let kernel = build_kernel(5, 1.0, false);
        let mut impulse = vec![0.0f64; 257];
        impulse[128] = 1.0;

        let one_round = convolve_1d(&impulse, &kernel);
        let mut three_rounds = one_round.clone();
        for _ in 0..2 {
            three_rounds = convolve_1d(&three_rounds, &kernel);
        }

        let v1 = weighted_variance(&one_round);
        let v3 = weighted_variance(&three_rounds);
        assert!(
            v3 > v1,
            "three rounds should spread wider: {v3} vs {v1}"
        );
    }
}
