use num_traits::{AsPrimitive, Float};

use crate::{MatmulInput, MatmulOutput, Tensor};

pub const BLOCK_SIZE: usize = 4;

/// Signed int8 values packed four to a `u32`, lowest byte first, with one
/// scale for the whole matrix.
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct QuantizedMatrix {
    pub packed: Vec<u32>,
    pub absmax: f32,
    pub rows: usize,
    pub cols: usize,
}

impl QuantizedMatrix {
    /// Largest error a single element picks up from quantization.
    pub fn max_error(&self) -> f32 {
        self.absmax / 127.0 / 2.0
    }
}

/// The last block is zero-padded when `rows * cols` is not a multiple of 4.
pub fn sint8_quantize<F: Float + AsPrimitive<f32> + AsPrimitive<i32>>(
    matrix: &[F],
    rows: usize,
    cols: usize,
) -> QuantizedMatrix {
    let absmax = matrix.iter().fold(F::zero(), |acc, &x| acc.max(x.abs()));
    let sf = F::from(127.).unwrap_or_else(F::one);
    let quantize = |x: F| -> u32 {
        if absmax == F::zero() {
            return 0;
        }
        let q: i32 = AsPrimitive::<i32>::as_((x / absmax * sf).round());
        (q as i8 as u8) as u32
    };

    let packed = matrix
        .chunks(BLOCK_SIZE)
        .map(|block| {
            block
                .iter()
                .enumerate()
                .fold(0u32, |acc, (j, &x)| acc | (quantize(x) << (8 * j)))
        })
        .collect();
    log::debug!("quantized {rows}x{cols} matrix, absmax {:?}", AsPrimitive::<f32>::as_(absmax));
    QuantizedMatrix::new(packed, AsPrimitive::<f32>::as_(absmax), rows, cols)
}

pub fn sint8_dequantize(quantized: &QuantizedMatrix) -> Vec<f32> {
    let numel = quantized.rows * quantized.cols;
    let scale = quantized.absmax / 127.0;
    quantized
        .packed
        .iter()
        .flat_map(|&packed_value| {
            (0..BLOCK_SIZE).map(move |j| ((packed_value >> (8 * j)) as u8 as i8) as f32 * scale)
        })
        .take(numel)
        .collect()
}

/// Matmul with B round-tripped through int8.
pub fn qmm(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let A = input.a().to_vec::<f32>();
    let B = sint8_dequantize(&sint8_quantize(&input.b().to_vec::<f32>(), K, N));
    Tensor::from_fn([M, N], |i| {
        let (m, n) = (i / N, i % N);
        (0..K).map(|k| A[m * K + k] * B[k * N + n]).sum::<f32>()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_roundtrip_error_bounded() {
        let input = MatmulInput::random(1, 1, 64 * 9 + 3, 11);
        let data = input.b().to_vec::<f32>();
        let q = sint8_quantize(&data, 1, data.len());
        assert_eq!(q.packed.len(), (data.len() + 3) / 4);
        let back = sint8_dequantize(&q);
        assert_eq!(back.len(), data.len());
        for (x, y) in data.iter().zip(&back) {
            assert!((x - y).abs() <= q.max_error() * 1.001, "{x} vs {y}");
        }
    }

    #[test]
    pub fn test_extremes_and_sign() {
        let data = [-2.0f32, 2.0, 1.0, 0.0, -1.0];
        let q = sint8_quantize(&data, 1, 5);
        assert_eq!(q.absmax, 2.0);
        assert_eq!(q.packed[0] & 0xFF, 0x81); // -127
        assert_eq!((q.packed[0] >> 8) & 0xFF, 0x7F); // 127
        let back = sint8_dequantize(&q);
        assert!((back[0] + 2.0).abs() < 1e-6);
        assert!((back[1] - 2.0).abs() < 1e-6);
        assert_eq!(back[3], 0.0);
        assert!((back[4] + 1.0).abs() <= q.max_error() * 1.001);
    }

    #[test]
    pub fn test_all_zero_matrix() {
        let q = sint8_quantize(&[0.0f64; 8], 2, 4);
        assert_eq!(q.packed, vec![0, 0]);
        assert_eq!(sint8_dequantize(&q), vec![0.0; 8]);
    }

    #[test]
    pub fn test_qmm_close_to_exact() {
        let input = MatmulInput::random(5, 32, 7, 99);
        let exact = crate::mm_ref(&input);
        let approx = qmm(&input);
        let max_diff = exact
            .iter_f64()
            .zip(approx.iter_f64())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_diff > 0.0);
        assert!(max_diff < 1e-2, "{max_diff}");
    }
}
