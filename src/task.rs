use rand::{distributions::Uniform, rngs::StdRng, Rng, SeedableRng};

use crate::{DType, HarnessError, Tensor};

/// The output of a matmul kernel: an M×N matrix.
pub type MatmulOutput = Tensor;

/// Operands of `C = A @ B`, with A being M×K and B being K×N.
#[derive(Debug, Clone, PartialEq)]
pub struct MatmulInput {
    a: Tensor,
    b: Tensor,
}

impl MatmulInput {
    pub fn new(a: Tensor, b: Tensor) -> Result<Self, HarnessError> {
        for t in [&a, &b] {
            if t.rank() != 2 {
                return Err(HarnessError::NotAMatrix(t.shape().to_vec()));
            }
        }
        if a.shape()[1] != b.shape()[0] {
            return Err(HarnessError::InnerDimMismatch {
                lhs: a.shape().to_vec(),
                rhs: b.shape().to_vec(),
            });
        }
        Ok(Self { a, b })
    }

    /// Reproducible f32 operands, uniform in [-0.2, 0.2].
    pub fn random(M: usize, K: usize, N: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = generate_weight_data(&mut rng, M, K);
        let b = generate_weight_data(&mut rng, K, N);
        Self { a, b }
    }

    pub fn a(&self) -> &Tensor {
        &self.a
    }

    pub fn b(&self) -> &Tensor {
        &self.b
    }

    /// (M, N, K)
    pub fn dims(&self) -> (usize, usize, usize) {
        let (M, K) = (self.a.shape()[0], self.a.shape()[1]);
        let N = self.b.shape()[1];
        (M, N, K)
    }

    pub fn flops(&self) -> usize {
        let (M, N, K) = self.dims();
        2 * M * N * K
    }

    pub fn to_dtype(&self, dtype: DType) -> Self {
        Self {
            a: self.a.to_dtype(dtype),
            b: self.b.to_dtype(dtype),
        }
    }
}

fn generate_weight_data(rng: &mut impl Rng, rows: usize, cols: usize) -> Tensor {
    let dist = Uniform::from(-10.0f32..10.0);
    Tensor::from_fn([rows, cols], |_| rng.sample(dist) / 50.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_rejects_mismatched_inner_dims() {
        let a = Tensor::zeros::<f32>([2, 3]);
        let b = Tensor::zeros::<f32>([2, 3]);
        assert_eq!(
            MatmulInput::new(a, b).unwrap_err(),
            HarnessError::InnerDimMismatch {
                lhs: vec![2, 3],
                rhs: vec![2, 3]
            }
        );
    }

    #[test]
    pub fn test_rejects_non_matrices() {
        let a = Tensor::zeros::<f32>([6]);
        let b = Tensor::zeros::<f32>([6, 1]);
        assert_eq!(
            MatmulInput::new(a, b).unwrap_err(),
            HarnessError::NotAMatrix(vec![6])
        );
    }

    #[test]
    pub fn test_accessors_expose_validated_operands() {
        let a = Tensor::from_fn([2, 3], |i| i as f32);
        let b = Tensor::zeros::<f32>([3, 4]);
        let x = MatmulInput::new(a.clone(), b.clone()).unwrap();
        assert_eq!(x.a(), &a);
        assert_eq!(x.b(), &b);
        assert_eq!(x.dims(), (2, 4, 3));
        assert_eq!(x.to_dtype(DType::F64).a().dtype(), DType::F64);
    }

    #[test]
    pub fn test_random_is_seeded_and_bounded() {
        let x = MatmulInput::random(4, 8, 3, 7);
        assert_eq!(x, MatmulInput::random(4, 8, 3, 7));
        assert_ne!(x, MatmulInput::random(4, 8, 3, 8));
        assert_eq!(x.dims(), (4, 3, 8));
        assert_eq!(x.flops(), 2 * 4 * 3 * 8);
        assert!(x.a().iter_f64().chain(x.b().iter_f64()).all(|v| v.abs() <= 0.2 + 1e-6));
    }
}
