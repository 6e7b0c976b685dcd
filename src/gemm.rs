use half::f16;
use num_traits::Float;

use crate::{qmm, KernelOutput, MatmulInput, MatmulOutput, Tensor};

pub const BLOCKSIZE: usize = 16;

/// A candidate kernel as stored in [`CANDIDATES`].
pub type Kernel = fn(&MatmulInput) -> KernelOutput;

fn mm_naive_into<F: Float>(A: &[F], B: &[F], C: &mut [F], dims: (usize, usize, usize)) {
    let (M, N, K) = dims;
    for m in 0..M {
        for n in 0..N {
            let mut res = F::zero();
            for k in 0..K {
                res = res + A[m * K + k] * B[k * N + n];
            }
            C[m * N + n] = res;
        }
    }
}

/// Trusted reference: naive loop accumulated in f64, returned in the dtype of `A`.
pub fn mm_ref(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let A = input.a().to_vec::<f64>();
    let B = input.b().to_vec::<f64>();
    let mut C = vec![0f64; M * N];
    mm_naive_into(&A, &B, &mut C, (M, N, K));
    Tensor::from_fn([M, N], |i| C[i]).to_dtype(input.a().dtype())
}

pub fn mm_naive(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let mut C = vec![0f32; M * N];
    mm_naive_into(&input.a().to_vec(), &input.b().to_vec(), &mut C, (M, N, K));
    Tensor::from_fn([M, N], |i| C[i])
}

/// Square tiles of `BLOCKSIZE` over all three loops, i-k-j order inside a tile.
pub fn mm_blocked(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let A = input.a().to_vec::<f32>();
    let B = input.b().to_vec::<f32>();
    let mut C = vec![0f32; M * N];
    for m0 in (0..M).step_by(BLOCKSIZE) {
        for n0 in (0..N).step_by(BLOCKSIZE) {
            for k0 in (0..K).step_by(BLOCKSIZE) {
                for m in m0..(m0 + BLOCKSIZE).min(M) {
                    for k in k0..(k0 + BLOCKSIZE).min(K) {
                        let a = A[m * K + k];
                        for n in n0..(n0 + BLOCKSIZE).min(N) {
                            C[m * N + n] += a * B[k * N + n];
                        }
                    }
                }
            }
        }
    }
    Tensor::from_fn([M, N], |i| C[i])
}

pub fn mm_gemm(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let A = input.a().to_vec::<f32>();
    let B = input.b().to_vec::<f32>();
    let mut C = vec![0f32; M * N];
    // SAFETY: A is M×K, B is K×N and C is M×N, all row-major and contiguous,
    // so every stride below stays inside its buffer.
    unsafe {
        matrixmultiply::sgemm(
            M,
            K,
            N,
            1.0,
            A.as_ptr(),
            K as isize,
            1,
            B.as_ptr(),
            N as isize,
            1,
            0.0,
            C.as_mut_ptr(),
            N as isize,
            1,
        );
    }
    Tensor::from_fn([M, N], |i| C[i])
}

pub fn mm_f64(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let A = input.a().to_vec::<f64>();
    let B = input.b().to_vec::<f64>();
    let mut C = vec![0f64; M * N];
    // SAFETY: same layout as in `mm_gemm`.
    unsafe {
        matrixmultiply::dgemm(
            M,
            K,
            N,
            1.0,
            A.as_ptr(),
            K as isize,
            1,
            B.as_ptr(),
            N as isize,
            1,
            0.0,
            C.as_mut_ptr(),
            N as isize,
            1,
        );
    }
    Tensor::from_fn([M, N], |i| C[i])
}

/// Operands and accumulator in f16.
pub fn mm_half(input: &MatmulInput) -> MatmulOutput {
    let (M, N, K) = input.dims();
    let mut C = vec![f16::ZERO; M * N];
    mm_naive_into(&input.a().to_vec(), &input.b().to_vec(), &mut C, (M, N, K));
    Tensor::from_fn([M, N], |i| C[i])
}

/// Correct values without a shape.
pub fn mm_flat(input: &MatmulInput) -> Vec<f32> {
    let (M, N, K) = input.dims();
    let mut C = vec![0f32; M * N];
    mm_naive_into(&input.a().to_vec(), &input.b().to_vec(), &mut C, (M, N, K));
    C
}

/// Every candidate shipped with the crate, by name.
pub const CANDIDATES: &[(&str, Kernel)] = &[
    ("mm_naive", |x: &MatmulInput| mm_naive(x).into()),
    ("mm_blocked", |x: &MatmulInput| mm_blocked(x).into()),
    ("mm_gemm", |x: &MatmulInput| mm_gemm(x).into()),
    ("mm_f64", |x: &MatmulInput| mm_f64(x).into()),
    ("mm_half", |x: &MatmulInput| mm_half(x).into()),
    ("mm_flat", |x: &MatmulInput| mm_flat(x).into()),
    ("qmm", |x: &MatmulInput| qmm(x).into()),
];
