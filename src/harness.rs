use std::{fmt, hint::black_box, time::Instant};

use crate::{DiagnosticSink, HarnessError, KernelOutput, MatmulInput, ReferenceMatcher, Tensor};

/// How many untimed and timed calls a kernel gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new)]
pub struct Benchmark {
    pub warmup: usize,
    pub iterations: usize,
}

impl Default for Benchmark {
    fn default() -> Self {
        Self::new(8, 10)
    }
}

#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct BenchReport {
    pub name: String,
    pub nanos: u128,
    pub iterations: usize,
    pub gflops: f64,
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ns over {} runs, {:.3} GFLOPS",
            self.name, self.nanos, self.iterations, self.gflops
        )
    }
}

/// Checks `kernel` against the matcher's reference, then times it.
/// A kernel that does not match is never timed.
pub fn test_harness<R, S, K, O>(
    matcher: &ReferenceMatcher<R, S>,
    name: &str,
    kernel: K,
    input: &MatmulInput,
    bench: &Benchmark,
) -> Result<BenchReport, HarnessError>
where
    R: Fn(&MatmulInput) -> Tensor,
    S: DiagnosticSink,
    K: Fn(&MatmulInput) -> O,
    O: Into<KernelOutput>,
{
    if !matcher.check(&kernel, input) {
        return Err(HarnessError::Mismatch(name.to_string()));
    }
    log::info!("{name} matches reference implementation");

    //warmup
    for _ in 0..bench.warmup {
        black_box(kernel(black_box(input)));
    }

    let start = Instant::now();
    for _ in 0..bench.iterations {
        black_box(kernel(black_box(input)));
    }
    let elapsed = start.elapsed();

    let nanos = elapsed.as_nanos().max(1);
    let flops = input.flops() * bench.iterations;
    let gflops = (flops as f64 / 1e9) / (nanos as f64 / 1e9);
    log::debug!("{name}: {nanos} ns, {gflops} GFLOPS");
    Ok(BenchReport::new(name.to_string(), nanos, bench.iterations, gflops))
}
