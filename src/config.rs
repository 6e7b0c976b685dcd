use std::str::FromStr;

use crate::{Benchmark, HarnessError, MatmulInput, Tolerance};

pub const ENV_M: &str = "MM_HARNESS_M";
pub const ENV_N: &str = "MM_HARNESS_N";
pub const ENV_K: &str = "MM_HARNESS_K";
pub const ENV_SEED: &str = "MM_HARNESS_SEED";
pub const ENV_RTOL: &str = "MM_HARNESS_RTOL";
pub const ENV_ATOL: &str = "MM_HARNESS_ATOL";
pub const ENV_WARMUP: &str = "MM_HARNESS_WARMUP";
pub const ENV_ITERS: &str = "MM_HARNESS_ITERS";

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub m: usize,
    pub n: usize,
    pub k: usize,
    pub seed: u64,
    pub tolerance: Tolerance,
    pub bench: Benchmark,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            m: 256,
            n: 256,
            k: 256,
            seed: 42,
            tolerance: Tolerance::default(),
            bench: Benchmark::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HarnessError> {
        let d = Self::default();
        let relative = parse(&lookup, ENV_RTOL)?.unwrap_or(d.tolerance.relative());
        let absolute = parse(&lookup, ENV_ATOL)?.unwrap_or(d.tolerance.absolute());
        Ok(Self {
            m: parse(&lookup, ENV_M)?.unwrap_or(d.m),
            n: parse(&lookup, ENV_N)?.unwrap_or(d.n),
            k: parse(&lookup, ENV_K)?.unwrap_or(d.k),
            seed: parse(&lookup, ENV_SEED)?.unwrap_or(d.seed),
            tolerance: Tolerance::new(relative, absolute)?,
            bench: Benchmark::new(
                parse(&lookup, ENV_WARMUP)?.unwrap_or(d.bench.warmup),
                parse(&lookup, ENV_ITERS)?.unwrap_or(d.bench.iterations),
            ),
        })
    }

    pub fn input(&self) -> MatmulInput {
        MatmulInput::random(self.m, self.k, self.n, self.seed)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, HarnessError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => match value.trim().parse() {
            Ok(v) => Ok(Some(v)),
            Err(_) => Err(HarnessError::InvalidEnv { var, value }),
        },
    }
}
