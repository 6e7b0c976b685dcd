use std::fmt;

use crate::{scan, Diagnostic, DiagnosticSink, LogSink, Tensor, Tolerance};

/// Whatever a candidate kernel hands back. Only [`KernelOutput::Tensor`] can
/// ever match a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelOutput {
    Tensor(Tensor),
    Scalar(f64),
    Opaque { type_name: &'static str },
}

impl KernelOutput {
    pub fn opaque<T>() -> Self {
        Self::Opaque {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Tensor(_) => "Tensor",
            Self::Scalar(_) => "scalar",
            Self::Opaque { type_name } => type_name,
        }
    }
}

impl From<Tensor> for KernelOutput {
    fn from(t: Tensor) -> Self {
        Self::Tensor(t)
    }
}

impl From<f32> for KernelOutput {
    fn from(x: f32) -> Self {
        Self::Scalar(x as f64)
    }
}

impl From<f64> for KernelOutput {
    fn from(x: f64) -> Self {
        Self::Scalar(x)
    }
}

// A flat buffer carries no shape, so it is not a tensor.
impl From<Vec<f32>> for KernelOutput {
    fn from(_: Vec<f32>) -> Self {
        Self::opaque::<Vec<f32>>()
    }
}

impl From<Vec<f64>> for KernelOutput {
    fn from(_: Vec<f64>) -> Self {
        Self::opaque::<Vec<f64>>()
    }
}

/// Outcome of a single comparison, before it is collapsed to a `bool`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Match,
    WrongType,
    ShapeMismatch,
    ValueMismatch { max_abs_diff: f64 },
}

impl Verdict {
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Checks candidate kernels against a trusted reference kernel.
///
/// Holds no state between calls: every `check` invokes the reference and the
/// candidate afresh, so identical arguments always give identical answers.
pub struct ReferenceMatcher<R, S = LogSink> {
    reference: R,
    tolerance: Tolerance,
    sink: S,
}

/// Builds a matcher with the default tolerance that logs its diagnostics.
pub fn make_matcher<R>(reference: R) -> ReferenceMatcher<R> {
    ReferenceMatcher::new(reference)
}

impl<R> ReferenceMatcher<R> {
    pub fn new(reference: R) -> Self {
        Self {
            reference,
            tolerance: Tolerance::default(),
            sink: LogSink,
        }
    }
}

impl<R, S> ReferenceMatcher<R, S> {
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_sink<T: DiagnosticSink>(self, sink: T) -> ReferenceMatcher<R, T> {
        ReferenceMatcher {
            reference: self.reference,
            tolerance: self.tolerance,
            sink,
        }
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<R, S: DiagnosticSink> ReferenceMatcher<R, S> {
    /// Runs the reference then the candidate on `input` and reports whether
    /// their outputs agree. Panics in either kernel propagate.
    pub fn check<I, C, O>(&self, candidate: C, input: &I) -> bool
    where
        I: ?Sized,
        R: Fn(&I) -> Tensor,
        C: FnOnce(&I) -> O,
        O: Into<KernelOutput>,
    {
        let reference_output = (self.reference)(input);
        let candidate_output = candidate(input).into();
        self.compare(&reference_output, candidate_output).is_match()
    }

    /// Like [`check`](Self::check) for fallible kernels. The first `Err` is
    /// returned untouched.
    pub fn try_check<I, C, O, E>(&self, candidate: C, input: &I) -> Result<bool, E>
    where
        I: ?Sized,
        R: Fn(&I) -> Result<Tensor, E>,
        C: FnOnce(&I) -> Result<O, E>,
        O: Into<KernelOutput>,
    {
        let reference_output = (self.reference)(input)?;
        let candidate_output = candidate(input)?.into();
        Ok(self.compare(&reference_output, candidate_output).is_match())
    }

    /// Gates run in a fixed order: type, shape, then values. A dtype
    /// mismatch is reported but never fails the comparison on its own.
    pub fn compare(&self, reference: &Tensor, candidate: KernelOutput) -> Verdict {
        let candidate = match candidate {
            KernelOutput::Tensor(t) => t,
            other => {
                self.sink.emit(&Diagnostic::NotATensor {
                    type_name: other.type_name().to_string(),
                });
                return Verdict::WrongType;
            }
        };

        if reference.shape() != candidate.shape() {
            self.sink.emit(&Diagnostic::ShapeMismatch {
                reference: reference.shape().to_vec(),
                candidate: candidate.shape().to_vec(),
            });
            return Verdict::ShapeMismatch;
        }

        if reference.dtype() != candidate.dtype() {
            self.sink.emit(&Diagnostic::DtypeMismatch {
                reference: reference.dtype(),
                candidate: candidate.dtype(),
            });
        }

        let closeness = scan(reference.iter_f64(), candidate.iter_f64(), &self.tolerance);
        if !closeness.within {
            self.sink.emit(&Diagnostic::ValueMismatch {
                max_abs_diff: closeness.max_abs_diff,
            });
            return Verdict::ValueMismatch {
                max_abs_diff: closeness.max_abs_diff,
            };
        }
        Verdict::Match
    }
}

impl<R, S: fmt::Debug> fmt::Debug for ReferenceMatcher<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceMatcher")
            .field("tolerance", &self.tolerance)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{DType, RecordingSink, Severity};

    fn zeros_2x2(_: &()) -> Tensor {
        Tensor::zeros::<f32>([2, 2])
    }

    fn one_off_2x2(_: &()) -> Tensor {
        Tensor::new([2, 2], vec![0.0f32, 1e-3, 0.0, 0.0]).unwrap()
    }

    #[test]
    pub fn test_identical_kernel_matches_at_any_tolerance() {
        let _ = env_logger::builder().is_test(true).try_init();
        let kernel = |x: &Vec<f64>| Tensor::new([x.len()], x.clone()).unwrap();
        let input = vec![1.5, -2.25, 1e30, 0.0, f64::INFINITY];
        for tol in [Tolerance::exact(), Tolerance::default(), Tolerance::new(3.0, 7.0).unwrap()] {
            let matcher = make_matcher(kernel).with_tolerance(tol);
            assert!(matcher.check(kernel, &input));
        }
    }

    #[test]
    pub fn test_small_error_passes_default_but_not_tight_tolerance() {
        let _ = env_logger::builder().is_test(true).try_init();
        let matcher = make_matcher(zeros_2x2);
        assert!(matcher.check(one_off_2x2, &()));

        let tight = make_matcher(zeros_2x2).with_tolerance(Tolerance::new(0.0, 1e-4).unwrap());
        assert!(!tight.check(one_off_2x2, &()));
    }

    #[test]
    pub fn test_exact_equality_passes_zero_tolerance() {
        let matcher = make_matcher(one_off_2x2).with_tolerance(Tolerance::exact());
        assert!(matcher.check(one_off_2x2, &()));
    }

    #[test]
    pub fn test_transposed_shape_fails_before_values() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(|_: &()| Tensor::from_fn([2, 3], |i| i as f32))
            .with_sink(&sink);
        assert!(!matcher.check(|_: &()| Tensor::from_fn([3, 2], |i| i as f32), &()));
        assert_eq!(
            sink.take(),
            vec![Diagnostic::ShapeMismatch {
                reference: vec![2, 3],
                candidate: vec![3, 2],
            }]
        );
    }

    #[test]
    pub fn test_scalar_output_fails_type_gate_only() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(zeros_2x2).with_sink(&sink);
        assert!(!matcher.check(|_: &()| 0.0f32, &()));
        let seen = sink.take();
        assert_eq!(seen.len(), 1);
        assert!(matches!(seen[0], Diagnostic::NotATensor { .. }));
    }

    #[test]
    pub fn test_flat_buffer_is_not_a_tensor() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(zeros_2x2).with_sink(&sink);
        assert!(!matcher.check(|_: &()| vec![0.0f32; 4], &()));
        assert_eq!(
            sink.take(),
            vec![Diagnostic::NotATensor {
                type_name: std::any::type_name::<Vec<f32>>().to_string()
            }]
        );
    }

    #[test]
    pub fn test_dtype_mismatch_only_warns() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(one_off_2x2).with_sink(&sink);
        assert!(matcher.check(|x: &()| one_off_2x2(x).to_dtype(DType::F64), &()));
        let seen = sink.take();
        assert_eq!(
            seen,
            vec![Diagnostic::DtypeMismatch {
                reference: DType::F32,
                candidate: DType::F64,
            }]
        );
        assert_eq!(seen[0].severity(), Severity::Warning);
    }

    #[test]
    pub fn test_dtype_warning_precedes_value_failure() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(zeros_2x2)
            .with_tolerance(Tolerance::exact())
            .with_sink(&sink);
        let candidate = |x: &()| one_off_2x2(x).to_dtype(DType::F64);
        assert!(!matcher.check(candidate, &()));
        let seen = sink.take();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].severity(), Severity::Warning);
        assert!(matches!(seen[1], Diagnostic::ValueMismatch { .. }));
    }

    #[test]
    pub fn test_difference_exactly_at_bound_is_within() {
        let reference = |_: &()| Tensor::new([3], vec![2.0f64, -4.0, 0.0]).unwrap();
        let tol = Tolerance::new(0.25, 0.5).unwrap();
        let matcher = make_matcher(reference).with_tolerance(tol);
        // bounds are 1.0, 1.5 and 0.5
        assert!(matcher.check(|_: &()| Tensor::new([3], vec![3.0f64, -5.5, 0.5]).unwrap(), &()));
        assert!(!matcher.check(
            |_: &()| Tensor::new([3], vec![3.0f64, -5.5, 0.5000001]).unwrap(),
            &()
        ));
    }

    #[test]
    pub fn test_value_mismatch_reports_max_difference() {
        let matcher = make_matcher(zeros_2x2).with_sink(RecordingSink::new());
        let candidate = KernelOutput::from(Tensor::new([2, 2], vec![0.5f32, -2.0, 0.0, 1.0]).unwrap());
        let verdict = matcher.compare(&zeros_2x2(&()), candidate);
        assert_eq!(verdict, Verdict::ValueMismatch { max_abs_diff: 2.0 });
        assert_eq!(
            matcher.sink().take(),
            vec![Diagnostic::ValueMismatch { max_abs_diff: 2.0 }]
        );
    }

    #[test]
    pub fn test_agrees_with_closed_form_over_random_cases() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let n = rng.gen_range(1..16);
            let r: Vec<f64> = (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect();
            let c: Vec<f64> = r.iter().map(|x| x + rng.gen_range(-0.2..0.2)).collect();
            let tol = Tolerance::new(rng.gen_range(0.0..0.05), rng.gen_range(0.0..0.1)).unwrap();

            let expected = r
                .iter()
                .zip(&c)
                .map(|(r, c)| (r - c).abs() - (tol.absolute() + tol.relative() * r.abs()))
                .fold(f64::NEG_INFINITY, f64::max)
                <= 0.0;

            let reference = Tensor::new([n], r).unwrap();
            let candidate = Tensor::new([n], c).unwrap();
            let matcher = make_matcher(|_: &()| reference.clone())
                .with_tolerance(tol)
                .with_sink(RecordingSink::new());
            assert_eq!(matcher.check(|_: &()| candidate.clone(), &()), expected);
        }
    }

    #[test]
    pub fn test_both_kernels_run_even_when_output_is_wrong() {
        use std::cell::Cell;
        let calls = Cell::new(0);
        let matcher = make_matcher(|_: &()| {
            calls.set(calls.get() + 1);
            Tensor::zeros::<f32>([1])
        })
        .with_sink(RecordingSink::new());
        assert!(!matcher.check(
            |_: &()| {
                calls.set(calls.get() + 10);
                1.0f64
            },
            &()
        ));
        assert_eq!(calls.get(), 11);
    }

    #[test]
    pub fn test_try_check_propagates_kernel_errors() {
        let matcher = make_matcher(|x: &i32| {
            if *x < 0 {
                Err(format!("negative input {x}"))
            } else {
                Ok(Tensor::zeros::<f32>([1]))
            }
        });
        let ok = |_: &i32| Ok::<_, String>(Tensor::zeros::<f32>([1]));
        assert_eq!(matcher.try_check(ok, &1), Ok(true));
        assert_eq!(matcher.try_check(ok, &-1), Err("negative input -1".to_string()));

        let failing = |_: &i32| Err::<Tensor, _>("candidate blew up".to_string());
        assert_eq!(matcher.try_check(failing, &1), Err("candidate blew up".to_string()));
    }

    #[test]
    pub fn test_infinite_reference_rejects_finite_candidate() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(|_: &()| Tensor::new([2], vec![f32::INFINITY, 1.0]).unwrap())
            .with_tolerance(Tolerance::new(0.5, 0.5).unwrap())
            .with_sink(&sink);
        assert!(!matcher.check(|_: &()| Tensor::new([2], vec![5.0f32, 1.0]).unwrap(), &()));
        assert_eq!(
            sink.take(),
            vec![Diagnostic::ValueMismatch {
                max_abs_diff: f64::INFINITY
            }]
        );
    }

    #[test]
    pub fn test_infinite_reference_rejects_opposite_infinity() {
        let sink = RecordingSink::new();
        let matcher = make_matcher(|_: &()| Tensor::new([1], vec![f64::NEG_INFINITY]).unwrap())
            .with_sink(&sink);
        assert!(!matcher.check(|_: &()| Tensor::new([1], vec![f64::INFINITY]).unwrap(), &()));
        assert!(matches!(sink.take()[..], [Diagnostic::ValueMismatch { .. }]));

        assert!(matcher.check(|_: &()| Tensor::new([1], vec![f64::NEG_INFINITY]).unwrap(), &()));
        assert!(sink.is_empty());
    }

    #[test]
    #[should_panic(expected = "candidate panicked")]
    pub fn test_candidate_panic_propagates() {
        let matcher = make_matcher(zeros_2x2);
        matcher.check(|_: &()| -> Tensor { panic!("candidate panicked") }, &());
    }
}
