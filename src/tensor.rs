use std::fmt;

use half::{bf16, f16};

use crate::HarnessError;

/// Element types a [`Tensor`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
}

impl DType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    pub const fn size_of(self) -> usize {
        match self {
            Self::F16 | Self::BF16 => 2,
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed, contiguous, row-major element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Storage {
    pub fn len(&self) -> usize {
        match self {
            Self::F16(v) => v.len(),
            Self::BF16(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::F16(_) => DType::F16,
            Self::BF16(_) => DType::BF16,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }
}

/// A scalar type that can back a [`Storage`].
pub trait Element: Copy + bytemuck::Pod + fmt::Debug + 'static {
    const DTYPE: DType;

    fn wrap(data: Vec<Self>) -> Storage;
    fn view(storage: &Storage) -> Option<&[Self]>;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $to:expr, $from:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(data: Vec<Self>) -> Storage {
                Storage::$variant(data)
            }

            fn view(storage: &Storage) -> Option<&[Self]> {
                match storage {
                    Storage::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn to_f64(self) -> f64 {
                $to(self)
            }

            fn from_f64(value: f64) -> Self {
                $from(value)
            }
        }
    };
}

impl_element!(f16, F16, f16::to_f64, f16::from_f64);
impl_element!(bf16, BF16, bf16::to_f64, bf16::from_f64);
impl_element!(f32, F32, |x: f32| x as f64, |x: f64| x as f32);
impl_element!(f64, F64, |x: f64| x, |x: f64| x);

/// An n-dimensional numeric array: a shape plus row-major storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    storage: Storage,
}

impl Tensor {
    /// Fails if `data` does not hold exactly `shape.iter().product()` elements.
    pub fn new<E: Element>(shape: impl Into<Vec<usize>>, data: Vec<E>) -> Result<Self, HarnessError> {
        let shape = shape.into();
        let expected = numel(&shape);
        if data.len() != expected {
            return Err(HarnessError::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            storage: E::wrap(data),
        })
    }

    pub fn zeros<E: Element>(shape: impl Into<Vec<usize>>) -> Self {
        Self::from_fn(shape, |_| E::from_f64(0.0))
    }

    /// Builds a tensor by calling `f` with each flat (row-major) index.
    pub fn from_fn<E: Element>(shape: impl Into<Vec<usize>>, f: impl FnMut(usize) -> E) -> Self {
        let shape = shape.into();
        let data = (0..numel(&shape)).map(f).collect();
        Self {
            shape,
            storage: E::wrap(data),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.storage.len()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Element at flat index `i`, widened to `f64`.
    pub fn get(&self, i: usize) -> f64 {
        match &self.storage {
            Storage::F16(v) => v[i].to_f64(),
            Storage::BF16(v) => v[i].to_f64(),
            Storage::F32(v) => v[i] as f64,
            Storage::F64(v) => v[i],
        }
    }

    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match &self.storage {
            Storage::F16(v) => Box::new(v.iter().map(|x| x.to_f64())),
            Storage::BF16(v) => Box::new(v.iter().map(|x| x.to_f64())),
            Storage::F32(v) => Box::new(v.iter().map(|&x| x as f64)),
            Storage::F64(v) => Box::new(v.iter().copied()),
        }
    }

    /// Borrows the elements without conversion when `E` is the stored type.
    pub fn as_slice<E: Element>(&self) -> Option<&[E]> {
        E::view(&self.storage)
    }

    /// Copies the elements out as `E`, converting through `f64` if needed.
    pub fn to_vec<E: Element>(&self) -> Vec<E> {
        match self.as_slice::<E>() {
            Some(s) => s.to_vec(),
            None => self.iter_f64().map(E::from_f64).collect(),
        }
    }

    pub fn to_dtype(&self, dtype: DType) -> Tensor {
        let storage = match dtype {
            DType::F16 => Storage::F16(self.to_vec()),
            DType::BF16 => Storage::BF16(self.to_vec()),
            DType::F32 => Storage::F32(self.to_vec()),
            DType::F64 => Storage::F64(self.to_vec()),
        };
        Tensor {
            shape: self.shape.clone(),
            storage,
        }
    }

    /// Raw native-endian bytes of the storage, for handing to external kernels.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::F16(v) => bytemuck::cast_slice(v),
            Storage::BF16(v) => bytemuck::cast_slice(v),
            Storage::F32(v) => bytemuck::cast_slice(v),
            Storage::F64(v) => bytemuck::cast_slice(v),
        }
    }
}

fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}
