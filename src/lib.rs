#![allow(non_snake_case)]
mod config;
mod diagnostic;
mod error;
pub mod gemm;
mod harness;
mod matcher;
mod quant;
mod task;
mod tensor;
mod tolerance;

pub use config::*;
pub use diagnostic::*;
pub use error::*;
pub use gemm::*;
pub use harness::*;
pub use matcher::*;
pub use quant::*;
pub use task::*;
pub use tensor::*;
pub use tolerance::*;
