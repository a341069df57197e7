//! Reverse-mode automatic differentiation over n-dimensional arrays.
//!
//! Expressions are built from [`Tensor`] values: every operation computes
//! its forward result through the dense-array engine and records a tape
//! entry naming the operation and its arguments. Calling
//! [`Tensor::backward`] on a scalar output walks that tape depth-first,
//! applying each operation's chain rule and summing contributions into
//! every reachable tensor's gradient accumulator.
//!
//! ```
//! use numgrad::Tensor;
//!
//! let x = Tensor::scalar(2.0, true);
//! let y = x.multiply(&x).unwrap().multiply(&x).unwrap();
//! y.backward().unwrap();
//! assert_eq!(x.grad().unwrap().item().unwrap(), 12.0); // 3x² at x = 2
//! ```

pub mod device;
pub mod engine;
pub mod error;
pub mod nn;
pub mod ops;
pub mod tape;
pub mod tensor;
pub mod validate;

pub use device::Device;
pub use error::{Result, TensorError};
pub use nn::Reduction;
pub use tape::{Arg, Op, OperationContext};
pub use tensor::Tensor;
pub use validate::IntoOperand;
