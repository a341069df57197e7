//! Forward operation methods on [`Tensor`].
//!
//! Each method coerces its operands, computes the forward value through the
//! array engine, constructs the output tensor (requires_grad is the OR of
//! the participating operands, device is their merge) and attaches the tape
//! entry before returning. Inputs are never mutated.

mod arithmetic;
mod exponents;
mod hyperbolic;
mod linalg;
mod rounding;
mod trigonometric;

use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

use ndarray::ArrayD;

use crate::tape::Op;
use crate::tensor::Tensor;

impl Tensor {
    /// Output of a single-operand operation: inherits this tensor's
    /// requires_grad, device and (absent an explicit rename) name.
    pub(crate) fn unary_output(&self, value: ArrayD<f32>, op: Op) -> Tensor {
        let output = Tensor::new_on(value, self.requires_grad(), self.device());
        output.register_operation(op);
        output.set_name(&self.name());
        output
    }

    /// Output of a two-operand operation: requires_grad is the OR of both
    /// flags, the device is the merge, the name falls back to the origin's.
    pub(crate) fn binary_output(&self, other: &Tensor, value: ArrayD<f32>, op: Op) -> Tensor {
        let requires_grad = self.requires_grad() || other.requires_grad();
        let device = self.device().merge(other.device());
        let output = Tensor::new_on(value, requires_grad, device);
        output.register_operation(op);
        output.set_name(&self.name());
        output
    }
}

// Operator sugar over the named methods. The named methods are the checked
// surface; these panic on the shape errors they would return, the same
// convention ndarray uses for its own operators.

macro_rules! impl_binary_operator {
    ($trait:ident, $fn:ident, $method:ident) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Tensor;
            fn $fn(self, rhs: &Tensor) -> Tensor {
                Tensor::$method(self, rhs).unwrap_or_else(|e| panic!("{}", e))
            }
        }

        impl $trait<f32> for &Tensor {
            type Output = Tensor;
            fn $fn(self, rhs: f32) -> Tensor {
                Tensor::$method(self, rhs).unwrap_or_else(|e| panic!("{}", e))
            }
        }
    };
}

impl_binary_operator!(Add, add, add);
impl_binary_operator!(Sub, sub, subtract);
impl_binary_operator!(Mul, mul, multiply);
impl_binary_operator!(Div, div, divide);
impl_binary_operator!(Rem, rem, rem);

impl Neg for &Tensor {
    type Output = Tensor;
    fn neg(self) -> Tensor {
        self.negative()
    }
}
