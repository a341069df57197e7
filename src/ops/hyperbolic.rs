//! Hyperbolic functions and their inverses.

use crate::tape::Op;
use crate::tensor::Tensor;

impl Tensor {
    pub fn sinh(&self) -> Tensor {
        let value = self.value().mapv(f32::sinh);
        self.unary_output(value, Op::Sinh { a: self.clone() })
    }

    pub fn cosh(&self) -> Tensor {
        let value = self.value().mapv(f32::cosh);
        self.unary_output(value, Op::Cosh { a: self.clone() })
    }

    pub fn tanh(&self) -> Tensor {
        let value = self.value().mapv(f32::tanh);
        self.unary_output(value, Op::Tanh { a: self.clone() })
    }

    pub fn arcsinh(&self) -> Tensor {
        let value = self.value().mapv(f32::asinh);
        self.unary_output(value, Op::Arcsinh { a: self.clone() })
    }

    pub fn arccosh(&self) -> Tensor {
        let value = self.value().mapv(f32::acosh);
        self.unary_output(value, Op::Arccosh { a: self.clone() })
    }

    pub fn arctanh(&self) -> Tensor {
        let value = self.value().mapv(f32::atanh);
        self.unary_output(value, Op::Arctanh { a: self.clone() })
    }
}
