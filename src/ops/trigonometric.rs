//! Trigonometric functions and their inverses.

use std::f32::consts::PI;

use crate::tape::Op;
use crate::tensor::Tensor;

impl Tensor {
    pub fn sin(&self) -> Tensor {
        let value = self.value().mapv(f32::sin);
        self.unary_output(value, Op::Sin { a: self.clone() })
    }

    pub fn cos(&self) -> Tensor {
        let value = self.value().mapv(f32::cos);
        self.unary_output(value, Op::Cos { a: self.clone() })
    }

    pub fn tan(&self) -> Tensor {
        let value = self.value().mapv(f32::tan);
        self.unary_output(value, Op::Tan { a: self.clone() })
    }

    pub fn arcsin(&self) -> Tensor {
        let value = self.value().mapv(f32::asin);
        self.unary_output(value, Op::Arcsin { a: self.clone() })
    }

    pub fn arccos(&self) -> Tensor {
        let value = self.value().mapv(f32::acos);
        self.unary_output(value, Op::Arccos { a: self.clone() })
    }

    pub fn arctan(&self) -> Tensor {
        let value = self.value().mapv(f32::atan);
        self.unary_output(value, Op::Arctan { a: self.clone() })
    }

    /// Degrees to radians.
    pub fn radians(&self) -> Tensor {
        let value = self.value().mapv(f32::to_radians);
        self.unary_output(value, Op::Radians { a: self.clone() })
    }

    /// Normalized sinc: sin(πx)/(πx), 1 at the origin.
    pub fn sinc(&self) -> Tensor {
        let value = self.value().mapv(|v| {
            if v == 0.0 {
                1.0
            } else {
                (PI * v).sin() / (PI * v)
            }
        });
        self.unary_output(value, Op::Sinc { a: self.clone() })
    }
}
