//! Exponential and logarithmic functions.

use crate::error::Result;
use crate::tape::Op;
use crate::tensor::Tensor;

impl Tensor {
    pub fn exp(&self) -> Tensor {
        let value = self.value().mapv(f32::exp);
        self.unary_output(value, Op::Exp { a: self.clone() })
    }

    pub fn exp2(&self) -> Tensor {
        let value = self.value().mapv(f32::exp2);
        self.unary_output(value, Op::Exp2 { a: self.clone() })
    }

    pub fn expm1(&self) -> Tensor {
        let value = self.value().mapv(f32::exp_m1);
        self.unary_output(value, Op::Expm1 { a: self.clone() })
    }

    /// Natural logarithm.
    pub fn log(&self) -> Tensor {
        let value = self.value().mapv(f32::ln);
        self.unary_output(value, Op::Log { a: self.clone() })
    }

    pub fn log1p(&self) -> Tensor {
        let value = self.value().mapv(f32::ln_1p);
        self.unary_output(value, Op::Log1p { a: self.clone() })
    }

    pub fn log2(&self) -> Tensor {
        let value = self.value().mapv(f32::log2);
        self.unary_output(value, Op::Log2 { a: self.clone() })
    }

    pub fn log10(&self) -> Tensor {
        let value = self.value().mapv(f32::log10);
        self.unary_output(value, Op::Log10 { a: self.clone() })
    }

    pub fn sqrt(&self) -> Tensor {
        let value = self.value().mapv(f32::sqrt);
        self.unary_output(value, Op::Sqrt { a: self.clone() })
    }

    /// Reciprocal square root.
    pub fn rsqrt(&self) -> Tensor {
        let value = self.value().mapv(|v| 1.0 / v.sqrt());
        self.unary_output(value, Op::Rsqrt { a: self.clone() })
    }

    /// Logistic sigmoid, built from primitive ops so the gradient flows
    /// through the recorded graph.
    pub fn sigmoid(&self) -> Result<Tensor> {
        let one = Tensor::scalar(1.0, false);
        one.divide(self.multiply(-1.0)?.exp().add(&one)?)
    }
}
