//! Arithmetic function tools.
//!
//! Six pure, deterministic operations over 64-bit integers (and `f64` for
//! square roots). Misuse is reported as [`ToolError`] rather than producing
//! infinities or wrapping.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::tool::{Tool, ToolKind, parse_args};
use crate::error::ToolError;

/// Numeric tool output: integer where the operation stays integral.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    /// Exact integer result.
    Int(i64),
    /// Floating-point result.
    Float(f64),
}

/// Adds two integers.
pub fn add(a: i64, b: i64) -> Result<i64, ToolError> {
    a.checked_add(b)
        .ok_or(ToolError::Overflow { operation: "add" })
}

/// Subtracts `b` from `a`.
pub fn subtract(a: i64, b: i64) -> Result<i64, ToolError> {
    a.checked_sub(b).ok_or(ToolError::Overflow {
        operation: "subtract",
    })
}

/// Multiplies two integers.
pub fn multiply(a: i64, b: i64) -> Result<i64, ToolError> {
    a.checked_mul(b).ok_or(ToolError::Overflow {
        operation: "multiply",
    })
}

/// Divides `a` by `b`, rounded to two decimal places with ties to even.
#[allow(clippy::cast_precision_loss)]
pub fn divide(a: i64, b: i64) -> Result<f64, ToolError> {
    if b == 0 {
        return Err(ToolError::DivisionByZero);
    }
    let quotient = a as f64 / b as f64;
    Ok((quotient * 100.0).round_ties_even() / 100.0)
}

/// Raises `a` to the power `b`.
///
/// Non-negative exponents give an exact integer; negative exponents give a
/// float. Zero to a negative power is a division by zero.
#[allow(clippy::cast_precision_loss)]
pub fn power(a: i64, b: i64) -> Result<Number, ToolError> {
    if b < 0 {
        if a == 0 {
            return Err(ToolError::DivisionByZero);
        }
        return Ok(Number::Float((a as f64).powf(b as f64)));
    }

    let result = match a {
        0 if b == 0 => 1,
        0 | 1 => a,
        -1 => {
            if b % 2 == 0 {
                1
            } else {
                -1
            }
        }
        _ => {
            u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .ok_or(ToolError::Overflow { operation: "power" })?
        }
    };
    Ok(Number::Int(result))
}

/// Returns the square root of a non-negative number.
pub fn square_root(a: f64) -> Result<f64, ToolError> {
    if a.is_nan() || a < 0.0 {
        return Err(ToolError::Domain {
            message: format!("square_root is undefined for {a}"),
        });
    }
    Ok(a.sqrt())
}

/// The arithmetic operations exposed as tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    /// [`add`]
    Add,
    /// [`subtract`]
    Subtract,
    /// [`multiply`]
    Multiply,
    /// [`divide`]
    Divide,
    /// [`power`]
    Power,
    /// [`square_root`]
    SquareRoot,
}

impl MathOp {
    /// Every operation, in registration order.
    pub const ALL: [Self; 6] = [
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Power,
        Self::SquareRoot,
    ];

    /// Tool name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Power => "power",
            Self::SquareRoot => "square_root",
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Add => "Adds two integers and returns the result",
            Self::Subtract => "Subtracts two integers and returns the result",
            Self::Multiply => "Multiplies two integers and returns the result",
            Self::Divide => "Divides two integers and returns the result rounded to 2 decimals",
            Self::Power => "Raises a to the power of b and returns the result",
            Self::SquareRoot => "Returns the square root of a",
        }
    }
}

#[derive(Deserialize)]
struct BinaryArgs {
    a: i64,
    b: i64,
}

#[derive(Deserialize)]
struct UnaryArgs {
    a: f64,
}

/// A [`Tool`] wrapping one [`MathOp`].
#[derive(Debug, Clone, Copy)]
pub struct MathTool {
    op: MathOp,
}

impl MathTool {
    /// Creates the tool for `op`.
    #[must_use]
    pub const fn new(op: MathOp) -> Self {
        Self { op }
    }
}

#[async_trait]
impl Tool for MathTool {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn parameters(&self) -> serde_json::Value {
        if self.op == MathOp::SquareRoot {
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "number", "description": "Non-negative input." }
                },
                "required": ["a"],
                "additionalProperties": false
            })
        } else {
            json!({
                "type": "object",
                "properties": {
                    "a": { "type": "integer" },
                    "b": { "type": "integer" }
                },
                "required": ["a", "b"],
                "additionalProperties": false
            })
        }
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn invoke(&self, args: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        match self.op {
            MathOp::Add => self.binary(args, add),
            MathOp::Subtract => self.binary(args, subtract),
            MathOp::Multiply => self.binary(args, multiply),
            MathOp::Divide => self.binary(args, divide),
            MathOp::Power => self.binary(args, power),
            MathOp::SquareRoot => {
                let UnaryArgs { a } = parse_args(self.name(), args)?;
                Ok(json!(square_root(a)?))
            }
        }
    }
}

impl MathTool {
    fn binary<T: Serialize>(
        &self,
        args: serde_json::Value,
        f: fn(i64, i64) -> Result<T, ToolError>,
    ) -> Result<serde_json::Value, ToolError> {
        let BinaryArgs { a, b } = parse_args(self.name(), args)?;
        Ok(json!(f(a, b)?))
    }
}

/// All six arithmetic tools.
#[must_use]
pub fn math_tools() -> Vec<Arc<dyn Tool>> {
    MathOp::ALL
        .into_iter()
        .map(|op| Arc::new(MathTool::new(op)) as Arc<dyn Tool>)
        .collect()
}
