//! Reverse-polish expression evaluator.
//!
//! Expressions are whitespace separated tokens, e.g. `0.2 pi * 180 /`.
//! Evaluation fails soft: anything that does not reduce to exactly one
//! finite number yields `None`, and the caller keeps the raw text.

use std::f64::consts::PI;

/// Speed of light in vacuum [m/s].
pub const C_MKS: f64 = 299_792_458.0;

/// Elementary charge [C].
pub const E_MKS: f64 = 1.602_176_634e-19;

/// Electron mass [kg].
pub const ME_MKS: f64 = 9.109_383_701_5e-31;

/// Electron rest energy [MeV].
pub const MEV: f64 = 0.510_998_95;

/// Built-in named constants.
pub fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(PI),
        "c_mks" => Some(C_MKS),
        "e_mks" => Some(E_MKS),
        "me_mks" => Some(ME_MKS),
        "mev" => Some(MEV),
        _ => None,
    }
}

/// Evaluate an RPN expression.
///
/// ```
/// use beamline_core::dsl::solve;
///
/// assert_eq!(solve("3 4 +"), Some(7.0));
/// assert_eq!(solve("a b +"), None);
/// ```
pub fn solve(expr: &str) -> Option<f64> {
    let mut stack: Vec<f64> = Vec::new();

    for token in expr.split_whitespace() {
        if let Ok(v) = token.parse::<f64>() {
            stack.push(v);
            continue;
        }
        if let Some(v) = constant(token) {
            stack.push(v);
            continue;
        }

        match token {
            "+" | "-" | "*" | "/" | "pow" | "atan2" => {
                let b = stack.pop()?;
                let a = stack.pop()?;
                stack.push(match token {
                    "+" => a + b,
                    "-" => a - b,
                    "*" => a * b,
                    "/" => a / b,
                    "pow" => a.powf(b),
                    _ => a.atan2(b),
                });
            }
            "sin" | "cos" | "tan" | "asin" | "acos" | "atan" | "sqrt" | "exp" | "ln" | "log"
            | "abs" | "chs" | "sqr" => {
                let a = stack.pop()?;
                stack.push(match token {
                    "sin" => a.sin(),
                    "cos" => a.cos(),
                    "tan" => a.tan(),
                    "asin" => a.asin(),
                    "acos" => a.acos(),
                    "atan" => a.atan(),
                    "sqrt" => a.sqrt(),
                    "exp" => a.exp(),
                    "ln" => a.ln(),
                    "log" => a.log10(),
                    "abs" => a.abs(),
                    "chs" => -a,
                    _ => a * a,
                });
            }
            "swap" => {
                let b = stack.pop()?;
                let a = stack.pop()?;
                stack.push(b);
                stack.push(a);
            }
            "dup" => {
                let a = *stack.last()?;
                stack.push(a);
            }
            "pop" => {
                stack.pop()?;
            }
            // Unknown symbol: leave it for a later pass
            _ => return None,
        }
    }

    match stack.as_slice() {
        [v] if v.is_finite() => Some(*v),
        _ => None,
    }
}
