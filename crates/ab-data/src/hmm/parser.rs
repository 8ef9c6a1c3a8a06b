//! Parser for HMM definition files
//!
//! One distribution per line, written as a constructor call:
//!
//! ```text
//! # comment
//! NormalDistribution( 4, 2 )
//! GaussianKernelDensity( [ 0.4, 0.6, 0.3 ], bandwidth=0.5 )
//! ```
//!
//! Lines are parsed, never evaluated. Only the kinds listed in
//! [`build_distribution`] are accepted.

use chumsky::error::SimpleReason;
use chumsky::prelude::*;

use super::distribution::{Distribution, Kernel, KernelDensity};
use crate::DataError;

/// One argument of a constructor call
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(f64),
    List(Vec<f64>),
    Named(String, f64),
}

/// A parsed `Name(args)` line
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Arg>,
}

fn number() -> impl Parser<char, f64, Error = Simple<char>> + Clone {
    let frac = just('.').chain(text::digits(10));
    // Integer part is optional when a fraction follows: `.5`
    let mantissa = text::int(10)
        .chain::<char, _, _>(frac.clone().or_not().flatten())
        .or(frac);
    let exp = just('e')
        .or(just('E'))
        .chain(just('+').or(just('-')).or_not())
        .chain::<char, _, _>(text::digits(10));

    just('-')
        .or(just('+'))
        .or_not()
        .chain::<char, _, _>(mantissa)
        .chain::<char, _, _>(exp.or_not().flatten())
        .collect::<String>()
        .try_map(|s: String, span| {
            s.parse::<f64>()
                .map_err(|e| Simple::custom(span, format!("invalid number '{}': {}", s, e)))
        })
        .labelled("number")
}

/// Parser for a single definition line
pub fn call() -> impl Parser<char, Call, Error = Simple<char>> + Clone {
    let list = number()
        .padded()
        .separated_by(just(','))
        .allow_trailing()
        .padded()
        .delimited_by(just('['), just(']'))
        .labelled("list");

    let named = text::ident()
        .then_ignore(just('=').padded())
        .then(number())
        .map(|(key, value)| Arg::Named(key, value));

    let arg = choice((named, list.map(Arg::List), number().map(Arg::Number))).padded();

    let args = arg
        .separated_by(just(','))
        .allow_trailing()
        .padded()
        .delimited_by(just('('), just(')'));

    text::ident()
        .padded()
        .then(args)
        .padded()
        .then_ignore(end())
        .map(|(name, args)| Call { name, args })
}

/// Parse every definition in `text`. Blank lines and lines starting with `#`
/// are skipped; line numbers in errors are 1-based.
pub fn parse_definitions(text: &str) -> Result<Vec<Distribution>, DataError> {
    let parser = call();
    let mut distributions = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = idx + 1;
        let parsed = parser.parse(line).map_err(|errors| DataError::HmmParse {
            line: line_no,
            message: errors.first().map(format_error).unwrap_or_else(|| "syntax error".to_string()),
        })?;
        let distribution = build_distribution(&parsed)
            .map_err(|message| DataError::HmmParse { line: line_no, message })?;
        distributions.push(distribution);
    }

    Ok(distributions)
}

fn format_error(error: &Simple<char>) -> String {
    if let SimpleReason::Custom(msg) = error.reason() {
        return msg.clone();
    }
    match error.found() {
        Some(c) => format!("unexpected '{}' at column {}", c, error.span().start + 1),
        None => "unexpected end of line".to_string(),
    }
}

/// Map a parsed call onto the closed set of supported distributions
pub fn build_distribution(call: &Call) -> Result<Distribution, String> {
    match call.name.as_str() {
        "NormalDistribution" => {
            let [mean, std] = numbers::<2>(call)?;
            Distribution::normal(mean, std)
        }
        "UniformDistribution" => {
            let [low, high] = numbers::<2>(call)?;
            Distribution::uniform(low, high)
        }
        "InverseGammaDistribution" => {
            let [shape, rate] = numbers::<2>(call)?;
            Distribution::inverse_gamma(shape, rate)
        }
        "ExponentialDistribution" => {
            let [rate] = numbers::<1>(call)?;
            Distribution::exponential(rate)
        }
        "GaussianKernelDensity" => kernel_density(call, Kernel::Gaussian),
        "UniformKernelDensity" => kernel_density(call, Kernel::Uniform),
        "TriangleKernelDensity" => kernel_density(call, Kernel::Triangle),
        other => Err(format!("unsupported distribution '{}'", other)),
    }
}

/// Exactly `N` plain numeric arguments
fn numbers<const N: usize>(call: &Call) -> Result<[f64; N], String> {
    let mut values = [0.0; N];
    if call.args.len() != N {
        return Err(format!("{} takes {} arguments, got {}", call.name, N, call.args.len()));
    }
    for (slot, arg) in values.iter_mut().zip(&call.args) {
        match arg {
            Arg::Number(v) => *slot = *v,
            _ => return Err(format!("{} takes only numeric arguments", call.name)),
        }
    }
    Ok(values)
}

fn kernel_density(call: &Call, kernel: Kernel) -> Result<Distribution, String> {
    let mut points = None;
    let mut bandwidth = 1.0;
    for arg in &call.args {
        match arg {
            Arg::List(values) if points.is_none() => points = Some(values.clone()),
            Arg::Named(key, value) if key == "bandwidth" => bandwidth = *value,
            Arg::Named(key, _) => return Err(format!("unknown argument '{}' for {}", key, call.name)),
            _ => return Err(format!("{} takes a list of points and an optional bandwidth", call.name)),
        }
    }
    let points = points.ok_or_else(|| format!("{} needs a list of points", call.name))?;
    KernelDensity::new(kernel, points, bandwidth).map(Distribution::KernelDensity)
}
