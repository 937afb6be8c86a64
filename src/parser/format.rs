// Numeric value-label formats, in the `[,][.N][type]` style used by the
// dashboard (".1f", ",d", ".0%", ".2e").

use nom::{
    character::complete::{char, digit1, one_of},
    combinator::{eof, map_res, opt},
    sequence::preceded,
    IResult,
};

use crate::error::{DataError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// No type letter: shortest representation, or fixed when a precision is given
    General,
    Fixed,
    Integer,
    Percent,
    Exponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub grouping: bool,
    pub precision: Option<usize>,
    pub kind: FormatKind,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            grouping: false,
            precision: Some(1),
            kind: FormatKind::Fixed,
        }
    }
}

fn format_spec(input: &str) -> IResult<&str, NumberFormat> {
    let (input, grouping) = opt(char(','))(input)?;
    let (input, precision) = opt(preceded(char('.'), map_res(digit1, str::parse::<usize>)))(input)?;
    let (input, kind) = opt(one_of("fd%e"))(input)?;
    let (input, _) = eof(input)?;

    let kind = match kind {
        Some('f') => FormatKind::Fixed,
        Some('d') => FormatKind::Integer,
        Some('%') => FormatKind::Percent,
        Some('e') => FormatKind::Exponent,
        _ => FormatKind::General,
    };

    Ok((
        input,
        NumberFormat {
            grouping: grouping.is_some(),
            precision,
            kind,
        },
    ))
}

impl NumberFormat {
    pub fn parse(spec: &str) -> Result<Self> {
        format_spec(spec.trim())
            .map(|(_, fmt)| fmt)
            .map_err(|_| DataError::InvalidFormat(spec.to_string()))
    }

    pub fn apply(&self, value: f64) -> String {
        let body = match self.kind {
            FormatKind::Fixed => format!("{:.*}", self.precision.unwrap_or(6), value),
            FormatKind::Integer => format!("{}", value.round() as i64),
            FormatKind::Percent => format!("{:.*}", self.precision.unwrap_or(6), value * 100.0),
            FormatKind::Exponent => exponent(value, self.precision.unwrap_or(6)),
            FormatKind::General => match self.precision {
                Some(p) => format!("{:.*}", p, value),
                None if value.fract() == 0.0 && value.abs() < 1e15 => format!("{}", value as i64),
                None => value.to_string(),
            },
        };

        let body = if self.grouping { group_thousands(&body) } else { body };
        if self.kind == FormatKind::Percent {
            format!("{}%", body)
        } else {
            body
        }
    }
}

/// `1.50e3` -> `1.50e+03`
fn exponent(value: f64, precision: usize) -> String {
    let raw = format!("{:.*e}", precision, value);
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => raw,
    }
}

fn group_thousands(body: &str) -> String {
    let (sign, rest) = match body.strip_prefix('-') {
        Some(r) => ("-", r),
        None => ("", body),
    };
    let (int_part, tail) = match rest.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}{}", sign, grouped, tail)
}
