use anyhow::{Context, Result};
use regex::Regex;

use super::vocabulary::Parameter;

#[derive(Debug)]
pub struct ValueNormalizer {
    number: Regex,
}

impl ValueNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            number: Regex::new(r"[-+]?\d+(?:[.,]\d+)?")
                .context("failed to compile numeric value regex")?,
        })
    }

    /// First signed decimal number in `raw`, with `,` normalized to `.`; the trimmed
    /// input when it carries no number.
    pub fn numeric_head(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self.number.find(trimmed) {
            Some(found) => found.as_str().replace(',', "."),
            None => trimmed.to_string(),
        }
    }

    pub fn normalize(&self, parameter: Option<Parameter>, raw: &str) -> String {
        apply_unit_policy(parameter, &self.numeric_head(raw))
    }
}

/// Reformats a numeric token according to the parameter's reporting convention.
///
/// Leukocyte and platelet counts printed in thousands are scaled to absolute counts,
/// differential and prothrombin percentages get one decimal and a `%` suffix. Anything
/// that does not parse is returned as given.
pub fn apply_unit_policy(parameter: Option<Parameter>, token: &str) -> String {
    let token = token.trim();
    let Some(parameter) = parameter else {
        return token.to_string();
    };
    let Ok(value) = token.parse::<f64>() else {
        return token.to_string();
    };
    if !value.is_finite() {
        return token.to_string();
    }

    match parameter {
        Parameter::Leuco | Parameter::Plaq => {
            let scaled = if value < 1000.0 { value * 1000.0 } else { value };
            format!("{}", scaled.round() as i64)
        }
        Parameter::Neu
        | Parameter::Linfocitos
        | Parameter::Mono
        | Parameter::Eosin
        | Parameter::Basofilos
        | Parameter::Tp => format!("{value:.1}%"),
        _ => token.to_string(),
    }
}
