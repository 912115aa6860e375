use std::{fmt::Display, str::FromStr};

use regex::Regex;

use crate::Dataset;

const NAME: &str = r"[A-Za-z_][A-Za-z0-9_.]*";

/// A single variable in a model formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Column(String),
    Log(String),
    Exp(String),
    Sqrt(String),
    Power(String, i32),
}

impl Term {
    /// The dataset column this term reads.
    pub fn column(&self) -> &str {
        match self {
            Term::Column(c) | Term::Log(c) | Term::Exp(c) | Term::Sqrt(c) | Term::Power(c, _) => c,
        }
    }

    /// The coefficient name this term gets in a fitted model.
    pub fn label(&self) -> String {
        self.to_string()
    }

    pub fn eval(&self, data: &Dataset) -> Result<Vec<f64>, crate::Error> {
        let col = data.column(self.column())?;
        let f: fn(f64) -> f64 = match self {
            Term::Column(_) => |x| x,
            Term::Log(_) => f64::ln,
            Term::Exp(_) => f64::exp,
            Term::Sqrt(_) => f64::sqrt,
            Term::Power(_, k) => {
                let k = *k;
                return Ok(col.iter().map(|x| x.powi(k)).collect());
            },
        };
        Ok(col.iter().copied().map(f).collect())
    }

    fn parse(s: &str) -> Result<Self, crate::Error> {
        let re = Regex::new(&format!(
            r"^(?:(?P<func>log|exp|sqrt)\((?P<farg>{NAME})\)|I\((?P<parg>{NAME})(?:\^|\*\*)(?P<pow>-?\d+)\)|(?P<name>{NAME}))$"
        ))?;
        let caps = re
            .captures(s)
            .ok_or_else(|| crate::Error::InvalidFormula(format!("unsupported term {}", s)))?;
        if let Some(name) = caps.name("name") {
            return Ok(Term::Column(name.as_str().to_string()));
        }
        if let (Some(func), Some(arg)) = (caps.name("func"), caps.name("farg")) {
            let arg = arg.as_str().to_string();
            return Ok(match func.as_str() {
                "log" => Term::Log(arg),
                "exp" => Term::Exp(arg),
                _ => Term::Sqrt(arg),
            });
        }
        match (caps.name("parg"), caps.name("pow")) {
            (Some(arg), Some(pow)) => {
                let pow = pow
                    .as_str()
                    .parse()
                    .map_err(|_| crate::Error::InvalidFormula(format!("invalid power in {}", s)))?;
                Ok(Term::Power(arg.as_str().to_string(), pow))
            },
            _ => Err(crate::Error::InvalidFormula(format!("unsupported term {}", s))),
        }
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Column(c) => write!(f, "{}", c),
            Term::Log(c) => write!(f, "log({})", c),
            Term::Exp(c) => write!(f, "exp({})", c),
            Term::Sqrt(c) => write!(f, "sqrt({})", c),
            Term::Power(c, k) => write!(f, "I({}^{})", c, k),
        }
    }
}

/// A parsed `response ~ term + term` model formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    response: Term,
    terms: Vec<Term>,
    intercept: bool,
}

impl Formula {
    pub fn response(&self) -> &Term {
        &self.response
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn intercept(&self) -> bool {
        self.intercept
    }

    /// Coefficient names in design matrix order, intercept first.
    pub fn labels(&self) -> Vec<String> {
        self.intercept
            .then(|| crate::INTERCEPT.to_string())
            .into_iter()
            .chain(self.terms.iter().map(Term::label))
            .collect()
    }
}

impl FromStr for Formula {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.split_whitespace().collect::<String>();
        let (lhs, rhs) = s
            .split_once('~')
            .ok_or_else(|| crate::Error::InvalidFormula("missing ~".to_string()))?;
        if lhs.is_empty() {
            return Err(crate::Error::InvalidFormula("missing response".to_string()));
        }
        if rhs.is_empty() {
            return Err(crate::Error::InvalidFormula("missing terms".to_string()));
        }
        let response = Term::parse(lhs)?;

        let mut intercept = true;
        let mut terms: Vec<Term> = vec![];
        for (negated, token) in split_signed(rhs)? {
            match (negated, token) {
                (false, "1") | (true, "0") => intercept = true,
                (false, "0") | (true, "1") => intercept = false,
                (true, t) => {
                    return Err(crate::Error::InvalidFormula(format!(
                        "cannot remove term {}",
                        t
                    )))
                },
                (false, t) => {
                    let term = Term::parse(t)?;
                    if !terms.contains(&term) {
                        terms.push(term);
                    }
                },
            }
        }
        if terms.is_empty() && !intercept {
            return Err(crate::Error::InvalidFormula(
                "model has no regressors".to_string(),
            ));
        }
        Ok(Self {
            response,
            terms,
            intercept,
        })
    }
}

impl Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut rhs = self.terms.iter().map(|t| t.to_string()).collect::<Vec<_>>();
        if !self.intercept {
            rhs.push("0".to_string());
        } else if rhs.is_empty() {
            rhs.push("1".to_string());
        }
        write!(f, "{} ~ {}", self.response, rhs.join(" + "))
    }
}

// splits on top level + and -, returning (is_negated, token)
fn split_signed(rhs: &str) -> Result<Vec<(bool, &str)>, crate::Error> {
    let mut out = vec![];
    let mut depth = 0i32;
    let mut start = 0;
    let mut negated = false;
    for (i, c) in rhs.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '+' | '-' if depth == 0 => {
                if i > start {
                    out.push((negated, &rhs[start..i]));
                } else if i != 0 {
                    return Err(crate::Error::InvalidFormula(format!(
                        "empty term in {}",
                        rhs
                    )));
                }
                negated = c == '-';
                start = i + 1;
            },
            _ => {},
        }
        if depth < 0 {
            return Err(crate::Error::InvalidFormula("unbalanced parentheses".to_string()));
        }
    }
    if depth != 0 {
        return Err(crate::Error::InvalidFormula("unbalanced parentheses".to_string()));
    }
    if start >= rhs.len() {
        return Err(crate::Error::InvalidFormula(format!("empty term in {}", rhs)));
    }
    out.push((negated, &rhs[start..]));
    Ok(out)
}
