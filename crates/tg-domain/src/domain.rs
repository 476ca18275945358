// domain.rs — Attribute domains.
//
// A domain constrains the possible values of one attribute. Numeric domains
// are closed intervals whose bounds may be infinite; a singleton is an
// interval whose bounds coincide. Dates and durations are not a separate
// kind: they are integer intervals over ticks (see `factory`).

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// One end of an interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound<T> {
    MinusInf,
    Finite(T),
    PlusInf,
}

impl<T: Copy> Bound<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Bound::Finite(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Bound::Finite(_))
    }
}

impl<T: PartialOrd> Bound<T> {
    fn rank(&self) -> u8 {
        match self {
            Bound::MinusInf => 0,
            Bound::Finite(_) => 1,
            Bound::PlusInf => 2,
        }
    }

    fn compare(&self, other: &Bound<T>) -> Ordering {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Bound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::MinusInf => write!(f, "-inf"),
            Bound::Finite(v) => write!(f, "{}", v),
            Bound::PlusInf => write!(f, "+inf"),
        }
    }
}

/// A closed interval `[lower, upper]`. Always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval<T> {
    lower: Bound<T>,
    upper: Bound<T>,
}

impl<T> Interval<T>
where
    T: Copy + PartialOrd + fmt::Display,
{
    /// Create an interval, rejecting empty ones and incomparable (NaN) bounds.
    pub fn new(lower: Bound<T>, upper: Bound<T>) -> Result<Self, DomainError> {
        for bound in [&lower, &upper] {
            if let Bound::Finite(v) = bound {
                if v.partial_cmp(v).is_none() {
                    return Err(DomainError::EmptyDomain(format!(
                        "bound {} is not comparable",
                        v
                    )));
                }
            }
        }
        if matches!(lower, Bound::PlusInf)
            || matches!(upper, Bound::MinusInf)
            || lower.compare(&upper) == Ordering::Greater
        {
            return Err(DomainError::EmptyDomain(format!("[{}, {}]", lower, upper)));
        }
        Ok(Self { lower, upper })
    }

    /// The unconstrained interval `(-inf, +inf)`.
    pub fn full() -> Self {
        Self {
            lower: Bound::MinusInf,
            upper: Bound::PlusInf,
        }
    }

    pub fn singleton(value: T) -> Self {
        Self {
            lower: Bound::Finite(value),
            upper: Bound::Finite(value),
        }
    }

    /// `[value, +inf)`
    pub fn at_least(value: T) -> Self {
        Self {
            lower: Bound::Finite(value),
            upper: Bound::PlusInf,
        }
    }

    pub fn lower(&self) -> Bound<T> {
        self.lower
    }

    pub fn upper(&self) -> Bound<T> {
        self.upper
    }

    pub fn has_lower(&self) -> bool {
        self.lower.is_finite()
    }

    pub fn has_upper(&self) -> bool {
        self.upper.is_finite()
    }

    pub fn is_full(&self) -> bool {
        !self.has_lower() && !self.has_upper()
    }

    pub fn is_singleton(&self) -> bool {
        self.has_lower() && self.lower.compare(&self.upper) == Ordering::Equal
    }

    /// The single admitted value, if any.
    pub fn singleton_value(&self) -> Option<T> {
        if self.is_singleton() {
            self.lower.value()
        } else {
            None
        }
    }

    pub fn contains(&self, value: T) -> bool {
        let v = Bound::Finite(value);
        self.lower.compare(&v) != Ordering::Greater && v.compare(&self.upper) != Ordering::Greater
    }

    /// Intersection of two intervals, `None` when disjoint.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = if self.lower.compare(&other.lower) == Ordering::Less {
            other.lower
        } else {
            self.lower
        };
        let upper = if self.upper.compare(&other.upper) == Ordering::Greater {
            other.upper
        } else {
            self.upper
        };
        Self::new(lower, upper).ok()
    }

    /// Whether every value of `self` is admitted by `other`.
    pub fn is_subset_of(&self, other: &Self) -> bool {
        other.lower.compare(&self.lower) != Ordering::Greater
            && self.upper.compare(&other.upper) != Ordering::Greater
    }
}

impl<T: fmt::Display> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// A constraint over one attribute's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "domain", rename_all = "snake_case")]
pub enum Domain {
    Int(Interval<i64>),
    Float(Interval<f64>),
    /// `None` admits both values.
    Bool(Option<bool>),
    /// A non-empty set of symbols.
    Enum(BTreeSet<String>),
}

impl Domain {
    pub fn int(value: i64) -> Self {
        Domain::Int(Interval::singleton(value))
    }

    pub fn float(value: f64) -> Self {
        Domain::Float(Interval::singleton(value))
    }

    pub fn boolean(value: bool) -> Self {
        Domain::Bool(Some(value))
    }

    pub fn symbol(value: impl Into<String>) -> Self {
        Domain::Enum(BTreeSet::from([value.into()]))
    }

    /// Type name, matching the description tag that produces this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Domain::Int(_) => "int",
            Domain::Float(_) => "float",
            Domain::Bool(_) => "bool",
            Domain::Enum(_) => "enum",
        }
    }

    pub fn is_singleton(&self) -> bool {
        match self {
            Domain::Int(i) => i.is_singleton(),
            Domain::Float(i) => i.is_singleton(),
            Domain::Bool(b) => b.is_some(),
            Domain::Enum(set) => set.len() == 1,
        }
    }

    pub fn as_int(&self) -> Option<&Interval<i64>> {
        match self {
            Domain::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&Interval<f64>> {
        match self {
            Domain::Float(i) => Some(i),
            _ => None,
        }
    }

    /// The symbol of a singleton enum domain.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Domain::Enum(set) if set.len() == 1 => set.iter().next().map(String::as_str),
            _ => None,
        }
    }

    /// Intersect with another domain of the same kind.
    ///
    /// `name` identifies the attribute in error messages.
    pub fn intersect(&self, other: &Domain, name: &str) -> Result<Domain, DomainError> {
        let empty = || DomainError::EmptyDomain(format!("{name}: {self} ∩ {other}"));
        match (self, other) {
            (Domain::Int(a), Domain::Int(b)) => a.intersect(b).map(Domain::Int).ok_or_else(empty),
            (Domain::Float(a), Domain::Float(b)) => {
                a.intersect(b).map(Domain::Float).ok_or_else(empty)
            }
            (Domain::Bool(a), Domain::Bool(b)) => match (a, b) {
                (Some(x), Some(y)) if x != y => Err(empty()),
                (Some(x), _) | (None, Some(x)) => Ok(Domain::Bool(Some(*x))),
                (None, None) => Ok(Domain::Bool(None)),
            },
            (Domain::Enum(a), Domain::Enum(b)) => {
                let common: BTreeSet<String> = a.intersection(b).cloned().collect();
                if common.is_empty() {
                    Err(empty())
                } else {
                    Ok(Domain::Enum(common))
                }
            }
            _ => Err(DomainError::TypeMismatch {
                name: name.to_string(),
                expected: self.type_name().to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Int(i) => write!(f, "{}", i),
            Domain::Float(i) => write!(f, "{}", i),
            Domain::Bool(Some(b)) => write!(f, "{}", b),
            Domain::Bool(None) => write!(f, "{{false, true}}"),
            Domain::Enum(set) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}
