//! Lazy numeric expression trees.
//!
//! An [`Expression`] is an opaque node that can be asked for a point value, a
//! closed interval of possible values, whether it represents a random
//! deviate, and (if so) how to draw a sample from it. Concrete probability
//! distributions (Weibull, lognormal, ...) are deliberately not modelled
//! here — callers plug them in through [`Deviate`]. This crate only
//! provides the composition primitives (`Constant`, `Sum`, `Product`,
//! `Parameter`) that the event model and CCF expansion need to build
//! expressions out of smaller ones.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use thiserror::Error;

/// A closed interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn degenerate(v: f64) -> Self {
        Interval { lo: v, hi: v }
    }

    pub fn union(self, other: Interval) -> Interval {
        Interval {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("expression value out of domain: {0}")]
    Domain(String),
}

pub type Result<T, E = ExprError> = std::result::Result<T, E>;

/// Capability set shared by every numeric node in an expression tree.
pub trait Expression: std::fmt::Debug {
    /// The current point value.
    fn value(&self) -> f64;

    /// The closed interval of values this expression can legally take.
    fn interval(&self) -> Interval;

    /// Whether this node represents a random deviate (as opposed to a
    /// deterministic function of its children).
    fn is_deviate(&self) -> bool {
        false
    }

    /// Draw one sample. Deterministic nodes return their `value()`.
    fn sample(&self, rng: &mut dyn RngMut) -> f64 {
        let _ = rng;
        self.value()
    }
}

/// Object-safe RNG handle so `Expression::sample` does not need to be
/// generic over the RNG type.
pub trait RngMut {
    fn next_u64(&mut self) -> u64;
    fn next_f64(&mut self) -> f64;
}

impl<R: Rng> RngMut for R {
    fn next_u64(&mut self) -> u64 {
        self.gen()
    }
    fn next_f64(&mut self) -> f64 {
        self.gen()
    }
}

pub type ExprRef = Rc<dyn Expression>;

/// A constant value.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl Expression for Constant {
    fn value(&self) -> f64 {
        self.0
    }
    fn interval(&self) -> Interval {
        Interval::degenerate(self.0)
    }
}

/// `a + b + ... `
#[derive(Debug, Clone)]
pub struct Sum(pub Vec<ExprRef>);

impl Expression for Sum {
    fn value(&self) -> f64 {
        self.0.iter().map(|e| e.value()).sum()
    }
    fn interval(&self) -> Interval {
        self.0.iter().fold(Interval::degenerate(0.0), |acc, e| {
            let iv = e.interval();
            Interval {
                lo: acc.lo + iv.lo,
                hi: acc.hi + iv.hi,
            }
        })
    }
    fn is_deviate(&self) -> bool {
        self.0.iter().any(|e| e.is_deviate())
    }
}

/// `a * b * ...`
#[derive(Debug, Clone)]
pub struct Product(pub Vec<ExprRef>);

impl Expression for Product {
    fn value(&self) -> f64 {
        self.0.iter().map(|e| e.value()).product()
    }
    fn interval(&self) -> Interval {
        self.0.iter().fold(Interval::degenerate(1.0), |acc, e| {
            let iv = e.interval();
            // all factors here are probabilities/rates, i.e. non-negative.
            Interval {
                lo: acc.lo * iv.lo,
                hi: acc.hi * iv.hi,
            }
        })
    }
    fn is_deviate(&self) -> bool {
        self.0.iter().any(|e| e.is_deviate())
    }
}

/// `1 - a`
#[derive(Debug, Clone)]
pub struct Complement(pub ExprRef);

impl Expression for Complement {
    fn value(&self) -> f64 {
        1.0 - self.0.value()
    }
    fn interval(&self) -> Interval {
        let iv = self.0.interval();
        Interval {
            lo: 1.0 - iv.hi,
            hi: 1.0 - iv.lo,
        }
    }
    fn is_deviate(&self) -> bool {
        self.0.is_deviate()
    }
}

/// A random deviate whose distribution is supplied by the caller. This is
/// the extension point for concrete distributions (Weibull, lognormal,
/// ...), which live outside this crate's scope.
pub struct Deviate {
    pub point_value: f64,
    pub bounds: Interval,
    sampler: Box<dyn Fn(&mut dyn RngMut) -> f64>,
}

impl std::fmt::Debug for Deviate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deviate")
            .field("point_value", &self.point_value)
            .field("bounds", &self.bounds)
            .finish()
    }
}

impl Deviate {
    pub fn new(
        point_value: f64,
        bounds: Interval,
        sampler: impl Fn(&mut dyn RngMut) -> f64 + 'static,
    ) -> Self {
        Deviate {
            point_value,
            bounds,
            sampler: Box::new(sampler),
        }
    }
}

impl Expression for Deviate {
    fn value(&self) -> f64 {
        self.point_value
    }
    fn interval(&self) -> Interval {
        self.bounds
    }
    fn is_deviate(&self) -> bool {
        true
    }
    fn sample(&self, rng: &mut dyn RngMut) -> f64 {
        (self.sampler)(rng)
    }
}

/// A distinguished, process-local identity for parameters, so CCF factor
/// tables and reporting can refer to a parameter by a stable handle rather
/// than by pointer equality.
static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParamId(u64);

impl ParamId {
    fn fresh() -> Self {
        ParamId(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Physical unit of a parameter, purely informational (no arithmetic
/// conversion is performed on it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Dimensionless,
    PerHour,
    PerDemand,
    Hours,
}

/// A named, shared expression with a unit tag.
#[derive(Debug)]
pub struct Parameter {
    pub id: ParamId,
    pub name: String,
    pub unit: Unit,
    value: Cell<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, unit: Unit, initial: f64) -> Rc<Self> {
        Rc::new(Parameter {
            id: ParamId::fresh(),
            name: name.into(),
            unit,
            value: Cell::new(initial),
        })
    }

    pub fn set(&self, v: f64) {
        self.value.set(v);
    }
}

impl Expression for Parameter {
    fn value(&self) -> f64 {
        self.value.get()
    }
    fn interval(&self) -> Interval {
        Interval::degenerate(self.value.get())
    }
}

/// The distinguished, mutable mission-time parameter owned by the model.
/// All time-dependent expressions read it through an immutable borrow; the
/// probability analyser's time sweep (spec §4.5) is the only code that
/// mutates it, through [`MissionTime::set`].
#[derive(Debug)]
pub struct MissionTime {
    param: Rc<Parameter>,
}

impl MissionTime {
    pub fn new(initial_hours: f64) -> Self {
        MissionTime {
            param: Parameter::new("mission-time", Unit::Hours, initial_hours),
        }
    }

    pub fn get(&self) -> f64 {
        self.param.value()
    }

    pub fn set(&self, hours: f64) {
        self.param.set(hours);
    }

    pub fn as_parameter(&self) -> Rc<Parameter> {
        Rc::clone(&self.param)
    }
}
