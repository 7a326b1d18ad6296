//! Stateful request parameters.
//!
//! A [`Parameter`] is a value source that evolves as a run progresses: some
//! advance once per placeholder reference, some once per request, some once
//! per batch of `concurrency` launches. A [`Parameters`] set maps names to
//! literals or parameters and drives `<<name>>` template substitution.

mod random;
mod set;
mod state;
mod template;


pub use set::{Entry, Parameters};
pub use state::{load_state, save_state};

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Value, json};

use crate::error::ParamError;
use random::ReplayRng;

/// Rendered for a parameter that has not produced a value yet.
pub const NO_VALUE: &str = "<no value>";
/// Rendered when a randomized sequence has been consumed completely.
pub const NO_MORE_VALUES: &str = "<no more values>";
/// Rendered when a lookup key or attribute is absent.
pub const LOOKUP_MISS: &str = "ERROR";

/// Current value of a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Unset,
    Int(i64),
    Str(String),
    /// Marker produced once a randomized sequence runs out of values.
    Exhausted(u64),
}

impl ParamValue {
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, ParamValue::Unset)
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, ParamValue::Exhausted(_))
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(value) => Some(*value),
            ParamValue::Unset | ParamValue::Str(_) | ParamValue::Exhausted(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Unset => f.write_str(NO_VALUE),
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Str(value) => f.write_str(value),
            ParamValue::Exhausted(pos) => write!(f, "{NO_MORE_VALUES}{pos}"),
        }
    }
}

/// Attribute table backing a [`Parameter::lookup`]: instance name to named
/// attributes.
pub type LookupTable = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone)]
struct SequenceState {
    start: i64,
    wrap: Option<i64>,
    current: ParamValue,
}

impl SequenceState {
    const fn new(start: i64, wrap: Option<i64>) -> Self {
        Self {
            start,
            wrap,
            current: ParamValue::Unset,
        }
    }

    fn advance(&mut self) {
        self.current = match self.current.as_int() {
            None => ParamValue::Int(self.start),
            Some(value) => {
                let next = value.saturating_add(1);
                let wrapped = match self.wrap {
                    Some(wrap) if wrap > 0 => next.rem_euclid(wrap),
                    Some(_) | None => next,
                };
                ParamValue::Int(wrapped)
            }
        };
    }

    /// The counter [`Parameter::calc`] reads and state persistence saves.
    fn counter(&self) -> i64 {
        self.current.as_int().unwrap_or(self.start)
    }
}

#[derive(Debug, Clone)]
struct ShuffleState {
    wrap: Option<u64>,
    order: Vec<u64>,
    pos: u64,
    current: ParamValue,
}

impl ShuffleState {
    fn new(length: u64, wrap: Option<u64>, seed: Option<u64>) -> Self {
        let mut rng = seed.map_or_else(ReplayRng::from_entropy, ReplayRng::from_seed);
        Self {
            wrap,
            order: rng.permutation(length),
            pos: 0,
            current: ParamValue::Unset,
        }
    }

    fn advance(&mut self) {
        let idx = usize::try_from(self.pos).unwrap_or(usize::MAX);
        self.current = match self.order.get(idx) {
            Some(value) => ParamValue::Int(i64::try_from(*value).unwrap_or(i64::MAX)),
            None => ParamValue::Exhausted(self.pos),
        };
        self.pos = self.pos.saturating_add(1);
        if let Some(wrap) = self.wrap.filter(|wrap| *wrap > 0) {
            self.pos = self.pos.checked_rem(wrap).unwrap_or(0);
        }
    }
}

#[derive(Debug, Clone)]
struct RandomValueState {
    lower: i64,
    upper: i64,
    wrap: Option<u64>,
    seeded: bool,
    rng: ReplayRng,
    n: u64,
    current: ParamValue,
}

impl RandomValueState {
    fn new(lower: i64, upper: i64, wrap: Option<u64>, seed: Option<u64>) -> Self {
        Self {
            lower,
            upper,
            wrap,
            seeded: seed.is_some(),
            rng: seed.map_or_else(ReplayRng::from_entropy, ReplayRng::from_seed),
            n: 0,
            current: ParamValue::Unset,
        }
    }

    fn advance(&mut self) {
        self.n = self.n.saturating_add(1);
        if self.wrap.is_some_and(|wrap| self.n > wrap) {
            // Reinitialize after `wrap` draws. Reproducible only with a seed:
            // an unseeded generator restarts from fresh entropy.
            self.rng = if self.seeded {
                ReplayRng::from_seed(self.rng.seed())
            } else {
                ReplayRng::from_entropy()
            };
            self.n = 0;
        }
        self.current = ParamValue::Int(self.rng.int_in(self.lower, self.upper));
    }

    fn get_state(&self) -> Value {
        json!({
            "seed": self.rng.seed(),
            "draws": self.rng.draws(),
            "n": self.n,
            "seeded": self.seeded,
        })
    }

    fn set_state(&mut self, state: &Value) -> Result<(), ParamError> {
        let slot = StateSlot::parse(state, "random-value")?;
        self.rng = ReplayRng::from_seed(slot.seed);
        for _ in 0..slot.draws {
            self.rng.int_in(self.lower, self.upper);
        }
        self.n = slot.n;
        self.seeded = slot.seeded;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct RandomStringState {
    length: usize,
    wrap: Option<u64>,
    seeded: bool,
    rng: ReplayRng,
    n: u64,
    current: ParamValue,
}

impl RandomStringState {
    fn new(length: usize, wrap: Option<u64>, seed: Option<u64>) -> Self {
        Self {
            length,
            wrap,
            seeded: seed.is_some(),
            rng: seed.map_or_else(ReplayRng::from_entropy, ReplayRng::from_seed),
            n: 0,
            current: ParamValue::Unset,
        }
    }

    fn advance(&mut self) {
        self.n = self.n.saturating_add(1);
        if self.wrap.is_some_and(|wrap| self.n > wrap) {
            self.rng = if self.seeded {
                ReplayRng::from_seed(self.rng.seed())
            } else {
                ReplayRng::from_entropy()
            };
            self.n = 0;
        }
        self.current = ParamValue::Str(self.rng.letters(self.length));
    }

    fn get_state(&self) -> Value {
        json!({
            "seed": self.rng.seed(),
            "draws": self.rng.draws(),
            "n": self.n,
            "seeded": self.seeded,
            "length": self.length,
        })
    }

    fn set_state(&mut self, state: &Value) -> Result<(), ParamError> {
        let slot = StateSlot::parse(state, "random-string")?;
        if let Some(length) = state
            .get("length")
            .and_then(Value::as_u64)
            .and_then(|length| usize::try_from(length).ok())
        {
            self.length = length;
        }
        self.rng = ReplayRng::from_seed(slot.seed);
        for _ in 0..slot.draws {
            self.rng.letters(self.length);
        }
        self.n = slot.n;
        self.seeded = slot.seeded;
        Ok(())
    }
}

/// Common `(seed, draws, n)` slot shape shared by the random variants.
struct StateSlot {
    seed: u64,
    draws: u64,
    n: u64,
    seeded: bool,
}

impl StateSlot {
    fn parse(state: &Value, variant: &'static str) -> Result<Self, ParamError> {
        let field = |name: &str| {
            state
                .get(name)
                .and_then(Value::as_u64)
                .ok_or(ParamError::StateShape { variant })
        };
        Ok(Self {
            seed: field("seed")?,
            draws: field("draws")?,
            n: field("n")?,
            seeded: state.get("seeded").and_then(Value::as_bool).unwrap_or(true),
        })
    }
}

#[derive(Debug, Clone)]
struct CalcState {
    key: String,
    wrap: i64,
    mul: i64,
    add: i64,
    current: ParamValue,
}

impl CalcState {
    fn update(&mut self, counter: i64) {
        let value = counter
            .checked_div_euclid(self.wrap)
            .unwrap_or(0)
            .saturating_mul(self.mul)
            .saturating_add(self.add);
        self.current = ParamValue::Int(value);
    }
}

#[derive(Debug, Clone)]
struct LookupState {
    table: LookupTable,
    key_template: String,
    attr: String,
}

/// One case per parameter variant; dispatch is by tag, not inheritance.
#[derive(Debug, Clone)]
enum Kind {
    Sequence(SequenceState),
    SequenceRequest(SequenceState),
    SequenceBatch(SequenceState),
    SequenceRequestRandomized(ShuffleState),
    RandomValue(RandomValueState),
    RandomValueRequest(RandomValueState),
    RandomString(RandomStringState),
    RandomStringRequest(RandomStringState),
    Calc(CalcState),
    Lookup(LookupState),
}

/// A stateful value source for request templates.
#[derive(Debug, Clone)]
pub struct Parameter {
    kind: Kind,
    keep_state: bool,
}

impl Parameter {
    const fn from_kind(kind: Kind) -> Self {
        Self {
            kind,
            keep_state: false,
        }
    }

    /// Counter advancing once per placeholder reference.
    #[must_use]
    pub const fn sequence(start: i64, wrap: Option<i64>) -> Self {
        Self::from_kind(Kind::Sequence(SequenceState::new(start, wrap)))
    }

    /// Counter advancing once per request launch.
    #[must_use]
    pub const fn sequence_request(start: i64, wrap: Option<i64>) -> Self {
        Self::from_kind(Kind::SequenceRequest(SequenceState::new(start, wrap)))
    }

    /// Counter advancing once per batch of `concurrency` launches.
    #[must_use]
    pub const fn sequence_batch(start: i64) -> Self {
        Self::from_kind(Kind::SequenceBatch(SequenceState::new(start, None)))
    }

    /// Pre-shuffled permutation of `0..length`, consumed one value per
    /// request. Exhaustion yields a marker value instead of failing.
    #[must_use]
    pub fn sequence_request_randomized(
        length: u64,
        wrap: Option<u64>,
        seed: Option<u64>,
    ) -> Self {
        Self::from_kind(Kind::SequenceRequestRandomized(ShuffleState::new(
            length, wrap, seed,
        )))
    }

    /// Uniform integer in `[lower, upper]`, fresh per reference.
    #[must_use]
    pub fn random_value(lower: i64, upper: i64, wrap: Option<u64>, seed: Option<u64>) -> Self {
        Self::from_kind(Kind::RandomValue(RandomValueState::new(
            lower, upper, wrap, seed,
        )))
    }

    /// Uniform integer in `[lower, upper]`, fresh per request.
    #[must_use]
    pub fn random_value_request(
        lower: i64,
        upper: i64,
        wrap: Option<u64>,
        seed: Option<u64>,
    ) -> Self {
        Self::from_kind(Kind::RandomValueRequest(RandomValueState::new(
            lower, upper, wrap, seed,
        )))
    }

    /// Pseudo-random letter string of `length`, fresh per reference.
    #[must_use]
    pub fn random_string(length: usize, wrap: Option<u64>, seed: Option<u64>) -> Self {
        Self::from_kind(Kind::RandomString(RandomStringState::new(
            length, wrap, seed,
        )))
    }

    /// Pseudo-random letter string of `length`, fresh per request.
    #[must_use]
    pub fn random_string_request(length: usize, seed: Option<u64>) -> Self {
        Self::from_kind(Kind::RandomStringRequest(RandomStringState::new(
            length, None, seed,
        )))
    }

    /// Derived value `(i // wrap) * mul + add` over another parameter's
    /// counter `i`, evaluated at substitution time.
    #[must_use]
    pub fn calc(key: impl Into<String>, wrap: i64, mul: i64, add: i64) -> Self {
        Self::from_kind(Kind::Calc(CalcState {
            key: key.into(),
            wrap,
            mul,
            add,
            current: ParamValue::Unset,
        }))
    }

    /// Table lookup: renders `key_template` against the live parameter set,
    /// indexes `table` with the result and returns the `attr` column.
    #[must_use]
    pub fn lookup(
        table: LookupTable,
        key_template: impl Into<String>,
        attr: impl Into<String>,
    ) -> Self {
        Self::from_kind(Kind::Lookup(LookupState {
            table,
            key_template: key_template.into(),
            attr: attr.into(),
        }))
    }

    /// Marks this parameter for persistence across runs.
    #[must_use]
    pub const fn keep_state(mut self) -> Self {
        self.keep_state = true;
        self
    }

    #[must_use]
    pub const fn keeps_state(&self) -> bool {
        self.keep_state
    }

    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self.kind {
            Kind::Sequence(_) => "sequence",
            Kind::SequenceRequest(_) => "sequence-request",
            Kind::SequenceBatch(_) => "sequence-batch",
            Kind::SequenceRequestRandomized(_) => "sequence-request-randomized",
            Kind::RandomValue(_) => "random-value",
            Kind::RandomValueRequest(_) => "random-value-request",
            Kind::RandomString(_) => "random-string",
            Kind::RandomStringRequest(_) => "random-string-request",
            Kind::Calc(_) => "calc",
            Kind::Lookup(_) => "lookup",
        }
    }

    /// The current value. [`ParamValue::Unset`] until the first trigger.
    #[must_use]
    pub const fn value(&self) -> &ParamValue {
        match &self.kind {
            Kind::Sequence(state) | Kind::SequenceRequest(state) | Kind::SequenceBatch(state) => {
                &state.current
            }
            Kind::SequenceRequestRandomized(state) => &state.current,
            Kind::RandomValue(state) | Kind::RandomValueRequest(state) => &state.current,
            Kind::RandomString(state) | Kind::RandomStringRequest(state) => &state.current,
            Kind::Calc(state) => &state.current,
            Kind::Lookup(_) => &ParamValue::Unset,
        }
    }

    /// Internal counter exposed to `calc` dependencies.
    #[must_use]
    pub(crate) fn counter(&self) -> Option<i64> {
        match &self.kind {
            Kind::Sequence(state) | Kind::SequenceRequest(state) | Kind::SequenceBatch(state) => {
                Some(state.counter())
            }
            Kind::SequenceRequestRandomized(state) => i64::try_from(state.pos).ok(),
            Kind::RandomValue(state) | Kind::RandomValueRequest(state) => {
                i64::try_from(state.n).ok()
            }
            Kind::RandomString(state) | Kind::RandomStringRequest(state) => {
                i64::try_from(state.n).ok()
            }
            Kind::Calc(_) | Kind::Lookup(_) => None,
        }
    }

    /// Per-reference trigger. Only reference-scoped variants advance;
    /// request- and batch-scoped variants keep their value stable within
    /// their scope.
    pub fn update_on_reference(&mut self) {
        match &mut self.kind {
            Kind::Sequence(state) => state.advance(),
            Kind::RandomValue(state) => state.advance(),
            Kind::RandomString(state) => state.advance(),
            Kind::SequenceRequest(_)
            | Kind::SequenceBatch(_)
            | Kind::SequenceRequestRandomized(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomStringRequest(_)
            | Kind::Calc(_)
            | Kind::Lookup(_) => {}
        }
    }

    /// Per-request trigger, fired once per launch.
    pub fn update_on_request(&mut self) {
        match &mut self.kind {
            Kind::SequenceRequest(state) => state.advance(),
            Kind::SequenceRequestRandomized(state) => state.advance(),
            Kind::RandomValueRequest(state) => state.advance(),
            Kind::RandomStringRequest(state) => state.advance(),
            Kind::Sequence(_)
            | Kind::SequenceBatch(_)
            | Kind::RandomValue(_)
            | Kind::RandomString(_)
            | Kind::Calc(_)
            | Kind::Lookup(_) => {}
        }
    }

    /// Per-batch trigger, fired once per `concurrency` launches.
    pub fn update_on_batch(&mut self) {
        match &mut self.kind {
            Kind::SequenceBatch(state) => state.advance(),
            Kind::Sequence(_)
            | Kind::SequenceRequest(_)
            | Kind::SequenceRequestRandomized(_)
            | Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomString(_)
            | Kind::RandomStringRequest(_)
            | Kind::Calc(_)
            | Kind::Lookup(_) => {}
        }
    }

    /// Restores the construction-time baseline. Persisted state is not
    /// touched; only the live value.
    pub fn reset(&mut self) {
        match &mut self.kind {
            Kind::Sequence(state) | Kind::SequenceRequest(state) | Kind::SequenceBatch(state) => {
                state.current = ParamValue::Unset;
            }
            Kind::SequenceRequestRandomized(state) => {
                state.pos = 0;
                state.current = ParamValue::Unset;
            }
            Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomString(_)
            | Kind::RandomStringRequest(_)
            | Kind::Calc(_)
            | Kind::Lookup(_) => {}
        }
    }

    /// Applies an external `key=value` override to this variant.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] when the variant takes no overrides or the
    /// value does not parse.
    pub fn set(&mut self, raw: &str) -> Result<(), ParamError> {
        let variant = self.variant_name();
        let parse_int = |value: &str| {
            value
                .parse::<i64>()
                .map_err(|source| ParamError::InvalidVariantOverride {
                    variant,
                    value: value.to_owned(),
                    source,
                })
        };
        match &mut self.kind {
            Kind::Sequence(state) | Kind::SequenceRequest(state) | Kind::SequenceBatch(state) => {
                state.start = parse_int(raw)?;
                state.current = ParamValue::Unset;
                Ok(())
            }
            Kind::RandomString(state) | Kind::RandomStringRequest(state) => {
                let length = parse_int(raw)?;
                state.length = usize::try_from(length)
                    .ok()
                    .ok_or(ParamError::OverrideUnsupported { variant })?;
                Ok(())
            }
            Kind::SequenceRequestRandomized(_)
            | Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::Calc(_)
            | Kind::Lookup(_) => Err(ParamError::OverrideUnsupported { variant }),
        }
    }

    /// Serializes the internal state for a persistence slot.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::StateUnsupported`] for variants without
    /// persistable state.
    pub fn get_state(&self) -> Result<Value, ParamError> {
        match &self.kind {
            Kind::Sequence(state) | Kind::SequenceRequest(state) | Kind::SequenceBatch(state) => {
                Ok(json!(state.counter()))
            }
            Kind::RandomValue(state) | Kind::RandomValueRequest(state) => Ok(state.get_state()),
            Kind::RandomString(state) | Kind::RandomStringRequest(state) => Ok(state.get_state()),
            Kind::SequenceRequestRandomized(_) | Kind::Calc(_) | Kind::Lookup(_) => {
                Err(ParamError::StateUnsupported {
                    variant: self.variant_name(),
                })
            }
        }
    }

    /// Restores state captured by [`Parameter::get_state`]. The subsequent
    /// output sequence continues exactly where the saved parameter left off.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] when the variant has no persistable state or
    /// the slot has the wrong shape.
    pub fn set_state(&mut self, state: &Value) -> Result<(), ParamError> {
        let variant = self.variant_name();
        match &mut self.kind {
            Kind::Sequence(seq) | Kind::SequenceRequest(seq) | Kind::SequenceBatch(seq) => {
                let counter = state
                    .as_i64()
                    .ok_or(ParamError::StateShape { variant })?;
                seq.current = ParamValue::Int(counter);
                Ok(())
            }
            Kind::RandomValue(rv) | Kind::RandomValueRequest(rv) => rv.set_state(state),
            Kind::RandomString(rs) | Kind::RandomStringRequest(rs) => rs.set_state(state),
            Kind::SequenceRequestRandomized(_) | Kind::Calc(_) | Kind::Lookup(_) => {
                Err(ParamError::StateUnsupported { variant })
            }
        }
    }

    pub(crate) fn calc_dep(&self) -> Option<&str> {
        match &self.kind {
            Kind::Calc(state) => Some(&state.key),
            Kind::Sequence(_)
            | Kind::SequenceRequest(_)
            | Kind::SequenceBatch(_)
            | Kind::SequenceRequestRandomized(_)
            | Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomString(_)
            | Kind::RandomStringRequest(_)
            | Kind::Lookup(_) => None,
        }
    }

    pub(crate) fn update_calc(&mut self, counter: i64) {
        if let Kind::Calc(state) = &mut self.kind {
            state.update(counter);
        }
    }

    pub(crate) fn lookup_parts(&self) -> Option<(&str, &str)> {
        match &self.kind {
            Kind::Lookup(state) => Some((&state.key_template, &state.attr)),
            Kind::Sequence(_)
            | Kind::SequenceRequest(_)
            | Kind::SequenceBatch(_)
            | Kind::SequenceRequestRandomized(_)
            | Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomString(_)
            | Kind::RandomStringRequest(_)
            | Kind::Calc(_) => None,
        }
    }

    pub(crate) fn lookup_attr(&self, name: &str, attr: &str) -> Option<String> {
        match &self.kind {
            Kind::Lookup(state) => state.table.get(name)?.get(attr).cloned(),
            Kind::Sequence(_)
            | Kind::SequenceRequest(_)
            | Kind::SequenceBatch(_)
            | Kind::SequenceRequestRandomized(_)
            | Kind::RandomValue(_)
            | Kind::RandomValueRequest(_)
            | Kind::RandomString(_)
            | Kind::RandomStringRequest(_)
            | Kind::Calc(_) => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
