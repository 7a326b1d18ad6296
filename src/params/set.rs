use std::collections::BTreeMap;

use super::{Parameter, template};
use crate::error::ParamError;

/// A named entry in a [`Parameters`] set: a literal or a live parameter.
#[derive(Debug, Clone)]
pub enum Entry {
    Int(i64),
    Float(f64),
    Str(String),
    Param(Parameter),
}

impl From<i64> for Entry {
    fn from(value: i64) -> Self {
        Entry::Int(value)
    }
}

impl From<f64> for Entry {
    fn from(value: f64) -> Self {
        Entry::Float(value)
    }
}

impl From<&str> for Entry {
    fn from(value: &str) -> Self {
        Entry::Str(value.to_owned())
    }
}

impl From<String> for Entry {
    fn from(value: String) -> Self {
        Entry::Str(value)
    }
}

impl From<Parameter> for Entry {
    fn from(value: Parameter) -> Self {
        Entry::Param(value)
    }
}

/// Named mapping of literals and [`Parameter`]s feeding template
/// substitution. Constructed once per run and mutated in place for the
/// run's duration.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    entries: BTreeMap<String, Entry>,
}

impl Parameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: impl Into<Entry>) {
        self.entries.insert(key.into(), entry.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<&Parameter> {
        match self.entries.get(key) {
            Some(Entry::Param(param)) => Some(param),
            Some(Entry::Int(_) | Entry::Float(_) | Entry::Str(_)) | None => None,
        }
    }

    pub(crate) fn get_param_mut(&mut self, key: &str) -> Option<&mut Parameter> {
        match self.entries.get_mut(key) {
            Some(Entry::Param(param)) => Some(param),
            Some(Entry::Int(_) | Entry::Float(_) | Entry::Str(_)) | None => None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.entries.iter()
    }

    /// Substitutes every `<<name>>` placeholder in `template`, firing each
    /// referenced parameter's per-reference hook once per occurrence. Pass
    /// `update = false` for a dry resolution that leaves all state alone.
    pub fn render(&mut self, template: &str, update: bool) -> String {
        template::render(self, template, update)
    }

    /// Fires the per-request trigger on every parameter.
    pub fn update_request(&mut self) {
        for entry in self.entries.values_mut() {
            if let Entry::Param(param) = entry {
                param.update_on_request();
            }
        }
    }

    /// Fires the per-batch trigger on every parameter.
    pub fn update_batch(&mut self) {
        for entry in self.entries.values_mut() {
            if let Entry::Param(param) = entry {
                param.update_on_batch();
            }
        }
    }

    /// Restores every parameter to its construction-time baseline.
    pub fn reset(&mut self) {
        for entry in self.entries.values_mut() {
            if let Entry::Param(param) = entry {
                param.reset();
            }
        }
    }

    pub(crate) fn counter(&self, key: &str) -> Option<i64> {
        self.get_param(key).and_then(Parameter::counter)
    }

    /// Applies one `key=value` override, coercing the value to the type of
    /// the existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] when the entry is missing, the syntax is not
    /// `key=value`, or the value does not coerce.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ParamError> {
        let (key, value) = spec
            .split_once('=')
            .ok_or_else(|| ParamError::MalformedOverride {
                entry: spec.to_owned(),
            })?;
        match self.entries.get_mut(key) {
            None => Err(ParamError::UnknownKey {
                key: key.to_owned(),
            }),
            Some(Entry::Int(slot)) => {
                *slot = value
                    .parse()
                    .map_err(|source| ParamError::InvalidIntOverride {
                        key: key.to_owned(),
                        source,
                    })?;
                Ok(())
            }
            Some(Entry::Float(slot)) => {
                *slot = value
                    .parse()
                    .map_err(|source| ParamError::InvalidFloatOverride {
                        key: key.to_owned(),
                        source,
                    })?;
                Ok(())
            }
            Some(Entry::Str(slot)) => {
                *slot = value.to_owned();
                Ok(())
            }
            Some(Entry::Param(param)) => param.set(value),
        }
    }

    /// Applies a sequence of `key=value` overrides.
    ///
    /// # Errors
    ///
    /// Fails on the first override that does not apply; earlier overrides
    /// stay applied.
    pub fn apply_overrides<I, S>(&mut self, specs: I) -> Result<(), ParamError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in specs {
            self.apply_override(spec.as_ref())?;
        }
        Ok(())
    }
}

impl<K, E> FromIterator<(K, E)> for Parameters
where
    K: Into<String>,
    E: Into<Entry>,
{
    fn from_iter<T: IntoIterator<Item = (K, E)>>(iter: T) -> Self {
        let mut params = Parameters::new();
        for (key, entry) in iter {
            params.insert(key, entry);
        }
        params
    }
}
