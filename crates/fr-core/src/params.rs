//! Tagged physical parameters and ordered, name-addressable parameter sets.
//!
//! A [`Parameter`] is a shared handle: cloning it (directly, or by filtering a
//! [`ParameterSet`] with [`ParameterSet::from_tag`]) produces another window
//! onto the same mutable value. Handles are reference counted without atomics,
//! so a live set can never cross a thread boundary. Workers that need their own
//! copy go through [`ParameterSet::snapshot`] and [`ParameterSet::from_defs`].

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, FrError, UNKNOWN_PARAMETER};

/// Closed interval `[lo, hi]` of admissible values.
pub type Range = [f64; 2];

/// Physical role of a parameter in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ParamTag {
    /// No particular role.
    #[default]
    None,
    /// Detector or astrophysical nuisance parameter.
    Nuisance,
    /// New-physics mixing angle (or CP phase).
    MixingAngle,
    /// log10 of the new-physics scale.
    Scale,
    /// Source flavour-composition angle.
    SourceAngle,
    /// Best-fit flavour angle handed to the external fitter.
    BestFit,
}

/// Prior distribution attached to a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Prior {
    /// Flat within the parameter range.
    #[default]
    None,
    /// Gaussian centred on the nominal value with width `std`.
    Gaussian,
    /// Gaussian with an additional one-sided normalisation at the upper bound.
    HalfGaussian,
}

fn default_std() -> f64 {
    1.0
}

/// Plain, thread-safe description of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Unique name within a set.
    pub name: String,
    /// Current value.
    pub value: f64,
    /// Reference value used to centre priors (defaults to `value`).
    #[serde(default)]
    pub nominal_value: Option<f64>,
    /// Closed admissible interval.
    pub ranges: Range,
    /// Prior width.
    #[serde(default = "default_std")]
    pub std: f64,
    /// Prior family.
    #[serde(default)]
    pub prior: Prior,
    /// Physical role.
    #[serde(default)]
    pub tag: ParamTag,
    /// Display label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tex: Option<String>,
    /// Interval used for uniform walker seeding, when narrower than `ranges`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<Range>,
}

impl ParameterDef {
    /// Creates a definition with no display hints.
    pub fn new(
        name: impl Into<String>,
        value: f64,
        ranges: Range,
        std: f64,
        prior: Prior,
        tag: ParamTag,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            nominal_value: None,
            ranges,
            std,
            prior,
            tag,
            tex: None,
            seed: None,
        }
    }

    /// Sets the display label.
    pub fn with_tex(mut self, tex: impl Into<String>) -> Self {
        self.tex = Some(tex.into());
        self
    }

    /// Sets the seeding interval.
    pub fn with_seed(mut self, seed: Range) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Sets a nominal value distinct from the starting value.
    pub fn with_nominal(mut self, nominal: f64) -> Self {
        self.nominal_value = Some(nominal);
        self
    }
}

#[derive(Debug)]
struct ParamCell {
    name: String,
    value: Cell<f64>,
    nominal_value: f64,
    ranges: Range,
    std: f64,
    prior: Prior,
    tag: ParamTag,
    tex: Option<String>,
    seed: Option<Range>,
}

/// Shared handle to a single named scalar parameter.
///
/// `Clone` yields another view of the same value, not a copy.
#[derive(Clone)]
pub struct Parameter {
    cell: Rc<ParamCell>,
}

impl Parameter {
    /// Validates a definition and creates a fresh live parameter.
    pub fn define(def: ParameterDef) -> Result<Self, FrError> {
        let [lo, hi] = def.ranges;
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(FrError::Configuration(
                ErrorInfo::new("param-range", "parameter range must satisfy lo <= hi")
                    .with_context("name", def.name.clone())
                    .with_context("lo", lo.to_string())
                    .with_context("hi", hi.to_string()),
            ));
        }
        if !(def.std.is_finite() && def.std > 0.0) && def.prior != Prior::None {
            return Err(FrError::Configuration(
                ErrorInfo::new("param-std", "prior width must be positive and finite")
                    .with_context("name", def.name.clone()),
            ));
        }
        Ok(Self {
            cell: Rc::new(ParamCell {
                nominal_value: def.nominal_value.unwrap_or(def.value),
                value: Cell::new(def.value),
                name: def.name,
                ranges: def.ranges,
                std: def.std,
                prior: def.prior,
                tag: def.tag,
                tex: def.tex,
                seed: def.seed,
            }),
        })
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.cell.name
    }

    /// Current value.
    pub fn value(&self) -> f64 {
        self.cell.value.get()
    }

    /// Overwrites the current value; visible through every alias.
    pub fn set_value(&self, value: f64) {
        self.cell.value.set(value);
    }

    /// Prior centre.
    pub fn nominal_value(&self) -> f64 {
        self.cell.nominal_value
    }

    /// Admissible interval.
    pub fn ranges(&self) -> Range {
        self.cell.ranges
    }

    /// Prior width.
    pub fn std(&self) -> f64 {
        self.cell.std
    }

    /// Prior family.
    pub fn prior(&self) -> Prior {
        self.cell.prior
    }

    /// Physical role.
    pub fn tag(&self) -> ParamTag {
        self.cell.tag
    }

    /// Display label, falling back to the name.
    pub fn label(&self) -> &str {
        self.cell.tex.as_deref().unwrap_or(&self.cell.name)
    }

    /// Seeding interval, falling back to the full range.
    pub fn seed(&self) -> Range {
        self.cell.seed.unwrap_or(self.cell.ranges)
    }

    /// True when `value` lies in the closed range.
    pub fn contains(&self, value: f64) -> bool {
        let [lo, hi] = self.cell.ranges;
        lo <= value && value <= hi
    }

    /// True when both handles point at the same underlying value.
    pub fn same_as(&self, other: &Parameter) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Plain description carrying the current value.
    pub fn to_def(&self) -> ParameterDef {
        ParameterDef {
            name: self.cell.name.clone(),
            value: self.value(),
            nominal_value: Some(self.cell.nominal_value),
            ranges: self.cell.ranges,
            std: self.cell.std,
            prior: self.cell.prior,
            tag: self.cell.tag,
            tex: self.cell.tex.clone(),
            seed: self.cell.seed,
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.cell.name)
            .field("value", &self.value())
            .field("ranges", &self.cell.ranges)
            .field("tag", &self.cell.tag)
            .finish()
    }
}

/// Ordered collection of uniquely named parameters.
///
/// The positional order defines the layout of every `theta` vector handed to
/// the samplers and must not change for the lifetime of a run.
#[derive(Clone, Default)]
pub struct ParameterSet {
    params: IndexMap<String, Parameter>,
}

impl ParameterSet {
    /// Builds a set from live handles. Duplicate names are rejected.
    pub fn new(params: impl IntoIterator<Item = Parameter>) -> Result<Self, FrError> {
        let mut map = IndexMap::new();
        for param in params {
            let name = param.name().to_string();
            if map.insert(name.clone(), param).is_some() {
                return Err(FrError::Configuration(
                    ErrorInfo::new("param-duplicate", "parameter names must be unique")
                        .with_context("name", name),
                ));
            }
        }
        Ok(Self { params: map })
    }

    /// Builds an independent live set from plain definitions.
    pub fn from_defs(defs: impl IntoIterator<Item = ParameterDef>) -> Result<Self, FrError> {
        let params = defs
            .into_iter()
            .map(Parameter::define)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(params)
    }

    /// Plain definitions (with current values) in set order.
    pub fn snapshot(&self) -> Vec<ParameterDef> {
        self.iter().map(Parameter::to_def).collect()
    }

    /// Deep copy: a new set whose values are independent of this one.
    pub fn detach(&self) -> Result<Self, FrError> {
        Self::from_defs(self.snapshot())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// True when the set holds no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over the handles in order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> + '_ {
        self.params.values()
    }

    /// Positional lookup.
    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.params.get_index(index).map(|(_, param)| param)
    }

    /// Name lookup returning the shared handle.
    ///
    /// An unknown name is a [`FrError::Configuration`] with code
    /// [`UNKNOWN_PARAMETER`].
    pub fn by_name(&self, name: &str) -> Result<&Parameter, FrError> {
        self.params.get(name).ok_or_else(|| {
            FrError::Configuration(
                ErrorInfo::new(UNKNOWN_PARAMETER, "no parameter with this name")
                    .with_context("name", name),
            )
        })
    }

    /// Position of a named parameter.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.get_index_of(name)
    }

    /// True when a parameter with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Current values in order.
    pub fn values(&self) -> Vec<f64> {
        self.iter().map(Parameter::value).collect()
    }

    /// Ranges in order.
    pub fn ranges(&self) -> Vec<Range> {
        self.iter().map(Parameter::ranges).collect()
    }

    /// Names in order.
    pub fn names(&self) -> Vec<String> {
        self.params.keys().cloned().collect()
    }

    /// Display labels in order.
    pub fn labels(&self) -> Vec<String> {
        self.iter().map(|param| param.label().to_string()).collect()
    }

    /// Prior widths in order.
    pub fn stds(&self) -> Vec<f64> {
        self.iter().map(Parameter::std).collect()
    }

    /// Seeding intervals in order.
    pub fn seeds(&self) -> Vec<Range> {
        self.iter().map(Parameter::seed).collect()
    }

    /// Binds `theta` by position onto the set.
    pub fn set_values(&self, theta: &[f64]) -> Result<(), FrError> {
        if theta.len() != self.len() {
            return Err(FrError::Shape(
                ErrorInfo::new("theta-length", "parameter vector does not match the set")
                    .with_context("expected", self.len().to_string())
                    .with_context("received", theta.len().to_string()),
            ));
        }
        for (param, &value) in self.iter().zip(theta) {
            param.set_value(value);
        }
        Ok(())
    }

    fn matches(param: &Parameter, tags: &[ParamTag], invert: bool) -> bool {
        tags.contains(&param.tag()) != invert
    }

    /// Sub-set of parameters whose tag is one of `tags` (or none of them when
    /// `invert`), in original order. The sub-set aliases this set's values.
    pub fn from_tag(&self, tags: &[ParamTag], invert: bool) -> ParameterSet {
        let params = self
            .params
            .iter()
            .filter(|(_, param)| Self::matches(param, tags, invert))
            .map(|(name, param)| (name.clone(), param.clone()))
            .collect();
        ParameterSet { params }
    }

    /// Values of the parameters selected as in [`ParameterSet::from_tag`].
    pub fn values_from_tag(&self, tags: &[ParamTag], invert: bool) -> Vec<f64> {
        self.iter()
            .filter(|param| Self::matches(param, tags, invert))
            .map(Parameter::value)
            .collect()
    }

    /// Positions of the parameters selected as in [`ParameterSet::from_tag`].
    pub fn indices_from_tag(&self, tags: &[ParamTag], invert: bool) -> Vec<usize> {
        self.iter()
            .enumerate()
            .filter(|(_, param)| Self::matches(param, tags, invert))
            .map(|(index, _)| index)
            .collect()
    }
}

impl fmt::Debug for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a ParameterSet {
    type Item = &'a Parameter;
    type IntoIter = indexmap::map::Values<'a, String, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.values()
    }
}
