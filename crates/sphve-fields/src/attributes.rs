//! Scalar dataset attributes persisted alongside the particle columns.

/// Value of a persisted attribute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttrValue {
    /// Real-valued attribute.
    Real(f64),
    /// Integer attribute.
    Int(u64),
}

impl AttrValue {
    /// The value as `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Real(v) => v,
            Self::Int(v) => v as f64,
        }
    }

    /// The value as `u64`, truncating reals.
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Real(v) => v.max(0.0) as u64,
            Self::Int(v) => v,
        }
    }
}

/// Persisted attribute descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Record name.
    pub name: &'static str,
    /// Whether a checkpoint without this attribute is rejected.
    pub required: bool,
}

const fn spec(name: &'static str, required: bool) -> AttributeSpec {
    AttributeSpec { name, required }
}

/// Every persisted attribute, in record order.
pub const ATTRIBUTES: [AttributeSpec; 14] = [
    spec("iteration", true),
    spec("numParticlesGlobal", true),
    spec("ng0", false),
    spec("ngmax", false),
    spec("time", true),
    spec("minDt", true),
    spec("minDt_m1", true),
    spec("Kcour", false),
    spec("Krho", false),
    spec("gravConstant", true),
    spec("gamma", false),
    spec("eps", false),
    spec("etaAcc", false),
    spec("muiConst", false),
];

/// Dataset attributes and per-step diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    /// Completed step count.
    pub iteration: u64,
    /// Particle count summed over all ranks.
    pub num_particles_global: u64,
    /// Target neighbor count.
    pub ng0: u32,
    /// Neighbor list capacity per particle.
    pub ngmax: u32,
    /// Simulation time.
    pub time: f64,
    /// Timestep of the current step.
    pub min_dt: f64,
    /// Timestep of the previous step.
    pub min_dt_m1: f64,
    /// Courant factor.
    pub k_cour: f64,
    /// Density-change timestep factor.
    pub k_rho: f64,
    /// Gravitational constant, zero disables gravity.
    pub g: f64,
    /// Adiabatic index.
    pub gamma: f64,
    /// Gravitational softening length.
    pub eps: f64,
    /// Acceleration timestep factor.
    pub eta_acc: f64,
    /// Mean molecular weight of the ions.
    pub mui_const: f64,
    /// Rank-local Courant bound of the current step.
    pub min_dt_courant: f64,
    /// Rank-local density-change bound of the current step.
    pub min_dt_rho: f64,
    /// Gravitational potential energy of the owned particles.
    pub egrav: f64,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            iteration: 0,
            num_particles_global: 0,
            ng0: 100,
            ngmax: 150,
            time: 0.0,
            min_dt: 1e-12,
            min_dt_m1: 1e-12,
            k_cour: 0.2,
            k_rho: 0.06,
            g: 0.0,
            gamma: 5.0 / 3.0,
            eps: 0.005,
            eta_acc: 0.2,
            mui_const: 10.0,
            min_dt_courant: f64::INFINITY,
            min_dt_rho: f64::INFINITY,
            egrav: 0.0,
        }
    }
}

impl Attributes {
    /// Value of a persisted attribute by record name.
    pub fn get(&self, name: &str) -> Option<AttrValue> {
        let v = match name {
            "iteration" => AttrValue::Int(self.iteration),
            "numParticlesGlobal" => AttrValue::Int(self.num_particles_global),
            "ng0" => AttrValue::Int(u64::from(self.ng0)),
            "ngmax" => AttrValue::Int(u64::from(self.ngmax)),
            "time" => AttrValue::Real(self.time),
            "minDt" => AttrValue::Real(self.min_dt),
            "minDt_m1" => AttrValue::Real(self.min_dt_m1),
            "Kcour" => AttrValue::Real(self.k_cour),
            "Krho" => AttrValue::Real(self.k_rho),
            "gravConstant" => AttrValue::Real(self.g),
            "gamma" => AttrValue::Real(self.gamma),
            "eps" => AttrValue::Real(self.eps),
            "etaAcc" => AttrValue::Real(self.eta_acc),
            "muiConst" => AttrValue::Real(self.mui_const),
            _ => return None,
        };
        Some(v)
    }

    /// Set a persisted attribute by record name. Returns `false` for
    /// unknown names.
    pub fn set(&mut self, name: &str, value: AttrValue) -> bool {
        match name {
            "iteration" => self.iteration = value.as_u64(),
            "numParticlesGlobal" => self.num_particles_global = value.as_u64(),
            "ng0" => self.ng0 = value.as_u64().min(u64::from(u32::MAX)) as u32,
            "ngmax" => self.ngmax = value.as_u64().min(u64::from(u32::MAX)) as u32,
            "time" => self.time = value.as_f64(),
            "minDt" => self.min_dt = value.as_f64(),
            "minDt_m1" => self.min_dt_m1 = value.as_f64(),
            "Kcour" => self.k_cour = value.as_f64(),
            "Krho" => self.k_rho = value.as_f64(),
            "gravConstant" => self.g = value.as_f64(),
            "gamma" => self.gamma = value.as_f64(),
            "eps" => self.eps = value.as_f64(),
            "etaAcc" => self.eta_acc = value.as_f64(),
            "muiConst" => self.mui_const = value.as_f64(),
            _ => return false,
        }
        true
    }

    /// Reset the rank-local timestep bounds before a step.
    pub fn reset_step_bounds(&mut self) {
        self.min_dt_courant = f64::INFINITY;
        self.min_dt_rho = f64::INFINITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_attribute_is_addressable() {
        let mut attrs = Attributes::default();
        for spec in ATTRIBUTES {
            let v = attrs.get(spec.name).unwrap();
            assert!(attrs.set(spec.name, v), "{}", spec.name);
        }
        assert_eq!(attrs, Attributes::default());
        assert!(attrs.get("bogus").is_none());
        assert!(!attrs.set("bogus", AttrValue::Int(1)));
    }

    #[test]
    fn defaults_match_reference_constants() {
        let a = Attributes::default();
        assert_eq!(a.ng0, 100);
        assert_eq!(a.ngmax, 150);
        assert!((a.gamma - 5.0 / 3.0).abs() < 1e-15);
        assert!(a.min_dt_courant.is_infinite());
    }

    #[test]
    fn integer_attributes_accept_reals() {
        let mut a = Attributes::default();
        a.set("iteration", AttrValue::Real(12.0));
        assert_eq!(a.iteration, 12);
    }
}
