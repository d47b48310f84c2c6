//! Pandapower-style network model: typed element tables, a results snapshot and the solver
//! state left behind by the last converged power flow.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::basic::system::SolverInternals;

mod create;
pub mod display;
pub mod elements;
pub mod results;

pub use elements::*;
pub use results::*;

/// Element table keyed by the element index.
pub type Table<T> = BTreeMap<i64, T>;

/// A power network in the pandapower data layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub name: Option<String>,
    pub f_hz: f64,
    pub sn_mva: f64,
    #[serde(default)]
    pub bus: Table<Bus>,
    #[serde(default)]
    pub line: Table<Line>,
    #[serde(default)]
    pub trafo: Table<Transformer>,
    #[serde(default)]
    pub load: Table<Load>,
    #[serde(default)]
    pub sgen: Table<SGen>,
    #[serde(rename = "gen", default)]
    pub generator: Table<Gen>,
    #[serde(default)]
    pub storage: Table<Storage>,
    #[serde(default)]
    pub ext_grid: Table<ExtGrid>,
    #[serde(default)]
    pub shunt: Table<Shunt>,
    #[serde(default)]
    pub impedance: Table<Impedance>,
    #[serde(default)]
    pub switch: Table<Switch>,
    #[serde(default)]
    pub ward: Table<Ward>,
    #[serde(default)]
    pub xward: Table<XWard>,
    /// Results of the last converged power flow.
    #[serde(skip)]
    pub res: Option<NetResults>,
    /// Admittance matrix and bus lookup of the last converged power flow.
    #[serde(skip)]
    pub internal: Option<SolverInternals>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(50.0, 1.0)
    }
}

impl Network {
    /// Creates an empty network with the given frequency and power base.
    pub fn new(f_hz: f64, sn_mva: f64) -> Self {
        Self {
            name: None,
            f_hz,
            sn_mva,
            bus: Table::new(),
            line: Table::new(),
            trafo: Table::new(),
            load: Table::new(),
            sgen: Table::new(),
            generator: Table::new(),
            storage: Table::new(),
            ext_grid: Table::new(),
            shunt: Table::new(),
            impedance: Table::new(),
            switch: Table::new(),
            ward: Table::new(),
            xward: Table::new(),
            res: None,
            internal: None,
        }
    }

    /// Solved voltage magnitude and angle (degrees) of a bus, if the bus was energised.
    pub fn bus_voltage(&self, bus: i64) -> Option<(f64, f64)> {
        let r = self.res.as_ref()?.bus.get(&bus)?;
        Some((r.vm_pu, r.va_degree))
    }

    /// Drops results and solver state, e.g. after the topology changed for good.
    pub fn clear_results(&mut self) {
        self.res = None;
        self.internal = None;
    }

    /// `bus` and the in-service buses joined to it by closed zero-impedance bus-bus switches.
    /// The walk never enters a `barrier` bus.
    pub fn fused_buses(&self, bus: i64, barrier: &BTreeSet<i64>) -> BTreeSet<i64> {
        let mut group = BTreeSet::from([bus]);
        let mut queue = VecDeque::from([bus]);
        while let Some(b) = queue.pop_front() {
            for s in self.switch.values().filter(|s| s.fuses()) {
                let next = match s.other_bus() {
                    Some(other) if s.bus == b => other,
                    Some(other) if other == b => s.bus,
                    _ => continue,
                };
                let usable = !barrier.contains(&next)
                    && self.bus.get(&next).is_some_and(|n| n.in_service);
                if usable && group.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        group
    }

    /// In-service reference sources (ext grids and slack generators) at `bus`.
    pub fn reference_sources(&self, bus: i64) -> Vec<ReferenceSource> {
        let ext = self
            .ext_grid
            .iter()
            .filter(|(_, e)| e.in_service && e.bus == bus)
            .map(|(&idx, _)| ReferenceSource::ExtGrid(idx));
        let gens = self
            .generator
            .iter()
            .filter(|(_, g)| g.in_service && g.slack && g.bus == bus)
            .map(|(&idx, _)| ReferenceSource::SlackGen(idx));
        ext.chain(gens).collect()
    }
}

/// A voltage reference element: either an external grid or a generator flagged as slack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    ExtGrid(i64),
    SlackGen(i64),
}

impl ReferenceSource {
    /// Power delivered by the source in the last solve (generator convention).
    pub fn power(&self, res: &NetResults) -> Option<PQResult> {
        match self {
            ReferenceSource::ExtGrid(idx) => res.ext_grid.get(idx).copied(),
            ReferenceSource::SlackGen(idx) => res.generator.get(idx).copied(),
        }
    }
}
