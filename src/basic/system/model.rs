use std::collections::HashMap;

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use num_complex::Complex64;
use num_traits::One;

use super::admittance::Admittance;
use super::topology::Topology;
use crate::basic::runpp::{InitMode, PowerFlowConfig};
use crate::error::PowerFlowError;
use crate::network::Network;

/// Bus type seen by the Newton-Raphson iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    PQ,
    PV,
    Slack,
}

/// Everything the Newton-Raphson solver needs, in natural solver bus order.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct PowerFlowModel {
    pub topology: Topology,
    pub Ybus: CscMatrix<Complex64>,
    /// Specified injections (generator convention, per unit).
    pub Sbus: DVector<Complex64>,
    /// Part of `Sbus` coming from constant power loads, sgens, storage and ward setpoints.
    pub s_fixed: DVector<Complex64>,
    pub v_init: DVector<Complex64>,
    pub bus_type: Vec<BusType>,
}

impl PowerFlowModel {
    /// Assembles the admittance matrix, injections and initial voltages of `net`.
    pub fn build(net: &Network, cfg: &PowerFlowConfig) -> Result<Self, PowerFlowError> {
        let topology = Topology::build(net, cfg.calculate_voltage_angles)?;
        let n = topology.n_bus;
        let sn = net.sn_mva;
        let lookup = &topology.bus_lookup;
        let solver_bus = |bus: i64| lookup.get(&bus).copied();

        let mut y_shunt = vec![Complex64::default(); n];
        for shunt in net.shunt.values().filter(|s| s.in_service) {
            if let Some(b) = solver_bus(shunt.bus) {
                y_shunt[b] += *Admittance::shunt(shunt, topology.vn_kv[b], sn);
            }
        }
        for ward in net.ward.values().filter(|w| w.in_service) {
            if let Some(b) = solver_bus(ward.bus) {
                y_shunt[b] += *Admittance::ward(ward.pz_mw, ward.qz_mvar, sn);
            }
        }
        for xward in net.xward.values().filter(|w| w.in_service) {
            if let Some(b) = solver_bus(xward.bus) {
                y_shunt[b] += *Admittance::ward(xward.pz_mw, xward.qz_mvar, sn);
            }
        }
        let ybus = create_ybus(&topology, &y_shunt);

        let mut s_fixed = DVector::<Complex64>::zeros(n);
        let mut add = |bus: i64, s: Complex64| {
            if let Some(b) = solver_bus(bus) {
                s_fixed[b] += s / sn;
            }
        };
        for l in net.load.values().filter(|e| e.in_service) {
            add(l.bus, -Complex64::new(l.p_mw, l.q_mvar) * l.scaling);
        }
        for s in net.sgen.values().filter(|e| e.in_service) {
            add(s.bus, Complex64::new(s.p_mw, s.q_mvar) * s.scaling);
        }
        for s in net.storage.values().filter(|e| e.in_service) {
            add(s.bus, -Complex64::new(s.p_mw, s.q_mvar) * s.scaling);
        }
        for w in net.ward.values().filter(|e| e.in_service) {
            add(w.bus, -Complex64::new(w.ps_mw, w.qs_mvar));
        }
        for w in net.xward.values().filter(|e| e.in_service) {
            add(w.bus, -Complex64::new(w.ps_mw, w.qs_mvar));
        }

        let mut sbus = s_fixed.clone();
        let mut bus_type = vec![BusType::PQ; n];
        let mut v_init = DVector::from_element(n, Complex64::one());
        if cfg.init == InitMode::Results {
            if let Some(res) = &net.res {
                for (bus, r) in &res.bus {
                    if let Some(b) = solver_bus(*bus) {
                        v_init[b] = Complex64::from_polar(r.vm_pu, r.va_degree.to_radians());
                    }
                }
            }
        }
        let set_vm = |v: &mut Complex64, vm: f64| {
            let va = if v.norm() > 0.0 { v.arg() } else { 0.0 };
            *v = Complex64::from_polar(vm, va);
        };

        for g in net.generator.values().filter(|g| g.in_service && !g.slack) {
            if let Some(b) = solver_bus(g.bus) {
                sbus[b] += Complex64::new(g.p_mw * g.scaling / sn, 0.0);
                bus_type[b] = BusType::PV;
                set_vm(&mut v_init[b], g.vm_pu);
            }
        }
        for &b in topology.aux_bus.values() {
            bus_type[b] = BusType::PV;
        }
        for (idx, &b) in &topology.aux_bus {
            if let Some(xw) = net.xward.get(idx) {
                set_vm(&mut v_init[b], xw.vm_pu);
            }
        }
        for g in net.generator.values().filter(|g| g.in_service && g.slack) {
            if let Some(b) = solver_bus(g.bus) {
                bus_type[b] = BusType::Slack;
                v_init[b] = Complex64::from_polar(g.vm_pu, 0.0);
            }
        }
        for e in net.ext_grid.values().filter(|e| e.in_service) {
            if let Some(b) = solver_bus(e.bus) {
                bus_type[b] = BusType::Slack;
                let va = if cfg.calculate_voltage_angles {
                    e.va_degree.to_radians()
                } else {
                    0.0
                };
                v_init[b] = Complex64::from_polar(e.vm_pu, va);
            }
        }

        Ok(Self {
            topology,
            Ybus: ybus,
            Sbus: sbus,
            s_fixed,
            v_init,
            bus_type,
        })
    }

    /// Solver buses ordered `[pv.., pq.., slack..]`, with the number of pv and pq buses.
    pub fn ordering(&self) -> (Vec<usize>, usize, usize) {
        let of = |t: BusType| {
            self.bus_type
                .iter()
                .enumerate()
                .filter(move |(_, bt)| **bt == t)
                .map(|(i, _)| i)
        };
        let pv: Vec<_> = of(BusType::PV).collect();
        let pq: Vec<_> = of(BusType::PQ).collect();
        let (npv, npq) = (pv.len(), pq.len());
        let order = pv.into_iter().chain(pq).chain(of(BusType::Slack)).collect();
        (order, npv, npq)
    }

    /// Solver state handed to the caller after convergence.
    pub fn internals(&self) -> SolverInternals {
        SolverInternals {
            ybus: self.Ybus.clone(),
            bus_lookup: self.topology.bus_lookup.clone(),
            branch: self.topology.branches.clone(),
            aux_bus: self.topology.aux_bus.clone(),
        }
    }
}

/// Admittance matrix and bus mapping of the last converged power flow.
#[derive(Debug, Clone)]
pub struct SolverInternals {
    /// Admittance matrix in natural solver bus order.
    pub ybus: CscMatrix<Complex64>,
    /// Network bus -> solver bus. Buses that were not energised are absent.
    pub bus_lookup: HashMap<i64, usize>,
    /// Every branch stamped into `ybus`.
    pub branch: Vec<super::topology::SolverBranch>,
    /// Extended ward -> solver bus of its internal node.
    pub aux_bus: std::collections::BTreeMap<i64, usize>,
}

/// Assembles Ybus from the branch stamps and the bus shunt admittances.
fn create_ybus(topology: &Topology, y_shunt: &[Complex64]) -> CscMatrix<Complex64> {
    let n = topology.n_bus;
    let mut coo = CooMatrix::new(n, n);
    for (b, y) in y_shunt.iter().enumerate() {
        coo.push(b, b, *y);
    }
    for br in &topology.branches {
        let s = &br.stamp;
        coo.push(br.from, br.from, s.yff);
        coo.push(br.from, br.to, s.yft);
        coo.push(br.to, br.from, s.ytf);
        coo.push(br.to, br.to, s.ytt);
    }
    CscMatrix::from(&coo)
}

/// Permutation matrix `P` with `(P x)[i] = x[order[i]]`.
pub fn create_permute_mat(order: &[usize]) -> CsrMatrix<Complex64> {
    let n = order.len();
    let mut coo = CooMatrix::new(n, n);
    for (row, &col) in order.iter().enumerate() {
        coo.push(row, col, Complex64::one());
    }
    CsrMatrix::from(&coo)
}
