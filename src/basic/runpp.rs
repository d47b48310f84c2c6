use nalgebra_sparse::{CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::newtonpf::newton_pf;
use super::solver::DefaultSolver;
use super::system::model::{create_permute_mat, PowerFlowModel};
use super::system::results::extract_results;
use crate::error::PowerFlowError;
use crate::network::Network;

/// Initial voltage guess of a power flow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitMode {
    /// 1 pu and 0 degrees, except for voltage setpoints.
    #[default]
    Flat,
    /// Voltages of the previous results where available.
    Results,
}

/// Configuration of a power flow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PowerFlowConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_it: Option<usize>, // Maximum number of iterations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tol: Option<f64>, // Largest allowed mismatch in per unit
    /// Honour ext grid angles and transformer phase shifts.
    pub calculate_voltage_angles: bool,
    pub init: InitMode,
}

impl Default for PowerFlowConfig {
    fn default() -> Self {
        Self {
            max_it: Some(100),
            tol: Some(1e-8),
            calculate_voltage_angles: true,
            init: InitMode::Flat,
        }
    }
}

/// Summary of a converged power flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerFlowSummary {
    pub iterations: usize,
    /// Number of energised solver buses.
    pub n_bus: usize,
}

/// A trait for running power flow analysis on a [`Network`].
///
/// On success the implementation writes `net.res` and `net.internal`. On failure both are
/// left untouched.
pub trait RunPF {
    fn run_pf(
        &mut self,
        net: &mut Network,
        cfg: &PowerFlowConfig,
    ) -> Result<PowerFlowSummary, PowerFlowError>;
}

/// Newton-Raphson power flow with a fresh sparse LU solver per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct NewtonPF;

impl RunPF for NewtonPF {
    #[instrument(skip_all, fields(buses = net.bus.len()))]
    #[allow(non_snake_case)]
    fn run_pf(
        &mut self,
        net: &mut Network,
        cfg: &PowerFlowConfig,
    ) -> Result<PowerFlowSummary, PowerFlowError> {
        let model = PowerFlowModel::build(net, cfg)?;
        let (order, npv, npq) = model.ordering();
        let reorder = create_permute_mat(&order);
        let reorder_t = reorder.transpose();
        let Ybus = CscMatrix::from(&(&reorder * &CsrMatrix::from(&model.Ybus) * &reorder_t));
        let Sbus = &reorder * &model.Sbus;
        let v_init = &reorder * &model.v_init;

        let mut solver = DefaultSolver::default();
        let (v, iterations) = newton_pf(
            &Ybus,
            &Sbus,
            &v_init,
            npv,
            npq,
            cfg.tol,
            cfg.max_it,
            &mut solver,
        )?;
        let v = &reorder_t * &v;

        net.res = Some(extract_results(net, &model, &v));
        net.internal = Some(model.internals());
        debug!(iterations, n_bus = model.topology.n_bus, "results written");
        Ok(PowerFlowSummary {
            iterations,
            n_bus: model.topology.n_bus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcases::*;

    fn solved(mut net: Network) -> Network {
        NewtonPF.run_pf(&mut net, &PowerFlowConfig::default()).unwrap();
        net
    }

    /// Every bus draws exactly what its branches deliver.
    fn assert_bus_balance(net: &Network) {
        let res = net.res.as_ref().unwrap();
        for (&bus, r) in &res.bus {
            let mut p = r.p_mw;
            let mut q = r.q_mvar;
            for (idx, l) in &res.line {
                let line = &net.line[idx];
                if line.from_bus == bus {
                    p += l.p_from_mw;
                    q += l.q_from_mvar;
                }
                if line.to_bus == bus {
                    p += l.p_to_mw;
                    q += l.q_to_mvar;
                }
            }
            for (idx, t) in &res.trafo {
                let trafo = &net.trafo[idx];
                if trafo.hv_bus == bus {
                    p += t.p_from_mw;
                    q += t.q_from_mvar;
                }
                if trafo.lv_bus == bus {
                    p += t.p_to_mw;
                    q += t.q_to_mvar;
                }
            }
            assert!(p.abs() < 1e-6 && q.abs() < 1e-6, "bus {bus}: {p} {q}");
        }
    }

    #[test]
    fn five_bus_power_balance() {
        let net = solved(five_bus());
        let res = net.res.as_ref().unwrap();
        let losses: f64 = res.line.values().map(|l| l.pl_mw).sum();
        let ext = res.ext_grid[&0];
        assert!((ext.p_mw - (20.0 + 40.0 - 30.0 + losses)).abs() < 1e-6);
        assert!((res.bus[&3].vm_pu - 1.01).abs() < 1e-9);
        assert!((res.bus[&0].vm_pu - 1.02).abs() < 1e-12);
        assert!(res.bus[&0].va_degree.abs() < 1e-12);
        assert_bus_balance(&net);
        let internals = net.internal.as_ref().unwrap();
        assert_eq!(internals.ybus.nrows(), 5);
        assert_eq!(internals.branch.len(), 6);
    }

    #[test]
    fn transformer_network_balances() {
        let net = solved(seven_bus());
        let res = net.res.as_ref().unwrap();
        assert!(res.trafo[&0].p_from_mw > 15.0);
        assert!(res.trafo[&0].pl_mw > 0.0);
        assert!(res.bus[&4].vm_pu < res.bus[&2].vm_pu + 0.05);
        assert!((res.shunt[&0].q_mvar + 5.0 * res.bus[&2].vm_pu.powi(2)).abs() < 1e-9);
        assert_bus_balance(&net);
    }

    #[test]
    fn warm_start_needs_at_most_one_step() {
        let mut net = solved(five_bus());
        let cfg = PowerFlowConfig {
            init: InitMode::Results,
            ..Default::default()
        };
        let summary = NewtonPF.run_pf(&mut net, &cfg).unwrap();
        assert!(summary.iterations <= 1);
    }

    #[test]
    fn failure_leaves_results_untouched() {
        let mut net = five_bus();
        net.ext_grid.clear();
        let err = NewtonPF.run_pf(&mut net, &PowerFlowConfig::default()).unwrap_err();
        assert_eq!(err, PowerFlowError::NoReferenceBus);
        assert!(net.res.is_none());
        assert!(net.internal.is_none());
    }

    #[test]
    fn config_from_json_keeps_defaults() {
        let json = r#"{"max_it": 5, "init": "results"}"#;
        let cfg: PowerFlowConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_it, Some(5));
        assert_eq!(cfg.tol, Some(1e-8));
        assert!(cfg.calculate_voltage_angles);
        assert_eq!(cfg.init, InitMode::Results);
    }
}
