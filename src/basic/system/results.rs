use std::collections::HashMap;

use nalgebra::DVector;
use num_complex::Complex64;

use super::admittance::Admittance;
use super::model::{BusType, PowerFlowModel};
use super::topology::BranchKind;
use crate::network::{BranchResult, BusResult, NetResults, Network, PQResult};

fn pq(s: Complex64) -> PQResult {
    PQResult::new(s.re, s.im)
}

/// Writes bus, element and branch results for the converged voltages `v` (natural solver
/// bus order).
///
/// Reactive power of PV buses is shared equally among their generators; active and reactive
/// power of slack buses is shared equally among their reference sources. Generators that are
/// not slack keep their active setpoint and get no reactive power when they sit on a slack bus.
pub(crate) fn extract_results(
    net: &Network,
    model: &PowerFlowModel,
    v: &DVector<Complex64>,
) -> NetResults {
    let sn = net.sn_mva;
    let topo = &model.topology;
    let lookup = &topo.bus_lookup;
    let s_calc = v.component_mul(&(&model.Ybus * v).conjugate());
    let s_src = (&s_calc - &model.s_fixed) * Complex64::new(sn, 0.0);
    let vm2 = |b: usize| v[b].norm_sqr();

    let mut res = NetResults::default();

    let mut branch_flow = HashMap::new();
    for br in &topo.branches {
        let (sf, st) = br.stamp.flows(v[br.from], v[br.to]);
        let (sf, st) = (sf * sn, st * sn);
        let r = BranchResult {
            p_from_mw: sf.re,
            q_from_mvar: sf.im,
            p_to_mw: st.re,
            q_to_mvar: st.im,
            pl_mw: sf.re + st.re,
            ql_mvar: sf.im + st.im,
        };
        match br.kind {
            BranchKind::Line => {
                res.line.insert(br.index, r);
            }
            BranchKind::Trafo => {
                res.trafo.insert(br.index, r);
            }
            BranchKind::Impedance => {
                res.impedance.insert(br.index, r);
            }
            BranchKind::XWard => {
                branch_flow.insert(br.index, sf);
            }
            BranchKind::Switch => {}
        }
    }

    for (&idx, e) in net.load.iter().filter(|(_, e)| e.in_service) {
        if lookup.contains_key(&e.bus) {
            res.load.insert(idx, PQResult::new(e.p_mw * e.scaling, e.q_mvar * e.scaling));
        }
    }
    for (&idx, e) in net.sgen.iter().filter(|(_, e)| e.in_service) {
        if lookup.contains_key(&e.bus) {
            res.sgen.insert(idx, PQResult::new(e.p_mw * e.scaling, e.q_mvar * e.scaling));
        }
    }
    for (&idx, e) in net.storage.iter().filter(|(_, e)| e.in_service) {
        if lookup.contains_key(&e.bus) {
            res.storage.insert(idx, PQResult::new(e.p_mw * e.scaling, e.q_mvar * e.scaling));
        }
    }
    for (&idx, e) in net.shunt.iter().filter(|(_, e)| e.in_service) {
        if let Some(&b) = lookup.get(&e.bus) {
            let y = Admittance::shunt(e, topo.vn_kv[b], sn);
            res.shunt.insert(idx, pq(y.conj() * vm2(b) * sn));
        }
    }
    for (&idx, e) in net.ward.iter().filter(|(_, e)| e.in_service) {
        if let Some(&b) = lookup.get(&e.bus) {
            let y = Admittance::ward(e.pz_mw, e.qz_mvar, sn);
            let s = Complex64::new(e.ps_mw, e.qs_mvar) + y.conj() * vm2(b) * sn;
            res.ward.insert(idx, pq(s));
        }
    }
    for (&idx, e) in net.xward.iter().filter(|(_, e)| e.in_service) {
        if let Some(&b) = lookup.get(&e.bus) {
            let y = Admittance::ward(e.pz_mw, e.qz_mvar, sn);
            let source = branch_flow.get(&idx).copied().unwrap_or_default();
            let s = Complex64::new(e.ps_mw, e.qs_mvar) + y.conj() * vm2(b) * sn + source;
            res.xward.insert(idx, pq(s));
        }
    }

    // Sources: regular generators, then reference sources sharing what is left.
    let mut gens_at: HashMap<usize, Vec<i64>> = HashMap::new();
    let mut refs_at: HashMap<usize, Vec<(bool, i64)>> = HashMap::new();
    for (&idx, g) in net.generator.iter().filter(|(_, g)| g.in_service) {
        if let Some(&b) = lookup.get(&g.bus) {
            if g.slack {
                refs_at.entry(b).or_default().push((false, idx));
            } else {
                gens_at.entry(b).or_default().push(idx);
            }
        }
    }
    for (&idx, e) in net.ext_grid.iter().filter(|(_, e)| e.in_service) {
        if let Some(&b) = lookup.get(&e.bus) {
            refs_at.entry(b).or_default().push((true, idx));
        }
    }
    for (&b, gens) in &gens_at {
        let is_slack = model.bus_type[b] == BusType::Slack;
        let q_share = if is_slack { 0.0 } else { s_src[b].im / gens.len() as f64 };
        for idx in gens {
            let g = &net.generator[idx];
            res.generator.insert(*idx, PQResult::new(g.p_mw * g.scaling, q_share));
        }
    }
    for (&b, refs) in &refs_at {
        let gen_p: f64 = gens_at
            .get(&b)
            .map(|gens| gens.iter().map(|i| net.generator[i].p_mw * net.generator[i].scaling).sum())
            .unwrap_or(0.0);
        let share = (s_src[b] - Complex64::new(gen_p, 0.0)) / refs.len() as f64;
        for &(is_ext, idx) in refs {
            if is_ext {
                res.ext_grid.insert(idx, pq(share));
            } else {
                res.generator.insert(idx, pq(share));
            }
        }
    }

    for (&bus, &b) in lookup {
        res.bus.insert(
            bus,
            BusResult {
                vm_pu: v[b].norm(),
                va_degree: v[b].arg().to_degrees(),
                p_mw: 0.0,
                q_mvar: 0.0,
            },
        );
    }
    let mut add = |bus: i64, s: Complex64| {
        if let Some(r) = res.bus.get_mut(&bus) {
            r.p_mw += s.re;
            r.q_mvar += s.im;
        }
    };
    let c = |r: &PQResult| Complex64::new(r.p_mw, r.q_mvar);
    for (idx, r) in &res.load {
        add(net.load[idx].bus, c(r));
    }
    for (idx, r) in &res.storage {
        add(net.storage[idx].bus, c(r));
    }
    for (idx, r) in &res.shunt {
        add(net.shunt[idx].bus, c(r));
    }
    for (idx, r) in &res.ward {
        add(net.ward[idx].bus, c(r));
    }
    for (idx, r) in &res.xward {
        add(net.xward[idx].bus, c(r));
    }
    for (idx, r) in &res.sgen {
        add(net.sgen[idx].bus, -c(r));
    }
    for (idx, r) in &res.generator {
        add(net.generator[idx].bus, -c(r));
    }
    for (idx, r) in &res.ext_grid {
        add(net.ext_grid[idx].bus, -c(r));
    }
    res
}
