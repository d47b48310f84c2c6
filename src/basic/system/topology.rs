//! Solver bus topology: bus fusing over closed switches, extended ward internal nodes,
//! branch stamps and the energisation check.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use tracing::{debug, warn};

use super::admittance::BranchStamp;
use crate::error::PowerFlowError;
use crate::network::{Network, SwitchType};

/// Implements a Union-Find structure for merging buses connected by closed switches.
#[derive(Default, Debug, Clone)]
pub struct NodeMerge {
    pub parent: HashMap<i64, i64>,
    pub rank: HashMap<i64, u64>,
}

impl NodeMerge {
    /// Each node starts as its own parent with rank 0.
    pub fn new(nodes: &[i64]) -> Self {
        let parent = nodes.iter().map(|&n| (n, n)).collect();
        let rank = nodes.iter().map(|&n| (n, 0)).collect();
        NodeMerge { parent, rank }
    }

    /// Finds the root of a node with path compression. Unknown nodes are their own root.
    pub fn find(&mut self, node: i64) -> i64 {
        let mut root = node;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }
        let mut current = node;
        while let Some(&p) = self.parent.get(&current) {
            if p == root {
                break;
            }
            self.parent.insert(current, root);
            current = p;
        }
        root
    }

    /// Merges two nodes by their roots based on rank.
    pub fn union(&mut self, node1: i64, node2: i64) {
        let root1 = self.find(node1);
        let root2 = self.find(node2);
        if root1 == root2 {
            return;
        }
        let rank1 = self.rank.get(&root1).copied().unwrap_or(0);
        let rank2 = self.rank.get(&root2).copied().unwrap_or(0);
        if rank1 < rank2 {
            self.parent.insert(root1, root2);
        } else {
            self.parent.insert(root2, root1);
            if rank1 == rank2 {
                self.rank.insert(root1, rank1 + 1);
            }
        }
    }

    /// Maps every node to a consecutive id, starting at `starting_idx`, in ascending order of
    /// the smallest node of each merged group.
    pub fn get_node_mapping(&mut self, starting_idx: usize) -> HashMap<i64, usize> {
        let mut nodes: Vec<_> = self.parent.keys().copied().collect();
        nodes.sort_unstable();
        let mut root_to_new_id = HashMap::new();
        let mut node_mapping = HashMap::new();
        for node in nodes {
            let root = self.find(node);
            let next = starting_idx + root_to_new_id.len();
            let id = *root_to_new_id.entry(root).or_insert(next);
            node_mapping.insert(node, id);
        }
        node_mapping
    }
}

/// Origin of a solver branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Line,
    Trafo,
    Impedance,
    Switch,
    /// Series branch between an extended ward's bus and its internal node.
    XWard,
}

/// A branch record stamped into the admittance matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverBranch {
    pub from: usize,
    pub to: usize,
    pub kind: BranchKind,
    /// Index of the originating element in its table.
    pub index: i64,
    pub stamp: BranchStamp,
}

/// Energised solver buses and the branches between them.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Network bus -> solver bus. Fused buses share a solver bus.
    pub bus_lookup: HashMap<i64, usize>,
    /// Extended ward -> solver bus of its internal node.
    pub aux_bus: BTreeMap<i64, usize>,
    pub branches: Vec<SolverBranch>,
    /// Rated voltage of every solver bus.
    pub vn_kv: Vec<f64>,
    pub n_bus: usize,
}

impl Topology {
    /// Builds the solver topology of the in-service part of `net` that is connected to a
    /// reference source.
    pub fn build(net: &Network, calculate_voltage_angles: bool) -> Result<Self, PowerFlowError> {
        let sn = net.sn_mva;
        let buses: Vec<i64> = net
            .bus
            .iter()
            .filter(|(_, b)| b.in_service)
            .map(|(&idx, _)| idx)
            .collect();
        let in_service: HashSet<i64> = buses.iter().copied().collect();

        let mut merge = NodeMerge::new(&buses);
        let mut open_line = HashSet::new();
        let mut open_trafo = HashSet::new();
        for s in net.switch.values() {
            match (s.et, s.closed) {
                (SwitchType::SwitchTwoBuses, true) if s.z_ohm == 0.0 => {
                    if in_service.contains(&s.bus) && in_service.contains(&s.element) {
                        merge.union(s.bus, s.element);
                    }
                }
                (SwitchType::SwitchBusLine, false) => {
                    open_line.insert(s.element);
                }
                (SwitchType::SwitchBusTransformer, false) => {
                    open_trafo.insert(s.element);
                }
                _ => {}
            }
        }
        let lookup = merge.get_node_mapping(0);
        let n_regular = lookup.values().max().map_or(0, |&m| m + 1);
        let mut vn_kv = vec![0.0; n_regular];
        for &b in buses.iter().rev() {
            vn_kv[lookup[&b]] = net.bus[&b].vn_kv;
        }

        let mut branches = Vec::new();
        let pair = |a: i64, b: i64| Some((*lookup.get(&a)?, *lookup.get(&b)?));

        for (&idx, line) in net.line.iter().filter(|(_, l)| l.in_service) {
            if open_line.contains(&idx) {
                continue;
            }
            let Some((from, to)) = pair(line.from_bus, line.to_bus) else {
                continue;
            };
            match BranchStamp::line(line, vn_kv[from], sn, net.f_hz) {
                Some(stamp) => branches.push(SolverBranch {
                    from,
                    to,
                    kind: BranchKind::Line,
                    index: idx,
                    stamp,
                }),
                None => warn!(line = idx, "line with zero impedance ignored"),
            }
        }
        for (&idx, trafo) in net.trafo.iter().filter(|(_, t)| t.in_service) {
            if open_trafo.contains(&idx) {
                continue;
            }
            let Some((from, to)) = pair(trafo.hv_bus, trafo.lv_bus) else {
                continue;
            };
            match BranchStamp::trafo(trafo, vn_kv[from], vn_kv[to], sn, calculate_voltage_angles) {
                Some(stamp) => branches.push(SolverBranch {
                    from,
                    to,
                    kind: BranchKind::Trafo,
                    index: idx,
                    stamp,
                }),
                None => warn!(trafo = idx, "transformer with zero impedance ignored"),
            }
        }
        for (&idx, imp) in net.impedance.iter().filter(|(_, i)| i.in_service) {
            let Some((from, to)) = pair(imp.from_bus, imp.to_bus) else {
                continue;
            };
            match BranchStamp::impedance(imp, sn) {
                Some(stamp) => branches.push(SolverBranch {
                    from,
                    to,
                    kind: BranchKind::Impedance,
                    index: idx,
                    stamp,
                }),
                None => warn!(impedance = idx, "impedance with zero value ignored"),
            }
        }
        for (&idx, s) in net.switch.iter() {
            if s.et != SwitchType::SwitchTwoBuses || !s.closed || s.z_ohm == 0.0 {
                continue;
            }
            let Some((from, to)) = pair(s.bus, s.element) else {
                continue;
            };
            if let Some(stamp) = BranchStamp::series_ohm(s.z_ohm, 0.0, vn_kv[from], sn) {
                branches.push(SolverBranch {
                    from,
                    to,
                    kind: BranchKind::Switch,
                    index: idx,
                    stamp,
                });
            }
        }

        let mut aux_bus = BTreeMap::new();
        for (&idx, xw) in net.xward.iter().filter(|(_, x)| x.in_service) {
            let Some(&from) = lookup.get(&xw.bus) else {
                continue;
            };
            let Some(stamp) = BranchStamp::series_ohm(xw.r_ohm, xw.x_ohm, vn_kv[from], sn) else {
                debug!(xward = idx, "extended ward without a usable series impedance");
                continue;
            };
            let to = vn_kv.len();
            vn_kv.push(vn_kv[from]);
            aux_bus.insert(idx, to);
            branches.push(SolverBranch {
                from,
                to,
                kind: BranchKind::XWard,
                index: idx,
                stamp,
            });
        }

        let topo = Topology {
            bus_lookup: lookup,
            aux_bus,
            branches,
            n_bus: vn_kv.len(),
            vn_kv,
        };
        topo.energised(net)
    }

    /// Keeps only solver buses reachable from a reference source and renumbers them.
    fn energised(self, net: &Network) -> Result<Self, PowerFlowError> {
        let mut adjacency = vec![Vec::new(); self.n_bus];
        for br in &self.branches {
            adjacency[br.from].push(br.to);
            adjacency[br.to].push(br.from);
        }
        let refs = net
            .ext_grid
            .values()
            .filter(|e| e.in_service)
            .map(|e| e.bus)
            .chain(
                net.generator
                    .values()
                    .filter(|g| g.in_service && g.slack)
                    .map(|g| g.bus),
            )
            .filter_map(|b| self.bus_lookup.get(&b).copied());

        let mut reached = vec![false; self.n_bus];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for r in refs {
            if !reached[r] {
                reached[r] = true;
                queue.push_back(r);
            }
        }
        if queue.is_empty() {
            return Err(PowerFlowError::NoReferenceBus);
        }
        while let Some(b) = queue.pop_front() {
            for &n in &adjacency[b] {
                if !reached[n] {
                    reached[n] = true;
                    queue.push_back(n);
                }
            }
        }

        let mut renumber = vec![None; self.n_bus];
        let mut next = 0;
        for (old, _) in reached.iter().enumerate().filter(|(_, r)| **r) {
            renumber[old] = Some(next);
            next += 1;
        }
        if next < self.n_bus {
            debug!(isolated = self.n_bus - next, "solver buses without reference dropped");
        }
        let bus_lookup = self
            .bus_lookup
            .into_iter()
            .filter_map(|(bus, old)| Some((bus, renumber[old]?)))
            .collect();
        let aux_bus = self
            .aux_bus
            .into_iter()
            .filter_map(|(xw, old)| Some((xw, renumber[old]?)))
            .collect();
        let branches = self
            .branches
            .into_iter()
            .filter_map(|br| {
                Some(SolverBranch {
                    from: renumber[br.from]?,
                    to: renumber[br.to]?,
                    ..br
                })
            })
            .collect();
        let vn_kv = self
            .vn_kv
            .iter()
            .zip(&reached)
            .filter(|(_, r)| **r)
            .map(|(v, _)| *v)
            .collect();
        Ok(Topology {
            bus_lookup,
            aux_bus,
            branches,
            vn_kv,
            n_bus: next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::*;

    #[test]
    fn node_merge_groups_by_root() {
        let mut m = NodeMerge::new(&[4, 1, 7, 3]);
        m.union(7, 1);
        m.union(3, 7);
        let map = m.get_node_mapping(10);
        assert_eq!(map[&1], 10);
        assert_eq!(map[&3], 10);
        assert_eq!(map[&7], 10);
        assert_eq!(map[&4], 11);
    }

    fn feeder() -> Network {
        let mut net = Network::new(50.0, 1.0);
        for _ in 0..4 {
            net.create_bus(Bus::new(20.0));
        }
        net.create_ext_grid(ExtGrid::new(0, 1.0, 0.0)).unwrap();
        net.create_line(Line::new(0, 1, 1.0, 0.2, 0.3)).unwrap();
        net.create_switch(Switch::bus_bus(1, 2)).unwrap();
        net
    }

    #[test]
    fn closed_switches_fuse_buses_and_islands_are_dropped() {
        let net = feeder();
        let topo = Topology::build(&net, true).unwrap();
        assert_eq!(topo.n_bus, 2);
        assert_eq!(topo.bus_lookup[&1], topo.bus_lookup[&2]);
        assert!(!topo.bus_lookup.contains_key(&3));
        assert_eq!(topo.branches.len(), 1);
    }

    #[test]
    fn open_line_switch_disconnects() {
        let mut net = feeder();
        net.create_switch(Switch {
            name: None,
            bus: 0,
            element: 0,
            et: SwitchType::SwitchBusLine,
            closed: false,
            z_ohm: 0.0,
        })
        .unwrap();
        let topo = Topology::build(&net, true).unwrap();
        assert_eq!(topo.n_bus, 1);
        assert!(topo.branches.is_empty());
    }

    #[test]
    fn xward_gets_an_internal_node() {
        let mut net = feeder();
        net.create_xward(XWard {
            name: None,
            bus: 1,
            ps_mw: 0.0,
            qs_mvar: 0.0,
            pz_mw: 0.0,
            qz_mvar: 0.0,
            r_ohm: 0.0,
            x_ohm: 5.0,
            vm_pu: 1.01,
            in_service: true,
        })
        .unwrap();
        let topo = Topology::build(&net, true).unwrap();
        assert_eq!(topo.n_bus, 3);
        assert_eq!(topo.aux_bus[&0], 2);
        assert_eq!(topo.branches[1].kind, BranchKind::XWard);
    }

    #[test]
    fn no_reference_is_an_error() {
        let mut net = feeder();
        net.ext_grid.clear();
        assert_eq!(
            Topology::build(&net, true).unwrap_err(),
            PowerFlowError::NoReferenceBus
        );
    }
}
