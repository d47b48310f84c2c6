use std::collections::HashSet;

use crate::basic::system::SolverInternals;
use crate::error::EquivalentError;

/// Resolves network buses to the solver bus indices needed to index into Ybus.
///
/// The result starts with the solver buses of `buses` in caller order. Every auxiliary
/// solver bus (neither a target nor in `nogo`) that shares a branch with a bus already in
/// the list is prepended, in branch order. Targets without a solver bus, or sharing one with
/// another target, are rejected.
pub fn get_solver_buses(
    internals: &SolverInternals,
    buses: &[i64],
    nogo: &[i64],
) -> Result<Vec<usize>, EquivalentError> {
    let ybus_size = internals.ybus.nrows();
    let mut resolved = Vec::with_capacity(buses.len());
    let mut in_list = HashSet::new();
    for &bus in buses {
        let idx = *internals
            .bus_lookup
            .get(&bus)
            .ok_or(EquivalentError::UnresolvedBus { bus })?;
        if !in_list.insert(idx) {
            return Err(EquivalentError::UnresolvedBus { bus });
        }
        resolved.push(idx);
    }
    let nogo: HashSet<usize> = nogo
        .iter()
        .filter_map(|b| internals.bus_lookup.get(b).copied())
        .collect();
    let is_aux = |b: usize| !nogo.contains(&b);

    let mut prepended = Vec::new();
    for br in &internals.branch {
        let (f, t) = (br.from, br.to);
        let aux = if !in_list.contains(&f) && is_aux(f) && in_list.contains(&t) {
            f
        } else if !in_list.contains(&t) && is_aux(t) && in_list.contains(&f) {
            t
        } else {
            continue;
        };
        in_list.insert(aux);
        prepended.push(aux);
    }
    prepended.reverse();
    prepended.extend(resolved);

    if prepended.len() > ybus_size {
        return Err(EquivalentError::IndexInconsistency {
            resolved: prepended.len(),
            ybus_size,
        });
    }
    Ok(prepended)
}
