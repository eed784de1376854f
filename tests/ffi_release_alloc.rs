use std::alloc::System;
use std::ffi::CString;

use stats_alloc::{Region, Stats, StatsAlloc, INSTRUMENTED_SYSTEM};

use nfsim_connector::ffi::{
    delete_observable_results, delete_reactant_query_results, extract_species_compartment,
    free_compartment_info, free_string,
};
use nfsim_connector::marshal::{marshal_observables, marshal_reactant_groups};
use nfsim_connector::{CompartmentInfo, ObservableSnapshot, ReactantGroups, ReactionList, RecordMap};

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

fn record(name: &str, rate: &str) -> RecordMap {
    let mut record = RecordMap::new();
    record.insert("name".to_string(), name.to_string());
    record.insert("rate".to_string(), rate.to_string());
    record
}

fn groups(records_per_key: &[usize]) -> ReactantGroups {
    records_per_key
        .iter()
        .enumerate()
        .map(|(k, &m)| {
            let records = (0..m).map(|i| record(&format!("r{k}_{i}"), "0.25")).collect();
            (format!("S{k}()"), records)
        })
        .collect()
}

// Reallocations shift bytes without changing the allocation count, so the
// byte balance includes them. Dealloc sizes come from the layout passed back,
// so a release with the wrong length leaves this unbalanced.
fn assert_balanced(stats: &Stats, what: &str) {
    assert!(stats.allocations > 0, "{what}: nothing was allocated");
    assert_eq!(stats.allocations, stats.deallocations, "{what}: allocation count");
    let net = stats.bytes_allocated as isize + stats.bytes_reallocated - stats.bytes_deallocated as isize;
    assert_eq!(net, 0, "{what}: bytes left allocated");
}

// One test per binary: the global allocator counts every thread.
#[test]
fn c_release_functions_free_everything_into_ffi_allocated() {
    let shape = [3, 0, 1, 2];
    let input = groups(&shape);

    let region = Region::new(GLOBAL);
    let result = marshal_reactant_groups(&input).unwrap();
    let c = result.into_ffi().unwrap();
    unsafe { delete_reactant_query_results(c) };
    assert_balanced(&region.change(), "reactant results");

    let snapshot: ObservableSnapshot = vec![("Atotal", 5.0), ("Btotal", 3.0)].into_iter().collect();
    let region = Region::new(GLOBAL);
    let c = marshal_observables(&snapshot).into_ffi().unwrap();
    unsafe { delete_observable_results(c) };
    assert_balanced(&region.change(), "observable results");

    let region = Region::new(GLOBAL);
    let info = CompartmentInfo {
        name: "CP".to_string(),
        spatial_dimensions: 2,
        size: 1.0,
        outside: "EC".to_string(),
    };
    let c = info.into_ffi().unwrap();
    unsafe { free_compartment_info(c) };
    assert_balanced(&region.change(), "compartment info");

    let label = CString::new("A(b!1).B(a!1)@CP").unwrap();
    let region = Region::new(GLOBAL);
    let out = unsafe { extract_species_compartment(label.as_ptr()) };
    unsafe { free_string(out) };
    assert_balanced(&region.change(), "extracted compartment");

    // Arrays of mismatched length never reach the C heap.
    let mut bad = marshal_reactant_groups(&input).unwrap();
    bad.reactions[0] = ReactionList {
        names: vec!["x".to_string(), "y".to_string()],
        rates: vec![1.0],
    };
    let region = Region::new(GLOBAL);
    let err = bad.into_ffi().unwrap_err();
    drop(err);
    let stats = region.change();
    assert_eq!(stats.allocations, 0);
}
