//! C-compatible mirrors of the marshaled results.
//!
//! Each `into_ffi` conversion moves an owned result onto the C heap as
//! `#[repr(C)]` structs of raw pointers. Every pointer handed out must be
//! returned to exactly one of the `extern "C"` release functions below; the
//! caller must not free them with the C allocator.

use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

use crate::engine::label_compartment;
use crate::error::ValidationError;
use crate::marshal::{CompartmentInfo, ObservableQueryResult, ReactantQueryResult};

/// Reactions for one reactant key.
#[repr(C)]
#[derive(Debug)]
pub struct ReactionResultC {
    /// `num_of_associated_reactions[i]` NUL-terminated names.
    pub reaction_names: *mut *mut c_char,
    /// Rates, index-aligned with `reaction_names`.
    pub rates: *mut f64,
}

/// Result of a by-reactant-count query.
#[repr(C)]
#[derive(Debug)]
pub struct ReactantQueryResultsC {
    /// Number of keys.
    pub num_of_results: c_int,
    /// Reactant labels.
    pub keys: *mut *mut c_char,
    /// Reactions per key.
    pub num_of_associated_reactions: *mut c_int,
    /// Per-key reaction arrays.
    pub associated_reactions: *mut ReactionResultC,
}

/// Result of an observable query.
#[repr(C)]
#[derive(Debug)]
pub struct ObservableResultsC {
    /// Observable names.
    pub observable_names: *mut *mut c_char,
    /// Values, index-aligned with `observable_names`.
    pub observable_values: *mut f64,
    /// Number of observables.
    pub num_results: c_int,
}

/// Compartment description.
#[repr(C)]
#[derive(Debug)]
pub struct CompartmentStructC {
    /// Compartment name.
    pub name: *mut c_char,
    /// Number of spatial dimensions.
    pub spatial_dimensions: c_int,
    /// Compartment size.
    pub size: f64,
    /// Enclosing compartment name.
    pub outside: *mut c_char,
}

fn to_c_string(value: String, field: &'static str) -> Result<CString, ValidationError> {
    CString::new(value).map_err(|_| ValidationError::InteriorNul { field })
}

fn to_c_int(len: usize) -> Result<c_int, ValidationError> {
    c_int::try_from(len).map_err(|_| ValidationError::ResultTooLarge { len })
}

fn check_lengths(what: &'static str, left: usize, right: usize) -> Result<(), ValidationError> {
    if left == right {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch { what, left, right })
    }
}

fn to_c_strings(values: Vec<String>, field: &'static str) -> Result<Vec<CString>, ValidationError> {
    values.into_iter().map(|v| to_c_string(v, field)).collect()
}

/// Leaks `values` as a boxed slice. Empty input yields null.
fn leak<T>(values: Vec<T>) -> *mut T {
    if values.is_empty() {
        return ptr::null_mut();
    }
    Box::into_raw(values.into_boxed_slice()).cast::<T>()
}

fn leak_strings(values: Vec<CString>) -> *mut *mut c_char {
    leak(values.into_iter().map(CString::into_raw).collect())
}

/// Reclaims a slice produced by [`leak`].
///
/// # Safety
///
/// `data` must be null or come from `leak` with exactly `len` elements.
unsafe fn reclaim<T>(data: *mut T, len: usize) -> Vec<T> {
    if data.is_null() || len == 0 {
        return Vec::new();
    }
    // SAFETY: `leak` produced a boxed slice with `len` elements at `data`.
    unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)) }.into_vec()
}

/// Frees `len` strings produced by [`leak_strings`].
///
/// # Safety
///
/// `data` must be null or come from `leak_strings` with exactly `len` elements.
unsafe fn reclaim_strings(data: *mut *mut c_char, len: usize) {
    // SAFETY: forwarded from the caller.
    for raw in unsafe { reclaim(data, len) } {
        if !raw.is_null() {
            // SAFETY: every element came from `CString::into_raw`.
            drop(unsafe { CString::from_raw(raw) });
        }
    }
}

fn len_of(count: c_int) -> usize {
    usize::try_from(count).unwrap_or(0)
}

impl ReactantQueryResult {
    /// Moves the result onto the C heap.
    ///
    /// Every string is converted before anything is leaked, so an error leaks
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::LengthMismatch` if the per-key arrays disagree
    /// in length, `ValidationError::InteriorNul` for a string containing NUL
    /// and `ValidationError::ResultTooLarge` if a count does not fit a C `int`.
    pub fn into_ffi(self) -> Result<ReactantQueryResultsC, ValidationError> {
        check_lengths("reactant keys and reaction lists", self.keys.len(), self.reactions.len())?;
        for list in &self.reactions {
            check_lengths("reaction names and rates", list.names.len(), list.rates.len())?;
        }
        let num_of_results = to_c_int(self.keys.len())?;
        let keys = to_c_strings(self.keys, "reactant key")?;

        let mut counts = Vec::with_capacity(self.reactions.len());
        let mut lists = Vec::with_capacity(self.reactions.len());
        for list in self.reactions {
            counts.push(to_c_int(list.names.len())?);
            lists.push((to_c_strings(list.names, "reaction name")?, list.rates));
        }

        let associated: Vec<ReactionResultC> = lists
            .into_iter()
            .map(|(names, rates)| ReactionResultC {
                reaction_names: leak_strings(names),
                rates: leak(rates),
            })
            .collect();

        Ok(ReactantQueryResultsC {
            num_of_results,
            keys: leak_strings(keys),
            num_of_associated_reactions: leak(counts),
            associated_reactions: leak(associated),
        })
    }
}

impl ObservableQueryResult {
    /// Moves the result onto the C heap.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::LengthMismatch` if names and values disagree
    /// in length, `ValidationError::InteriorNul` or
    /// `ValidationError::ResultTooLarge`.
    pub fn into_ffi(self) -> Result<ObservableResultsC, ValidationError> {
        check_lengths("observable names and values", self.names.len(), self.values.len())?;
        let num_results = to_c_int(self.names.len())?;
        let names = to_c_strings(self.names, "observable name")?;
        Ok(ObservableResultsC {
            observable_names: leak_strings(names),
            observable_values: leak(self.values),
            num_results,
        })
    }
}

impl CompartmentInfo {
    /// Moves the description onto the C heap.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InteriorNul` if a name contains NUL.
    pub fn into_ffi(self) -> Result<CompartmentStructC, ValidationError> {
        let name = to_c_string(self.name, "compartment name")?;
        let outside = to_c_string(self.outside, "outside compartment")?;
        Ok(CompartmentStructC {
            name: name.into_raw(),
            spatial_dimensions: self.spatial_dimensions,
            size: self.size,
            outside: outside.into_raw(),
        })
    }
}

/// Frees a reactant result and every array it owns.
///
/// # Safety
///
/// `result` must come from [`ReactantQueryResult::into_ffi`] and must not be
/// used or released again.
#[no_mangle]
pub unsafe extern "C" fn delete_reactant_query_results(result: ReactantQueryResultsC) {
    let keys = len_of(result.num_of_results);
    // SAFETY: all arrays were built by `into_ffi` with `keys` elements.
    unsafe {
        reclaim_strings(result.keys, keys);
        let counts = reclaim(result.num_of_associated_reactions, keys);
        let lists = reclaim(result.associated_reactions, keys);
        for (list, count) in lists.into_iter().zip(counts) {
            let reactions = len_of(count);
            reclaim_strings(list.reaction_names, reactions);
            drop(reclaim(list.rates, reactions));
        }
    }
}

/// Frees an observable result.
///
/// # Safety
///
/// `result` must come from [`ObservableQueryResult::into_ffi`] and must not be
/// used or released again.
#[no_mangle]
pub unsafe extern "C" fn delete_observable_results(result: ObservableResultsC) {
    let len = len_of(result.num_results);
    // SAFETY: both arrays were built by `into_ffi` with `len` elements.
    unsafe {
        reclaim_strings(result.observable_names, len);
        drop(reclaim(result.observable_values, len));
    }
}

/// Frees a compartment description.
///
/// # Safety
///
/// `info` must come from [`CompartmentInfo::into_ffi`] and must not be used or
/// released again.
#[no_mangle]
pub unsafe extern "C" fn free_compartment_info(info: CompartmentStructC) {
    // SAFETY: both strings came from `CString::into_raw`.
    unsafe {
        free_string(info.name);
        free_string(info.outside);
    }
}

/// Compartment named in a species label, as a new string.
///
/// A label without a compartment yields an empty string; a null label yields
/// null. Release the result with [`free_string`].
///
/// # Safety
///
/// `label` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn extract_species_compartment(label: *const c_char) -> *mut c_char {
    if label.is_null() {
        return ptr::null_mut();
    }
    // SAFETY: the caller guarantees a valid NUL-terminated string.
    let label = unsafe { CStr::from_ptr(label) }.to_string_lossy();
    CString::new(label_compartment(&label)).map_or(ptr::null_mut(), CString::into_raw)
}

/// Frees a string handed out by this library. Null is ignored.
///
/// # Safety
///
/// `value` must be null or come from this library and not be freed again.
#[no_mangle]
pub unsafe extern "C" fn free_string(value: *mut c_char) {
    if !value.is_null() {
        // SAFETY: the caller guarantees `value` came from `CString::into_raw`.
        drop(unsafe { CString::from_raw(value) });
    }
}
