//! Quantified invariants of the library, merge and transformation layers.

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use tempfile::tempdir;

use speclib::library::{merge_shards, InsertRequest, MergeOptions, SpectrumLibrary};
use speclib::metadata::{keys, MetadataMap, MetadataValue};
use speclib::prelude::*;

fn star(name: &str, teff: f64) -> Spectrum {
    let mut meta = MetadataMap::new();
    meta.insert(keys::STARNAME.to_string(), MetadataValue::from(name));
    meta.insert(keys::TEFF.to_string(), MetadataValue::from(teff));
    Spectrum::new(
        vec![4000.0, 4001.0, 4002.0, 4003.0],
        vec![1.0, 0.8, 0.9, 1.0],
        vec![0.01, 0.01, 0.01, 0.01],
        meta,
    )
    .unwrap()
}

fn fill_shard(workspace: &Path, name: &str, spectra: &[Spectrum]) {
    let mut shard =
        SpectrumLibrary::create(workspace.join(name), PayloadFormat::Binary).unwrap();
    for spectrum in spectra {
        shard.insert_one(InsertRequest::new(spectrum)).unwrap();
    }
}

/// One line per entry capturing metadata and the three arrays; sorting the
/// lines compares libraries as multisets of (metadata, payload) pairs.
fn entry_fingerprints(library: &SpectrumLibrary) -> Vec<String> {
    let entries = library.entries().unwrap();
    let mut fingerprints = Vec::with_capacity(entries.len());
    for entry in entries {
        let loaded = library.open_ids(&[entry.id]).unwrap();
        let spectrum = loaded.get(0).unwrap();
        fingerprints.push(format!(
            "{:?}|{:?}|{:?}|{:?}",
            spectrum.metadata(),
            spectrum.wavelengths(),
            spectrum.values(),
            spectrum.value_errors()
        ));
    }
    fingerprints
}

fn sorted(mut v: Vec<String>) -> Vec<String> {
    v.sort();
    v
}

#[test]
fn open_metadata_is_a_superset_of_insert_metadata() {
    let dir = tempdir().unwrap();
    let mut library =
        SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();

    let spectrum = star("Vega", 9602.0);
    let mut overrides = MetadataMap::new();
    overrides.insert(keys::SNR.to_string(), MetadataValue::from(250i64));

    let id = library
        .insert_one(InsertRequest::new(&spectrum).overrides(&overrides))
        .unwrap();

    let stored = &library.get_metadata(&[id]).unwrap()[0];
    for (key, value) in spectrum.metadata().iter().chain(overrides.iter()) {
        assert_eq!(stored.get(key), Some(value));
    }
    // The one key the library may add on its own.
    assert_eq!(
        stored.get(keys::CONTINUUM_NORMALISED),
        Some(&MetadataValue::from(0i64))
    );
}

#[test]
fn empty_search_returns_all_ids_ascending() {
    let dir = tempdir().unwrap();
    let mut library =
        SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
    for i in 0..7 {
        library
            .insert_one(InsertRequest::new(&star("x", 4000.0 + f64::from(i))))
            .unwrap();
    }

    let entries = library.search(&ConstraintSet::new()).unwrap();
    let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
    assert_eq!(ids, (1..=7).collect::<Vec<i64>>());
}

#[test]
fn unknown_field_matches_nothing() {
    let dir = tempdir().unwrap();
    let mut library =
        SpectrumLibrary::create(dir.path().join("lib"), PayloadFormat::Binary).unwrap();
    library
        .insert_one(InsertRequest::new(&star("Sun", 5771.8)))
        .unwrap();

    assert!(!library
        .list_metadata_fields()
        .unwrap()
        .contains(&"no_such_field".to_string()));
    let found = library
        .search(&ConstraintSet::new().equals("no_such_field", 1i64))
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn merge_is_associative_on_entry_multisets() {
    let a: Vec<Spectrum> = (0..3).map(|i| star("a", 4000.0 + f64::from(i))).collect();
    let b: Vec<Spectrum> = (0..2).map(|i| star("b", 5000.0 + f64::from(i))).collect();
    let c: Vec<Spectrum> = (0..4).map(|i| star("c", 6000.0 + f64::from(i))).collect();

    let dir = tempdir().unwrap();
    let ws = dir.path();

    // (A ++ B) ++ C
    fill_shard(ws, "m1_0", &a);
    fill_shard(ws, "m1_1", &b);
    merge_shards(ws, "m1", MergeOptions::default()).unwrap();
    fs::rename(ws.join("m1"), ws.join("m2_0")).unwrap();
    fill_shard(ws, "m2_1", &c);
    merge_shards(ws, "m2", MergeOptions::default()).unwrap();

    // A ++ (B ++ C)
    fill_shard(ws, "m3_0", &b);
    fill_shard(ws, "m3_1", &c);
    merge_shards(ws, "m3", MergeOptions::default()).unwrap();
    fs::rename(ws.join("m3"), ws.join("m4_1")).unwrap();
    fill_shard(ws, "m4_0", &a);
    merge_shards(ws, "m4", MergeOptions::default()).unwrap();

    let left = SpectrumLibrary::open_read_only(ws.join("m2")).unwrap();
    let right = SpectrumLibrary::open_read_only(ws.join("m4")).unwrap();
    assert_eq!(
        sorted(entry_fingerprints(&left)),
        sorted(entry_fingerprints(&right))
    );
}

#[test]
fn merging_a_single_shard_copies_it() {
    let spectra: Vec<Spectrum> = (0..5).map(|i| star("s", 4000.0 + f64::from(i))).collect();

    let dir = tempdir().unwrap();
    fill_shard(dir.path(), "solo_0", &spectra);
    merge_shards(dir.path(), "solo", MergeOptions::default()).unwrap();

    let shard = SpectrumLibrary::open_read_only(dir.path().join("solo_0")).unwrap();
    let merged = SpectrumLibrary::open_read_only(dir.path().join("solo")).unwrap();

    // Same entries in the same order; ids are renumbered from one either way.
    assert_eq!(entry_fingerprints(&shard), entry_fingerprints(&merged));
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Strictly increasing positive wavelength grids with matching values.
    fn arb_spectrum_arrays() -> impl Strategy<Value = (Vec<f64>, Vec<f64>, Vec<f64>)> {
        (2usize..40).prop_flat_map(|n| {
            (
                prop::collection::vec(0.1f64..10.0, n),
                prop::collection::vec(-5.0f64..5.0, n),
                prop::collection::vec(0.0f64..1.0, n),
            )
                .prop_map(|(steps, values, errors)| {
                    let mut w = 3000.0;
                    let wavelengths: Vec<f64> = steps
                        .into_iter()
                        .map(|step| {
                            w += step;
                            w
                        })
                        .collect();
                    (wavelengths, values, errors)
                })
        })
    }

    fn arb_field_key() -> impl Strategy<Value = String> {
        prop_oneof![
            "[A-Za-z][A-Za-z0-9_]{0,8}",
            Just("[Fe/H]".to_string()),
            Just("[Mg/H]".to_string()),
        ]
    }

    /// Integer, real and bare-string literals as they appear in spec strings.
    fn arb_literal() -> impl Strategy<Value = String> {
        prop_oneof![
            any::<i64>().prop_map(|i| i.to_string()),
            (-1.0e6f64..1.0e6).prop_map(|v| v.to_string()),
            "[A-Za-z][A-Za-z0-9_.]{0,8}",
        ]
    }

    /// Syntactically valid library-spec strings, with and without
    /// constraint lists.
    fn arb_spec_string() -> impl Strategy<Value = String> {
        let token = prop_oneof![
            (arb_field_key(), arb_literal()).prop_map(|(k, v)| format!("{k}={v}")),
            (arb_literal(), arb_field_key(), arb_literal())
                .prop_map(|(lo, k, hi)| format!("{lo}<{k}<{hi}")),
        ];
        ("[a-z][a-z0-9_]{0,8}", prop::collection::vec(token, 0..4)).prop_map(
            |(name, tokens)| {
                if tokens.is_empty() {
                    name
                } else {
                    format!("{name}[{}]", tokens.join(","))
                }
            },
        )
    }

    proptest! {
        /// Resampling a spectrum onto its own raster reproduces it.
        #[test]
        fn resample_onto_own_raster_is_identity(
            (wavelengths, values, errors) in arb_spectrum_arrays()
        ) {
            let mut meta = MetadataMap::new();
            meta.insert(keys::STARNAME.to_string(), MetadataValue::from("p"));
            let spectrum =
                Spectrum::new(wavelengths.clone(), values.clone(), errors.clone(), meta)
                    .unwrap();

            let resampled = spectrum.resample_onto(&wavelengths).unwrap();
            for (got, want) in resampled.values().iter().zip(&values) {
                prop_assert!((got - want).abs() <= 1e-9 * want.abs().max(1.0));
            }
            for (got, want) in resampled.value_errors().iter().zip(&errors) {
                prop_assert!(*got >= *want - 1e-12);
            }
        }

        /// Zero colour excess leaves the values untouched.
        #[test]
        fn zero_reddening_is_identity(
            (wavelengths, values, errors) in arb_spectrum_arrays()
        ) {
            let mut meta = MetadataMap::new();
            meta.insert(keys::STARNAME.to_string(), MetadataValue::from("p"));
            let spectrum = Spectrum::new(wavelengths, values.clone(), errors, meta).unwrap();

            let reddened = spectrum.redden(0.0);
            prop_assert_eq!(reddened.values(), values.as_slice());
        }

        /// per_a is per_pixel times the fixed conversion factor, exactly.
        #[test]
        fn snr_scales_by_the_conversion_factor(value in 0.0f64..1e6) {
            let raster: Vec<f64> = (0..20).map(|i| 5000.0 + 0.5 * f64::from(i)).collect();
            let converter = SnrConverter::new(&raster, 5000.0).unwrap();

            let snr = converter.per_pixel(value);
            prop_assert_eq!(snr.per_a(), value * converter.factor());
        }

        /// Formatting a parsed spec is a fixed point of parse-then-format,
        /// even when a literal changes storage class on the way (a real
        /// written `5000` reparses as an integer).
        #[test]
        fn spec_strings_survive_a_parse_format_parse_cycle(spec in arb_spec_string()) {
            let parsed = speclib::library::parse_library_spec(&spec).unwrap();
            let formatted = parsed.to_string();
            let reparsed = speclib::library::parse_library_spec(&formatted).unwrap();
            prop_assert_eq!(formatted, reparsed.to_string());
        }
    }
}
